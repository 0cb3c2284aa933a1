//! Terminal client: wires the engine to the WebSocket transport, the upload
//! client, a simulated player and stdin.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::playback::{PlaybackSink, SimulatedPlayer};
use crate::status::{ConsoleStatus, UploadStatus};
use crate::sync::{ConnectionSupervisor, SyncReconciler};
use crate::transport::{TransportEvent, WebSocketTransport};
use crate::upload::{self, UploadClient};

pub mod console;

pub use console::{CommandParseError, ConsoleCommand};

/// Drives suppression expiry and the resync timer.
pub const HOUSEKEEPING_TICK: Duration = Duration::from_millis(100);

type Supervisor = ConnectionSupervisor<SimulatedPlayer, ConsoleStatus>;

#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Join as soon as the client starts instead of waiting for `join`.
    pub auto_join: bool,
    /// Uploaded once the first connection hands out an identity.
    pub upload: Option<PathBuf>,
}

struct UploadRunner {
    client: UploadClient,
    results: UnboundedSender<UploadStatus>,
    /// Requested before an identity was available.
    deferred: Option<PathBuf>,
}

impl UploadRunner {
    fn request(&mut self, supervisor: &mut Supervisor, path: PathBuf) {
        if let Err(err) = upload::validate_extension(&path) {
            supervisor.set_upload_status(UploadStatus::Failed(err.to_string()));
            return;
        }
        let Some(sid) = supervisor.local_identity().cloned() else {
            println!("⏳ not connected yet; upload starts once connected");
            self.deferred = Some(path);
            return;
        };
        supervisor.set_upload_status(UploadStatus::InProgress);
        upload::spawn_upload(self.client.clone(), path, sid, self.results.clone());
    }

    fn resume(&mut self, supervisor: &mut Supervisor) {
        if supervisor.local_identity().is_none() {
            return;
        }
        if let Some(path) = self.deferred.take() {
            self.request(supervisor, path);
        }
    }
}

pub async fn run(config: ClientConfig, options: ClientOptions) -> Result<()> {
    info!(
        server = %config.server_url,
        upload = %config.upload_url,
        "starting watchparty client"
    );

    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let player = SimulatedPlayer::new(sink_tx);
    let reconciler = SyncReconciler::new(player, ConsoleStatus, config.tuning.clone());
    let mut supervisor = ConnectionSupervisor::new(reconciler);

    let (upload_tx, mut upload_rx) = mpsc::unbounded_channel();
    let mut uploads = UploadRunner {
        client: UploadClient::new(config.upload_url.clone())?,
        results: upload_tx,
        deferred: options.upload,
    };

    let (mut transport, mut transport_rx) =
        WebSocketTransport::spawn(config.server_url.clone(), config.reconnect_delay);

    let (console_tx, mut console_rx) = mpsc::unbounded_channel();
    console::spawn_reader(console_tx);
    let mut console_open = true;

    if options.auto_join {
        join(&mut supervisor, Instant::now());
    } else {
        println!("type 'join' to start watching, 'help' for commands");
    }

    let mut ticker = tokio::time::interval(HOUSEKEEPING_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = transport_rx.recv() => {
                let connected = matches!(event, TransportEvent::Connected { .. });
                supervisor.handle_transport_event(event, Instant::now());
                if connected {
                    uploads.resume(&mut supervisor);
                }
            }
            Some(event) = sink_rx.recv() => {
                supervisor.handle_sink_event(event, Instant::now());
            }
            Some(status) = upload_rx.recv() => {
                supervisor.set_upload_status(status);
            }
            command = console_rx.recv(), if console_open => match command {
                Some(ConsoleCommand::Quit) => break,
                Some(command) => handle_console(&mut supervisor, &mut uploads, command),
                None => console_open = false,
            },
            _ = ticker.tick() => {
                supervisor.tick(Instant::now());
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
        flush(&mut supervisor, &transport);
    }

    transport.close().await;
    println!("👋 left the room");
    Ok(())
}

fn flush(supervisor: &mut Supervisor, transport: &WebSocketTransport) {
    for intent in supervisor.drain_outbound() {
        if let Err(err) = transport.send(intent) {
            warn!(event = intent.event_name(), error = %err, "dropping outbound intent");
        }
    }
}

fn join(supervisor: &mut Supervisor, now: Instant) {
    // Joining is the user gesture that allows playback to start.
    supervisor.reconciler_mut().sink_mut().unlock();
    if supervisor.join(now) {
        println!("🍿 joined; playback follows the room");
    } else {
        println!("already joined");
    }
}

fn handle_console(supervisor: &mut Supervisor, uploads: &mut UploadRunner, command: ConsoleCommand) {
    debug!(?command, "console command");
    match command {
        ConsoleCommand::Join => join(supervisor, Instant::now()),
        ConsoleCommand::Play | ConsoleCommand::Pause | ConsoleCommand::Seek(_) => {
            let player = supervisor.reconciler_mut().sink_mut();
            if !player.controls_visible() {
                println!("🔒 only the controller can drive playback");
                return;
            }
            match command {
                ConsoleCommand::Play => {
                    if let Err(err) = player.play() {
                        println!("❌ {err}");
                    }
                }
                ConsoleCommand::Pause => player.pause(),
                ConsoleCommand::Seek(seconds) => player.set_position(seconds),
                _ => {}
            }
        }
        ConsoleCommand::Upload(path) => uploads.request(supervisor, path),
        ConsoleCommand::Status => {
            let reconciler = supervisor.reconciler();
            let player = reconciler.sink();
            println!("{}", reconciler.status().snapshot());
            println!(
                "source={} position={:.2}s paused={} joined={}",
                player.source().unwrap_or("none"),
                player.position(),
                player.is_paused(),
                supervisor.is_joined()
            );
        }
        ConsoleCommand::Help => println!("{}", console::help_text()),
        ConsoleCommand::Quit => {}
    }
}
