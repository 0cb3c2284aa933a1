use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use thiserror::Error;
use tracing::debug;
use watchparty_client_core::client::{self, ClientOptions};
use watchparty_client_core::config::{ClientConfig, ConfigError, DEFAULT_SERVER_URL};
use watchparty_client_core::sync::SyncTuning;
use watchparty_client_core::telemetry::logging::{self as logctl, LogConfig, LogLevel};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let log_config = cli.logging.to_config();
    logctl::init(&log_config).map_err(|err| CliError::Logging(err.to_string()))?;
    debug!(log_level = ?log_config.level, log_file = ?log_config.file, "logging configured");

    let config = ClientConfig::new(&cli.server, cli.upload_url.as_deref())?
        .with_reconnect_delay(Duration::from_millis(cli.reconnect_delay_ms))
        .with_tuning(cli.tuning.to_tuning())?;
    let options = ClientOptions {
        auto_join: cli.auto_join,
        upload: cli.upload,
    };

    client::run(config, options)
        .await
        .map_err(|err| CliError::Runtime(format!("{err:#}")))
}

#[derive(Parser, Debug)]
#[command(
    name = "watchparty",
    about = "🍿 Watch a video in lock-step with everyone in the room",
    author,
    version
)]
struct Cli {
    #[arg(
        long,
        env = "WATCHPARTY_SERVER",
        default_value = DEFAULT_SERVER_URL,
        help = "WebSocket URL of the room authority"
    )]
    server: String,

    #[arg(
        long = "upload-url",
        env = "WATCHPARTY_UPLOAD_URL",
        help = "Upload endpoint (defaults to /upload on the server host)"
    )]
    upload_url: Option<String>,

    #[arg(
        long = "reconnect-delay-ms",
        env = "WATCHPARTY_RECONNECT_DELAY_MS",
        default_value_t = 1000,
        help = "Delay before reconnecting after the channel drops"
    )]
    reconnect_delay_ms: u64,

    #[arg(long = "auto-join", help = "Join immediately instead of waiting for 'join'")]
    auto_join: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Upload this video once connected (mp4, webm, ogg)"
    )]
    upload: Option<PathBuf>,

    #[command(flatten)]
    tuning: TuningArgs,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Args, Debug, Clone)]
struct TuningArgs {
    #[arg(
        long = "drift-threshold-ms",
        default_value_t = 250,
        help = "Drift tolerated before a hard jump"
    )]
    drift_threshold_ms: u64,

    #[arg(
        long = "latency-compensation-ms",
        default_value_t = 200,
        help = "Added to remote play positions"
    )]
    latency_compensation_ms: u64,

    #[arg(
        long = "resync-interval-ms",
        default_value_t = 1000,
        help = "How often viewers poll the authority"
    )]
    resync_interval_ms: u64,
}

impl TuningArgs {
    fn to_tuning(&self) -> SyncTuning {
        SyncTuning {
            drift_threshold: self.drift_threshold_ms as f64 / 1000.0,
            latency_compensation: self.latency_compensation_ms as f64 / 1000.0,
            resync_interval: Duration::from_millis(self.resync_interval_ms),
            ..SyncTuning::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "WATCHPARTY_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "WATCHPARTY_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    file: Option<PathBuf>,
}

impl LoggingArgs {
    fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("client error: {0}")]
    Runtime(String),
    #[error("logging initialization failed: {0}")]
    Logging(String),
}
