//! Write-only status surface. The engine publishes semantic updates; how
//! they are rendered is up to the surface.

use std::fmt;

use tracing::info;
use watchparty_proto::SessionId;

use crate::sync::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    InProgress,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Connection(ConnectionStatus),
    Role {
        role: Role,
        controller_id: Option<SessionId>,
    },
    Upload(UploadStatus),
}

/// Current value of every status field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub connection: ConnectionStatus,
    pub role: Role,
    pub controller_id: Option<SessionId>,
    pub upload: UploadStatus,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            role: Role::Viewer,
            controller_id: None,
            upload: UploadStatus::Idle,
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let controller = self
            .controller_id
            .as_ref()
            .map(SessionId::as_str)
            .unwrap_or("none");
        write!(
            f,
            "connection={:?} role={:?} controller={} upload={:?}",
            self.connection, self.role, controller, self.upload
        )
    }
}

pub trait StatusSurface {
    fn publish(&mut self, update: &StatusUpdate);
}

/// Holds the last published value of each field and forwards only real
/// transitions, so replaying the same authority message is invisible.
#[derive(Debug)]
pub struct StatusBoard<S> {
    current: StatusSnapshot,
    surface: S,
}

impl<S: StatusSurface> StatusBoard<S> {
    pub fn new(surface: S) -> Self {
        Self {
            current: StatusSnapshot::default(),
            surface,
        }
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.current
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn set_connection(&mut self, connection: ConnectionStatus) -> bool {
        if self.current.connection == connection {
            return false;
        }
        self.current.connection = connection.clone();
        self.surface.publish(&StatusUpdate::Connection(connection));
        true
    }

    pub fn set_role(&mut self, role: Role, controller_id: Option<&SessionId>) -> bool {
        if self.current.role == role && self.current.controller_id.as_ref() == controller_id {
            return false;
        }
        self.current.role = role;
        self.current.controller_id = controller_id.cloned();
        self.surface.publish(&StatusUpdate::Role {
            role,
            controller_id: controller_id.cloned(),
        });
        true
    }

    pub fn set_upload(&mut self, upload: UploadStatus) -> bool {
        if self.current.upload == upload {
            return false;
        }
        self.current.upload = upload.clone();
        self.surface.publish(&StatusUpdate::Upload(upload));
        true
    }
}

/// Keeps every update it receives. Used by tests and embedders that poll.
#[derive(Debug, Default, Clone)]
pub struct RecordingStatus {
    pub updates: Vec<StatusUpdate>,
}

impl StatusSurface for RecordingStatus {
    fn publish(&mut self, update: &StatusUpdate) {
        self.updates.push(update.clone());
    }
}

/// Prints human-readable status lines for the terminal client.
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl StatusSurface for ConsoleStatus {
    fn publish(&mut self, update: &StatusUpdate) {
        info!(?update, "status changed");
        match update {
            StatusUpdate::Connection(ConnectionStatus::Connecting) => {
                println!("🔄 connecting to room...");
            }
            StatusUpdate::Connection(ConnectionStatus::Connected) => {
                println!("🔌 connected");
            }
            StatusUpdate::Connection(ConnectionStatus::Disconnected) => {
                println!("⚠️  disconnected; retrying");
            }
            StatusUpdate::Connection(ConnectionStatus::Error(message)) => {
                println!("❌ connection error: {message}");
            }
            StatusUpdate::Role {
                role: Role::Controller,
                ..
            } => {
                println!("👑 you control playback for the room");
            }
            StatusUpdate::Role {
                role: Role::Viewer,
                controller_id,
            } => match controller_id {
                Some(id) => println!("👀 watching; {id} controls playback"),
                None => println!("👀 watching; nobody controls playback"),
            },
            StatusUpdate::Upload(UploadStatus::Idle) => {}
            StatusUpdate::Upload(UploadStatus::InProgress) => println!("⬆️  uploading..."),
            StatusUpdate::Upload(UploadStatus::Succeeded) => println!("✅ upload complete"),
            StatusUpdate::Upload(UploadStatus::Failed(message)) => {
                println!("❌ upload failed: {message}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_only_publishes_transitions() {
        let mut board = StatusBoard::new(RecordingStatus::default());
        let x = SessionId::from("X");
        assert!(board.set_role(Role::Viewer, Some(&x)));
        assert!(!board.set_role(Role::Viewer, Some(&x)));
        assert!(board.set_connection(ConnectionStatus::Connected));
        assert!(!board.set_connection(ConnectionStatus::Connected));
        assert!(!board.set_upload(UploadStatus::Idle));
        assert_eq!(board.surface().updates.len(), 2);
        assert_eq!(board.snapshot().controller_id, Some(x));
    }

    #[test]
    fn snapshot_display_names_missing_controller() {
        let snapshot = StatusSnapshot::default();
        assert!(snapshot.to_string().contains("controller=none"));
    }
}
