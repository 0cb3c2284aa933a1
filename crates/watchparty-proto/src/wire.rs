//! JSON envelope used on the authority WebSocket.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. Authority payloads
//! are loosely typed (positions arrive as numbers or numeric strings, play
//! state as bools or `"0"`/`"1"`), so field decoding here never fails on a
//! bad value: positions fall back to `0`, empty urls and controller ids to
//! `None`. Only a missing envelope or a payload of the wrong shape is an error.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{AuthoritativeSnapshot, InboundCommand, OutboundIntent, SessionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// A decoded authority frame. Channel lifecycle frames are kept apart from
/// playback commands so the transport can route them to the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Connect { sid: SessionId },
    Disconnect,
    ConnectError { message: String },
    Command(InboundCommand),
    Unknown { event: String },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{event} frame is missing required field `{field}`")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct ConnectPayload {
    #[serde(default, deserialize_with = "lenient_sid")]
    sid: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
struct ConnectErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SyncStatePayload {
    #[serde(default, deserialize_with = "lenient_url")]
    video_file_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    current_time: f64,
    #[serde(default, deserialize_with = "lenient_flag")]
    is_playing: bool,
    #[serde(default, deserialize_with = "lenient_sid")]
    controller_sid: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
struct VideoLoadedPayload {
    #[serde(default, deserialize_with = "lenient_url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimePayload {
    #[serde(default, deserialize_with = "lenient_seconds")]
    time: f64,
}

#[derive(Debug, Deserialize)]
struct ControllerPayload {
    #[serde(default, deserialize_with = "lenient_sid")]
    controller_sid: Option<SessionId>,
}

pub fn decode_server_frame(text: &str) -> Result<ServerFrame, FrameError> {
    let Envelope { event, data } = serde_json::from_str(text)?;
    // `request_sync`-style frames may omit data entirely.
    let data = match data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let frame = match event.as_str() {
        "connect" => {
            let payload: ConnectPayload = serde_json::from_value(data)?;
            let sid = payload.sid.ok_or(FrameError::MissingField {
                event: "connect",
                field: "sid",
            })?;
            ServerFrame::Connect { sid }
        }
        "disconnect" => ServerFrame::Disconnect,
        "connect_error" => {
            let payload: ConnectErrorPayload = serde_json::from_value(data)?;
            ServerFrame::ConnectError {
                message: payload
                    .message
                    .unwrap_or_else(|| "connection rejected".to_string()),
            }
        }
        "sync_state" => {
            let payload: SyncStatePayload = serde_json::from_value(data)?;
            ServerFrame::Command(InboundCommand::Snapshot(AuthoritativeSnapshot {
                source_url: payload.video_file_url,
                position_seconds: payload.current_time,
                is_playing: payload.is_playing,
                controller_id: payload.controller_sid,
            }))
        }
        "video_loaded" => {
            let payload: VideoLoadedPayload = serde_json::from_value(data)?;
            let url = payload.url.ok_or(FrameError::MissingField {
                event: "video_loaded",
                field: "url",
            })?;
            ServerFrame::Command(InboundCommand::VideoLoaded { url })
        }
        "sync_play" => {
            let TimePayload { time } = serde_json::from_value(data)?;
            ServerFrame::Command(InboundCommand::Play { time })
        }
        "sync_pause" => {
            let TimePayload { time } = serde_json::from_value(data)?;
            ServerFrame::Command(InboundCommand::Pause { time })
        }
        "sync_seek" => {
            let TimePayload { time } = serde_json::from_value(data)?;
            ServerFrame::Command(InboundCommand::Seek { time })
        }
        "controller_change" => {
            let payload: ControllerPayload = serde_json::from_value(data)?;
            ServerFrame::Command(InboundCommand::ControllerChanged {
                controller_id: payload.controller_sid,
            })
        }
        _ => ServerFrame::Unknown { event },
    };
    Ok(frame)
}

pub fn encode_intent(intent: &OutboundIntent) -> Result<String, FrameError> {
    let data = match intent.time() {
        Some(time) => serde_json::json!({ "time": time }),
        None => Value::Null,
    };
    let envelope = Envelope {
        event: intent.event_name().to_string(),
        data,
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn coerce_seconds(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() && raw >= 0.0 { raw } else { 0.0 }
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_seconds(&value))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        _ => false,
    })
}

fn non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn lenient_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(non_empty_string(value))
}

fn lenient_sid<'de, D>(deserializer: D) -> Result<Option<SessionId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(non_empty_string(value).map(SessionId::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> InboundCommand {
        match decode_server_frame(text).expect("decode") {
            ServerFrame::Command(cmd) => cmd,
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn sync_state_decodes_typed_payload() {
        let cmd = command(
            r#"{"event":"sync_state","data":{"video_file_url":"/static/videos/a.mp4","current_time":12.5,"is_playing":true,"controller_sid":"X"}}"#,
        );
        assert_eq!(
            cmd,
            InboundCommand::Snapshot(AuthoritativeSnapshot {
                source_url: Some("/static/videos/a.mp4".into()),
                position_seconds: 12.5,
                is_playing: true,
                controller_id: Some(SessionId::from("X")),
            })
        );
    }

    #[test]
    fn sync_state_accepts_stringly_typed_fields() {
        let cmd = command(
            r#"{"event":"sync_state","data":{"video_file_url":"a.mp4","current_time":"7.25","is_playing":"1","controller_sid":"X"}}"#,
        );
        let InboundCommand::Snapshot(snapshot) = cmd else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.position_seconds, 7.25);
        assert!(snapshot.is_playing);
    }

    #[test]
    fn sync_state_defaults_missing_and_invalid_fields() {
        let cmd = command(
            r#"{"event":"sync_state","data":{"video_file_url":"","current_time":"soon","controller_sid":""}}"#,
        );
        assert_eq!(cmd, InboundCommand::Snapshot(AuthoritativeSnapshot::default()));

        let cmd = command(r#"{"event":"sync_state"}"#);
        assert_eq!(cmd, InboundCommand::Snapshot(AuthoritativeSnapshot::default()));
    }

    #[test]
    fn negative_positions_clamp_to_zero() {
        let cmd = command(r#"{"event":"sync_seek","data":{"time":-3.0,"sid":"X"}}"#);
        assert_eq!(cmd, InboundCommand::Seek { time: 0.0 });
    }

    #[test]
    fn playback_commands_ignore_extra_fields() {
        assert_eq!(
            command(r#"{"event":"sync_play","data":{"time":3.5,"sid":"X"}}"#),
            InboundCommand::Play { time: 3.5 }
        );
        assert_eq!(
            command(r#"{"event":"sync_pause","data":{}}"#),
            InboundCommand::Pause { time: 0.0 }
        );
    }

    #[test]
    fn controller_change_with_empty_sid_means_no_controller() {
        assert_eq!(
            command(r#"{"event":"controller_change","data":{"controller_sid":""}}"#),
            InboundCommand::ControllerChanged {
                controller_id: None
            }
        );
    }

    #[test]
    fn video_loaded_requires_url() {
        let err = decode_server_frame(r#"{"event":"video_loaded","data":{"sid":"X"}}"#)
            .expect_err("missing url");
        assert!(matches!(
            err,
            FrameError::MissingField {
                event: "video_loaded",
                field: "url"
            }
        ));
    }

    #[test]
    fn lifecycle_frames_are_not_commands() {
        assert_eq!(
            decode_server_frame(r#"{"event":"connect","data":{"sid":"abc"}}"#).unwrap(),
            ServerFrame::Connect {
                sid: SessionId::from("abc")
            }
        );
        assert_eq!(
            decode_server_frame(r#"{"event":"connect_error","data":{"message":"full"}}"#)
                .unwrap(),
            ServerFrame::ConnectError {
                message: "full".into()
            }
        );
        assert_eq!(
            decode_server_frame(r#"{"event":"disconnect"}"#).unwrap(),
            ServerFrame::Disconnect
        );
    }

    #[test]
    fn unknown_events_are_surfaced_not_rejected() {
        assert_eq!(
            decode_server_frame(r#"{"event":"chat","data":{"text":"hi"}}"#).unwrap(),
            ServerFrame::Unknown {
                event: "chat".into()
            }
        );
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            decode_server_frame("not json"),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn request_sync_encodes_without_data() {
        let text = encode_intent(&OutboundIntent::RequestSync).unwrap();
        assert_eq!(text, r#"{"event":"request_sync"}"#);
    }

    #[test]
    fn seek_encodes_time() {
        let text = encode_intent(&OutboundIntent::Seek { time: 55.3 }).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "seek");
        assert_eq!(value["data"]["time"], 55.3);
    }
}
