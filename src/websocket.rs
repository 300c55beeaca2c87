//! # WebSocket Recording Stream
//!
//! Clients connect to `/ws/audio` and stream a recording as binary frames.
//! Each connection is one actor owning one recording sink at a time.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: Server opens a sink and sends `session_established`
//! 2. **Start**: `{"type":"recording_started"}` → `recording_confirmed`
//! 3. **Audio**: Every binary frame is appended in order → `audio_received`
//! 4. **Stop**: `{"type":"recording_stopped"}` → sink finalized → `recording_saved`.
//!    The next recording on the same connection gets a fresh sink.
//! 5. **Close**: Close frame, protocol error, or heartbeat timeout finalizes
//!    whatever sink is still open
//!
//! Malformed JSON and unknown message types are answered with `error`; the
//! connection stays open.

use crate::audio::RecordingSink;
use crate::state::AppState;
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Control frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    RecordingStarted,
    RecordingStopped,
}

/// Acknowledgments sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionEstablished { session_id: String },
    RecordingConfirmed { session_id: String },
    AudioReceived { bytes: usize, total_bytes: u64 },
    RecordingSaved { filename: String, size: u64 },
    Error { message: String },
}

impl ServerMessage {
    fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// One streaming connection.
pub struct RecordingSocket {
    connection_id: Uuid,
    app_state: AppState,
    recordings_dir: PathBuf,
    min_recording_bytes: u64,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    sink: Option<RecordingSink>,
    /// Number of sinks opened so far on this connection
    recordings: u32,
    last_heartbeat: Instant,
}

impl RecordingSocket {
    pub fn new(app_state: AppState) -> Self {
        let streaming = app_state.config.streaming.clone();
        Self {
            connection_id: Uuid::new_v4(),
            recordings_dir: streaming.recordings_dir,
            min_recording_bytes: streaming.min_recording_bytes,
            heartbeat_interval: Duration::from_secs(streaming.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(streaming.client_timeout_secs),
            app_state,
            sink: None,
            recordings: 0,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Return the open sink, opening a new one if the last was finalized.
    fn active_sink(&mut self) -> std::io::Result<&mut RecordingSink> {
        if self.sink.is_none() {
            self.recordings += 1;
            let name = format!("recording-{}-{}.webm", self.connection_id, self.recordings);
            let sink = RecordingSink::create(&self.recordings_dir, &name, self.min_recording_bytes)?;
            self.sink = Some(sink);
        }
        match self.sink.as_mut() {
            Some(sink) => Ok(sink),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "recording sink unavailable",
            )),
        }
    }

    fn on_connect(&mut self) -> ServerMessage {
        match self.active_sink() {
            Ok(_) => ServerMessage::SessionEstablished {
                session_id: self.connection_id.to_string(),
            },
            Err(e) => {
                error!(connection_id = %self.connection_id, error = %e, "Failed to open recording sink");
                ServerMessage::error(format!("Failed to open recording: {}", e))
            }
        }
    }

    fn on_text(&mut self, text: &str) -> ServerMessage {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::RecordingStarted) => self.on_recording_started(),
            Ok(ClientMessage::RecordingStopped) => self.on_recording_stopped(),
            Err(err) => {
                debug!(connection_id = %self.connection_id, error = %err, "Rejected control frame");
                ServerMessage::error(format!("Invalid message: {}", err))
            }
        }
    }

    fn on_recording_started(&mut self) -> ServerMessage {
        match self.active_sink() {
            Ok(_) => {
                info!(connection_id = %self.connection_id, recording = self.recordings, "Recording started");
                ServerMessage::RecordingConfirmed {
                    session_id: self.connection_id.to_string(),
                }
            }
            Err(e) => ServerMessage::error(format!("Failed to open recording: {}", e)),
        }
    }

    fn on_recording_stopped(&mut self) -> ServerMessage {
        let Some(sink) = self.sink.take() else {
            return ServerMessage::error("No recording in progress");
        };

        match sink.finish() {
            Ok(summary) => ServerMessage::RecordingSaved {
                filename: summary.filename,
                size: summary.bytes,
            },
            Err(e) => {
                error!(connection_id = %self.connection_id, error = %e, "Failed to finalize recording");
                ServerMessage::error(format!("Failed to save recording: {}", e))
            }
        }
    }

    fn on_binary(&mut self, chunk: &[u8]) -> ServerMessage {
        let written = self.active_sink().and_then(|sink| sink.write_chunk(chunk));
        match written {
            Ok(total_bytes) => ServerMessage::AudioReceived {
                bytes: chunk.len(),
                total_bytes,
            },
            Err(e) => {
                error!(connection_id = %self.connection_id, error = %e, "Failed to write audio chunk");
                // Finalize what we have; the next frame starts a new recording.
                self.sink = None;
                ServerMessage::error(format!("Failed to write audio: {}", e))
            }
        }
    }

    /// Finalize the open sink, if any. Safe to call more than once.
    fn close_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.finish() {
                warn!(connection_id = %self.connection_id, error = %e, "Failed to finalize recording on close");
            }
        }
    }

    fn send(ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(json) => ctx.text(json),
            Err(e) => error!(error = %e, "Failed to serialize WebSocket message"),
        }
    }
}

impl Actor for RecordingSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.app_state.stream_opened();
        info!(connection_id = %self.connection_id, "WebSocket connection started");

        let greeting = self.on_connect();
        Self::send(ctx, &greeting);

        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!(connection_id = %act.connection_id, "WebSocket heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.close_sink();
        self.app_state.stream_closed();
        info!(connection_id = %self.connection_id, "WebSocket connection stopped");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RecordingSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                let reply = self.on_text(&text);
                Self::send(ctx, &reply);
            }
            Ok(ws::Message::Binary(data)) => {
                self.last_heartbeat = Instant::now();
                let reply = self.on_binary(&data);
                Self::send(ctx, &reply);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(connection_id = %self.connection_id, ?reason, "WebSocket closed by client");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(connection_id = %self.connection_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(connection_id = %self.connection_id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// WebSocket endpoint handler.
///
/// ## Endpoint: `GET /ws/audio`
pub async fn audio_stream(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    debug!(peer = ?req.connection_info().peer_addr(), "New WebSocket connection request");
    ws::start(RecordingSocket::new(app_state.get_ref().clone()), &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::fs;

    fn socket(dir: &std::path::Path, min_bytes: u64) -> RecordingSocket {
        let mut config = AppConfig::default();
        config.streaming.recordings_dir = dir.to_path_buf();
        config.streaming.min_recording_bytes = min_bytes;
        RecordingSocket::new(AppState::from_config(config).unwrap())
    }

    #[test]
    fn test_server_message_wire_format() {
        let json = serde_json::to_value(ServerMessage::AudioReceived {
            bytes: 4,
            total_bytes: 12,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "audio_received", "bytes": 4, "total_bytes": 12}));

        let json = serde_json::to_value(ServerMessage::error("bad")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "bad"}));
    }

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"recording_started"}"#).unwrap(),
            ClientMessage::RecordingStarted
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_full_recording_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut socket = socket(dir.path(), 1);

        let greeting = socket.on_connect();
        assert_eq!(
            greeting,
            ServerMessage::SessionEstablished {
                session_id: socket.connection_id().to_string()
            }
        );
        assert!(matches!(
            socket.on_text(r#"{"type":"recording_started"}"#),
            ServerMessage::RecordingConfirmed { .. }
        ));

        assert_eq!(
            socket.on_binary(b"abc"),
            ServerMessage::AudioReceived { bytes: 3, total_bytes: 3 }
        );
        assert_eq!(
            socket.on_binary(b"defg"),
            ServerMessage::AudioReceived { bytes: 4, total_bytes: 7 }
        );

        let expected = format!("recording-{}-1.webm", socket.connection_id());
        assert_eq!(
            socket.on_text(r#"{"type":"recording_stopped"}"#),
            ServerMessage::RecordingSaved {
                filename: expected.clone(),
                size: 7
            }
        );
        assert_eq!(fs::read(dir.path().join(&expected)).unwrap(), b"abcdefg");

        // A second recording on the same connection gets its own file.
        socket.on_binary(b"xyz");
        socket.close_sink();
        let second = format!("recording-{}-2.webm", socket.connection_id());
        assert_eq!(fs::read(dir.path().join(second)).unwrap(), b"xyz");
    }

    #[test]
    fn test_bad_frames_answered_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut socket = socket(dir.path(), 1);

        assert!(matches!(socket.on_text("not json"), ServerMessage::Error { .. }));
        assert!(matches!(socket.on_text(r#"{"type":"dance"}"#), ServerMessage::Error { .. }));
        assert!(matches!(
            socket.on_text(r#"{"type":"recording_stopped"}"#),
            ServerMessage::Error { .. }
        ));
    }

    #[test]
    fn test_close_discards_undersized_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut socket = socket(dir.path(), 1024);
        socket.on_connect();
        socket.on_binary(b"tiny");

        socket.close_sink();
        socket.close_sink();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
