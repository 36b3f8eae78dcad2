//! mpv JSON IPC protocol
//!
//! mpv speaks newline-delimited JSON on its `--input-ipc-server` socket.
//! Commands go out as `{"command": [...], "request_id": N}`; replies carry the
//! same `request_id` plus an `error` string, and asynchronous events carry an
//! `event` name.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `error` value of a successful reply
pub const SUCCESS: &str = "success";

/// Lifecycle and log events emitted by mpv
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StartFile,
    FileLoaded,
    PlaybackRestart,
    /// Playback of a file ended; `reason` is eof, stop, quit, error or redirect
    EndFile {
        reason: Option<String>,
        error: Option<String>,
    },
    Idle,
    /// mpv is exiting (or the socket was closed)
    Shutdown,
    LogMessage {
        prefix: String,
        level: String,
        text: String,
    },
    /// Any event we don't act on
    Other(String),
}

/// One line received from mpv
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Event(PlayerEvent),
    Reply {
        request_id: u64,
        error: String,
        data: Value,
    },
}

impl Message {
    /// Decode one JSON line
    pub fn decode(line: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(line)?;

        let Some(name) = raw.event else {
            return Ok(Message::Reply {
                request_id: raw.request_id,
                error: raw.error.unwrap_or_default(),
                data: raw.data,
            });
        };

        let event = match name.as_str() {
            "start-file" => PlayerEvent::StartFile,
            "file-loaded" => PlayerEvent::FileLoaded,
            "playback-restart" => PlayerEvent::PlaybackRestart,
            "end-file" => PlayerEvent::EndFile {
                reason: raw.reason,
                error: raw.file_error,
            },
            "idle" => PlayerEvent::Idle,
            "shutdown" => PlayerEvent::Shutdown,
            "log-message" => PlayerEvent::LogMessage {
                prefix: raw.prefix.unwrap_or_default(),
                level: raw.level.unwrap_or_default(),
                text: raw.text.unwrap_or_default(),
            },
            _ => PlayerEvent::Other(name),
        };
        Ok(Message::Event(event))
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: Option<String>,
    #[serde(default)]
    request_id: u64,
    error: Option<String>,
    #[serde(default)]
    data: Value,
    reason: Option<String>,
    file_error: Option<String>,
    prefix: Option<String>,
    level: Option<String>,
    text: Option<String>,
}

/// A command sent to mpv
#[derive(Debug, Serialize)]
pub struct Command<'a> {
    pub command: &'a [&'a str],
    pub request_id: u64,
}

impl<'a> Command<'a> {
    pub fn new(command: &'a [&'a str], request_id: u64) -> Self {
        Self { command, request_id }
    }

    /// Encode as one newline-terminated JSON line
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = serde_json::to_vec(self)?;
        buf.push(b'\n');
        Ok(buf)
    }
}
