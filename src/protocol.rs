//! IPC protocol definitions for client-daemon communication.
//!
//! The protocol uses length-prefixed JSON over Unix domain sockets. The daemon
//! greets every connection with its current state and may push fresh state at
//! any time; the client issues calls tagged with an id and the daemon answers
//! each one with a reply carrying the same id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Method name the daemon exposes for changing settings.
pub const APPLY_SETTINGS: &str = "applySettings";

/// A remote procedure call to be issued to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The daemon method to invoke.
    pub method: String,
    /// Positional arguments, in order.
    pub args: Vec<Value>,
}

impl Request {
    /// Build an `applySettings(patch, reconnectIfNeeded)` request.
    pub fn apply_settings(patch: Map<String, Value>, reconnect_if_needed: bool) -> Self {
        Self {
            method: APPLY_SETTINGS.to_string(),
            args: vec![Value::Object(patch), Value::Bool(reconnect_if_needed)],
        }
    }
}

#[cfg(test)]
impl Request {
    /// The settings patch, if this is an `applySettings` request.
    pub fn settings_patch(&self) -> Option<&Map<String, Value>> {
        if self.method != APPLY_SETTINGS {
            return None;
        }
        self.args.first().and_then(Value::as_object)
    }

    /// The `reconnectIfNeeded` flag, if this is an `applySettings` request.
    pub fn reconnect_if_needed(&self) -> Option<bool> {
        if self.method != APPLY_SETTINGS {
            return None;
        }
        self.args.get(1).and_then(Value::as_bool)
    }
}

/// A region the daemon knows how to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier used in settings.
    pub id: String,
    /// Human-facing name, matched against command-line input.
    #[serde(rename = "name")]
    pub display_name: String,
}

impl Location {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Point-in-time view of daemon state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current settings, keyed by setting name.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    /// Known locations, in the daemon's order.
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Snapshot {
    /// Look up a setting value by name.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }
}

/// Message sent from client to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Invoke a daemon method.
    Call {
        id: u64,
        #[serde(flatten)]
        request: Request,
    },
}

/// Message sent from daemon to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Current daemon state. Always the first frame on a connection.
    State(Snapshot),
    /// Outcome of a previous call.
    Reply {
        id: u64,
        /// The call's return value, if successful.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Error message, if the call failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[cfg(test)]
impl DaemonMessage {
    /// Create a successful reply.
    pub fn success(id: u64, result: Value) -> Self {
        Self::Reply {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error reply.
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self::Reply {
            id,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Framing for messages: length-prefixed JSON.
/// Format: 4 bytes (big-endian u32) length + JSON payload
pub mod framing {
    use thiserror::Error;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Largest payload accepted in either direction.
    pub const MAX_FRAME_LEN: usize = 1_000_000;

    /// Errors reading or writing a frame.
    #[derive(Debug, Error)]
    pub enum FrameError {
        #[error("socket error: {0}")]
        Io(#[from] std::io::Error),
        #[error("malformed message: {0}")]
        Json(#[from] serde_json::Error),
        #[error("message too large: {0} bytes")]
        TooLarge(usize),
    }

    /// Write a length-prefixed message.
    pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
    where
        W: AsyncWriteExt + Unpin,
        T: serde::Serialize,
    {
        let json = serde_json::to_vec(message)?;
        let len = u32::try_from(json.len())
            .ok()
            .filter(|len| *len as usize <= MAX_FRAME_LEN)
            .ok_or(FrameError::TooLarge(json.len()))?;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&json).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a length-prefixed message.
    pub async fn read_message<R, T>(reader: &mut R) -> Result<T, FrameError>
    where
        R: AsyncReadExt + Unpin,
        T: serde::de::DeserializeOwned,
    {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        Ok(serde_json::from_slice(&buf)?)
    }
}
