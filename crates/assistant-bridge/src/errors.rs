use std::time::Duration;

use serde::Deserialize as _;

/// Error body returned by the assistants API, and the payload of
/// `RunStatusEvent::ErrorOccurred`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Error category reported by the server (for example `invalid_request_error`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Request parameter the error refers to, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Machine-readable error code. Accepts a JSON string or number.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub code: Option<String>,
}

/// `kind` used for the synthetic error emitted by the stream watchdog.
pub const INACTIVITY_TIMEOUT_KIND: &str = "stream_inactivity_timeout";

impl ApiErrorBody {
    /// Creates an error body carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            param: None,
            code: None,
        }
    }

    /// Error reported when a stream stays silent for longer than `timeout`.
    pub fn inactivity_timeout(timeout: Duration) -> Self {
        Self {
            message: format!(
                "No SSE events arrived for {}s (inactivity timeout).",
                timeout.as_secs()
            ),
            kind: Some(INACTIVITY_TIMEOUT_KIND.to_string()),
            param: None,
            code: None,
        }
    }

    /// Returns true for errors produced by the stream watchdog rather than the server.
    pub fn is_inactivity_timeout(&self) -> bool {
        self.kind.as_deref() == Some(INACTIVITY_TIMEOUT_KIND)
    }

    /// Returns the id of the run blocking the thread when this is the
    /// "Can't add messages to thread ... while a run ... is active" conflict.
    pub fn conflicting_run_id(&self) -> Option<String> {
        active_run_conflict(&self.message)
    }
}

/// Wire wrapper: error responses arrive as `{"error": {...}}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Extracts the active run id from a thread conflict message.
///
/// Matches messages such as
/// `Can't add messages to thread thread_1 while a run run_42 is active.`
pub(crate) fn active_run_conflict(message: &str) -> Option<String> {
    if !(message.contains("Can't add messages to thread")
        && message.contains("while a run")
        && message.contains("is active"))
    {
        return None;
    }
    let (_, tail) = message.rsplit_once("run_")?;
    let id = tail
        .split_whitespace()
        .next()?
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-');
    if id.is_empty() {
        return None;
    }
    Some(format!("run_{id}"))
}

/// Top-level error type for the bridge API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Connection, request, or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Structured error decoded from a non-success response.
    #[error("api error ({status}): {}", .error.message)]
    Api { status: u16, error: ApiErrorBody },
    /// Non-success response without a usable error body.
    #[error("invalid response: status {status}")]
    InvalidResponse { status: u16, body: String },
    /// A run is already active on the thread the write targeted.
    #[error("run {run_id} is already active on the thread")]
    RunAlreadyActive { run_id: String },
    /// Cancel-and-retry did not clear the thread within the retry bound.
    #[error("thread {thread_id} still has active run {run_id} after {attempts} attempts")]
    ConflictRetriesExhausted {
        thread_id: String,
        run_id: String,
        attempts: u32,
    },
    /// A success response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A run requires action but carries no tool calls.
    #[error("run {run_id} requires action but has no tool calls")]
    NilRunResponse { run_id: String },
    /// A completed run has no step that created a message.
    #[error("run {run_id} completed without creating a message")]
    EmptyMessageResponse { run_id: String },
    /// Tool output was submitted for a call id the run is not waiting on.
    #[error("tool call {call_id} is not pending on run {run_id}")]
    UnknownToolCall { run_id: String, call_id: String },
}

impl BridgeError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    /// Maps a non-success HTTP status and its body to an error.
    ///
    /// Only 400 responses are decoded: they carry either the active-run
    /// conflict or a structured API error. Everything else is reported as
    /// an invalid response with the raw body attached.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        if status == 400 {
            return match serde_json::from_str::<ApiErrorEnvelope>(body) {
                Ok(envelope) => match envelope.error.conflicting_run_id() {
                    Some(run_id) => Self::RunAlreadyActive { run_id },
                    None => Self::Api {
                        status,
                        error: envelope.error,
                    },
                },
                Err(_) => Self::InvalidResponse {
                    status,
                    body: body.to_string(),
                },
            };
        }
        Self::InvalidResponse {
            status,
            body: body.to_string(),
        }
    }
}
