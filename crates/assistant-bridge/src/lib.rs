//! Async client for assistant thread runs.
//!
//! Runs can be followed either as a Server-Sent Events stream of typed
//! [`RunStatusEvent`]s (guarded by an inactivity watchdog) or by polling the
//! run until it reaches a terminal status. Runs that pause for tool calls
//! surface an [`ActionHandle`] for submitting outputs or cancelling.
//!
//! # Streaming a run
//!
//! ```no_run
//! use assistant_bridge::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), BridgeError> {
//! let client = AssistantClient::from_env()?;
//! let mut stream = client
//!     .add_message_and_stream_run("thread_abc", "asst_abc", "What's the weather?")
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     match event? {
//!         RunStatusEvent::MessageDelta(text) => print!("{text}"),
//!         RunStatusEvent::RunRequiresAction(handle) => {
//!             let call = &handle.tool_calls()[0];
//!             stream = handle.submit_output(&client, &call.call_id, "22C and sunny").await?;
//!         }
//!         RunStatusEvent::ErrorOccurred(error) => eprintln!("stream error: {}", error.message),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Tool-call handles and output submission.
pub mod action;
/// The unary run operations trait.
pub mod api;
/// HTTP client and request helpers.
pub mod client;
/// Client configuration.
pub mod config;
/// Message content types.
pub mod content;
/// Raw SSE event to typed event mapping.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Run, step, thread and assistant wire types.
pub mod model;
pub mod observability;
/// Run status polling.
pub mod polling;
/// Common imports for typical usage.
pub mod prelude;
/// Add-message conflict retry.
pub mod retry;
/// Stream session lifecycle and inactivity watchdog.
pub mod session;
/// Line framing and SSE event assembly.
pub mod sse;
/// Typed run status events.
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionHandle, PendingToolCall, ToolOutput};
pub use api::RunsApi;
pub use client::AssistantClient;
pub use config::BridgeConfig;
pub use content::{MessageContent, NewMessage, Role, ThreadMessage};
pub use dispatch::decode_event;
pub use errors::{ApiErrorBody, BridgeError};
pub use model::{
    Assistant, AssistantList, ListAssistantsParams, NewThread, Run, RunState, RunStep, SortOrder,
    Thread,
};
pub use polling::{RunPoller, RunStepResult};
pub use retry::ConflictRetryPolicy;
pub use session::{StreamOptions, StreamSession};
pub use sse::RawEvent;
pub use stream::RunStatusEvent;
