use crate::action::ActionHandle;
use crate::content::{MessageDeltaEvent, ThreadMessage};
use crate::errors::{ApiErrorBody, BridgeError};
use crate::model::{Run, RunStep, Thread};
use crate::sse::RawEvent;

/// Wire names of the SSE events a run stream emits.
pub mod names {
    pub const THREAD_CREATED: &str = "thread.created";
    pub const RUN_STEP_CREATED: &str = "thread.run.step.created";
    pub const RUN_STEP_IN_PROGRESS: &str = "thread.run.step.in_progress";
    pub const RUN_STEP_COMPLETED: &str = "thread.run.step.completed";
    pub const MESSAGE_DELTA: &str = "thread.message.delta";
    pub const MESSAGE_COMPLETED: &str = "thread.message.completed";
    pub const RUN_REQUIRES_ACTION: &str = "thread.run.requires_action";
    pub const RUN_COMPLETED: &str = "thread.run.completed";
    pub const RUN_FAILED: &str = "thread.run.failed";
    pub const RUN_CANCELLED: &str = "thread.run.cancelled";
    pub const RUN_EXPIRED: &str = "thread.run.expired";
    pub const ERROR: &str = "error";
    pub const DONE: &str = "done";
    /// Data sentinel that ends a stream when sent without an event name.
    pub const DONE_SENTINEL: &str = "[DONE]";
}

/// Typed event produced for every SSE event block (or watchdog firing).
#[derive(Clone, Debug, PartialEq)]
pub enum RunStatusEvent {
    /// A thread was created as part of `create_thread_and_stream_run`.
    ThreadCreated(String),
    RunStepCreated(RunStep),
    RunStepInProgress(RunStep),
    RunStepCompleted(RunStep),
    /// Incremental assistant text.
    MessageDelta(String),
    MessageCompleted(ThreadMessage),
    /// The run paused for tool results.
    RunRequiresAction(ActionHandle),
    RunCompleted(Run),
    RunFailed(Run),
    RunCancelled(Run),
    RunExpired(Run),
    /// Server-reported error, or the watchdog's inactivity timeout.
    ErrorOccurred(ApiErrorBody),
    Done,
    /// Unrecognized event name or undecodable payload. `event` is empty
    /// when the block had no `event:` line.
    Unknown { event: String, data: String },
}

impl RunStatusEvent {
    /// Wire event name of this variant.
    pub fn name(&self) -> &str {
        match self {
            Self::ThreadCreated(_) => names::THREAD_CREATED,
            Self::RunStepCreated(_) => names::RUN_STEP_CREATED,
            Self::RunStepInProgress(_) => names::RUN_STEP_IN_PROGRESS,
            Self::RunStepCompleted(_) => names::RUN_STEP_COMPLETED,
            Self::MessageDelta(_) => names::MESSAGE_DELTA,
            Self::MessageCompleted(_) => names::MESSAGE_COMPLETED,
            Self::RunRequiresAction(_) => names::RUN_REQUIRES_ACTION,
            Self::RunCompleted(_) => names::RUN_COMPLETED,
            Self::RunFailed(_) => names::RUN_FAILED,
            Self::RunCancelled(_) => names::RUN_CANCELLED,
            Self::RunExpired(_) => names::RUN_EXPIRED,
            Self::ErrorOccurred(_) => names::ERROR,
            Self::Done => names::DONE,
            Self::Unknown { event, .. } => event.as_str(),
        }
    }

    /// Returns true for events after which the run makes no further progress
    /// on this stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunRequiresAction(_)
                | Self::RunCompleted(_)
                | Self::RunFailed(_)
                | Self::RunCancelled(_)
                | Self::RunExpired(_)
                | Self::ErrorOccurred(_)
                | Self::Done
        )
    }

    /// Encodes the event back into its wire `(event, data)` form.
    pub fn to_raw_event(&self) -> Result<RawEvent, BridgeError> {
        let data = match self {
            Self::ThreadCreated(id) => encode(&Thread {
                id: id.clone(),
                created_at: None,
            })?,
            Self::RunStepCreated(step)
            | Self::RunStepInProgress(step)
            | Self::RunStepCompleted(step) => encode(step)?,
            Self::MessageDelta(fragment) => encode(&MessageDeltaEvent::text("", fragment.clone()))?,
            Self::MessageCompleted(message) => encode(message)?,
            Self::RunRequiresAction(handle) => encode(&handle.to_run())?,
            Self::RunCompleted(run)
            | Self::RunFailed(run)
            | Self::RunCancelled(run)
            | Self::RunExpired(run) => encode(run)?,
            Self::ErrorOccurred(error) => encode(error)?,
            Self::Done => names::DONE_SENTINEL.to_string(),
            Self::Unknown { event, data } => {
                return Ok(RawEvent {
                    event: (!event.is_empty()).then(|| event.clone()),
                    data: data.clone(),
                });
            }
        };
        Ok(RawEvent {
            event: Some(self.name().to_string()),
            data,
        })
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, BridgeError> {
    serde_json::to_string(value).map_err(BridgeError::decode)
}
