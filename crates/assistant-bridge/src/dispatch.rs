use serde::de::DeserializeOwned;
use tracing::warn;

use crate::action::ActionHandle;
use crate::content::{MessageDeltaEvent, ThreadMessage};
use crate::errors::{ApiErrorBody, ApiErrorEnvelope};
use crate::model::{Run, RunStep, Thread};
use crate::sse::RawEvent;
use crate::stream::{RunStatusEvent, names};

/// Maps a raw SSE event to its typed `RunStatusEvent`.
///
/// Never fails: unrecognized names and payloads that do not decode for a
/// recognized name both become `RunStatusEvent::Unknown`.
pub fn decode_event(raw: &RawEvent) -> RunStatusEvent {
    let name = raw.event.as_deref().unwrap_or_default();
    let data = raw.data.as_str();
    let decoded = match name {
        names::THREAD_CREATED => {
            payload::<Thread>(name, data).map(|thread| RunStatusEvent::ThreadCreated(thread.id))
        }
        names::RUN_STEP_CREATED => payload::<RunStep>(name, data).map(RunStatusEvent::RunStepCreated),
        names::RUN_STEP_IN_PROGRESS => {
            payload::<RunStep>(name, data).map(RunStatusEvent::RunStepInProgress)
        }
        names::RUN_STEP_COMPLETED => {
            payload::<RunStep>(name, data).map(RunStatusEvent::RunStepCompleted)
        }
        names::MESSAGE_DELTA => payload::<MessageDeltaEvent>(name, data)
            .map(|delta| RunStatusEvent::MessageDelta(delta.fragment())),
        names::MESSAGE_COMPLETED => {
            payload::<ThreadMessage>(name, data).map(RunStatusEvent::MessageCompleted)
        }
        names::RUN_REQUIRES_ACTION => payload::<Run>(name, data).and_then(|run| {
            ActionHandle::from_run(&run, None)
                .map(RunStatusEvent::RunRequiresAction)
                .inspect_err(|err| warn!(event = name, run_id = %run.id, error = %err, "requires_action payload rejected"))
                .ok()
        }),
        names::RUN_COMPLETED => payload::<Run>(name, data).map(RunStatusEvent::RunCompleted),
        names::RUN_FAILED => payload::<Run>(name, data).map(RunStatusEvent::RunFailed),
        names::RUN_CANCELLED => payload::<Run>(name, data).map(RunStatusEvent::RunCancelled),
        names::RUN_EXPIRED => payload::<Run>(name, data).map(RunStatusEvent::RunExpired),
        names::ERROR => Some(RunStatusEvent::ErrorOccurred(error_payload(data))),
        names::DONE => Some(RunStatusEvent::Done),
        _ => None,
    };
    decoded.unwrap_or_else(|| RunStatusEvent::Unknown {
        event: name.to_string(),
        data: raw.data.clone(),
    })
}

fn payload<T: DeserializeOwned>(name: &str, data: &str) -> Option<T> {
    serde_json::from_str(data)
        .inspect_err(|err| warn!(event = name, error = %err, "undecodable SSE payload"))
        .ok()
}

/// Error events carry either a bare error body or the `{"error": {...}}`
/// envelope; anything else is wrapped as a message so it is never dropped.
fn error_payload(data: &str) -> ApiErrorBody {
    serde_json::from_str::<ApiErrorBody>(data)
        .or_else(|_| serde_json::from_str::<ApiErrorEnvelope>(data).map(|envelope| envelope.error))
        .unwrap_or_else(|_| ApiErrorBody::message(data))
}
