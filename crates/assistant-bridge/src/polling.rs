use std::time::Duration;

use tracing::debug;

use crate::action::ActionHandle;
use crate::api::RunsApi;
use crate::errors::BridgeError;
use crate::model::{Run, RunState};

/// Text returned when a completed run's message has no text content.
pub const EMPTY_MESSAGE_FALLBACK: &str = "Unknown Error. Please try again";
/// Text returned for a failed or expired run without a server error message.
pub const UNKNOWN_FAILURE_MESSAGE: &str = "An unknown error occurred. Please try again.";
/// Text returned for a cancelled run.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Outcome of polling a run to a terminal state.
#[derive(Clone, Debug, PartialEq)]
pub enum RunStepResult {
    /// Assistant reply text, or a description of why the run ended.
    Message(String),
    /// The run is waiting for tool outputs.
    FunctionCalls(ActionHandle),
}

impl RunStepResult {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Message(text) => Some(text),
            Self::FunctionCalls(_) => None,
        }
    }

    pub fn function_calls(&self) -> Option<&ActionHandle> {
        match self {
            Self::FunctionCalls(handle) => Some(handle),
            Self::Message(_) => None,
        }
    }
}

/// Sequential run status poller.
///
/// Issues one GET per iteration with a fixed delay in between, stops on the
/// first terminal status and never retries a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunPoller {
    interval: Duration,
}

impl Default for RunPoller {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl RunPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until the run reaches a terminal status and returns that snapshot.
    pub async fn wait_for_terminal<A>(
        &self,
        api: &A,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Run, BridgeError>
    where
        A: RunsApi + ?Sized,
    {
        let mut polls = 0_u32;
        loop {
            let run = api.retrieve_run(thread_id, run_id).await?;
            polls = polls.saturating_add(1);
            debug!(thread_id, run_id, status = %run.status, polls, "polled run status");
            if run.status.is_terminal() {
                return Ok(run);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Polls the run to a terminal status and resolves it into a result.
    pub async fn poll_run<A>(
        &self,
        api: &A,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunStepResult, BridgeError>
    where
        A: RunsApi + ?Sized,
    {
        let run = self.wait_for_terminal(api, thread_id, run_id).await?;
        resolve(api, thread_id, &run).await
    }
}

/// Maps a terminal run to its result, fetching the reply for completed runs.
pub async fn resolve<A>(api: &A, thread_id: &str, run: &Run) -> Result<RunStepResult, BridgeError>
where
    A: RunsApi + ?Sized,
{
    match run.status {
        RunState::RequiresAction => {
            ActionHandle::from_run(run, Some(thread_id)).map(RunStepResult::FunctionCalls)
        }
        RunState::Cancelled | RunState::Cancelling => {
            Ok(RunStepResult::Message(CANCELLED_MESSAGE.to_string()))
        }
        RunState::Expired | RunState::Failed => Ok(RunStepResult::Message(
            run.last_error
                .as_ref()
                .map(|error| error.message.clone())
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_FAILURE_MESSAGE.to_string()),
        )),
        RunState::Completed => completed_message(api, thread_id, &run.id)
            .await
            .map(RunStepResult::Message),
        RunState::Queued | RunState::InProgress => Err(BridgeError::Decode(format!(
            "run {} is still {}",
            run.id, run.status
        ))),
    }
}

async fn completed_message<A>(api: &A, thread_id: &str, run_id: &str) -> Result<String, BridgeError>
where
    A: RunsApi + ?Sized,
{
    let steps = api.list_run_steps(thread_id, run_id).await?;
    let message_id = steps
        .data
        .iter()
        .find_map(|step| step.created_message_id())
        .ok_or_else(|| BridgeError::EmptyMessageResponse {
            run_id: run_id.to_string(),
        })?;
    let message = api.retrieve_message(thread_id, message_id).await?;
    let text = message.text();
    if text.is_empty() {
        debug!(thread_id, run_id, message_id, "completed run message has no text");
        return Ok(EMPTY_MESSAGE_FALLBACK.to_string());
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MessageContent, Role, ThreadMessage};
    use crate::model::{FunctionCall, RequiredAction, RunError, SubmitToolOutputs, ToolCall};
    use crate::testing::{ScriptedApi, run_with_status};
    use tokio::time::Instant;

    fn poller() -> RunPoller {
        RunPoller::default()
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_terminal_status() {
        let api = ScriptedApi::default()
            .with_runs([RunState::Queued, RunState::InProgress, RunState::Completed])
            .with_message_step("run_1", "msg_1", "Hello!");
        let started = Instant::now();

        let result = poller().poll_run(&api, "thread_1", "run_1").await.expect("poll");

        assert_eq!(result, RunStepResult::Message("Hello!".into()));
        assert_eq!(api.count("retrieve_run"), 3);
        assert_eq!(
            api.calls(),
            vec![
                "retrieve_run thread_1 run_1".to_string(),
                "retrieve_run thread_1 run_1".to_string(),
                "retrieve_run thread_1 run_1".to_string(),
                "list_run_steps thread_1 run_1".to_string(),
                "retrieve_message thread_1 msg_1".to_string(),
            ]
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1000) && waited < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn request_error_aborts_without_retry() {
        let api = ScriptedApi::default().with_runs([RunState::Queued]);
        api.push_run(Err(BridgeError::Transport("connection refused".into())));
        api.push_run(Ok(run_with_status("run_1", RunState::Completed)));

        let err = poller()
            .wait_for_terminal(&api, "thread_1", "run_1")
            .await
            .expect_err("transport error");

        assert_eq!(err, BridgeError::Transport("connection refused".into()));
        assert_eq!(api.count("retrieve_run"), 2);
    }

    #[tokio::test]
    async fn requires_action_returns_function_calls() {
        let api = ScriptedApi::default();
        let mut run = run_with_status("run_1", RunState::RequiresAction);
        run.thread_id = None;
        run.required_action = Some(RequiredAction {
            kind: "submit_tool_outputs".into(),
            submit_tool_outputs: SubmitToolOutputs {
                tool_calls: vec![ToolCall {
                    id: "call_1".into(),
                    kind: "function".into(),
                    function: FunctionCall {
                        name: "lookup".into(),
                        arguments: "{}".into(),
                    },
                }],
            },
        });
        api.push_run(Ok(run));

        let result = poller().poll_run(&api, "thread_9", "run_1").await.expect("poll");
        let handle = result.function_calls().expect("function calls");
        assert_eq!(handle.thread_id(), "thread_9");
        assert_eq!(handle.tool_calls()[0].function_name, "lookup");
    }

    #[tokio::test]
    async fn requires_action_without_calls_is_error() {
        let api = ScriptedApi::default().with_runs([RunState::RequiresAction]);
        assert_eq!(
            poller().poll_run(&api, "thread_1", "run_1").await,
            Err(BridgeError::NilRunResponse {
                run_id: "run_1".into()
            })
        );
    }

    #[tokio::test]
    async fn failure_states_describe_the_reason() {
        let api = ScriptedApi::default().with_runs([RunState::Cancelling, RunState::Expired]);
        let mut failed = run_with_status("run_1", RunState::Failed);
        failed.last_error = Some(RunError {
            code: Some("rate_limit_exceeded".into()),
            message: "Rate limit reached".into(),
        });
        api.push_run(Ok(failed));

        let mut messages = Vec::new();
        for _ in 0..3 {
            let result = poller().poll_run(&api, "thread_1", "run_1").await.expect("poll");
            messages.push(result.message().map(str::to_string));
        }
        assert_eq!(
            messages,
            vec![
                Some(CANCELLED_MESSAGE.to_string()),
                Some(UNKNOWN_FAILURE_MESSAGE.to_string()),
                Some("Rate limit reached".to_string()),
            ]
        );
        assert_eq!(api.count("list_run_steps"), 0);
    }

    #[tokio::test]
    async fn completed_without_message_step_is_error() {
        let api = ScriptedApi::default().with_runs([RunState::Completed]);
        assert_eq!(
            poller().poll_run(&api, "thread_1", "run_1").await,
            Err(BridgeError::EmptyMessageResponse {
                run_id: "run_1".into()
            })
        );
    }

    #[tokio::test]
    async fn completed_message_without_text_uses_fallback() {
        let api = ScriptedApi::default()
            .with_runs([RunState::Completed])
            .with_message_step("run_1", "msg_1", "placeholder");
        api.insert_message(ThreadMessage {
            id: "msg_1".into(),
            thread_id: Some("thread_1".into()),
            run_id: Some("run_1".into()),
            assistant_id: None,
            role: Role::Assistant,
            content: vec![MessageContent::Other],
        });

        assert_eq!(
            poller().poll_run(&api, "thread_1", "run_1").await,
            Ok(RunStepResult::Message(EMPTY_MESSAGE_FALLBACK.into()))
        );
    }

    #[tokio::test]
    async fn skips_tool_call_steps_when_looking_for_the_message() {
        let api = ScriptedApi::default()
            .with_runs([RunState::Completed])
            .with_message_step("run_1", "msg_2", "final answer");
        let mut steps = vec![crate::model::RunStep {
            id: "step_0".into(),
            run_id: Some("run_1".into()),
            thread_id: Some("thread_1".into()),
            status: Some("completed".into()),
            step_details: Some(crate::model::StepDetails {
                kind: Some("tool_calls".into()),
                message_creation: None,
                tool_calls: Some(vec![serde_json::json!({"id": "call_1"})]),
            }),
        }];
        steps.extend(
            api.list_run_steps("thread_1", "run_1")
                .await
                .expect("steps")
                .data,
        );
        api.set_steps("run_1", steps);

        assert_eq!(
            poller().poll_run(&api, "thread_1", "run_1").await,
            Ok(RunStepResult::Message("final answer".into()))
        );
    }
}
