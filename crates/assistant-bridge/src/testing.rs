//! Scripted in-memory `RunsApi` used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::action::ToolOutput;
use crate::api::RunsApi;
use crate::content::{MessageContent, NewMessage, Role, TextContent, ThreadMessage};
use crate::errors::BridgeError;
use crate::model::{MessageCreation, Run, RunState, RunStep, RunStepList, StepDetails};

pub(crate) fn run_with_status(run_id: &str, status: RunState) -> Run {
    Run {
        id: run_id.to_string(),
        thread_id: Some("thread_1".to_string()),
        assistant_id: Some("asst_1".to_string()),
        status,
        last_error: None,
        required_action: None,
    }
}

pub(crate) fn assistant_message(message_id: &str, text: &str) -> ThreadMessage {
    ThreadMessage {
        id: message_id.to_string(),
        thread_id: Some("thread_1".to_string()),
        run_id: None,
        assistant_id: Some("asst_1".to_string()),
        role: Role::Assistant,
        content: vec![MessageContent::Text {
            text: TextContent::new(text),
        }],
    }
}

#[derive(Default)]
pub(crate) struct ScriptedApi {
    runs: Mutex<VecDeque<Result<Run, BridgeError>>>,
    post_results: Mutex<VecDeque<Result<ThreadMessage, BridgeError>>>,
    steps: Mutex<HashMap<String, RunStepList>>,
    messages: Mutex<HashMap<String, ThreadMessage>>,
    submitted: Mutex<Vec<ToolOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    /// Queues run snapshots (for `run_1`) returned by successive `retrieve_run` calls.
    pub(crate) fn with_runs(self, statuses: impl IntoIterator<Item = RunState>) -> Self {
        for status in statuses {
            self.push_run(Ok(run_with_status("run_1", status)));
        }
        self
    }

    pub(crate) fn push_run(&self, run: Result<Run, BridgeError>) {
        lock(&self.runs).push_back(run);
    }

    pub(crate) fn push_post_result(&self, result: Result<ThreadMessage, BridgeError>) {
        lock(&self.post_results).push_back(result);
    }

    /// Registers a message-creation step for `run_id` pointing at a stored message.
    pub(crate) fn with_message_step(self, run_id: &str, message_id: &str, text: &str) -> Self {
        self.set_steps(
            run_id,
            vec![RunStep {
                id: "step_1".to_string(),
                run_id: Some(run_id.to_string()),
                thread_id: Some("thread_1".to_string()),
                status: Some("completed".to_string()),
                step_details: Some(StepDetails {
                    kind: Some("message_creation".to_string()),
                    message_creation: Some(MessageCreation {
                        message_id: message_id.to_string(),
                    }),
                    tool_calls: None,
                }),
            }],
        );
        lock(&self.messages).insert(message_id.to_string(), assistant_message(message_id, text));
        self
    }

    pub(crate) fn set_steps(&self, run_id: &str, steps: Vec<RunStep>) {
        lock(&self.steps).insert(run_id.to_string(), RunStepList { data: steps });
    }

    pub(crate) fn insert_message(&self, message: ThreadMessage) {
        lock(&self.messages).insert(message.id.clone(), message);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub(crate) fn count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(operation))
            .count()
    }

    pub(crate) fn submitted(&self) -> Vec<ToolOutput> {
        lock(&self.submitted).clone()
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl RunsApi for ScriptedApi {
    async fn post_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, BridgeError> {
        self.record(format!("post_message {thread_id} {}", message.content));
        lock(&self.post_results).pop_front().unwrap_or_else(|| {
            Ok(ThreadMessage {
                id: "msg_user".to_string(),
                thread_id: Some(thread_id.to_string()),
                run_id: None,
                assistant_id: None,
                role: message.role,
                content: vec![MessageContent::Text {
                    text: TextContent::new(message.content.clone()),
                }],
            })
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError> {
        self.record(format!("retrieve_run {thread_id} {run_id}"));
        lock(&self.runs)
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::Transport("run script exhausted".into())))
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunStepList, BridgeError> {
        self.record(format!("list_run_steps {thread_id} {run_id}"));
        Ok(lock(&self.steps)
            .get(run_id)
            .cloned()
            .unwrap_or(RunStepList { data: Vec::new() }))
    }

    async fn retrieve_message(
        &self,
        thread_id: &str,
        message_id: &str,
    ) -> Result<ThreadMessage, BridgeError> {
        self.record(format!("retrieve_message {thread_id} {message_id}"));
        lock(&self.messages)
            .get(message_id)
            .cloned()
            .ok_or_else(|| BridgeError::InvalidResponse {
                status: 404,
                body: format!("no message {message_id}"),
            })
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError> {
        self.record(format!("cancel_run {thread_id} {run_id}"));
        Ok(run_with_status(run_id, RunState::Cancelling))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, BridgeError> {
        self.record(format!("submit_tool_outputs {thread_id} {run_id}"));
        lock(&self.submitted).extend_from_slice(outputs);
        Ok(run_with_status(run_id, RunState::Queued))
    }
}
