use std::collections::HashSet;

use tracing::debug;

use crate::api::RunsApi;
use crate::client::AssistantClient;
use crate::errors::BridgeError;
use crate::model::{FunctionCall, RequiredAction, Run, RunState, SubmitToolOutputs, ToolCall};
use crate::polling::{RunPoller, RunStepResult};
use crate::session::StreamSession;

/// A function call the run is waiting on.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingToolCall {
    pub call_id: String,
    pub function_name: String,
    /// Decoded arguments. Text that is not valid JSON is kept as
    /// `Value::String` with the raw text.
    pub arguments: serde_json::Value,
}

impl PendingToolCall {
    fn from_wire(call: &ToolCall) -> Self {
        let arguments = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone()));
        Self {
            call_id: call.id.clone(),
            function_name: call.function.name.clone(),
            arguments,
        }
    }

    fn to_wire(&self) -> ToolCall {
        let arguments = match &self.arguments {
            serde_json::Value::String(raw)
                if serde_json::from_str::<serde_json::Value>(raw).is_err() =>
            {
                raw.clone()
            }
            value => value.to_string(),
        };
        ToolCall {
            id: self.call_id.clone(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: self.function_name.clone(),
                arguments,
            },
        }
    }
}

/// One entry of a `submit_tool_outputs` request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// A run paused on `requires_action`, waiting for tool results.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionHandle {
    run_id: String,
    thread_id: String,
    tool_calls: Vec<PendingToolCall>,
}

impl ActionHandle {
    /// Builds a handle from a `requires_action` run snapshot.
    ///
    /// Fails with `NilRunResponse` when the run carries no tool calls, and
    /// with `Decode` when call ids repeat or no thread id is known.
    pub fn from_run(run: &Run, fallback_thread_id: Option<&str>) -> Result<Self, BridgeError> {
        let calls = run.tool_calls();
        if calls.is_empty() {
            return Err(BridgeError::NilRunResponse {
                run_id: run.id.clone(),
            });
        }
        let mut seen = HashSet::with_capacity(calls.len());
        for call in calls {
            if !seen.insert(call.id.as_str()) {
                return Err(BridgeError::Decode(format!(
                    "run {} lists tool call {} more than once",
                    run.id, call.id
                )));
            }
        }
        let thread_id = run
            .thread_id
            .as_deref()
            .or(fallback_thread_id)
            .ok_or_else(|| BridgeError::Decode(format!("run {} has no thread_id", run.id)))?;
        Ok(Self {
            run_id: run.id.clone(),
            thread_id: thread_id.to_string(),
            tool_calls: calls.iter().map(PendingToolCall::from_wire).collect(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Pending calls in the order the server listed them.
    pub fn tool_calls(&self) -> &[PendingToolCall] {
        &self.tool_calls
    }

    pub fn tool_call(&self, call_id: &str) -> Option<&PendingToolCall> {
        self.tool_calls.iter().find(|call| call.call_id == call_id)
    }

    /// Builds the output entry for `call_id`, rejecting ids the run is not waiting on.
    pub fn output_for(
        &self,
        call_id: &str,
        output: impl Into<String>,
    ) -> Result<ToolOutput, BridgeError> {
        if self.tool_call(call_id).is_none() {
            return Err(BridgeError::UnknownToolCall {
                run_id: self.run_id.clone(),
                call_id: call_id.to_string(),
            });
        }
        Ok(ToolOutput {
            tool_call_id: call_id.to_string(),
            output: output.into(),
        })
    }

    /// Submits the result of one call and continues the run on a new stream.
    pub async fn submit_output(
        &self,
        client: &AssistantClient,
        call_id: &str,
        output: impl Into<String>,
    ) -> Result<StreamSession, BridgeError> {
        let output = self.output_for(call_id, output)?;
        debug!(run_id = %self.run_id, thread_id = %self.thread_id, call_id, "submitting tool output (stream)");
        client
            .submit_tool_outputs_stream(&self.thread_id, &self.run_id, &[output])
            .await
    }

    /// Submits the result of one call, then polls the run to its next terminal state.
    pub async fn submit_output_and_poll<A>(
        &self,
        api: &A,
        poller: &RunPoller,
        call_id: &str,
        output: impl Into<String>,
    ) -> Result<RunStepResult, BridgeError>
    where
        A: RunsApi + ?Sized,
    {
        let output = self.output_for(call_id, output)?;
        debug!(run_id = %self.run_id, thread_id = %self.thread_id, call_id, "submitting tool output (poll)");
        api.submit_tool_outputs(&self.thread_id, &self.run_id, &[output])
            .await?;
        poller.poll_run(api, &self.thread_id, &self.run_id).await
    }

    /// Abandons the run without submitting any output.
    pub async fn cancel<A>(&self, api: &A) -> Result<Run, BridgeError>
    where
        A: RunsApi + ?Sized,
    {
        debug!(run_id = %self.run_id, thread_id = %self.thread_id, "cancelling run awaiting tool output");
        api.cancel_run(&self.thread_id, &self.run_id).await
    }

    /// Rebuilds the `requires_action` run snapshot this handle represents.
    pub(crate) fn to_run(&self) -> Run {
        Run {
            id: self.run_id.clone(),
            thread_id: Some(self.thread_id.clone()),
            assistant_id: None,
            status: RunState::RequiresAction,
            last_error: None,
            required_action: Some(RequiredAction {
                kind: "submit_tool_outputs".to_string(),
                submit_tool_outputs: SubmitToolOutputs {
                    tool_calls: self.tool_calls.iter().map(PendingToolCall::to_wire).collect(),
                },
            }),
        }
    }
}
