use crate::action::ToolOutput;
use crate::content::{NewMessage, ThreadMessage};
use crate::errors::BridgeError;
use crate::model::{Run, RunStepList};

/// Unary run operations the polling state machine, the conflict retry
/// policy and tool-call handles are written against.
///
/// `AssistantClient` is the HTTP implementation.
#[async_trait::async_trait]
pub trait RunsApi: Send + Sync {
    /// Adds a message to a thread without any conflict handling.
    async fn post_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, BridgeError>;

    /// Fetches the current run snapshot.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError>;

    /// Lists the steps of a run.
    async fn list_run_steps(&self, thread_id: &str, run_id: &str)
    -> Result<RunStepList, BridgeError>;

    /// Fetches one stored message.
    async fn retrieve_message(
        &self,
        thread_id: &str,
        message_id: &str,
    ) -> Result<ThreadMessage, BridgeError>;

    /// Requests cancellation of a run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError>;

    /// Submits tool outputs without opening a stream.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, BridgeError>;
}
