use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::action::ToolOutput;
use crate::api::RunsApi;
use crate::config::BridgeConfig;
use crate::content::{NewMessage, ThreadMessage};
use crate::errors::BridgeError;
use crate::model::{AssistantList, ListAssistantsParams, NewThread, Run, RunStepList, Thread};
use crate::polling::{RunPoller, RunStepResult};
use crate::retry::ConflictRetryPolicy;
use crate::session::StreamSession;
use crate::sse::ByteStream;

/// HTTP client for assistant threads and runs.
///
/// Unary calls go through `RunsApi` plus the inherent methods below; the
/// `*_stream*` methods open an SSE response and return a `StreamSession`.
#[derive(Clone, Debug)]
pub struct AssistantClient {
    http: reqwest::Client,
    config: BridgeConfig,
}

impl AssistantClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Creates a client using `BridgeConfig::from_env`.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::new(BridgeConfig::from_env()?)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Poller using the configured interval.
    pub fn poller(&self) -> RunPoller {
        RunPoller::new(self.config.poll_interval)
    }

    /// Conflict retry policy using the configured bound.
    pub fn retry_policy(&self) -> ConflictRetryPolicy {
        ConflictRetryPolicy::new(self.config.max_conflict_retries)
    }

    /// Creates an empty thread.
    pub async fn create_thread(&self) -> Result<Thread, BridgeError> {
        let request = self
            .request(reqwest::Method::POST, "threads")
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    /// Adds a user message, cancelling a run that blocks the thread.
    pub async fn add_message(
        &self,
        thread_id: &str,
        text: impl Into<String>,
    ) -> Result<ThreadMessage, BridgeError> {
        let message = NewMessage::user(text);
        self.retry_policy()
            .add_message(self, thread_id, &message)
            .await
    }

    /// Creates a run without streaming.
    pub async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, BridgeError> {
        let request = self
            .request(reqwest::Method::POST, &format!("threads/{thread_id}/runs"))
            .json(&serde_json::json!({ "assistant_id": assistant_id }));
        self.send_json(request).await
    }

    /// Lists assistants, one page at a time.
    pub async fn list_assistants(
        &self,
        params: &ListAssistantsParams,
    ) -> Result<AssistantList, BridgeError> {
        let request = self
            .request(reqwest::Method::GET, "assistants")
            .query(&params.query_pairs());
        self.send_json(request).await
    }

    /// Starts a run on an existing thread and streams its events.
    pub async fn stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<StreamSession, BridgeError> {
        self.open_stream(
            &format!("threads/{thread_id}/runs"),
            serde_json::json!({ "assistant_id": assistant_id, "stream": true }),
        )
        .await
    }

    /// Adds a user message (with conflict retry) and streams a new run.
    pub async fn add_message_and_stream_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        text: impl Into<String>,
    ) -> Result<StreamSession, BridgeError> {
        self.add_message(thread_id, text).await?;
        self.stream_run(thread_id, assistant_id).await
    }

    /// Creates a thread seeded with `thread` and streams its first run.
    ///
    /// The new thread id arrives as `RunStatusEvent::ThreadCreated`.
    pub async fn create_thread_and_stream_run(
        &self,
        assistant_id: &str,
        thread: &NewThread,
    ) -> Result<StreamSession, BridgeError> {
        self.open_stream(
            "threads/runs",
            serde_json::json!({ "assistant_id": assistant_id, "thread": thread, "stream": true }),
        )
        .await
    }

    /// Creates a thread with a single user message and streams its first run.
    pub async fn create_and_stream_run(
        &self,
        assistant_id: &str,
        text: impl Into<String>,
    ) -> Result<StreamSession, BridgeError> {
        self.create_thread_and_stream_run(assistant_id, &NewThread::with_user_message(text))
            .await
    }

    /// Submits tool outputs and continues the run on a new stream.
    pub async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<StreamSession, BridgeError> {
        self.open_stream(
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            serde_json::json!({ "tool_outputs": outputs, "stream": true }),
        )
        .await
    }

    /// Polls a run to a terminal status and resolves its result.
    pub async fn poll_run(&self, thread_id: &str, run_id: &str) -> Result<RunStepResult, BridgeError> {
        self.poller().poll_run(self, thread_id, run_id).await
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method, self.config.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", &self.config.assistants_beta);
        if let Some(org) = &self.config.organization_id {
            request = request.header("OpenAI-Organization", org);
        }
        request
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BridgeError> {
        let response = request
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| BridgeError::transport(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::transport(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "assistants request failed");
            return Err(BridgeError::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| BridgeError::decode(format!("{e}: {body}")))
    }

    async fn open_stream(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<StreamSession, BridgeError> {
        debug!(path, "opening run stream");
        let response = self
            .request(reqwest::Method::POST, path)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::transport(format!("stream request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            debug!(path, status = status.as_u16(), "run stream rejected");
            return Err(BridgeError::from_status(status.as_u16(), &body));
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| BridgeError::transport(format!("stream read failed: {e}")))
        }));
        Ok(StreamSession::start(bytes, self.config.stream_options()))
    }
}

#[async_trait::async_trait]
impl RunsApi for AssistantClient {
    async fn post_message(
        &self,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, BridgeError> {
        let request = self
            .request(reqwest::Method::POST, &format!("threads/{thread_id}/messages"))
            .json(message);
        self.send_json(request).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError> {
        let request = self.request(
            reqwest::Method::GET,
            &format!("threads/{thread_id}/runs/{run_id}"),
        );
        self.send_json(request).await
    }

    async fn list_run_steps(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunStepList, BridgeError> {
        let request = self.request(
            reqwest::Method::GET,
            &format!("threads/{thread_id}/runs/{run_id}/steps"),
        );
        self.send_json(request).await
    }

    async fn retrieve_message(
        &self,
        thread_id: &str,
        message_id: &str,
    ) -> Result<ThreadMessage, BridgeError> {
        let request = self.request(
            reqwest::Method::GET,
            &format!("threads/{thread_id}/messages/{message_id}"),
        );
        self.send_json(request).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, BridgeError> {
        debug!(thread_id, run_id, "cancelling run");
        let request = self.request(
            reqwest::Method::POST,
            &format!("threads/{thread_id}/runs/{run_id}/cancel"),
        );
        self.send_json(request).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, BridgeError> {
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&serde_json::json!({ "tool_outputs": outputs }));
        self.send_json(request).await
    }
}
