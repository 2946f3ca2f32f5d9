use tracing::{debug, warn};

use crate::api::RunsApi;
use crate::content::{NewMessage, ThreadMessage};
use crate::errors::BridgeError;

/// Cancel-and-retry handling for "run already active" conflicts when adding
/// a message to a thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConflictRetryPolicy {
    max_retries: u32,
}

impl Default for ConflictRetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ConflictRetryPolicy {
    /// `max_retries` is how many times a conflicting run is cancelled before
    /// giving up. Zero surfaces the first conflict as `ConflictRetriesExhausted`.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Adds `message` to the thread, cancelling a blocking run and retrying
    /// with the same arguments on conflict. Other errors are returned as is.
    pub async fn add_message<A>(
        &self,
        api: &A,
        thread_id: &str,
        message: &NewMessage,
    ) -> Result<ThreadMessage, BridgeError>
    where
        A: RunsApi + ?Sized,
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let run_id = match api.post_message(thread_id, message).await {
                Err(BridgeError::RunAlreadyActive { run_id }) => run_id,
                other => return other,
            };
            if attempt > self.max_retries {
                warn!(thread_id, run_id = %run_id, attempt, "thread still busy, giving up");
                return Err(BridgeError::ConflictRetriesExhausted {
                    thread_id: thread_id.to_string(),
                    run_id,
                    attempts: attempt,
                });
            }
            debug!(thread_id, run_id = %run_id, attempt, "run active on thread, cancelling before retry");
            api.cancel_run(thread_id, &run_id).await?;
        }
    }
}
