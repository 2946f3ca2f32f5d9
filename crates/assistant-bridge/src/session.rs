use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::dispatch::decode_event;
use crate::errors::{ApiErrorBody, BridgeError};
use crate::sse::{self, ByteStream, EventAssembler};
use crate::stream::RunStatusEvent;

type EventResult = Result<RunStatusEvent, BridgeError>;

/// Watchdog settings for a stream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum silence before the stream is ended with a timeout error.
    /// `None` disables the watchdog.
    pub inactivity_timeout: Option<Duration>,
    /// How often the watchdog checks.
    pub watchdog_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            inactivity_timeout: Some(Duration::from_secs(30)),
            watchdog_interval: Duration::from_secs(1),
        }
    }
}

/// A live run-status stream.
///
/// Owns one reader task (bytes to events) and, unless disabled, one watchdog
/// task. Events are handed over one at a time through a channel of capacity
/// one. Dropping or cancelling the session aborts both tasks and releases the
/// connection. A session cannot be restarted.
pub struct StreamSession {
    session_id: uuid::Uuid,
    rx: mpsc::Receiver<EventResult>,
    reader: AbortHandle,
    watchdog: Option<AbortHandle>,
    finished: bool,
}

impl StreamSession {
    /// Starts reading `bytes` as an SSE body.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(bytes: ByteStream, options: StreamOptions) -> Self {
        let session_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        let (activity_tx, activity_rx) = watch::channel(Instant::now());
        debug!(%session_id, inactivity_timeout = ?options.inactivity_timeout, "starting run stream session");

        let reader = tokio::spawn(read_events(session_id, bytes, tx.clone(), activity_tx));
        let reader_abort = reader.abort_handle();
        let watchdog = options.inactivity_timeout.map(|timeout| {
            tokio::spawn(watch_inactivity(
                session_id,
                reader,
                activity_rx,
                timeout,
                options.watchdog_interval,
                tx,
            ))
            .abort_handle()
        });

        Self {
            session_id,
            rx,
            reader: reader_abort,
            watchdog,
            finished: false,
        }
    }

    /// Correlation id used in this session's log records.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the stream has ended, by completion, error,
    /// timeout or cancellation.
    pub async fn next_event(&mut self) -> Option<EventResult> {
        self.next().await
    }

    /// Stops the stream. Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.finished {
            debug!(session_id = %self.session_id, "run stream cancelled by consumer");
        }
        self.terminate();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn terminate(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.reader.abort();
        if let Some(watchdog) = &self.watchdog {
            watchdog.abort();
        }
        self.rx.close();
        trace!(session_id = %self.session_id, "run stream session terminated");
    }
}

impl futures::Stream for StreamSession {
    type Item = EventResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.terminate();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("session_id", &self.session_id)
            .field("finished", &self.finished)
            .finish()
    }
}

async fn read_events(
    session_id: uuid::Uuid,
    bytes: ByteStream,
    tx: mpsc::Sender<EventResult>,
    activity: watch::Sender<Instant>,
) {
    let mut lines = std::pin::pin!(sse::lines(bytes));
    let mut assembler = EventAssembler::default();
    while let Some(line) = lines.next().await {
        activity.send_replace(Instant::now());
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                debug!(%session_id, error = %err, "run stream read failed");
                let _ = tx.send(Err(err)).await;
                return;
            }
        };
        let Some(raw) = assembler.push_line(&line) else {
            continue;
        };
        let event = decode_event(&raw);
        trace!(%session_id, event = event.name(), "run stream event");
        if tx.send(Ok(event)).await.is_err() {
            return;
        }
        activity.send_replace(Instant::now());
    }
    debug!(%session_id, "run stream body ended");
}

async fn watch_inactivity(
    session_id: uuid::Uuid,
    mut reader: JoinHandle<()>,
    activity: watch::Receiver<Instant>,
    timeout: Duration,
    interval: Duration,
    tx: mpsc::Sender<EventResult>,
) {
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = &mut reader => return,
            _ = ticker.tick() => {
                // A full channel means an event is still waiting for the consumer.
                if tx.capacity() == 0 {
                    continue;
                }
                let idle = activity.borrow().elapsed();
                if idle <= timeout || reader.is_finished() {
                    continue;
                }
                warn!(%session_id, idle_secs = idle.as_secs(), timeout_secs = timeout.as_secs(), "run stream inactivity timeout");
                reader.abort();
                let _ = (&mut reader).await;
                let _ = tx
                    .send(Ok(RunStatusEvent::ErrorOccurred(ApiErrorBody::inactivity_timeout(timeout))))
                    .await;
                return;
            }
        }
    }
}
