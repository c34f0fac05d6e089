use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::{self, ClassifyError};
use super::identity;
use super::persist::EventPersister;
use super::presence::PresenceTracker;
use crate::db::models::LogLevel;
use crate::db::store::TelemetryStore;
use crate::stream::{EventStream, StreamConnector, StreamError, StreamEvent};

/// Terminal state of the consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Ingestion switched off by configuration; never connected.
    Disabled,
    /// Graceful shutdown was requested.
    Stopped,
    /// Consecutive connection failures exhausted the retry budget.
    Failed,
}

/// Exponential reconnect backoff with a hard ceiling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Delay before reconnect `attempt` (1-based): base × 2^(attempt−1),
    /// saturating at the ceiling.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(2u32.saturating_pow(exp))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

enum ConsumeEnd {
    Cancelled,
    ConnectionLost(StreamError),
}

/// The long-running ingestion loop: connect, consume, back off, repeat.
///
/// Per-event failures are contained inside `process_event`; only
/// connection-level faults drive state transitions. The hosting process
/// survives every outcome, including `Failed`.
pub struct IngestService<C, S> {
    connector: C,
    presence: PresenceTracker<S>,
    persister: EventPersister<S>,
    retry: RetryPolicy,
    enabled: bool,
}

impl<C, S> IngestService<C, S>
where
    C: StreamConnector,
    S: TelemetryStore + Clone,
{
    pub fn new(connector: C, store: S, retry: RetryPolicy, enabled: bool) -> Self {
        Self {
            connector,
            presence: PresenceTracker::new(store.clone()),
            persister: EventPersister::new(store),
            retry,
            enabled,
        }
    }

    /// Runs until a terminal state. Cancellation is observed at the loop
    /// top, while awaiting events, and during the backoff sleep.
    pub async fn run(self, cancel: CancellationToken) -> LoopOutcome {
        if !self.enabled {
            info!("Ingestion disabled by configuration; consumer loop not starting");
            return LoopOutcome::Disabled;
        }

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                info!("Shutdown requested; consumer loop stopping");
                return LoopOutcome::Stopped;
            }

            let connect = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested while connecting; consumer loop stopping");
                    return LoopOutcome::Stopped;
                }
                result = self.connector.connect() => result,
            };

            let fault = match connect {
                Ok(mut stream) => {
                    info!("Event stream connection established");
                    self.persister
                        .log(LogLevel::Info, "event stream connection established", None)
                        .await;
                    attempt = 0;

                    match self.consume(&mut stream, &cancel).await {
                        ConsumeEnd::Cancelled => {
                            info!("Shutdown requested; consumer loop stopping");
                            return LoopOutcome::Stopped;
                        }
                        ConsumeEnd::ConnectionLost(e) => e,
                    }
                }
                Err(e) => e,
            };

            attempt += 1;
            warn!(error = %fault, attempt, "Event stream connection lost");

            if attempt >= self.retry.max_retries {
                error!(attempt, "Retry budget exhausted; giving up on event stream");
                self.persister
                    .log(
                        LogLevel::Error,
                        format!("giving up on event stream after {attempt} failed connection attempts"),
                        None,
                    )
                    .await;
                return LoopOutcome::Failed;
            }

            let delay = self.retry.delay(attempt);
            self.persister
                .log(
                    LogLevel::Warning,
                    format!(
                        "reconnecting to event stream (attempt {attempt}) in {}s",
                        delay.as_secs()
                    ),
                    None,
                )
                .await;

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested during backoff; consumer loop stopping");
                    return LoopOutcome::Stopped;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn consume(&self, stream: &mut C::Stream, cancel: &CancellationToken) -> ConsumeEnd {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return ConsumeEnd::Cancelled,
                next = stream.next_event() => next,
            };

            match next {
                Ok(Some(event)) => self.process_event(&event).await,
                Ok(None) => return ConsumeEnd::ConnectionLost(StreamError::Closed),
                Err(e) => return ConsumeEnd::ConnectionLost(e),
            }
        }
    }

    /// Per-event pipeline: identity → classification → presence →
    /// persistence. Every failure is contained here and logged against the
    /// offending device; the loop always moves on to the next event.
    async fn process_event(&self, event: &StreamEvent) {
        let device_id = identity::logical_device_id(&event.device_id).to_owned();

        let classification = match classifier::classify(&event.payload) {
            Ok(c) => c,
            Err(e @ ClassifyError::MalformedPayload(_)) => {
                warn!(device_id = %device_id, error = %e, "Skipping event with malformed payload");
                return;
            }
        };

        let now = Utc::now();
        let result: anyhow::Result<()> = async {
            self.presence.observe(&device_id, now).await?;
            self.persister
                .record(&device_id, &classification, &event.payload, now)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                debug!(
                    device_id = %device_id,
                    event_type = %classification.event_type,
                    partition = ?event.partition,
                    "Event processed"
                );
            }
            Err(e) => {
                error!(device_id = %device_id, error = %e, "Failed to process event");
            }
        }
    }
}
