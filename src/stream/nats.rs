use async_nats::jetstream::{self, consumer::pull, consumer::PullConsumer};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{EventStream, StreamConnector, StreamError, StreamEvent};
use crate::config::StreamConfig;

/// NATS JetStream implementation of the stream source.
///
/// Subjects act as partitions: devices publish to `telemetry.<device_id>`,
/// and the durable pull consumer fans every matching subject into one
/// sequence. Consumer-group ownership (no duplicate partition assignment
/// across process instances) is JetStream's responsibility, not ours.
pub struct NatsConnector {
    config: StreamConfig,
}

impl NatsConnector {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StreamConnector for NatsConnector {
    type Stream = NatsEventStream;

    async fn connect(&self) -> Result<NatsEventStream, StreamError> {
        debug!(url = %self.config.url, "Connecting to NATS");

        let client = async_nats::connect(&self.config.url)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        let jetstream = jetstream::new(client);

        let consumer: PullConsumer = jetstream
            .create_consumer_on_stream(
                pull::Config {
                    name: Some(self.config.consumer_group.clone()),
                    durable_name: Some(self.config.consumer_group.clone()),
                    filter_subject: self.config.subject_filter.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                self.config.stream_name.clone(),
            )
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_group,
            subject = %self.config.subject_filter,
            "JetStream consumer ready"
        );

        Ok(NatsEventStream { messages })
    }
}

pub struct NatsEventStream {
    messages: pull::Stream,
}

#[async_trait]
impl EventStream for NatsEventStream {
    async fn next_event(&mut self) -> Result<Option<StreamEvent>, StreamError> {
        match self.messages.next().await {
            None => Ok(None),
            Some(Err(e)) => Err(StreamError::Transport(e.to_string())),
            Some(Ok(msg)) => {
                // Ack on receipt. The source is at-least-once either way:
                // redelivery after reconnect resumes from the ack floor.
                if let Err(e) = msg.ack().await {
                    warn!(subject = %msg.subject, error = %e, "Failed to ack message");
                }

                // The publishing convention carries the physical device id
                // as the last subject token.
                let device_id = msg
                    .subject
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();

                Ok(Some(StreamEvent {
                    device_id,
                    partition: None,
                    payload: msg.payload.to_vec(),
                }))
            }
        }
    }
}
