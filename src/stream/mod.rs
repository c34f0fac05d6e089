pub mod nats;

use async_trait::async_trait;
use thiserror::Error;

/// One raw event pulled from the partitioned stream source.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Physical device identifier reported by the transport layer.
    /// Remapped to a logical id before anything is persisted.
    pub device_id: String,
    /// Source partition, when the transport exposes one. Events are ordered
    /// within a partition; no ordering is guaranteed across partitions.
    pub partition: Option<u32>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to event stream: {0}")]
    Connect(String),
    #[error("event stream transport fault: {0}")]
    Transport(String),
    #[error("event stream closed by the source")]
    Closed,
}

/// A connected stream session, fanning partitions into one event sequence.
#[async_trait]
pub trait EventStream: Send {
    /// Pull the next event. `Ok(None)` means the source closed the stream;
    /// callers treat it the same as a transport fault and reconnect.
    async fn next_event(&mut self) -> Result<Option<StreamEvent>, StreamError>;
}

/// Builds stream sessions. Each reconnect attempt calls `connect` again.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Stream: EventStream;

    async fn connect(&self) -> Result<Self::Stream, StreamError>;
}
