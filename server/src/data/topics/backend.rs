//! Topic backend trait definition
//!
//! Stream semantics only: at-least-once delivery, one consumer per message,
//! acknowledgment required. The in-memory backend is the only implementation
//! today; the trait keeps the webhook pipeline decoupled from it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::error::TopicError;

/// Message received from a stream with its ID for acknowledgment
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// Unique message ID (monotonic sequence)
    pub id: String,
    /// Message payload
    pub payload: Vec<u8>,
}

/// Subscription to a stream topic (at-least-once semantics)
pub struct StreamSubscription {
    /// Stream of received messages with IDs
    pub receiver: Pin<Box<dyn Stream<Item = Result<StreamMessage, TopicError>> + Send>>,
}

/// Stream statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Total messages in the stream
    pub length: u64,
    /// Messages pending acknowledgment
    pub pending: u64,
    /// Number of consumers in the group
    pub consumers: u64,
    /// Oldest pending message age in milliseconds
    pub oldest_pending_ms: Option<u64>,
}

/// Topic backend trait
///
/// Messages persist until acknowledged; unacknowledged messages can be
/// claimed by another consumer after an idle period (crash recovery).
#[async_trait]
pub trait TopicBackend: Send + Sync {
    /// Publish a message to a stream topic, returning its ID
    async fn stream_publish(&self, topic: &str, payload: &[u8]) -> Result<String, TopicError>;

    /// Subscribe to a stream topic with a consumer group
    ///
    /// Each message is delivered to exactly one consumer in the group until
    /// acknowledged.
    async fn stream_subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<StreamSubscription, TopicError>;

    /// Acknowledge message processing complete
    ///
    /// Removes the message from the pending list; without this the message
    /// is eventually re-delivered via `stream_claim`.
    async fn stream_ack(&self, topic: &str, group: &str, id: &str) -> Result<(), TopicError>;

    /// Claim pending messages that have been idle at least `min_idle_ms`
    ///
    /// Used for recovery when a consumer stops without acknowledging.
    async fn stream_claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamMessage>, TopicError>;

    /// Get stream statistics for monitoring
    async fn stream_stats(&self, topic: &str, group: &str) -> Result<StreamStats, TopicError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
