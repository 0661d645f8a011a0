//! In-process stream topics
//!
//! Decouples webhook acknowledgment from lead processing: the Facebook POST
//! handler publishes one event per leadgen change and returns immediately;
//! the ingestion consumer drains the stream with at-least-once delivery.
//!
//! Messages persist until acknowledged. Unacknowledged messages are picked
//! up again through periodic claiming, so a consumer dying mid-lead never
//! strands an event. Payloads are JSON-encoded typed messages.

mod backend;
mod error;
mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::{StreamMessage, StreamStats, StreamSubscription, TopicBackend};
pub use error::TopicError;
use memory::MemoryTopicBackend;

/// Central topic service
pub struct TopicService {
    backend: Arc<dyn TopicBackend>,
}

impl TopicService {
    /// Create a new topic service with the in-memory backend
    pub fn new() -> Self {
        Self {
            backend: Arc::new(MemoryTopicBackend::new()),
        }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Get a typed handle to a stream topic
    pub fn stream_topic<T>(&self, name: &str) -> StreamTopic<T>
    where
        T: Serialize + DeserializeOwned,
    {
        StreamTopic {
            name: name.to_string(),
            backend: Arc::clone(&self.backend),
            _phantom: PhantomData,
        }
    }

    /// Get stream statistics for monitoring
    pub async fn stream_stats(&self, topic: &str, group: &str) -> Result<StreamStats, TopicError> {
        self.backend.stream_stats(topic, group).await
    }

    /// Shut down the topic service
    ///
    /// Consumers are drained by their own shutdown paths; nothing to flush
    /// for the in-memory backend.
    pub async fn shutdown(&self) {
        tracing::debug!(backend = self.backend_name(), "Topic service shut down");
    }
}

impl Default for TopicService {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed handle to a stream topic with at-least-once delivery
pub struct StreamTopic<T>
where
    T: Serialize + DeserializeOwned,
{
    name: String,
    backend: Arc<dyn TopicBackend>,
    _phantom: PhantomData<T>,
}

impl<T> StreamTopic<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Publish a message to the stream, returning its ID
    pub async fn publish(&self, msg: &T) -> Result<String, TopicError> {
        let payload =
            serde_json::to_vec(msg).map_err(|e| TopicError::Serialization(e.to_string()))?;
        self.backend.stream_publish(&self.name, &payload).await
    }

    /// Subscribe with a consumer group
    ///
    /// Messages are distributed across consumers in the group. Call
    /// `acker().ack(id)` after processing each message.
    pub async fn subscribe(
        &self,
        group: &str,
        consumer: &str,
    ) -> Result<StreamTopicSubscriber<T>, TopicError> {
        let subscription = self
            .backend
            .stream_subscribe(&self.name, group, consumer)
            .await?;
        Ok(StreamTopicSubscriber {
            name: self.name.clone(),
            group: group.to_string(),
            backend: Arc::clone(&self.backend),
            subscription,
            _phantom: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Acker for acknowledging stream messages (Send + Sync)
#[derive(Clone)]
pub struct StreamAcker {
    name: String,
    group: String,
    backend: Arc<dyn TopicBackend>,
}

impl StreamAcker {
    /// Acknowledge message processing complete
    pub async fn ack(&self, id: &str) -> Result<(), TopicError> {
        self.backend.stream_ack(&self.name, &self.group, id).await
    }
}

/// Claimer for recovering stuck messages from other consumers (Send + Sync)
#[derive(Clone)]
pub struct StreamClaimer {
    name: String,
    group: String,
    backend: Arc<dyn TopicBackend>,
}

impl StreamClaimer {
    /// Claim messages pending longer than `min_idle_ms`
    ///
    /// The caller decodes and processes the raw payloads, then acknowledges
    /// them through a [`StreamAcker`].
    pub async fn claim(
        &self,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamMessage>, TopicError> {
        self.backend
            .stream_claim(&self.name, &self.group, consumer, min_idle_ms, count)
            .await
    }
}

/// Subscriber to a stream topic
pub struct StreamTopicSubscriber<T>
where
    T: Serialize + DeserializeOwned,
{
    name: String,
    group: String,
    backend: Arc<dyn TopicBackend>,
    subscription: StreamSubscription,
    _phantom: PhantomData<T>,
}

impl<T> StreamTopicSubscriber<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Receive the next message
    ///
    /// Returns (message_id, message). Acknowledge via `acker().ack(id)`
    /// after processing.
    pub async fn recv(&mut self) -> Result<(String, T), TopicError> {
        if let Some(result) = self.subscription.receiver.next().await {
            let msg = result?;
            let decoded: T = serde_json::from_slice(&msg.payload)
                .map_err(|e| TopicError::Serialization(e.to_string()))?;
            Ok((msg.id, decoded))
        } else {
            Err(TopicError::ChannelClosed)
        }
    }

    /// Get an acker for acknowledging messages (Send + Sync)
    pub fn acker(&self) -> StreamAcker {
        StreamAcker {
            name: self.name.clone(),
            group: self.group.clone(),
            backend: Arc::clone(&self.backend),
        }
    }

    /// Get a claimer for recovering stuck messages (Send + Sync)
    pub fn claimer(&self) -> StreamClaimer {
        StreamClaimer {
            name: self.name.clone(),
            group: self.group.clone(),
            backend: Arc::clone(&self.backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio::time::{Duration, timeout};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestEvent {
        page_id: String,
        leadgen_id: String,
    }

    fn event(leadgen_id: &str) -> TestEvent {
        TestEvent {
            page_id: "page_1".to_string(),
            leadgen_id: leadgen_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_typed_publish_and_receive() {
        let service = TopicService::new();
        let topic = service.stream_topic::<TestEvent>("lead-events");

        let id = topic.publish(&event("lg_1")).await.unwrap();
        assert_eq!(id, "1");

        let mut sub = topic.subscribe("group", "c1").await.unwrap();
        let (msg_id, msg) = timeout(Duration::from_millis(500), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg_id, "1");
        assert_eq!(msg, event("lg_1"));

        sub.acker().ack(&msg_id).await.unwrap();
        let stats = service.stream_stats("lead-events", "group").await.unwrap();
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_claim_decodes_typed_messages() {
        let service = TopicService::new();
        let topic = service.stream_topic::<TestEvent>("lead-events");
        topic.publish(&event("lg_stuck")).await.unwrap();

        let mut sub = topic.subscribe("group", "c1").await.unwrap();
        let _ = timeout(Duration::from_millis(500), sub.recv())
            .await
            .unwrap()
            .unwrap();

        let claimed = sub.claimer().claim("c2", 0, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        let decoded: TestEvent = serde_json::from_slice(&claimed[0].payload).unwrap();
        assert_eq!(decoded.leadgen_id, "lg_stuck");
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_an_error() {
        let service = TopicService::new();
        let raw = service.stream_topic::<serde_json::Value>("mixed");
        raw.publish(&serde_json::json!("just a string")).await.unwrap();

        let typed = service.stream_topic::<TestEvent>("mixed");
        let mut sub = typed.subscribe("group", "c1").await.unwrap();
        let err = timeout(Duration::from_millis(500), sub.recv())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, TopicError::Serialization(_)));
    }
}
