//! In-memory topic backend
//!
//! Stream semantics over a VecDeque with pending tracking per consumer
//! group. Suitable for the single-process deployment model: a process crash
//! loses unprocessed messages, but ingestion is idempotent so Facebook's
//! webhook retries repair the gap.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Notify;

use super::backend::{StreamMessage, StreamStats, StreamSubscription, TopicBackend};
use super::error::TopicError;

use crate::core::constants::DEFAULT_STREAM_MAX_LEN;

/// Message stored in a memory stream
#[derive(Clone)]
struct StreamEntry {
    id: u64,
    payload: Vec<u8>,
}

/// Consumer group state for a stream
#[derive(Clone, Default)]
struct ConsumerGroup {
    /// Last delivered ID for each consumer
    last_delivered: HashMap<String, u64>,
    /// Pending messages: message_id -> (consumer, delivery_time)
    pending: HashMap<u64, (String, Instant)>,
}

/// Stream state
#[derive(Clone)]
struct StreamState {
    messages: VecDeque<StreamEntry>,
    groups: HashMap<String, ConsumerGroup>,
    next_id: u64,
    max_len: usize,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            messages: VecDeque::new(),
            groups: HashMap::new(),
            next_id: 1,
            max_len: DEFAULT_STREAM_MAX_LEN,
        }
    }
}

struct SharedState {
    /// Stream state by topic name
    streams: RwLock<HashMap<String, StreamState>>,
    /// Per-stream notifiers for immediate subscriber wakeup (avoids polling)
    notifiers: RwLock<HashMap<String, Arc<Notify>>>,
}

/// In-memory topic backend
pub struct MemoryTopicBackend {
    state: Arc<SharedState>,
}

impl Clone for MemoryTopicBackend {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MemoryTopicBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTopicBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedState {
                streams: RwLock::new(HashMap::new()),
                notifiers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Trim stream to max length (approximately)
    fn trim_stream(stream: &mut StreamState) {
        while stream.messages.len() > stream.max_len {
            if let Some(entry) = stream.messages.pop_front() {
                for group in stream.groups.values_mut() {
                    group.pending.remove(&entry.id);
                }
            }
        }
    }

    /// Get or create a Notify for a stream topic
    fn get_or_create_notifier(&self, topic: &str) -> Arc<Notify> {
        {
            let notifiers = self.state.notifiers.read();
            if let Some(n) = notifiers.get(topic) {
                return Arc::clone(n);
            }
        }
        let mut notifiers = self.state.notifiers.write();
        if let Some(n) = notifiers.get(topic) {
            return Arc::clone(n);
        }
        let n = Arc::new(Notify::new());
        notifiers.insert(topic.to_string(), Arc::clone(&n));
        n
    }
}

#[async_trait]
impl TopicBackend for MemoryTopicBackend {
    async fn stream_publish(&self, topic: &str, payload: &[u8]) -> Result<String, TopicError> {
        let id = {
            let mut streams = self.state.streams.write();
            let stream = streams.entry(topic.to_string()).or_default();

            let id = stream.next_id;
            stream.next_id += 1;

            stream.messages.push_back(StreamEntry {
                id,
                payload: payload.to_vec(),
            });

            Self::trim_stream(stream);
            id
        };

        // Wake subscriber immediately (no polling delay)
        self.get_or_create_notifier(topic).notify_one();

        Ok(id.to_string())
    }

    async fn stream_subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<StreamSubscription, TopicError> {
        // Ensure consumer group exists
        {
            let mut streams = self.state.streams.write();
            let stream = streams.entry(topic.to_string()).or_default();
            stream.groups.entry(group.to_string()).or_default();
        }

        let topic = topic.to_string();
        let group = group.to_string();
        let consumer = consumer.to_string();
        let state = Arc::clone(&self.state);
        let notifier = self.get_or_create_notifier(&topic);

        let stream = stream! {
            let mut last_seen: u64 = 0;

            // Resume from the consumer's last delivered position
            {
                let streams = state.streams.read();
                if let Some(stream_state) = streams.get(&topic)
                    && let Some(cg) = stream_state.groups.get(&group)
                    && let Some(&last) = cg.last_delivered.get(&consumer)
                {
                    last_seen = last;
                }
            }

            loop {
                // Check for new messages - scope the lock to avoid holding across await
                let maybe_msg = {
                    let mut streams = state.streams.write();
                    let stream_state = streams.entry(topic.clone()).or_default();
                    let cg = stream_state.groups.entry(group.clone()).or_default();

                    // Find next undelivered message for this consumer
                    let mut found = None;
                    for entry in &stream_state.messages {
                        if entry.id > last_seen && !cg.pending.contains_key(&entry.id) {
                            found = Some(entry.clone());
                            break;
                        }
                    }

                    if let Some(entry) = found {
                        cg.pending.insert(entry.id, (consumer.clone(), Instant::now()));
                        cg.last_delivered.insert(consumer.clone(), entry.id);
                        last_seen = entry.id;
                        Some(StreamMessage {
                            id: entry.id.to_string(),
                            payload: entry.payload,
                        })
                    } else {
                        None
                    }
                };

                if let Some(msg) = maybe_msg {
                    yield Ok(msg);
                } else {
                    // Wait for notification of a new message
                    notifier.notified().await;
                }
            }
        };

        Ok(StreamSubscription {
            receiver: Box::pin(stream),
        })
    }

    async fn stream_ack(&self, topic: &str, group: &str, id: &str) -> Result<(), TopicError> {
        let id: u64 = id
            .parse()
            .map_err(|_| TopicError::Stream(format!("invalid message id: {}", id)))?;

        let mut streams = self.state.streams.write();
        let stream = streams
            .get_mut(topic)
            .ok_or_else(|| TopicError::Stream(format!("stream not found: {}", topic)))?;

        let cg = stream.groups.get_mut(group).ok_or_else(|| {
            TopicError::ConsumerGroup(format!("consumer group not found: {}", group))
        })?;

        cg.pending.remove(&id);
        Ok(())
    }

    async fn stream_claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamMessage>, TopicError> {
        let mut streams = self.state.streams.write();
        let stream = match streams.get_mut(topic) {
            Some(s) => s,
            None => return Ok(vec![]),
        };

        let cg = match stream.groups.get_mut(group) {
            Some(g) => g,
            None => return Ok(vec![]),
        };

        let now = Instant::now();
        let min_idle = std::time::Duration::from_millis(min_idle_ms);

        let idle_ids: Vec<u64> = cg
            .pending
            .iter()
            .filter(|(_, (_, delivery_time))| now.duration_since(*delivery_time) >= min_idle)
            .map(|(&id, _)| id)
            .take(count)
            .collect();

        let mut claimed = Vec::new();
        for id in idle_ids {
            if let Some(entry) = stream.messages.iter().find(|e| e.id == id) {
                cg.pending
                    .insert(id, (consumer.to_string(), Instant::now()));
                claimed.push(StreamMessage {
                    id: id.to_string(),
                    payload: entry.payload.clone(),
                });
            }
        }

        Ok(claimed)
    }

    async fn stream_stats(&self, topic: &str, group: &str) -> Result<StreamStats, TopicError> {
        let streams = self.state.streams.read();
        let stream = match streams.get(topic) {
            Some(s) => s,
            None => return Ok(StreamStats::default()),
        };

        let cg = match stream.groups.get(group) {
            Some(g) => g,
            None => {
                return Ok(StreamStats {
                    length: stream.messages.len() as u64,
                    ..Default::default()
                });
            }
        };

        let now = Instant::now();
        let oldest_pending_ms = cg
            .pending
            .values()
            .map(|(_, delivery_time)| now.duration_since(*delivery_time).as_millis() as u64)
            .max();

        Ok(StreamStats {
            length: stream.messages.len() as u64,
            pending: cg.pending.len() as u64,
            consumers: cg.last_delivered.len() as u64,
            oldest_pending_ms,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn test_stream_publish_subscribe_ack() {
        let backend = MemoryTopicBackend::new();

        let id = backend.stream_publish("leads", b"event1").await.unwrap();
        assert_eq!(id, "1");

        let sub = backend
            .stream_subscribe("leads", "group1", "consumer1")
            .await
            .unwrap();
        let mut receiver = sub.receiver;

        let msg = timeout(Duration::from_millis(500), receiver.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.id, "1");
        assert_eq!(msg.payload, b"event1");

        backend.stream_ack("leads", "group1", &msg.id).await.unwrap();

        let stats = backend.stream_stats("leads", "group1").await.unwrap();
        assert_eq!(stats.length, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_publish() {
        let backend = MemoryTopicBackend::new();

        let sub = backend
            .stream_subscribe("leads", "group1", "consumer1")
            .await
            .unwrap();
        let mut receiver = sub.receiver;

        backend.stream_publish("leads", b"late").await.unwrap();

        let msg = timeout(Duration::from_millis(500), receiver.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, b"late");
    }

    #[tokio::test]
    async fn test_unacked_message_is_claimable() {
        let backend = MemoryTopicBackend::new();
        backend.stream_publish("leads", b"stuck").await.unwrap();

        let sub = backend
            .stream_subscribe("leads", "group1", "crashed")
            .await
            .unwrap();
        let mut receiver = sub.receiver;
        let msg = timeout(Duration::from_millis(500), receiver.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        drop(receiver);

        // Not yet idle long enough
        let claimed = backend
            .stream_claim("leads", "group1", "rescuer", 60_000, 10)
            .await
            .unwrap();
        assert!(claimed.is_empty());

        // Idle threshold of zero claims immediately
        let claimed = backend
            .stream_claim("leads", "group1", "rescuer", 0, 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, msg.id);
        assert_eq!(claimed[0].payload, b"stuck");
    }

    #[tokio::test]
    async fn test_pending_message_not_redelivered_to_group() {
        let backend = MemoryTopicBackend::new();
        backend.stream_publish("leads", b"one").await.unwrap();

        let sub1 = backend
            .stream_subscribe("leads", "group1", "c1")
            .await
            .unwrap();
        let mut r1 = sub1.receiver;
        let _ = timeout(Duration::from_millis(500), r1.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        // A second consumer in the same group sees nothing while pending
        let sub2 = backend
            .stream_subscribe("leads", "group1", "c2")
            .await
            .unwrap();
        let mut r2 = sub2.receiver;
        assert!(
            timeout(Duration::from_millis(100), r2.next())
                .await
                .is_err()
        );
    }

    #[test]
    fn test_backend_name() {
        let backend = MemoryTopicBackend::new();
        assert_eq!(backend.backend_name(), "memory");
    }
}
