//! Lead event consumer
//!
//! Drains the lead-events stream published by the Facebook webhook handler.
//! Uses a consumer group for at-least-once delivery: events are acknowledged
//! after processing, and events stuck pending on a dead consumer are claimed
//! back periodically.
//!
//! Processing failures are acknowledged too. The failure is already recorded
//! on the lead's metadata row, so redelivering the event would only repeat
//! the same Graph API error.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::data::topics::{StreamAcker, StreamClaimer, StreamTopic, TopicError};
use crate::domain::ingestion::{IngestionService, LeadEvent};

/// Consumer group name for lead ingestion
const CONSUMER_GROUP: &str = "lead_ingestion";

/// Interval for claiming stuck events (seconds)
const CLAIM_INTERVAL_SECS: u64 = 30;

/// Minimum idle time before claiming an event (milliseconds)
const CLAIM_MIN_IDLE_MS: u64 = 60_000;

/// Maximum number of events to claim at once
const CLAIM_MAX_COUNT: usize = 100;

pub struct LeadConsumer {
    ingestion: Arc<IngestionService>,
}

impl LeadConsumer {
    pub fn new(ingestion: Arc<IngestionService>) -> Self {
        Self { ingestion }
    }

    /// Start consuming lead events from the given stream topic
    pub fn start(
        self,
        topic: StreamTopic<LeadEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        // Unique consumer name: {uuid}:{pid}
        let consumer = format!("{}:{}", Uuid::new_v4(), std::process::id());

        tokio::spawn(async move {
            let mut subscriber = match topic.subscribe(CONSUMER_GROUP, &consumer).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to subscribe to lead events topic");
                    return;
                }
            };

            let acker = subscriber.acker();
            let claimer = subscriber.claimer();

            tracing::debug!(
                consumer = %consumer,
                group = CONSUMER_GROUP,
                "LeadConsumer started"
            );

            let mut claim_interval =
                tokio::time::interval(Duration::from_secs(CLAIM_INTERVAL_SECS));
            claim_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut shutdown_requested = false;

            loop {
                if shutdown_requested {
                    // Drain what is already in flight, then stop
                    match tokio::time::timeout(Duration::from_millis(100), subscriber.recv()).await
                    {
                        Ok(Ok((msg_id, event))) => {
                            self.process(&event).await;
                            if let Err(e) = acker.ack(&msg_id).await {
                                tracing::warn!(error = %e, msg_id = %msg_id, "Failed to ack during drain");
                            }
                            continue;
                        }
                        _ => break,
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("LeadConsumer received shutdown, draining...");
                            shutdown_requested = true;
                        }
                    }
                    result = subscriber.recv() => {
                        match result {
                            Ok((msg_id, event)) => {
                                self.process(&event).await;
                                if let Err(e) = acker.ack(&msg_id).await {
                                    tracing::warn!(error = %e, msg_id = %msg_id, "Failed to ack event");
                                }
                            }
                            Err(TopicError::ChannelClosed) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "LeadConsumer receive error");
                                break;
                            }
                        }
                    }
                    _ = claim_interval.tick() => {
                        self.claim_stuck_events(&claimer, &acker, &consumer).await;
                    }
                }
            }

            tracing::debug!("LeadConsumer shutdown complete");
        })
    }

    /// Claim and process events stuck pending on other consumers
    async fn claim_stuck_events(
        &self,
        claimer: &StreamClaimer,
        acker: &StreamAcker,
        consumer: &str,
    ) {
        match claimer
            .claim(consumer, CLAIM_MIN_IDLE_MS, CLAIM_MAX_COUNT)
            .await
        {
            Ok(messages) if messages.is_empty() => {
                tracing::trace!("No stuck events to claim");
            }
            Ok(messages) => {
                let count = messages.len();
                tracing::debug!(count, "Claiming stuck events");

                for msg in messages {
                    match serde_json::from_slice::<LeadEvent>(&msg.payload) {
                        Ok(event) => {
                            self.process(&event).await;
                            if let Err(e) = acker.ack(&msg.id).await {
                                tracing::warn!(error = %e, msg_id = %msg.id, "Failed to ack claimed event");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, msg_id = %msg.id, "Failed to decode claimed event, acking to discard");
                            if let Err(ack_err) = acker.ack(&msg.id).await {
                                tracing::warn!(error = %ack_err, msg_id = %msg.id, "Failed to ack invalid event");
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim stuck events");
            }
        }
    }

    async fn process(&self, event: &LeadEvent) {
        if let Err(e) = self.ingestion.process_lead_event(event).await {
            // Recorded on the metadata row; nothing left to retry here
            tracing::error!(
                leadgen_id = %event.leadgen_id,
                page_id = %event.page_id,
                error = %e,
                "Lead event processing failed"
            );
        }
    }
}
