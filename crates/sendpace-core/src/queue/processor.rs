//! Queue processor - periodic sweep that delivers due items
//!
//! Item state machine: waiting -> processing -> sent | waiting (retry) |
//! failed | cancelled. Retries are plain data: a failed attempt writes a
//! future `scheduled_send_at` and the item flows through the same sweep as
//! fresh sends.

use anyhow::Result;
use chrono::{Duration, Utc};
use sendpace_common::types::MessageType;
use sendpace_storage::db::DatabasePool;
use sendpace_storage::models::{CreateDeliveryLog, DeliveryStatus, QueueItem};
use sendpace_storage::repository::{
    DeliveryLogRepository, GroupRepository, MessageRepository, ProfileRepository, QueueRepository,
    RoutingRepository,
};
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

use crate::block::BlockDetection;
use crate::dispatch::Dispatcher;
use crate::transport::{MessagePayload, ProviderCredentials, Transport};

/// Queue processor - sweeps due items out to the provider
pub struct QueueProcessor<T: Transport> {
    queue_repo: QueueRepository,
    profile_repo: ProfileRepository,
    message_repo: MessageRepository,
    delivery_log_repo: DeliveryLogRepository,
    routing_repo: RoutingRepository,
    group_repo: GroupRepository,
    transport: Arc<T>,
    block_detection: Arc<dyn BlockDetection>,
    dispatcher: Arc<Dispatcher<T>>,
    /// Maximum due items picked per sweep
    batch_size: i64,
    /// Interval between sweeps (seconds)
    poll_interval_secs: u64,
}

impl<T: Transport> QueueProcessor<T> {
    /// Create a new queue processor
    pub fn new(
        db_pool: DatabasePool,
        transport: Arc<T>,
        block_detection: Arc<dyn BlockDetection>,
        dispatcher: Arc<Dispatcher<T>>,
    ) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            queue_repo: QueueRepository::new(pool.clone()),
            profile_repo: ProfileRepository::new(pool.clone()),
            message_repo: MessageRepository::new(pool.clone()),
            delivery_log_repo: DeliveryLogRepository::new(pool.clone()),
            routing_repo: RoutingRepository::new(pool.clone()),
            group_repo: GroupRepository::new(pool),
            transport,
            block_detection,
            dispatcher,
            batch_size: 10,
            poll_interval_secs: 5,
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Run the processor loop
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));

        info!(
            "Queue processor started (batch: {}, interval: {}s)",
            self.batch_size, self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Error processing queue: {}", e);
            }

            if let Err(e) = self.dispatcher.promote_scheduled().await {
                error!("Error promoting scheduled messages: {}", e);
            }
        }
    }

    /// Process one batch of due items
    pub async fn sweep(&self) -> Result<usize> {
        let items = self.queue_repo.due_items(self.batch_size).await?;
        if items.is_empty() {
            return Ok(0);
        }

        debug!("Processing {} due queue items", items.len());

        let count = items.len();
        for item in items {
            // Item failures never abort the sweep
            self.process_item(item).await;
        }

        Ok(count)
    }

    /// Process a single queue item
    async fn process_item(&self, item: QueueItem) {
        match self.queue_repo.mark_processing(item.id).await {
            Ok(true) => {}
            Ok(false) => return, // picked up by another worker
            Err(e) => {
                error!("Failed to mark queue item {} as processing: {}", item.id, e);
                return;
            }
        }

        let attempt_count = item.attempt_count + 1;
        if let Err(e) = self.deliver(&item, attempt_count).await {
            error!("Failed to process queue item {}: {}", item.id, e);
        }
    }

    async fn deliver(&self, item: &QueueItem, attempt_count: i32) -> Result<()> {
        let message = match self.message_repo.get(item.message_id).await? {
            Some(m) => m,
            None => {
                self.queue_repo
                    .mark_failed(item.id, "message record missing")
                    .await?;
                return Ok(());
            }
        };

        // The profile may have been paused between scheduling and now
        let profile = match self.profile_repo.get(item.profile_id).await? {
            Some(p) if p.is_active() => p,
            _ => {
                warn!(
                    "Profile {} unavailable for queue item {}",
                    item.profile_id, item.id
                );
                self.queue_repo
                    .mark_failed(item.id, "profile unavailable")
                    .await?;
                self.message_repo
                    .record_outcome(item.message_id, false)
                    .await?;
                return Ok(());
            }
        };

        let payload = MessagePayload {
            message_type: message
                .message_type
                .parse()
                .unwrap_or(MessageType::Text),
            content: message.content.clone(),
            media_url: message.media_url.clone(),
            caption: message.caption.clone(),
        };
        let credentials = ProviderCredentials {
            device_uuid: profile.device_uuid.clone(),
            api_token: profile.api_token.clone(),
        };

        let outcome = self
            .transport
            .send(&credentials, &item.recipient, &payload)
            .await;

        self.delivery_log_repo
            .create(CreateDeliveryLog {
                message_id: item.message_id,
                profile_id: item.profile_id,
                recipient: item.recipient.clone(),
                provider_message_id: outcome.provider_message_id.clone(),
                message_mode: message.message_mode.clone(),
                status: if outcome.success {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                attempt_count,
                error_message: outcome.error.clone(),
                response_time_ms: outcome.response_time_ms,
                sent_at: outcome.success.then(Utc::now),
            })
            .await?;

        if outcome.success {
            self.queue_repo.mark_sent(item.id).await?;
            // Future replies to this recipient reuse the same profile
            self.routing_repo
                .upsert(message.group_id, &item.recipient, item.profile_id)
                .await?;
            self.message_repo
                .record_outcome(item.message_id, true)
                .await?;

            info!(
                "Queue item {} sent via profile {} (attempt {})",
                item.id, profile.name, attempt_count
            );
        } else {
            let error = outcome
                .error
                .as_deref()
                .unwrap_or("unknown transport error");

            if attempt_count >= item.max_attempts {
                self.queue_repo.mark_failed(item.id, error).await?;
                self.message_repo
                    .record_outcome(item.message_id, false)
                    .await?;
                error!(
                    "Queue item {} exhausted {} attempts: {}",
                    item.id, item.max_attempts, error
                );
            } else {
                let base_delay = match self.group_repo.get(message.group_id).await? {
                    Some(group) => group.retry_delay_seconds as i64,
                    None => 5,
                };
                let retry_at = Utc::now() + retry_backoff(base_delay, attempt_count);
                self.queue_repo
                    .reschedule_retry(item.id, error, retry_at)
                    .await?;
                info!(
                    "Queue item {} scheduled for retry at {} (attempt {})",
                    item.id, retry_at, attempt_count
                );
            }

            // Fire-and-forget signal; the heuristic may pause the profile
            let block = Arc::clone(&self.block_detection);
            let group_id = message.group_id;
            let profile_id = item.profile_id;
            let error_owned = error.to_string();
            tokio::spawn(async move {
                block
                    .on_delivery_failure(group_id, profile_id, &error_owned)
                    .await;
            });
        }

        self.profile_repo
            .update_after_send(item.profile_id, outcome.success, outcome.response_time_ms)
            .await?;
        self.profile_repo
            .touch_last_message_at(item.profile_id)
            .await?;

        Ok(())
    }
}

/// Exponential backoff, encoded as the distance to the next scheduled slot
fn retry_backoff(base_delay_seconds: i64, attempt_count: i32) -> Duration {
    Duration::seconds(base_delay_seconds * 2_i64.pow(attempt_count.max(0) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles_per_attempt() {
        assert_eq!(retry_backoff(5, 1), Duration::seconds(10));
        assert_eq!(retry_backoff(5, 2), Duration::seconds(20));
        assert_eq!(retry_backoff(5, 3), Duration::seconds(40));
        assert_eq!(retry_backoff(10, 1), Duration::seconds(20));
    }

    #[test]
    fn test_retry_backoff_handles_zero_attempts() {
        assert_eq!(retry_backoff(5, 0), Duration::seconds(5));
    }
}
