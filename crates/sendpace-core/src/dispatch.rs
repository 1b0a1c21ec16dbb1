//! Dispatch orchestration - the entry points a request layer calls
//!
//! Open sends run the full distribute -> cooldown -> schedule pipeline
//! synchronously; replies bypass pacing through sticky routing; scheduled
//! messages are parked until the queue processor promotes them.

use chrono::{DateTime, Duration, Utc};
use sendpace_common::types::{
    CooldownMode, GroupId, MessageId, MessageMode, MessageType, ProfileId,
};
use sendpace_storage::db::DatabasePool;
use sendpace_storage::models::{
    CreateDeliveryLog, CreateMessage, DeliveryStatus, Message, MessageStatus,
};
use sendpace_storage::repository::{
    DeliveryLogRepository, GroupRepository, MessageRepository, ProfileRepository, QueueRepository,
    RoutingRepository,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cooldown::{classify_queue_mode, CooldownCalculator};
use crate::distribution::distribute;
use crate::queue::scheduler::GlobalQueueScheduler;
use crate::transport::{MessagePayload, ProviderCredentials, Transport};

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Group not found")]
    GroupNotFound,

    #[error("Group is not active")]
    GroupNotActive,

    #[error("No active profiles available in this group")]
    NoEligibleProfiles,

    #[error("No recipients supplied")]
    NoRecipients,

    #[error("scheduled_at must be in the future")]
    ScheduleTimeInPast,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DispatchError> for sendpace_common::Error {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::GroupNotFound => Self::NotFound("group".to_string()),
            DispatchError::MessageNotFound => Self::NotFound("message".to_string()),
            DispatchError::GroupNotActive => Self::Validation("group is not active".to_string()),
            DispatchError::NoRecipients => Self::Validation("no recipients supplied".to_string()),
            DispatchError::ScheduleTimeInPast => {
                Self::Validation("scheduled_at must be in the future".to_string())
            }
            DispatchError::NoEligibleProfiles => Self::NoEligibleProfiles,
            DispatchError::Database(e) => Self::Database(e.to_string()),
            DispatchError::Internal(e) => Self::Internal(e.to_string()),
        }
    }
}

/// One open send request
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub recipients: Vec<String>,
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

/// A future-dated send request
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub send: SendRequest,
    pub scheduled_at: DateTime<Utc>,
    /// When set and there is more than one recipient, each recipient becomes
    /// its own message, spaced this many minutes apart
    pub drip_interval_minutes: Option<i64>,
}

/// Per-profile limit usage at dispatch time
#[derive(Debug, Clone, Serialize)]
pub struct ProfileLimitsStatus {
    pub hourly: String,
    pub daily: String,
    pub status: String,
}

/// Result of an accepted open send
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub message_id: MessageId,
    pub status: String,
    pub total_recipients: usize,
    pub queued_items: usize,
    pub distribution: HashMap<ProfileId, usize>,
    /// Recipients no profile had room for; empty on a full assignment
    pub unassigned: Vec<String>,
    pub estimated_completion: DateTime<Utc>,
    pub limits_status: HashMap<ProfileId, ProfileLimitsStatus>,
}

/// Result of a reply send
#[derive(Debug, Clone, Serialize)]
pub struct ReplySummary {
    pub message_id: MessageId,
    pub status: String,
    pub profile_used: String,
    pub response_time_ms: i32,
}

/// Result of scheduling a future send
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSummary {
    pub message_ids: Vec<MessageId>,
    pub mode: String,
    pub total_recipients: usize,
    pub first_send: DateTime<Utc>,
    pub last_send: DateTime<Utc>,
}

/// Queue state of a group
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub waiting: i64,
    pub processing: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub queue_mode: CooldownMode,
    pub next_send_at: Option<DateTime<Utc>>,
    pub active_profiles: usize,
}

/// Dispatcher - orchestrates distribution, pacing, and scheduling
pub struct Dispatcher<T: Transport> {
    group_repo: GroupRepository,
    profile_repo: ProfileRepository,
    message_repo: MessageRepository,
    queue_repo: QueueRepository,
    delivery_log_repo: DeliveryLogRepository,
    routing_repo: RoutingRepository,
    cooldown: CooldownCalculator,
    scheduler: GlobalQueueScheduler,
    transport: Arc<T>,
}

impl<T: Transport> Dispatcher<T> {
    /// Create a new dispatcher
    pub fn new(db_pool: DatabasePool, transport: Arc<T>) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            group_repo: GroupRepository::new(pool.clone()),
            profile_repo: ProfileRepository::new(pool.clone()),
            message_repo: MessageRepository::new(pool.clone()),
            queue_repo: QueueRepository::new(pool.clone()),
            delivery_log_repo: DeliveryLogRepository::new(pool.clone()),
            routing_repo: RoutingRepository::new(pool),
            cooldown: CooldownCalculator::new(db_pool.clone()),
            scheduler: GlobalQueueScheduler::new(db_pool),
            transport,
        }
    }

    /// Distribute, pace, and queue an open send
    ///
    /// Fails atomically before any Message row exists when the group has no
    /// eligible profiles.
    pub async fn send(
        &self,
        group_id: GroupId,
        request: SendRequest,
    ) -> Result<DispatchSummary, DispatchError> {
        let group = self
            .group_repo
            .get(group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;
        if !group.is_active() {
            return Err(DispatchError::GroupNotActive);
        }
        if request.recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let profiles = self.profile_repo.list_active_with_stats(group_id).await?;
        let pending = self.queue_repo.waiting_counts_by_profile(group_id).await?;

        let distribution = distribute(
            &group,
            &profiles,
            &pending,
            &request.recipients,
            &mut rand::thread_rng(),
        )?;
        if distribution.is_empty() {
            return Err(DispatchError::NoEligibleProfiles);
        }

        let message = self
            .message_repo
            .create(CreateMessage {
                group_id,
                message_mode: MessageMode::Open.to_string(),
                message_type: request.message_type.to_string(),
                content: request.content,
                media_url: request.media_url,
                caption: request.caption,
                recipients: request.recipients.clone(),
                status: MessageStatus::Queued,
                scheduled_at: None,
                total_recipients: Some(distribution.total_assigned() as i32),
            })
            .await?;
        self.message_repo
            .set_distribution_result(message.id, &distribution.to_json())
            .await?;

        let mut cooldowns = HashMap::new();
        let mut limits_status = HashMap::new();
        for assignment in distribution.assignments() {
            let pws = profiles
                .iter()
                .find(|p| p.profile.id == assignment.profile_id)
                .expect("assigned profile came from this list");

            let decision = self.cooldown.calculate(&group, &pws.profile).await?;
            cooldowns.insert(assignment.profile_id, decision.seconds);

            limits_status.insert(
                assignment.profile_id,
                ProfileLimitsStatus {
                    hourly: format!(
                        "{}/{}",
                        pws.sent_hour(),
                        pws.profile.effective_hourly_limit(&group)
                    ),
                    daily: format!(
                        "{}/{}",
                        pws.sent_today(),
                        pws.profile.effective_daily_limit(&group)
                    ),
                    status: pws.profile.status.clone(),
                },
            );
        }

        let items = self
            .scheduler
            .schedule(&group, &message, &distribution, &cooldowns)
            .await?;

        if !distribution.unassigned.is_empty() {
            warn!(
                message_id = %message.id,
                unassigned = distribution.unassigned.len(),
                "partial assignment: some recipients could not be queued"
            );
        }

        info!(
            message_id = %message.id,
            items = items.len(),
            profiles = cooldowns.len(),
            "message queued"
        );

        Ok(DispatchSummary {
            message_id: message.id,
            status: MessageStatus::Queued.to_string(),
            total_recipients: request.recipients.len(),
            queued_items: items.len(),
            distribution: distribution.counts(),
            unassigned: distribution.unassigned.clone(),
            estimated_completion: estimate_completion(items.len(), &cooldowns),
            limits_status,
        })
    }

    /// Send a reply through the profile that owns the conversation
    ///
    /// Replies are human-initiated responses within an existing thread, so
    /// they bypass distribution and pacing entirely.
    pub async fn send_reply(
        &self,
        group_id: GroupId,
        recipient: &str,
        request: SendRequest,
    ) -> Result<ReplySummary, DispatchError> {
        self.group_repo
            .get(group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;

        let routing = self.routing_repo.get(group_id, recipient).await?;
        let mut profile = None;
        if let Some(routing) = routing {
            profile = self.profile_repo.get(routing.assigned_profile_id).await?;
        }
        let profile = match profile {
            Some(p) => p,
            None => self
                .profile_repo
                .best_active(group_id)
                .await?
                .ok_or(DispatchError::NoEligibleProfiles)?,
        };

        let message = self
            .message_repo
            .create(CreateMessage {
                group_id,
                message_mode: MessageMode::Reply.to_string(),
                message_type: request.message_type.to_string(),
                content: request.content.clone(),
                media_url: request.media_url.clone(),
                caption: request.caption.clone(),
                recipients: vec![recipient.to_string()],
                status: MessageStatus::Processing,
                scheduled_at: None,
                total_recipients: None,
            })
            .await?;

        let payload = MessagePayload {
            message_type: request.message_type,
            content: request.content,
            media_url: request.media_url,
            caption: request.caption,
        };
        let credentials = ProviderCredentials {
            device_uuid: profile.device_uuid.clone(),
            api_token: profile.api_token.clone(),
        };
        let outcome = self.transport.send(&credentials, recipient, &payload).await;

        self.delivery_log_repo
            .create(CreateDeliveryLog {
                message_id: message.id,
                profile_id: profile.id,
                recipient: recipient.to_string(),
                provider_message_id: outcome.provider_message_id.clone(),
                message_mode: MessageMode::Reply.to_string(),
                status: if outcome.success {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                attempt_count: 1,
                error_message: outcome.error.clone(),
                response_time_ms: outcome.response_time_ms,
                sent_at: outcome.success.then(Utc::now),
            })
            .await?;

        self.message_repo
            .record_outcome(message.id, outcome.success)
            .await?;
        if !outcome.success {
            self.message_repo
                .update_status(message.id, MessageStatus::Failed)
                .await?;
        }

        self.routing_repo
            .upsert(group_id, recipient, profile.id)
            .await?;
        self.profile_repo
            .update_after_send(profile.id, outcome.success, outcome.response_time_ms)
            .await?;
        self.profile_repo.touch_last_message_at(profile.id).await?;

        Ok(ReplySummary {
            message_id: message.id,
            status: if outcome.success {
                DeliveryStatus::Sent.to_string()
            } else {
                DeliveryStatus::Failed.to_string()
            },
            profile_used: profile.name,
            response_time_ms: outcome.response_time_ms,
        })
    }

    /// Park a message for future delivery
    pub async fn schedule(
        &self,
        group_id: GroupId,
        request: ScheduleRequest,
    ) -> Result<ScheduleSummary, DispatchError> {
        self.group_repo
            .get(group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;
        if request.send.recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        if request.scheduled_at <= Utc::now() {
            return Err(DispatchError::ScheduleTimeInPast);
        }

        let recipients = request.send.recipients.clone();

        match request.drip_interval_minutes {
            Some(interval_minutes) if recipients.len() > 1 => {
                let mut message_ids = Vec::with_capacity(recipients.len());
                let mut last_send = request.scheduled_at;

                for (i, recipient) in recipients.iter().enumerate() {
                    let send_time =
                        request.scheduled_at + Duration::minutes(interval_minutes * i as i64);
                    last_send = send_time;

                    let message = self
                        .message_repo
                        .create(CreateMessage {
                            group_id,
                            message_mode: MessageMode::Open.to_string(),
                            message_type: request.send.message_type.to_string(),
                            content: request.send.content.clone(),
                            media_url: request.send.media_url.clone(),
                            caption: request.send.caption.clone(),
                            recipients: vec![recipient.clone()],
                            status: MessageStatus::Scheduled,
                            scheduled_at: Some(send_time),
                            total_recipients: None,
                        })
                        .await?;
                    message_ids.push(message.id);
                }

                info!(
                    count = message_ids.len(),
                    interval_minutes, "drip schedule created"
                );

                Ok(ScheduleSummary {
                    message_ids,
                    mode: "drip".to_string(),
                    total_recipients: recipients.len(),
                    first_send: request.scheduled_at,
                    last_send,
                })
            }
            _ => {
                let message = self
                    .message_repo
                    .create(CreateMessage {
                        group_id,
                        message_mode: MessageMode::Open.to_string(),
                        message_type: request.send.message_type.to_string(),
                        content: request.send.content,
                        media_url: request.send.media_url,
                        caption: request.send.caption,
                        recipients: recipients.clone(),
                        status: MessageStatus::Scheduled,
                        scheduled_at: Some(request.scheduled_at),
                        total_recipients: None,
                    })
                    .await?;

                Ok(ScheduleSummary {
                    message_ids: vec![message.id],
                    mode: "bulk".to_string(),
                    total_recipients: recipients.len(),
                    first_send: request.scheduled_at,
                    last_send: request.scheduled_at,
                })
            }
        }
    }

    /// Move due scheduled messages into the live queue
    ///
    /// Runs on the processor's sweep; each message goes through the same
    /// distribute -> cooldown -> schedule pipeline as a direct send.
    pub async fn promote_scheduled(&self) -> anyhow::Result<usize> {
        let messages = self.message_repo.get_scheduled_ready(5).await?;

        let mut promoted = 0;
        for message in messages {
            match self.promote_one(&message).await {
                Ok(()) => {
                    promoted += 1;
                    info!(message_id = %message.id, "scheduled message queued for delivery");
                }
                Err(e) => {
                    error!("Error promoting scheduled message {}: {}", message.id, e);
                    let _ = self
                        .message_repo
                        .update_status(message.id, MessageStatus::Failed)
                        .await;
                }
            }
        }

        Ok(promoted)
    }

    async fn promote_one(&self, message: &Message) -> Result<(), DispatchError> {
        let group = self
            .group_repo
            .get(message.group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;
        if !group.is_active() {
            return Err(DispatchError::GroupNotActive);
        }

        let recipients = message.recipients_vec();
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let profiles = self
            .profile_repo
            .list_active_with_stats(message.group_id)
            .await?;
        let pending = self
            .queue_repo
            .waiting_counts_by_profile(message.group_id)
            .await?;

        let distribution = distribute(
            &group,
            &profiles,
            &pending,
            &recipients,
            &mut rand::thread_rng(),
        )?;
        self.message_repo
            .set_distribution_result(message.id, &distribution.to_json())
            .await?;

        let mut cooldowns = HashMap::new();
        for assignment in distribution.assignments() {
            let pws = profiles
                .iter()
                .find(|p| p.profile.id == assignment.profile_id)
                .expect("assigned profile came from this list");
            let decision = self.cooldown.calculate(&group, &pws.profile).await?;
            cooldowns.insert(assignment.profile_id, decision.seconds);
        }

        self.scheduler
            .schedule(&group, message, &distribution, &cooldowns)
            .await?;
        self.message_repo
            .update_status(message.id, MessageStatus::Queued)
            .await?;

        Ok(())
    }

    /// Cancel a message's queued work
    ///
    /// Waiting items transition to cancelled; already assigned slots of
    /// other items are never recomputed.
    pub async fn cancel_message(&self, message_id: MessageId) -> Result<u64, DispatchError> {
        let message = self
            .message_repo
            .get(message_id)
            .await?
            .ok_or(DispatchError::MessageNotFound)?;

        if message.status_enum() == Some(MessageStatus::Scheduled) {
            self.message_repo.cancel_scheduled(message_id).await?;
            return Ok(0);
        }

        let cancelled = self.queue_repo.cancel_by_message(message_id).await?;
        self.message_repo
            .update_status(message_id, MessageStatus::Cancelled)
            .await?;

        info!(%message_id, cancelled, "message cancelled");
        Ok(cancelled)
    }

    /// Cancel every waiting item in a group's queue
    pub async fn cancel_group_queue(&self, group_id: GroupId) -> Result<u64, DispatchError> {
        self.group_repo
            .get(group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;

        let cancelled = self.queue_repo.cancel_by_group(group_id).await?;
        info!(%group_id, cancelled, "group queue cancelled");
        Ok(cancelled)
    }

    /// Current queue state for a group
    pub async fn queue_status(&self, group_id: GroupId) -> Result<QueueStatus, DispatchError> {
        let group = self
            .group_repo
            .get(group_id)
            .await?
            .ok_or(DispatchError::GroupNotFound)?;

        let counts = self.queue_repo.status_counts(group_id).await?;
        let (queue_mode, _) = classify_queue_mode(&group, counts.waiting);
        let next_send_at = self.queue_repo.next_send_at(group_id).await?;
        let active_profiles = self.profile_repo.active_ids(group_id).await?.len();

        Ok(QueueStatus {
            waiting: counts.waiting,
            processing: counts.processing,
            sent: counts.sent,
            failed: counts.failed,
            cancelled: counts.cancelled,
            queue_mode,
            next_send_at,
            active_profiles,
        })
    }
}

/// Rough completion estimate: mean cooldown across the assigned profiles,
/// amortized over the interleaved timeline
fn estimate_completion(total_items: usize, cooldowns: &HashMap<ProfileId, i32>) -> DateTime<Utc> {
    let n = cooldowns.len().max(1);
    let mean = if cooldowns.is_empty() {
        600.0
    } else {
        cooldowns.values().map(|&c| c as f64).sum::<f64>() / n as f64
    };
    Utc::now() + Duration::seconds((total_items as f64 * mean / n as f64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_estimate_completion_amortizes_across_profiles() {
        let mut cooldowns = HashMap::new();
        cooldowns.insert(Uuid::new_v4(), 300);
        cooldowns.insert(Uuid::new_v4(), 900);

        // mean 600s over 2 profiles: 6 items ~ 1800s out
        let est = estimate_completion(6, &cooldowns);
        let expected = Utc::now() + Duration::seconds(1800);
        let delta = (est - expected).num_seconds().abs();
        assert!(delta <= 1, "off by {}s", delta);
    }

    #[test]
    fn test_estimate_completion_defaults_without_cooldowns() {
        let est = estimate_completion(1, &HashMap::new());
        let expected = Utc::now() + Duration::seconds(600);
        assert!((est - expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_dispatch_error_messages() {
        assert_eq!(
            DispatchError::NoEligibleProfiles.to_string(),
            "No active profiles available in this group"
        );
        assert_eq!(
            DispatchError::ScheduleTimeInPast.to_string(),
            "scheduled_at must be in the future"
        );
    }

    #[test]
    fn test_dispatch_error_maps_to_common_taxonomy() {
        let e: sendpace_common::Error = DispatchError::NoEligibleProfiles.into();
        assert_eq!(e.code(), "NO_ELIGIBLE_PROFILES");
        assert_eq!(e.status_code(), 409);

        let e: sendpace_common::Error = DispatchError::GroupNotFound.into();
        assert_eq!(e.status_code(), 404);
    }
}
