//! Database models

use chrono::{DateTime, Utc};
use sendpace_common::types::{GroupId, MessageId, ProfileId, QueueItemId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Group status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Active,
    Paused,
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupStatus::Active => write!(f, "active"),
            GroupStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GroupStatus::Active),
            "paused" => Ok(GroupStatus::Paused),
            _ => Err(format!("Invalid group status: {}", s)),
        }
    }
}

/// Profile lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Active,
    Paused,
    Inactive,
}

impl std::fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileStatus::Active => write!(f, "active"),
            ProfileStatus::Paused => write!(f, "paused"),
            ProfileStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for ProfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProfileStatus::Active),
            "paused" => Ok(ProfileStatus::Paused),
            "inactive" => Ok(ProfileStatus::Inactive),
            _ => Err(format!("Invalid profile status: {}", s)),
        }
    }
}

/// Message lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Queued,
    Scheduled,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Queued => write!(f, "queued"),
            MessageStatus::Scheduled => write!(f, "scheduled"),
            MessageStatus::Processing => write!(f, "processing"),
            MessageStatus::Completed => write!(f, "completed"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "queued" => Ok(MessageStatus::Queued),
            "scheduled" => Ok(MessageStatus::Scheduled),
            "processing" => Ok(MessageStatus::Processing),
            "completed" => Ok(MessageStatus::Completed),
            "failed" => Ok(MessageStatus::Failed),
            "cancelled" => Ok(MessageStatus::Cancelled),
            _ => Err(format!("Invalid message status: {}", s)),
        }
    }
}

/// Queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Waiting,
    Processing,
    Sent,
    Failed,
    Cancelled,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItemStatus::Waiting => write!(f, "waiting"),
            QueueItemStatus::Processing => write!(f, "processing"),
            QueueItemStatus::Sent => write!(f, "sent"),
            QueueItemStatus::Failed => write!(f, "failed"),
            QueueItemStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for QueueItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(QueueItemStatus::Waiting),
            "processing" => Ok(QueueItemStatus::Processing),
            "sent" => Ok(QueueItemStatus::Sent),
            "failed" => Ok(QueueItemStatus::Failed),
            "cancelled" => Ok(QueueItemStatus::Cancelled),
            _ => Err(format!("Invalid queue item status: {}", s)),
        }
    }
}

/// Delivery outcome status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Group model - a bundle of profiles sharing limits and a strategy
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub distribution_strategy: String,

    // Default per-profile limits
    pub max_per_hour: i32,
    pub max_per_3hours: i32,
    pub max_per_day: i32,
    pub max_concurrent_sends: i32,

    // Active hours window
    pub active_hours_start: String,
    pub active_hours_end: String,
    pub freeze_hours: i32,

    // Queue-pressure thresholds
    pub rush_hour_threshold: i32,
    pub rush_hour_multiplier: f64,
    pub quiet_mode_threshold: i32,
    pub quiet_mode_multiplier: f64,

    // Retry policy
    pub retry_attempts: i32,
    pub retry_delay_seconds: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Get status enum
    pub fn status_enum(&self) -> Option<GroupStatus> {
        self.status.parse().ok()
    }

    /// Get the configured distribution strategy, defaulting to rotate
    pub fn strategy(&self) -> sendpace_common::types::DistributionStrategy {
        self.distribution_strategy
            .parse()
            .unwrap_or(sendpace_common::types::DistributionStrategy::Rotate)
    }

    pub fn is_active(&self) -> bool {
        self.status_enum() == Some(GroupStatus::Active)
    }
}

/// Create group input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub distribution_strategy: Option<String>,
    pub max_per_hour: Option<i32>,
    pub max_per_3hours: Option<i32>,
    pub max_per_day: Option<i32>,
    pub max_concurrent_sends: Option<i32>,
    pub freeze_hours: Option<i32>,
    pub rush_hour_threshold: Option<i32>,
    pub rush_hour_multiplier: Option<f64>,
    pub quiet_mode_threshold: Option<i32>,
    pub quiet_mode_multiplier: Option<f64>,
    pub retry_attempts: Option<i32>,
    pub retry_delay_seconds: Option<i32>,
}

/// Profile model - one sending identity, owned by exactly one group
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub group_id: GroupId,
    pub name: String,
    pub phone_number: Option<String>,

    // Provider credentials
    pub device_uuid: String,
    pub api_token: String,

    pub status: String,
    pub pause_reason: Option<String>,
    pub resume_at: Option<DateTime<Utc>>,

    // Externally computed signals, read-only here
    pub weight_score: f64,
    pub health_score: i32,
    pub risk_score: i32,

    // Per-profile limit overrides (NULL = group default)
    pub max_per_hour: Option<i32>,
    pub max_per_3hours: Option<i32>,
    pub max_per_day: Option<i32>,

    pub last_message_at: Option<DateTime<Utc>>,
    pub last_block_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Get status enum
    pub fn status_enum(&self) -> Option<ProfileStatus> {
        self.status.parse().ok()
    }

    pub fn is_active(&self) -> bool {
        self.status_enum() == Some(ProfileStatus::Active)
    }

    /// Effective hourly cap: profile override, falling back to the group default
    pub fn effective_hourly_limit(&self, group: &Group) -> i32 {
        self.max_per_hour.unwrap_or(group.max_per_hour)
    }

    /// Effective 3-hour cap
    pub fn effective_3hour_limit(&self, group: &Group) -> i32 {
        self.max_per_3hours.unwrap_or(group.max_per_3hours)
    }

    /// Effective daily cap
    pub fn effective_daily_limit(&self, group: &Group) -> i32 {
        self.max_per_day.unwrap_or(group.max_per_day)
    }
}

/// Create profile input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    pub group_id: GroupId,
    pub name: String,
    pub phone_number: Option<String>,
    pub device_uuid: String,
    pub api_token: String,
    pub max_per_hour: Option<i32>,
    pub max_per_3hours: Option<i32>,
    pub max_per_day: Option<i32>,
}

/// Rolling counters and cooldown state, 1:1 with Profile
///
/// Window counters are reset by an external housekeeping process; this
/// codebase only increments them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProfileStatistics {
    pub id: uuid::Uuid,
    pub profile_id: ProfileId,

    pub messages_sent_total: i64,
    pub messages_sent_today: i32,
    pub messages_sent_hour: i32,
    pub messages_sent_3hours: i32,

    pub failed_messages_today: i32,
    pub failed_messages_hour: i32,

    pub success_rate_24h: f64,
    pub avg_response_time_ms: f64,

    pub current_cooldown_seconds: i32,
    pub cooldown_expires_at: Option<DateTime<Utc>>,
    pub cooldown_mode: String,

    pub last_hour_reset_at: DateTime<Utc>,
    pub last_3hour_reset_at: DateTime<Utc>,
    pub last_day_reset_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A profile joined with its statistics row
#[derive(Debug, Clone)]
pub struct ProfileWithStats {
    pub profile: Profile,
    pub stats: Option<ProfileStatistics>,
}

impl ProfileWithStats {
    pub fn sent_today(&self) -> i32 {
        self.stats.as_ref().map(|s| s.messages_sent_today).unwrap_or(0)
    }

    pub fn sent_hour(&self) -> i32 {
        self.stats.as_ref().map(|s| s.messages_sent_hour).unwrap_or(0)
    }

    pub fn sent_3hours(&self) -> i32 {
        self.stats.as_ref().map(|s| s.messages_sent_3hours).unwrap_or(0)
    }

    pub fn success_rate(&self) -> f64 {
        self.stats.as_ref().map(|s| s.success_rate_24h).unwrap_or(100.0)
    }
}

/// Message model - one logical send request, fanned out into queue items
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,

    pub message_mode: String,
    pub message_type: String,

    pub content: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,

    pub recipients: serde_json::Value,

    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,

    pub total_recipients: i32,
    pub processed_count: i32,
    pub success_count: i32,
    pub failed_count: i32,

    pub distribution_result: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Get status enum
    pub fn status_enum(&self) -> Option<MessageStatus> {
        self.status.parse().ok()
    }

    /// Get recipients as a vector
    pub fn recipients_vec(&self) -> Vec<String> {
        serde_json::from_value(self.recipients.clone()).unwrap_or_default()
    }
}

/// Create message input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub group_id: GroupId,
    pub message_mode: String,
    pub message_type: String,
    pub content: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,
    pub recipients: Vec<String>,
    pub status: MessageStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Recipients actually queued; defaults to the full recipient count
    pub total_recipients: Option<i32>,
}

/// Queue item model - one (profile, recipient) pair with an absolute slot
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub message_id: MessageId,
    pub profile_id: ProfileId,
    pub recipient: String,

    pub status: String,

    pub scheduled_send_at: DateTime<Utc>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,

    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    /// Get status enum
    pub fn status_enum(&self) -> Option<QueueItemStatus> {
        self.status.parse().ok()
    }

    /// Check if another delivery attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }
}

/// Delivery log model - immutable record of one attempted send
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub id: uuid::Uuid,
    pub message_id: MessageId,
    pub profile_id: ProfileId,
    pub recipient: String,

    pub provider_message_id: Option<String>,
    pub message_mode: String,

    pub status: String,
    pub attempt_count: i32,
    pub error_message: Option<String>,
    pub response_time_ms: i32,

    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Create delivery log input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryLog {
    pub message_id: MessageId,
    pub profile_id: ProfileId,
    pub recipient: String,
    pub provider_message_id: Option<String>,
    pub message_mode: String,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub error_message: Option<String>,
    pub response_time_ms: i32,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Sticky conversation routing: which profile owns a recipient's thread
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ConversationRouting {
    pub id: uuid::Uuid,
    pub group_id: GroupId,
    pub recipient: String,
    pub assigned_profile_id: ProfileId,
    pub last_interaction_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendpace_common::types::DistributionStrategy;

    fn test_group() -> Group {
        Group {
            id: uuid::Uuid::new_v4(),
            name: "test".into(),
            description: None,
            status: "active".into(),
            distribution_strategy: "rotate".into(),
            max_per_hour: 20,
            max_per_3hours: 45,
            max_per_day: 120,
            max_concurrent_sends: 4,
            active_hours_start: "04:00:00".into(),
            active_hours_end: "00:00:00".into(),
            freeze_hours: 4,
            rush_hour_threshold: 10,
            rush_hour_multiplier: 2.0,
            quiet_mode_threshold: 5,
            quiet_mode_multiplier: 0.5,
            retry_attempts: 3,
            retry_delay_seconds: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_profile(group_id: uuid::Uuid) -> Profile {
        Profile {
            id: uuid::Uuid::new_v4(),
            group_id,
            name: "p1".into(),
            phone_number: None,
            device_uuid: "dev-1".into(),
            api_token: "token".into(),
            status: "active".into(),
            pause_reason: None,
            resume_at: None,
            weight_score: 10.0,
            health_score: 100,
            risk_score: 0,
            max_per_hour: None,
            max_per_3hours: None,
            max_per_day: None,
            last_message_at: None,
            last_block_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_limits_fall_back_to_group() {
        let group = test_group();
        let mut profile = test_profile(group.id);

        assert_eq!(profile.effective_daily_limit(&group), 120);
        assert_eq!(profile.effective_hourly_limit(&group), 20);

        profile.max_per_day = Some(60);
        assert_eq!(profile.effective_daily_limit(&group), 60);
        assert_eq!(profile.effective_3hour_limit(&group), 45);
    }

    #[test]
    fn test_group_strategy_defaults_to_rotate() {
        let mut group = test_group();
        assert_eq!(group.strategy(), DistributionStrategy::Rotate);

        group.distribution_strategy = "garbage".into();
        assert_eq!(group.strategy(), DistributionStrategy::Rotate);

        group.distribution_strategy = "smart".into();
        assert_eq!(group.strategy(), DistributionStrategy::Smart);
    }

    #[test]
    fn test_queue_item_retry_bound() {
        let item = QueueItem {
            id: uuid::Uuid::new_v4(),
            message_id: uuid::Uuid::new_v4(),
            profile_id: uuid::Uuid::new_v4(),
            recipient: "31600000001".into(),
            status: "waiting".into(),
            scheduled_send_at: Utc::now(),
            attempt_count: 3,
            max_attempts: 3,
            last_error: None,
            sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!item.can_retry());
    }

    #[test]
    fn test_profile_with_stats_defaults() {
        let group = test_group();
        let pws = ProfileWithStats {
            profile: test_profile(group.id),
            stats: None,
        };
        assert_eq!(pws.sent_today(), 0);
        assert_eq!(pws.success_rate(), 100.0);
    }
}
