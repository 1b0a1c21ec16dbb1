//! Common types for Sendpace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for groups
pub type GroupId = Uuid;

/// Unique identifier for profiles
pub type ProfileId = Uuid;

/// Unique identifier for messages
pub type MessageId = Uuid;

/// Unique identifier for queue items
pub type QueueItemId = Uuid;

/// Unique identifier for delivery logs
pub type DeliveryLogId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Strategy used to split recipients across a group's profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    Rotate,
    Random,
    Weighted,
    Smart,
}

impl std::fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionStrategy::Rotate => write!(f, "rotate"),
            DistributionStrategy::Random => write!(f, "random"),
            DistributionStrategy::Weighted => write!(f, "weighted"),
            DistributionStrategy::Smart => write!(f, "smart"),
        }
    }
}

impl std::str::FromStr for DistributionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotate" => Ok(DistributionStrategy::Rotate),
            "random" => Ok(DistributionStrategy::Random),
            "weighted" => Ok(DistributionStrategy::Weighted),
            "smart" => Ok(DistributionStrategy::Smart),
            _ => Err(format!("Invalid distribution strategy: {}", s)),
        }
    }
}

/// Queue-pressure mode a cooldown was computed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownMode {
    Quiet,
    Normal,
    RushHour,
    Critical,
}

impl std::fmt::Display for CooldownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownMode::Quiet => write!(f, "quiet"),
            CooldownMode::Normal => write!(f, "normal"),
            CooldownMode::RushHour => write!(f, "rush_hour"),
            CooldownMode::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for CooldownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiet" => Ok(CooldownMode::Quiet),
            "normal" => Ok(CooldownMode::Normal),
            "rush_hour" => Ok(CooldownMode::RushHour),
            "critical" => Ok(CooldownMode::Critical),
            _ => Err(format!("Invalid cooldown mode: {}", s)),
        }
    }
}

/// How a message entered the system
///
/// Open sends are distributed and rate limited; replies reuse the profile
/// already holding the conversation and bypass pacing entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMode {
    Open,
    Reply,
}

impl std::fmt::Display for MessageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageMode::Open => write!(f, "open"),
            MessageMode::Reply => write!(f, "reply"),
        }
    }
}

impl std::str::FromStr for MessageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(MessageMode::Open),
            "reply" => Ok(MessageMode::Reply),
            _ => Err(format!("Invalid message mode: {}", s)),
        }
    }
}

/// Content type of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Voice,
    Document,
    Video,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Text => write!(f, "text"),
            MessageType::Image => write!(f, "image"),
            MessageType::Voice => write!(f, "voice"),
            MessageType::Document => write!(f, "document"),
            MessageType::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "voice" => Ok(MessageType::Voice),
            "document" => Ok(MessageType::Document),
            "video" => Ok(MessageType::Video),
            _ => Err(format!("Invalid message type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_roundtrip() {
        for s in ["rotate", "random", "weighted", "smart"] {
            let parsed: DistributionStrategy = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("round_robin".parse::<DistributionStrategy>().is_err());
    }

    #[test]
    fn test_cooldown_mode_display() {
        assert_eq!(CooldownMode::RushHour.to_string(), "rush_hour");
        assert_eq!(CooldownMode::Quiet.to_string(), "quiet");
    }

    #[test]
    fn test_message_type_parse() {
        assert_eq!("text".parse::<MessageType>().unwrap(), MessageType::Text);
        assert!("sticker".parse::<MessageType>().is_err());
    }
}
