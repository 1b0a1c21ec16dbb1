//! Sendpace Core - message distribution and pacing engine
//!
//! This crate implements the scheduling heart of Sendpace: splitting
//! recipients across a group's sending profiles, computing adaptive
//! cooldowns, placing every queued item on one coherent global timeline,
//! and sweeping due items out to the provider.

pub mod block;
pub mod cooldown;
pub mod dispatch;
pub mod distribution;
pub mod queue;
pub mod transport;

pub use block::{BlockDetection, LogOnlyBlockDetection};
pub use cooldown::{compute_cooldown, CooldownCalculator, CooldownDecision};
pub use dispatch::{
    DispatchError, DispatchSummary, Dispatcher, QueueStatus, ReplySummary, ScheduleRequest,
    ScheduleSummary, SendRequest,
};
pub use distribution::{distribute, Distribution};
pub use queue::processor::QueueProcessor;
pub use queue::scheduler::GlobalQueueScheduler;
pub use transport::{
    DeliveryOutcome, MessagePayload, ProviderClient, ProviderCredentials, Transport,
};
