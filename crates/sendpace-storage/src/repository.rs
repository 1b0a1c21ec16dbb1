//! Repository layer for data access

pub mod delivery_logs;
pub mod groups;
pub mod messages;
pub mod profiles;
pub mod queue;
pub mod routing;

pub use delivery_logs::DeliveryLogRepository;
pub use groups::GroupRepository;
pub use messages::MessageRepository;
pub use profiles::ProfileRepository;
pub use queue::{QueueRepository, QueueStatusCounts};
pub use routing::RoutingRepository;
