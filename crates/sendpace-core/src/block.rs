//! Block detection hook
//!
//! The queue processor signals every failed delivery through this trait so
//! an external heuristic can evaluate block indicators and decide whether to
//! pause the profile. The processor never waits on or branches over the
//! result.

use async_trait::async_trait;
use sendpace_common::types::{GroupId, ProfileId};
use tracing::warn;

/// Notification side-channel invoked after a failed delivery
#[async_trait]
pub trait BlockDetection: Send + Sync + 'static {
    async fn on_delivery_failure(&self, group_id: GroupId, profile_id: ProfileId, error: &str);
}

/// Default hook that only logs the signal
pub struct LogOnlyBlockDetection;

#[async_trait]
impl BlockDetection for LogOnlyBlockDetection {
    async fn on_delivery_failure(&self, group_id: GroupId, profile_id: ProfileId, error: &str) {
        warn!(%group_id, %profile_id, error, "delivery failure signaled to block detection");
    }
}
