//! Global queue scheduler - one coherent send timeline per group
//!
//! Every slot decision is derived from two persisted facts (the latest
//! waiting slot for the profile and the latest waiting slot across the
//! group) and each item is written before the next is computed. Scheduling a
//! batch of nine recipients and scheduling them one request at a time
//! therefore converge to the same timeline.

use chrono::{DateTime, Duration, Utc};
use sendpace_common::types::ProfileId;
use sendpace_storage::db::DatabasePool;
use sendpace_storage::models::{Group, Message, QueueItem};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::DispatchError;
use crate::distribution::Distribution;

/// Attempts before a serialization conflict is surfaced
const SCHEDULE_RETRY_ATTEMPTS: u32 = 3;

/// Persisted facts one slot decision derives from
#[derive(Debug, Clone)]
pub struct SlotContext {
    pub now: DateTime<Utc>,
    pub cooldown_seconds: i64,
    pub active_profiles: usize,
    /// Latest waiting slot already scheduled for this profile
    pub profile_last_waiting: Option<DateTime<Utc>>,
    /// When this profile last actually sent
    pub profile_last_sent: Option<DateTime<Utc>>,
    /// Latest waiting slot across all active profiles in the group
    pub global_last_waiting: Option<DateTime<Utc>>,
}

/// Gap between consecutive items of *different* profiles
///
/// A profile needs the full cooldown between its own messages, but the group
/// timeline can interleave other profiles every cooldown/n. Millisecond
/// precision keeps distinct slots distinct when the division is not whole.
pub fn inter_profile_gap(cooldown_seconds: i64, active_profiles: usize) -> Duration {
    let n = active_profiles.max(1) as f64;
    Duration::milliseconds(((cooldown_seconds as f64 * 1000.0) / n).round() as i64)
}

/// Compute the absolute send time for a profile's next item
///
/// The slot is the latest of: now, the profile's last waiting slot plus its
/// cooldown, the profile's last actual send plus its cooldown, and the
/// latest waiting slot anywhere in the group plus the inter-profile gap.
/// A cold group with nothing waiting yields `now`. Anchoring on waiting
/// slots even when they are already due keeps two waiting items of one
/// profile at least a cooldown apart in every case.
pub fn compute_send_at(ctx: &SlotContext) -> DateTime<Utc> {
    let now = ctx.now;
    let cooldown = Duration::seconds(ctx.cooldown_seconds);

    let mut profile_earliest = now;
    if let Some(last) = ctx.profile_last_waiting {
        profile_earliest = profile_earliest.max(last + cooldown);
    }
    if let Some(last_sent) = ctx.profile_last_sent {
        profile_earliest = profile_earliest.max(last_sent + cooldown);
    }

    let mut global_earliest = now;
    if let Some(last) = ctx.global_last_waiting {
        global_earliest =
            global_earliest.max(last + inter_profile_gap(ctx.cooldown_seconds, ctx.active_profiles));
    }

    profile_earliest.max(global_earliest)
}

/// Round-robin reorder of a distribution: A1, B1, C1, A2, B2, C2, ...
///
/// Interleaving before scheduling is what spreads profiles evenly across the
/// global timeline.
pub fn interleave(distribution: &Distribution) -> Vec<(ProfileId, String)> {
    let assignments: Vec<_> = distribution.assignments().collect();
    let max_len = assignments
        .iter()
        .map(|a| a.recipients.len())
        .max()
        .unwrap_or(0);

    let mut result = Vec::new();
    for i in 0..max_len {
        for a in &assignments {
            if let Some(recipient) = a.recipients.get(i) {
                result.push((a.profile_id, recipient.clone()));
            }
        }
    }
    result
}

/// Schedules queue items on the group's global timeline
pub struct GlobalQueueScheduler {
    db_pool: DatabasePool,
}

impl GlobalQueueScheduler {
    /// Create a new scheduler
    pub fn new(db_pool: DatabasePool) -> Self {
        Self { db_pool }
    }

    /// Assign a slot to every (profile, recipient) pair and persist the items
    ///
    /// Serialization conflicts with a concurrent scheduling call are retried
    /// transparently; the caller never sees them.
    pub async fn schedule(
        &self,
        group: &Group,
        message: &Message,
        distribution: &Distribution,
        cooldowns: &HashMap<ProfileId, i32>,
    ) -> Result<Vec<QueueItem>, DispatchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_schedule(group, message, distribution, cooldowns).await {
                Ok(items) => return Ok(items),
                Err(e) if is_serialization_failure(&e) && attempt < SCHEDULE_RETRY_ATTEMPTS => {
                    warn!(attempt, "scheduling conflict, re-reading queue state");
                    continue;
                }
                Err(e) => return Err(DispatchError::Database(e)),
            }
        }
    }

    async fn try_schedule(
        &self,
        group: &Group,
        message: &Message,
        distribution: &Distribution,
        cooldowns: &HashMap<ProfileId, i32>,
    ) -> Result<Vec<QueueItem>, sqlx::Error> {
        let pool = self.db_pool.pool();
        let mut tx = pool.begin().await?;

        // One scheduling call per group at a time: the read-then-write of
        // "latest slot" must not interleave with a concurrent caller's.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(group.id.to_string())
            .execute(&mut *tx)
            .await?;

        let active_rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM profiles WHERE group_id = $1 AND status = 'active'")
                .bind(group.id)
                .fetch_all(&mut *tx)
                .await?;
        let active_ids: Vec<Uuid> = active_rows.into_iter().map(|(id,)| id).collect();
        let active_count = active_ids.len().max(1);

        let mut items = Vec::with_capacity(distribution.total_assigned());

        for (profile_id, recipient) in interleave(distribution) {
            let cooldown_seconds = cooldowns.get(&profile_id).copied().unwrap_or(600) as i64;

            let (profile_last_waiting,): (Option<DateTime<Utc>>,) = sqlx::query_as(
                r#"
                SELECT MAX(scheduled_send_at) FROM queue_items
                WHERE profile_id = $1 AND status = 'waiting'
                "#,
            )
            .bind(profile_id)
            .fetch_one(&mut *tx)
            .await?;

            let (profile_last_sent,): (Option<DateTime<Utc>>,) =
                sqlx::query_as("SELECT last_message_at FROM profiles WHERE id = $1")
                    .bind(profile_id)
                    .fetch_one(&mut *tx)
                    .await?;

            let (global_last_waiting,): (Option<DateTime<Utc>>,) = sqlx::query_as(
                r#"
                SELECT MAX(scheduled_send_at) FROM queue_items
                WHERE status = 'waiting' AND profile_id = ANY($1)
                "#,
            )
            .bind(&active_ids)
            .fetch_one(&mut *tx)
            .await?;

            let send_at = compute_send_at(&SlotContext {
                now: Utc::now(),
                cooldown_seconds,
                active_profiles: active_count,
                profile_last_waiting,
                profile_last_sent,
                global_last_waiting,
            });

            // Insert before computing the next slot so the following read
            // observes this item
            let item = sqlx::query_as::<_, QueueItem>(
                r#"
                INSERT INTO queue_items (
                    id, message_id, profile_id, recipient, status,
                    scheduled_send_at, max_attempts
                )
                VALUES ($1, $2, $3, $4, 'waiting', $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(message.id)
            .bind(profile_id)
            .bind(&recipient)
            .bind(send_at)
            .bind(group.retry_attempts)
            .fetch_one(&mut *tx)
            .await?;

            debug!(
                %profile_id,
                recipient,
                send_at = %send_at,
                cooldown = cooldown_seconds,
                "queued"
            );

            items.push(item);
        }

        tx.commit().await?;
        Ok(items)
    }
}

fn is_serialization_failure(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("40001"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        "2026-02-11T12:00:00Z".parse().unwrap()
    }

    /// In-memory stand-in for the persisted queue state: each scheduled slot
    /// is recorded before the next is computed, exactly like the real
    /// insert-then-read loop.
    struct SlotLedger {
        now: DateTime<Utc>,
        active_profiles: usize,
        per_profile: HashMap<ProfileId, DateTime<Utc>>,
        last_sent: HashMap<ProfileId, DateTime<Utc>>,
        global: Option<DateTime<Utc>>,
    }

    impl SlotLedger {
        fn new(active_profiles: usize) -> Self {
            Self {
                now: now(),
                active_profiles,
                per_profile: HashMap::new(),
                last_sent: HashMap::new(),
                global: None,
            }
        }

        fn schedule(&mut self, profile_id: ProfileId, cooldown_seconds: i64) -> DateTime<Utc> {
            let send_at = compute_send_at(&SlotContext {
                now: self.now,
                cooldown_seconds,
                active_profiles: self.active_profiles,
                profile_last_waiting: self.per_profile.get(&profile_id).copied(),
                profile_last_sent: self.last_sent.get(&profile_id).copied(),
                global_last_waiting: self.global,
            });
            self.per_profile.insert(profile_id, send_at);
            self.global = Some(self.global.map_or(send_at, |g| g.max(send_at)));
            send_at
        }
    }

    #[test]
    fn test_cold_group_sends_immediately() {
        let ctx = SlotContext {
            now: now(),
            cooldown_seconds: 120,
            active_profiles: 3,
            profile_last_waiting: None,
            profile_last_sent: None,
            global_last_waiting: None,
        };
        assert_eq!(compute_send_at(&ctx), now());
    }

    #[test]
    fn test_last_sent_pushes_profile_earliest() {
        let ctx = SlotContext {
            now: now(),
            cooldown_seconds: 120,
            active_profiles: 1,
            profile_last_waiting: None,
            profile_last_sent: Some(now() - Duration::seconds(30)),
            global_last_waiting: None,
        };
        // 90 seconds of the cooldown still remain
        assert_eq!(compute_send_at(&ctx), now() + Duration::seconds(90));
    }

    #[test]
    fn test_due_waiting_slot_still_enforces_spacing() {
        // A waiting item already due keeps anchoring the next slot; two
        // waiting items of one profile stay a full cooldown apart.
        let ctx = SlotContext {
            now: now(),
            cooldown_seconds: 120,
            active_profiles: 1,
            profile_last_waiting: Some(now() - Duration::seconds(10)),
            profile_last_sent: Some(now() - Duration::seconds(60)),
            global_last_waiting: None,
        };
        assert_eq!(compute_send_at(&ctx), now() + Duration::seconds(110));
    }

    #[test]
    fn test_never_schedules_in_the_past() {
        let ctx = SlotContext {
            now: now(),
            cooldown_seconds: 120,
            active_profiles: 2,
            profile_last_waiting: None,
            profile_last_sent: Some(now() - Duration::seconds(600)),
            global_last_waiting: None,
        };
        assert_eq!(compute_send_at(&ctx), now());
    }

    #[test]
    fn test_inter_profile_gap_precision() {
        assert_eq!(inter_profile_gap(120, 3), Duration::seconds(40));
        // 100 / 3 keeps millisecond precision instead of truncating to 33s
        assert_eq!(inter_profile_gap(100, 3), Duration::milliseconds(33333));
        assert_eq!(inter_profile_gap(120, 0), Duration::seconds(120));
    }

    #[test]
    fn test_global_spacing_three_profiles() {
        // 3 profiles, 9 recipients, cooldown 120s: own gaps >= 120s, cross
        // gaps >= 40s.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut ledger = SlotLedger::new(3);

        let mut slots: Vec<(ProfileId, DateTime<Utc>)> = Vec::new();
        for _round in 0..3 {
            for &pid in &[a, b, c] {
                slots.push((pid, ledger.schedule(pid, 120)));
            }
        }

        for pid in [a, b, c] {
            let own: Vec<_> = slots.iter().filter(|(p, _)| *p == pid).collect();
            for pair in own.windows(2) {
                assert!(pair[1].1 - pair[0].1 >= Duration::seconds(120));
            }
        }
        for pair in slots.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::seconds(40));
        }
        // no two items share a slot
        for i in 0..slots.len() {
            for j in i + 1..slots.len() {
                assert_ne!(slots[i].1, slots[j].1);
            }
        }
    }

    #[test]
    fn test_batch_and_incremental_timelines_match() {
        // The request-shape independence property: one 9-recipient batch and
        // nine single-recipient requests in the same global order produce
        // identical per-profile slot sequences.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let order = [a, b, c, a, b, c, a, b, c];

        let mut batch = SlotLedger::new(3);
        let batch_slots: Vec<_> = order.iter().map(|&pid| batch.schedule(pid, 120)).collect();

        let mut incremental = SlotLedger::new(3);
        let incremental_slots: Vec<_> = order
            .iter()
            .map(|&pid| incremental.schedule(pid, 120))
            .collect();

        assert_eq!(batch_slots, incremental_slots);
    }

    #[test]
    fn test_interleave_round_robin_order() {
        use crate::distribution::tests_support::distribution_of;

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let dist = distribution_of(&[
            (a, vec!["r1", "r4", "r7"]),
            (b, vec!["r2", "r5", "r8"]),
            (c, vec!["r3", "r6"]),
        ]);

        let flat = interleave(&dist);
        let recipients: Vec<&str> = flat.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(
            recipients,
            vec!["r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8"]
        );
        assert_eq!(flat[0].0, a);
        assert_eq!(flat[1].0, b);
        assert_eq!(flat[2].0, c);
        assert_eq!(flat[3].0, a);
    }
}
