//! Cooldown calculator - adaptive delay before a profile's next send
//!
//! The cooldown spreads a group's daily quota across its active hours, then
//! bends that interval with jitter, queue pressure, a trailing-window trend
//! correction, and the profile's risk score.

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use sendpace_common::types::CooldownMode;
use sendpace_storage::db::DatabasePool;
use sendpace_storage::models::{Group, Profile};
use sendpace_storage::repository::{DeliveryLogRepository, ProfileRepository, QueueRepository};
use serde::Serialize;
use tracing::debug;

/// Group-wide waiting count at which pacing goes critical, regardless of the
/// configured thresholds
const CRITICAL_QUEUE_THRESHOLD: i64 = 21;
const CRITICAL_MULTIPLIER: f64 = 3.0;

/// Hard bounds on any computed cooldown: 1 minute to 40 minutes
const MIN_COOLDOWN_SECONDS: f64 = 60.0;
const MAX_COOLDOWN_SECONDS: f64 = 2400.0;

/// Trailing window is held to 80% of the nominal two-hour quota
const TREND_TARGET_RATIO: f64 = 0.8;

/// Every intermediate value of one cooldown computation
#[derive(Debug, Clone, Serialize)]
pub struct CooldownBreakdown {
    pub base_seconds: i64,
    pub jitter_min: i64,
    pub jitter_max: i64,
    pub jitter_selected: i64,
    pub queue_size: i64,
    pub queue_mode: CooldownMode,
    pub queue_multiplier: f64,
    pub after_queue_adjustment: i64,
    pub trailing_2h_actual: i64,
    pub trailing_2h_expected: i64,
    pub trend_multiplier: f64,
    pub risk_score: i32,
    pub risk_multiplier: f64,
    pub final_seconds: i32,
}

/// Outcome of one cooldown computation
#[derive(Debug, Clone, Serialize)]
pub struct CooldownDecision {
    pub seconds: i32,
    pub mode: CooldownMode,
    pub breakdown: CooldownBreakdown,
}

/// Classify queue pressure for a group given its total waiting count
pub fn classify_queue_mode(group: &Group, waiting: i64) -> (CooldownMode, f64) {
    if waiting >= CRITICAL_QUEUE_THRESHOLD {
        (CooldownMode::Critical, CRITICAL_MULTIPLIER)
    } else if waiting > group.rush_hour_threshold as i64 {
        (CooldownMode::RushHour, group.rush_hour_multiplier)
    } else if waiting <= group.quiet_mode_threshold as i64 {
        (CooldownMode::Quiet, group.quiet_mode_multiplier)
    } else {
        (CooldownMode::Normal, 1.0)
    }
}

/// Compute the cooldown for a profile's next send
///
/// Pure apart from the RNG; inputs are the group's total waiting count and
/// the profile's successful sends over the trailing two hours.
pub fn compute_cooldown(
    group: &Group,
    profile: &Profile,
    group_queue_size: i64,
    trailing_2h_sent: i64,
    rng: &mut impl Rng,
) -> CooldownDecision {
    // Step 1: spread the daily quota evenly over the active hours
    let active_minutes = (((24 - group.freeze_hours).max(1)) * 60) as f64;
    let base_seconds = active_minutes / group.max_per_day.max(1) as f64 * 60.0;

    // Step 2: jitter in [0.5x, 1.5x] so the pacing never looks periodic
    let jitter_min = base_seconds * 0.5;
    let jitter_max = base_seconds * 1.5;
    let jitter_selected = rng.gen_range(jitter_min..=jitter_max);

    // Step 3: queue pressure multiplier from the group-wide waiting count
    let (queue_mode, queue_multiplier) = classify_queue_mode(group, group_queue_size);
    let after_queue = jitter_selected * queue_multiplier;

    // Step 4: trailing two-hour trend correction
    let expected_2h = group.max_per_hour as f64 * 2.0 * TREND_TARGET_RATIO;
    let mut trend_multiplier = 1.0;
    if expected_2h > 0.0 {
        let ratio = trailing_2h_sent as f64 / expected_2h;
        if ratio > 1.0 {
            trend_multiplier = 1.3;
        } else if ratio < 0.5 {
            trend_multiplier = 0.8;
        }
    }
    let mut final_cooldown = after_queue * trend_multiplier;

    // Step 5: risk penalty
    let risk_multiplier = if profile.risk_score > 80 {
        2.0
    } else if profile.risk_score > 50 {
        1.5
    } else if profile.risk_score > 20 {
        1.2
    } else {
        1.0
    };
    final_cooldown *= risk_multiplier;

    // Step 6: clamp
    let final_seconds = final_cooldown.clamp(MIN_COOLDOWN_SECONDS, MAX_COOLDOWN_SECONDS) as i32;

    CooldownDecision {
        seconds: final_seconds,
        mode: queue_mode,
        breakdown: CooldownBreakdown {
            base_seconds: base_seconds as i64,
            jitter_min: jitter_min as i64,
            jitter_max: jitter_max as i64,
            jitter_selected: jitter_selected as i64,
            queue_size: group_queue_size,
            queue_mode,
            queue_multiplier,
            after_queue_adjustment: after_queue as i64,
            trailing_2h_actual: trailing_2h_sent,
            trailing_2h_expected: expected_2h as i64,
            trend_multiplier,
            risk_score: profile.risk_score,
            risk_multiplier,
            final_seconds,
        },
    }
}

/// Loads the cooldown inputs, computes, and persists the result
///
/// This is the only component that writes cooldown state.
pub struct CooldownCalculator {
    profile_repo: ProfileRepository,
    queue_repo: QueueRepository,
    delivery_log_repo: DeliveryLogRepository,
}

impl CooldownCalculator {
    /// Create a new cooldown calculator
    pub fn new(db_pool: DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            profile_repo: ProfileRepository::new(pool.clone()),
            queue_repo: QueueRepository::new(pool.clone()),
            delivery_log_repo: DeliveryLogRepository::new(pool),
        }
    }

    /// Compute and persist the cooldown for a profile's next send
    pub async fn calculate(&self, group: &Group, profile: &Profile) -> Result<CooldownDecision> {
        let queue_size = self.queue_repo.waiting_count_for_group(group.id).await?;

        let two_hours_ago = Utc::now() - Duration::hours(2);
        let trailing = self
            .delivery_log_repo
            .sent_count_since(profile.id, two_hours_ago)
            .await?;

        let decision = compute_cooldown(
            group,
            profile,
            queue_size,
            trailing,
            &mut rand::thread_rng(),
        );

        let expires_at = Utc::now() + Duration::seconds(decision.seconds as i64);
        self.profile_repo
            .update_cooldown_state(profile.id, decision.seconds, decision.mode, expires_at)
            .await?;

        debug!(
            profile = %profile.name,
            seconds = decision.seconds,
            mode = %decision.mode,
            queue_size,
            "cooldown computed"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn group(max_per_day: i32, freeze_hours: i32) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "g".into(),
            description: None,
            status: "active".into(),
            distribution_strategy: "rotate".into(),
            max_per_hour: 20,
            max_per_3hours: 45,
            max_per_day,
            max_concurrent_sends: 4,
            active_hours_start: "04:00:00".into(),
            active_hours_end: "00:00:00".into(),
            freeze_hours,
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

    fn profile(risk_score: i32) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            name: "p".into(),
            phone_number: None,
            device_uuid: "dev".into(),
            api_token: "token".into(),
            status: "active".into(),
            pause_reason: None,
            resume_at: None,
            weight_score: 10.0,
            health_score: 100,
            risk_score,
            max_per_hour: None,
            max_per_3hours: None,
            max_per_day: None,
            last_message_at: None,
            last_block_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(99)
    }

    #[test]
    fn test_base_interval_spreads_daily_quota() {
        // 120/day over 20 active hours -> 10 minutes base, jitter in [300, 900]
        let g = group(120, 4);
        let d = compute_cooldown(&g, &profile(0), 8, 0, &mut rng());

        assert_eq!(d.breakdown.base_seconds, 600);
        assert_eq!(d.breakdown.jitter_min, 300);
        assert_eq!(d.breakdown.jitter_max, 900);
        assert!(d.breakdown.jitter_selected >= 300 && d.breakdown.jitter_selected <= 900);
    }

    #[test]
    fn test_normal_mode_between_thresholds() {
        // quiet <= 5, rush > 10: a queue of 8 is normal with trend speeding up
        let g = group(120, 4);
        let d = compute_cooldown(&g, &profile(0), 8, 20, &mut rng());

        assert_eq!(d.mode, CooldownMode::Normal);
        assert_eq!(d.breakdown.queue_multiplier, 1.0);
        assert!(d.seconds >= 300 && d.seconds <= 900);
        assert!(d.seconds >= 60 && d.seconds <= 2400);
    }

    #[test]
    fn test_queue_pressure_modes() {
        let g = group(120, 4);

        let quiet = compute_cooldown(&g, &profile(0), 3, 20, &mut rng());
        assert_eq!(quiet.mode, CooldownMode::Quiet);
        assert_eq!(quiet.breakdown.queue_multiplier, 0.5);

        let rush = compute_cooldown(&g, &profile(0), 15, 20, &mut rng());
        assert_eq!(rush.mode, CooldownMode::RushHour);
        assert_eq!(rush.breakdown.queue_multiplier, 2.0);

        let critical = compute_cooldown(&g, &profile(0), 21, 20, &mut rng());
        assert_eq!(critical.mode, CooldownMode::Critical);
        assert_eq!(critical.breakdown.queue_multiplier, 3.0);
    }

    #[test]
    fn test_trend_correction() {
        let g = group(120, 4);
        // expected over 2h: 20 * 2 * 0.8 = 32

        let fast = compute_cooldown(&g, &profile(0), 8, 40, &mut rng());
        assert_eq!(fast.breakdown.trend_multiplier, 1.3);

        let slow = compute_cooldown(&g, &profile(0), 8, 10, &mut rng());
        assert_eq!(slow.breakdown.trend_multiplier, 0.8);

        let on_target = compute_cooldown(&g, &profile(0), 8, 25, &mut rng());
        assert_eq!(on_target.breakdown.trend_multiplier, 1.0);
    }

    #[test]
    fn test_risk_penalty_tiers() {
        let g = group(120, 4);

        assert_eq!(compute_cooldown(&g, &profile(90), 8, 20, &mut rng()).breakdown.risk_multiplier, 2.0);
        assert_eq!(compute_cooldown(&g, &profile(60), 8, 20, &mut rng()).breakdown.risk_multiplier, 1.5);
        assert_eq!(compute_cooldown(&g, &profile(30), 8, 20, &mut rng()).breakdown.risk_multiplier, 1.2);
        assert_eq!(compute_cooldown(&g, &profile(10), 8, 20, &mut rng()).breakdown.risk_multiplier, 1.0);
    }

    #[test]
    fn test_clamp_floor_and_ceiling() {
        // Huge daily quota pushes the raw value under a minute: floor at 60
        let floor = compute_cooldown(&group(100_000, 4), &profile(0), 3, 20, &mut rng());
        assert_eq!(floor.seconds, 60);

        // Tiny quota under critical pressure and max risk: ceiling at 2400
        let ceiling = compute_cooldown(&group(10, 4), &profile(90), 30, 100, &mut rng());
        assert_eq!(ceiling.seconds, 2400);
    }

    #[test]
    fn test_jitter_varies_between_calls() {
        let g = group(120, 4);
        let p = profile(0);
        let mut r = rng();

        let first = compute_cooldown(&g, &p, 8, 20, &mut r);
        let second = compute_cooldown(&g, &p, 8, 20, &mut r);
        assert_ne!(
            first.breakdown.jitter_selected,
            second.breakdown.jitter_selected
        );
    }
}
