//! Distribution engine - splits recipients across a group's profiles
//!
//! Every strategy is queue-aware: capacity checks count the waiting queue
//! items per profile on top of the sent counters, so many small requests
//! consume capacity exactly like one large request would.

use rand::seq::SliceRandom;
use rand::Rng;
use sendpace_common::types::{DistributionStrategy, ProfileId};
use sendpace_storage::models::{Group, ProfileWithStats};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::dispatch::DispatchError;

/// Recipients assigned to one profile
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub profile_id: ProfileId,
    pub recipients: Vec<String>,
}

/// Result of one distribution pass
///
/// Profile order is preserved from the input; the scheduler's interleaving
/// depends on it. `unassigned` holds recipients no profile had room for --
/// partial assignment is signaled, never silent.
#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    assignments: Vec<Assignment>,
    pub unassigned: Vec<String>,
}

impl Distribution {
    fn with_profiles(profile_ids: &[ProfileId]) -> Self {
        Self {
            assignments: profile_ids
                .iter()
                .map(|&profile_id| Assignment {
                    profile_id,
                    recipients: Vec::new(),
                })
                .collect(),
            unassigned: Vec::new(),
        }
    }

    fn push(&mut self, profile_id: ProfileId, recipient: String) {
        if let Some(a) = self
            .assignments
            .iter_mut()
            .find(|a| a.profile_id == profile_id)
        {
            a.recipients.push(recipient);
        }
    }

    fn len_for(&self, profile_id: ProfileId) -> usize {
        self.assignments
            .iter()
            .find(|a| a.profile_id == profile_id)
            .map(|a| a.recipients.len())
            .unwrap_or(0)
    }

    /// Iterate non-empty assignments in profile order
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| !a.recipients.is_empty())
    }

    /// Recipients assigned to a profile
    pub fn recipients_for(&self, profile_id: ProfileId) -> Option<&[String]> {
        self.assignments
            .iter()
            .find(|a| a.profile_id == profile_id)
            .map(|a| a.recipients.as_slice())
    }

    /// Total recipients placed on a profile
    pub fn total_assigned(&self) -> usize {
        self.assignments.iter().map(|a| a.recipients.len()).sum()
    }

    /// Per-profile assignment counts
    pub fn counts(&self) -> HashMap<ProfileId, usize> {
        self.assignments()
            .map(|a| (a.profile_id, a.recipients.len()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.total_assigned() == 0
    }

    /// JSON shape stored on the message for auditability
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .assignments()
            .map(|a| (a.profile_id.to_string(), serde_json::json!(a.recipients)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Split recipients across the group's active profiles
///
/// `pending` is the count of currently waiting queue items per profile;
/// missing entries mean zero. Pure apart from the RNG: nothing is persisted.
pub fn distribute(
    group: &Group,
    profiles: &[ProfileWithStats],
    pending: &HashMap<ProfileId, i64>,
    recipients: &[String],
    rng: &mut impl Rng,
) -> Result<Distribution, DispatchError> {
    let eligible: Vec<&ProfileWithStats> =
        profiles.iter().filter(|p| p.profile.is_active()).collect();

    if eligible.is_empty() {
        return Err(DispatchError::NoEligibleProfiles);
    }

    let strategy = group.strategy();
    debug!(
        %strategy,
        profiles = eligible.len(),
        recipients = recipients.len(),
        "distributing recipients"
    );

    let dist = match strategy {
        DistributionStrategy::Rotate => rotate(group, &eligible, pending, recipients),
        DistributionStrategy::Random => random(group, &eligible, pending, recipients, rng),
        DistributionStrategy::Weighted => weighted(group, &eligible, pending, recipients),
        DistributionStrategy::Smart => smart(group, &eligible, pending, recipients),
    };

    if !dist.unassigned.is_empty() {
        warn!(
            count = dist.unassigned.len(),
            "recipients left unassigned, every profile is at capacity"
        );
    }

    Ok(dist)
}

fn waiting_for(pending: &HashMap<ProfileId, i64>, profile_id: ProfileId) -> i64 {
    pending.get(&profile_id).copied().unwrap_or(0)
}

/// Room left under the effective daily cap, counting waiting queue items
/// and recipients already assigned in this pass
fn has_daily_room(
    p: &ProfileWithStats,
    group: &Group,
    pending: i64,
    already_assigned: usize,
) -> bool {
    (p.sent_today() as i64) + pending + (already_assigned as i64)
        < p.profile.effective_daily_limit(group) as i64
}

/// Round-robin whose starting offset is the total load (sent + waiting)
/// modulo the profile count, so single-recipient requests keep rotating
/// instead of always landing on the first profile.
fn rotate(
    group: &Group,
    profiles: &[&ProfileWithStats],
    pending: &HashMap<ProfileId, i64>,
    recipients: &[String],
) -> Distribution {
    let ids: Vec<ProfileId> = profiles.iter().map(|p| p.profile.id).collect();
    let mut dist = Distribution::with_profiles(&ids);
    let n = ids.len();

    let total_load: i64 = profiles
        .iter()
        .map(|p| p.sent_today() as i64 + waiting_for(pending, p.profile.id))
        .sum();
    let start_offset = (total_load % n as i64) as usize;

    debug!(total_load, start_offset, "rotate starting position");

    for (i, recipient) in recipients.iter().enumerate() {
        let idx = (start_offset + i) % n;

        let mut placed = false;
        for j in 0..n {
            let k = (idx + j) % n;
            let p = profiles[k];
            let pid = p.profile.id;
            if has_daily_room(p, group, waiting_for(pending, pid), dist.len_for(pid)) {
                dist.push(pid, recipient.clone());
                placed = true;
                break;
            }
        }
        if !placed {
            dist.unassigned.push(recipient.clone());
        }
    }

    dist
}

/// Shuffle the candidate order per recipient; the first profile under
/// capacity wins, and when none has room the least-loaded profile takes it
/// so no recipient is ever dropped.
fn random(
    group: &Group,
    profiles: &[&ProfileWithStats],
    pending: &HashMap<ProfileId, i64>,
    recipients: &[String],
    rng: &mut impl Rng,
) -> Distribution {
    let ids: Vec<ProfileId> = profiles.iter().map(|p| p.profile.id).collect();
    let mut dist = Distribution::with_profiles(&ids);

    let mut order: Vec<usize> = (0..profiles.len()).collect();

    for recipient in recipients {
        order.shuffle(rng);

        let mut placed = false;
        for &k in &order {
            let p = profiles[k];
            let pid = p.profile.id;
            if has_daily_room(p, group, waiting_for(pending, pid), dist.len_for(pid)) {
                dist.push(pid, recipient.clone());
                placed = true;
                break;
            }
        }
        if !placed {
            let k = (0..profiles.len())
                .min_by_key(|&k| {
                    let p = profiles[k];
                    p.sent_today() as i64
                        + waiting_for(pending, p.profile.id)
                        + dist.len_for(p.profile.id) as i64
                })
                .expect("profiles is non-empty");
            dist.push(profiles[k].profile.id, recipient.clone());
        }
    }

    dist
}

/// Target shares proportional to weight (minimum share 1), capped by each
/// profile's remaining daily capacity, with leftovers topped up round-robin.
fn weighted(
    group: &Group,
    profiles: &[&ProfileWithStats],
    pending: &HashMap<ProfileId, i64>,
    recipients: &[String],
) -> Distribution {
    let ids: Vec<ProfileId> = profiles.iter().map(|p| p.profile.id).collect();
    let mut dist = Distribution::with_profiles(&ids);
    let n_rec = recipients.len();

    let total_weight: f64 = profiles.iter().map(|p| p.profile.weight_score.max(1.0)).sum();

    let mut idx = 0usize;
    for p in profiles {
        if idx >= n_rec {
            break;
        }
        let pid = p.profile.id;
        let share = ((n_rec as f64) * (p.profile.weight_score.max(1.0) / total_weight)) as usize;
        let share = share.max(1);

        let pend = waiting_for(pending, pid);
        let max_can_send = (p.profile.effective_daily_limit(group) as i64
            - p.sent_today() as i64
            - pend)
            .max(0) as usize;

        let count = share.min(max_can_send).min(n_rec - idx);
        for r in &recipients[idx..idx + count] {
            dist.push(pid, r.clone());
        }
        idx += count;
    }

    // Top up leftovers round-robin across profiles still under capacity
    while idx < n_rec {
        let mut progressed = false;
        for p in profiles {
            if idx >= n_rec {
                break;
            }
            let pid = p.profile.id;
            if has_daily_room(p, group, waiting_for(pending, pid), dist.len_for(pid)) {
                dist.push(pid, recipients[idx].clone());
                idx += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    dist.unassigned.extend(recipients[idx..].iter().cloned());
    dist
}

/// Score profiles on weight, health, remaining capacity, and success rate,
/// penalize risk, then allocate proportionally to the normalized scores.
/// Capacity is the tightest of the daily/hourly/3-hour windows, each net of
/// pending queue items.
fn smart(
    group: &Group,
    profiles: &[&ProfileWithStats],
    pending: &HashMap<ProfileId, i64>,
    recipients: &[String],
) -> Distribution {
    struct Scored<'a> {
        p: &'a ProfileWithStats,
        score: f64,
        capacity: usize,
    }

    let mut scored: Vec<Scored> = profiles
        .iter()
        .map(|&p| {
            let pid = p.profile.id;
            let pend = waiting_for(pending, pid);

            let p_daily = p.profile.effective_daily_limit(group).max(1);
            let p_hourly = p.profile.effective_hourly_limit(group);
            let p_3hours = p.profile.effective_3hour_limit(group);

            let daily_remaining = (p_daily as i64 - p.sent_today() as i64 - pend).max(0);
            let hourly_remaining = (p_hourly as i64 - p.sent_hour() as i64 - pend).max(0);
            let three_hour_remaining = (p_3hours as i64 - p.sent_3hours() as i64 - pend).max(0);

            let capacity = daily_remaining.min(hourly_remaining).min(three_hour_remaining) as usize;

            let mut score = p.profile.weight_score.max(1.0)
                * (p.profile.health_score as f64 / 100.0)
                * (capacity as f64 / p_daily as f64)
                * (p.success_rate() / 100.0);

            if p.profile.risk_score > 50 {
                score *= 0.5;
            } else if p.profile.risk_score > 20 {
                score *= 0.8;
            }

            debug!(
                profile = %p.profile.name,
                score,
                capacity,
                pending = pend,
                risk = p.profile.risk_score,
                "smart score"
            );

            Scored { p, score, capacity }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let total_score: f64 = scored.iter().map(|s| s.score).sum();
    if total_score == 0.0 {
        return rotate(group, profiles, pending, recipients);
    }

    let ids: Vec<ProfileId> = profiles.iter().map(|p| p.profile.id).collect();
    let mut dist = Distribution::with_profiles(&ids);
    let n_rec = recipients.len();

    let mut idx = 0usize;
    for s in &scored {
        if idx >= n_rec {
            break;
        }
        let share = ((n_rec as f64) * (s.score / total_score)) as usize;
        let count = share.max(1).min(s.capacity).min(n_rec - idx);
        for r in &recipients[idx..idx + count] {
            dist.push(s.p.profile.id, r.clone());
        }
        idx += count;
    }

    // Leftovers go to the best-scored profile still under capacity
    while idx < n_rec {
        let mut progressed = false;
        for s in &scored {
            let pid = s.p.profile.id;
            if dist.len_for(pid) < s.capacity {
                dist.push(pid, recipients[idx].clone());
                idx += 1;
                progressed = true;
                break;
            }
        }
        if !progressed {
            break;
        }
    }

    dist.unassigned.extend(recipients[idx..].iter().cloned());
    dist
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Build a distribution directly, for scheduler tests
    pub fn distribution_of(entries: &[(ProfileId, Vec<&str>)]) -> Distribution {
        Distribution {
            assignments: entries
                .iter()
                .map(|(profile_id, recipients)| Assignment {
                    profile_id: *profile_id,
                    recipients: recipients.iter().map(|r| r.to_string()).collect(),
                })
                .collect(),
            unassigned: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sendpace_storage::models::{Profile, ProfileStatistics};
    use uuid::Uuid;

    fn group(strategy: &str, max_per_day: i32) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "g".into(),
            description: None,
            status: "active".into(),
            distribution_strategy: strategy.into(),
            max_per_hour: 20,
            max_per_3hours: 45,
            max_per_day,
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

    fn profile(group_id: Uuid, name: &str) -> ProfileWithStats {
        let id = Uuid::new_v4();
        ProfileWithStats {
            profile: Profile {
                id,
                group_id,
                name: name.into(),
                phone_number: None,
                device_uuid: format!("dev-{}", name),
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
            },
            stats: Some(ProfileStatistics {
                id: Uuid::new_v4(),
                profile_id: id,
                messages_sent_total: 0,
                messages_sent_today: 0,
                messages_sent_hour: 0,
                messages_sent_3hours: 0,
                failed_messages_today: 0,
                failed_messages_hour: 0,
                success_rate_24h: 100.0,
                avg_response_time_ms: 0.0,
                current_cooldown_seconds: 0,
                cooldown_expires_at: None,
                cooldown_mode: "normal".into(),
                last_hour_reset_at: Utc::now(),
                last_3hour_reset_at: Utc::now(),
                last_day_reset_at: Utc::now(),
                updated_at: Utc::now(),
            }),
        }
    }

    fn recipients(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("r{}", i)).collect()
    }

    fn set_sent_today(p: &mut ProfileWithStats, sent: i32) {
        p.stats.as_mut().unwrap().messages_sent_today = sent;
    }

    #[test]
    fn test_no_eligible_profiles() {
        let g = group("rotate", 240);
        let mut p = profile(g.id, "a");
        p.profile.status = "paused".into();
        let mut rng = StdRng::seed_from_u64(7);

        let result = distribute(&g, &[p], &HashMap::new(), &recipients(1), &mut rng);
        assert!(matches!(result, Err(DispatchError::NoEligibleProfiles)));
    }

    #[test]
    fn test_rotate_batch_alternates() {
        let g = group("rotate", 240);
        let a = profile(g.id, "a");
        let b = profile(g.id, "b");
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(4), &mut rng).unwrap();

        assert_eq!(
            dist.recipients_for(a.profile.id).unwrap(),
            &["r1".to_string(), "r3".to_string()]
        );
        assert_eq!(
            dist.recipients_for(b.profile.id).unwrap(),
            &["r2".to_string(), "r4".to_string()]
        );
        assert!(dist.unassigned.is_empty());
    }

    #[test]
    fn test_rotate_single_recipient_requests_keep_rotating() {
        // Four sequential one-recipient requests must land A, B, A, B --
        // the waiting counts between requests move the starting offset.
        let g = group("rotate", 240);
        let a = profile(g.id, "a");
        let b = profile(g.id, "b");
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let mut pending: HashMap<ProfileId, i64> = HashMap::new();
        let mut landed = Vec::new();

        for i in 1..=4 {
            let recipient = vec![format!("r{}", i)];
            let dist = distribute(&g, &profiles, &pending, &recipient, &mut rng).unwrap();
            let (pid, _) = dist.counts().into_iter().next().unwrap();
            *pending.entry(pid).or_insert(0) += 1;
            landed.push(pid);
        }

        assert_eq!(landed[0], a.profile.id);
        assert_eq!(landed[1], b.profile.id);
        assert_eq!(landed[2], a.profile.id);
        assert_eq!(landed[3], b.profile.id);
    }

    #[test]
    fn test_rotate_overflow_advances_to_profile_with_room() {
        let g = group("rotate", 3);
        let mut a = profile(g.id, "a");
        let b = profile(g.id, "b");
        set_sent_today(&mut a, 3); // a is at its daily cap
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(2), &mut rng).unwrap();

        assert_eq!(dist.recipients_for(a.profile.id).unwrap_or(&[]).len(), 0);
        assert_eq!(dist.recipients_for(b.profile.id).unwrap().len(), 2);
    }

    #[test]
    fn test_rotate_capacity_invariant_holds() {
        let g = group("rotate", 5);
        let mut a = profile(g.id, "a");
        let mut b = profile(g.id, "b");
        set_sent_today(&mut a, 3);
        set_sent_today(&mut b, 4);
        let mut pending = HashMap::new();
        pending.insert(a.profile.id, 1i64);
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        // a has room for 1 (3 sent + 1 waiting), b for 1 (4 sent)
        let dist = distribute(&g, &profiles, &pending, &recipients(5), &mut rng).unwrap();

        assert_eq!(dist.recipients_for(a.profile.id).unwrap().len(), 1);
        assert_eq!(dist.recipients_for(b.profile.id).unwrap().len(), 1);
        assert_eq!(dist.unassigned.len(), 3);
    }

    #[test]
    fn test_random_never_drops_recipients() {
        let g = group("random", 2);
        let mut a = profile(g.id, "a");
        let mut b = profile(g.id, "b");
        set_sent_today(&mut a, 2);
        set_sent_today(&mut b, 2); // everyone full
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(3), &mut rng).unwrap();

        // least-loaded fallback keeps assigning rather than dropping
        assert_eq!(dist.total_assigned(), 3);
        assert!(dist.unassigned.is_empty());
    }

    #[test]
    fn test_random_respects_capacity_when_available() {
        let g = group("random", 2);
        let a = profile(g.id, "a");
        let b = profile(g.id, "b");
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(42);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(4), &mut rng).unwrap();

        assert_eq!(dist.total_assigned(), 4);
        assert!(dist.recipients_for(a.profile.id).unwrap().len() <= 2);
        assert!(dist.recipients_for(b.profile.id).unwrap().len() <= 2);
    }

    #[test]
    fn test_weighted_shares_follow_weights() {
        let g = group("weighted", 240);
        let mut a = profile(g.id, "a");
        let b = profile(g.id, "b");
        a.profile.weight_score = 30.0; // 3x the weight of b
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(8), &mut rng).unwrap();

        assert_eq!(dist.recipients_for(a.profile.id).unwrap().len(), 6);
        assert_eq!(dist.recipients_for(b.profile.id).unwrap().len(), 2);
        assert_eq!(dist.total_assigned(), 8);
    }

    #[test]
    fn test_weighted_minimum_share_is_one() {
        let g = group("weighted", 240);
        let mut a = profile(g.id, "a");
        let b = profile(g.id, "b");
        a.profile.weight_score = 1000.0;
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(3), &mut rng).unwrap();

        // b still gets its minimum share of 1
        assert!(dist.recipients_for(b.profile.id).unwrap().len() >= 1);
        assert_eq!(dist.total_assigned(), 3);
    }

    #[test]
    fn test_weighted_signals_unassigned_when_full() {
        let g = group("weighted", 1);
        let mut a = profile(g.id, "a");
        let mut b = profile(g.id, "b");
        set_sent_today(&mut a, 1);
        set_sent_today(&mut b, 1);
        let profiles = vec![a, b];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(2), &mut rng).unwrap();

        assert_eq!(dist.total_assigned(), 0);
        assert_eq!(dist.unassigned.len(), 2);
    }

    #[test]
    fn test_smart_prefers_low_risk_profiles() {
        let g = group("smart", 240);
        let a = profile(g.id, "a");
        let mut b = profile(g.id, "b");
        b.profile.risk_score = 60; // 0.5x penalty
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(9), &mut rng).unwrap();

        let a_count = dist.recipients_for(a.profile.id).unwrap().len();
        let b_count = dist.recipients_for(b.profile.id).unwrap().len();
        assert!(a_count > b_count, "a={} b={}", a_count, b_count);
        assert_eq!(a_count + b_count, 9);
    }

    #[test]
    fn test_smart_capacity_uses_tightest_window() {
        let g = group("smart", 240);
        let mut a = profile(g.id, "a");
        // hourly window nearly exhausted: 20/hour limit, 19 sent
        a.stats.as_mut().unwrap().messages_sent_hour = 19;
        let b = profile(g.id, "b");
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(10), &mut rng).unwrap();

        assert!(dist.recipients_for(a.profile.id).unwrap_or(&[]).len() <= 1);
        assert_eq!(dist.total_assigned(), 10);
    }

    #[test]
    fn test_smart_zero_scores_fall_back_to_rotate() {
        let g = group("smart", 240);
        let mut a = profile(g.id, "a");
        let mut b = profile(g.id, "b");
        a.profile.health_score = 0;
        b.profile.health_score = 0;
        let profiles = vec![a.clone(), b.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(4), &mut rng).unwrap();

        // rotate fallback still alternates
        assert_eq!(dist.recipients_for(a.profile.id).unwrap().len(), 2);
        assert_eq!(dist.recipients_for(b.profile.id).unwrap().len(), 2);
    }

    #[test]
    fn test_distribution_json_shape() {
        let g = group("rotate", 240);
        let a = profile(g.id, "a");
        let profiles = vec![a.clone()];
        let mut rng = StdRng::seed_from_u64(7);

        let dist =
            distribute(&g, &profiles, &HashMap::new(), &recipients(2), &mut rng).unwrap();
        let json = dist.to_json();

        assert_eq!(
            json[a.profile.id.to_string()],
            serde_json::json!(["r1", "r2"])
        );
    }
}
