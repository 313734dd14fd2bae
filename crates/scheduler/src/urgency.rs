//! The urgency formula (§4.1): a pure, deterministic function of an
//! `AttentionSnapshot`. No side effects, no clock reads — callers supply
//! `now` and the local hour so this stays trivially testable.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct AttentionSnapshot {
    pub active_concerns_count: u32,
    pub pending_actions_count: u32,
    pub time_since_reflection: Duration,
    pub has_stale_thread: bool,
    pub time_since_user_message: Duration,
    /// Local hour of day, 0-23, used only for the rhythm bonus.
    pub local_hour: u32,
}

pub fn compute_urgency(snapshot: &AttentionSnapshot, max_interval: Duration) -> f64 {
    let concerns_term = 0.15 * snapshot.active_concerns_count.min(3) as f64;
    let pending_term = 0.20 * snapshot.pending_actions_count.min(2) as f64;
    let reflection_term = 0.15
        * clamp01(snapshot.time_since_reflection.as_secs_f64() / max_interval.as_secs_f64().max(f64::EPSILON));
    let stale_term = if snapshot.has_stale_thread { 0.10 } else { 0.0 };

    let score = concerns_term + pending_term + reflection_term + stale_term + rhythm_bonus(snapshot);
    score.clamp(0.0, 1.0)
}

fn rhythm_bonus(snapshot: &AttentionSnapshot) -> f64 {
    let hour = snapshot.local_hour;
    let morning = (6..10).contains(&hour);
    let evening = (18..23).contains(&hour);
    let night = !(6..23).contains(&hour);

    let mut bonus = 0.0;
    if morning && snapshot.time_since_reflection > Duration::from_secs(6 * 3600) {
        bonus += 0.15;
    }
    if evening && snapshot.time_since_reflection > Duration::from_secs(4 * 3600) {
        bonus += 0.10;
    }
    if snapshot.time_since_user_message > Duration::from_secs(4 * 3600) {
        bonus += 0.10;
    }
    if night {
        bonus -= 0.15;
    }
    bonus
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// `next_tick = max_interval - urgency * (max_interval - min_interval)`.
pub fn adaptive_interval(urgency: f64, min_interval: Duration, max_interval: Duration) -> Duration {
    let span = max_interval.as_secs_f64() - min_interval.as_secs_f64();
    let seconds = max_interval.as_secs_f64() - urgency.clamp(0.0, 1.0) * span;
    Duration::from_secs_f64(seconds.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_snapshot() -> AttentionSnapshot {
        AttentionSnapshot {
            active_concerns_count: 0,
            pending_actions_count: 0,
            time_since_reflection: Duration::ZERO,
            has_stale_thread: false,
            time_since_user_message: Duration::ZERO,
            local_hour: 12,
        }
    }

    #[test]
    fn three_active_concerns_with_max_time_pressure() {
        let max_interval = Duration::from_secs(900);
        let snapshot = AttentionSnapshot {
            active_concerns_count: 3,
            pending_actions_count: 0,
            time_since_reflection: max_interval,
            has_stale_thread: false,
            time_since_user_message: Duration::ZERO,
            local_hour: 12,
        };
        let urgency = compute_urgency(&snapshot, max_interval);
        assert!((urgency - 0.60).abs() < 1e-9);
    }

    #[test]
    fn zero_inputs_produce_zero_urgency_at_noon() {
        let urgency = compute_urgency(&base_snapshot(), Duration::from_secs(900));
        assert!((urgency - 0.0).abs() < 1e-9);
    }

    #[test]
    fn urgency_is_clamped_to_unit_interval() {
        let snapshot = AttentionSnapshot {
            active_concerns_count: 3,
            pending_actions_count: 2,
            time_since_reflection: Duration::from_secs(10_000),
            has_stale_thread: true,
            time_since_user_message: Duration::from_secs(10_000),
            local_hour: 7,
        };
        let urgency = compute_urgency(&snapshot, Duration::from_secs(900));
        assert!(urgency <= 1.0);
    }

    #[test]
    fn night_hours_reduce_urgency() {
        let mut snapshot = base_snapshot();
        snapshot.local_hour = 2;
        let urgency = compute_urgency(&snapshot, Duration::from_secs(900));
        assert_eq!(urgency, 0.0);
    }

    #[test]
    fn adaptive_interval_shrinks_with_rising_urgency() {
        let min = Duration::from_secs(60);
        let max = Duration::from_secs(900);
        assert_eq!(adaptive_interval(0.0, min, max), max);
        assert_eq!(adaptive_interval(1.0, min, max), min);
        let mid = adaptive_interval(0.5, min, max);
        assert!(mid > min && mid < max);
    }
}
