//! The cheap, no-LLM gate evaluated before significance scoring (§4.6 step 1).

use chrono::{DateTime, Utc};

use crate::state::ProactiveState;

const DAILY_CAP: usize = 3;
const MIN_GAP_HOURS: i64 = 2;
const PER_THREAD_CAP: u32 = 1;

pub fn check_rate_limits(state: &ProactiveState, thread_id: &str, now: DateTime<Utc>) -> Option<&'static str> {
    if state.sent_today.len() >= DAILY_CAP {
        return Some("daily limit reached (3/day)");
    }

    if let Some(latest) = state.sent_today.iter().map(|r| r.sent_at).max() {
        if now - latest < chrono::Duration::hours(MIN_GAP_HOURS) {
            return Some("minimum gap since last send not yet elapsed");
        }
    }

    if let Some(follow_up) = state.follow_ups_by_thread.get(thread_id) {
        if follow_up.count >= PER_THREAD_CAP {
            return Some("per-thread follow-up cap reached");
        }
        if follow_up.ignored {
            return Some("previous follow-up on this thread was ignored");
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FollowUpRecord, SentRecord};

    #[test]
    fn passes_with_fresh_state() {
        let state = ProactiveState::default();
        assert!(check_rate_limits(&state, "t1", Utc::now()).is_none());
    }

    #[test]
    fn daily_cap_rejects() {
        let now = Utc::now();
        let mut state = ProactiveState::default();
        for i in 0..3 {
            state.sent_today.push(SentRecord { thread_id: format!("t{i}"), sent_at: now - chrono::Duration::hours(5) });
        }
        assert_eq!(check_rate_limits(&state, "other", now), Some("daily limit reached (3/day)"));
    }

    #[test]
    fn minimum_gap_rejects() {
        let now = Utc::now();
        let mut state = ProactiveState::default();
        state.sent_today.push(SentRecord { thread_id: "t1".to_string(), sent_at: now - chrono::Duration::hours(1) });
        assert!(check_rate_limits(&state, "t2", now).is_some());
    }

    #[test]
    fn per_thread_cap_rejects() {
        let now = Utc::now();
        let mut state = ProactiveState::default();
        state.follow_ups_by_thread.insert(
            "t1".to_string(),
            FollowUpRecord { count: 1, last_at: Some(now - chrono::Duration::hours(10)), ignored: false },
        );
        assert!(check_rate_limits(&state, "t1", now).is_some());
    }

    #[test]
    fn ignored_previous_follow_up_rejects() {
        let now = Utc::now();
        let mut state = ProactiveState::default();
        state.follow_ups_by_thread.insert(
            "t1".to_string(),
            FollowUpRecord { count: 0, last_at: None, ignored: true },
        );
        assert!(check_rate_limits(&state, "t1", now).is_some());
    }
}
