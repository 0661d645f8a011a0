//! Follow-up classification
//!
//! Whether an activity's follow-up is overdue is never stored; it is a pure
//! function of the follow-up date, the activity status and the clock, so
//! listings can never go stale.

/// Where a follow-up stands relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpState {
    /// Pending with a follow-up date in the past
    Overdue,
    /// Pending with a follow-up date now or later
    Upcoming,
    /// No follow-up date, or the activity is no longer pending
    None,
}

pub fn classify_follow_up(follow_up_at: Option<i64>, status: &str, now: i64) -> FollowUpState {
    if status != "pending" {
        return FollowUpState::None;
    }
    match follow_up_at {
        Some(at) if at < now => FollowUpState::Overdue,
        Some(_) => FollowUpState::Upcoming,
        None => FollowUpState::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_pending_past_date_is_overdue() {
        assert_eq!(
            classify_follow_up(Some(NOW - 1), "pending", NOW),
            FollowUpState::Overdue
        );
    }

    #[test]
    fn test_pending_future_or_exact_date_is_upcoming() {
        assert_eq!(
            classify_follow_up(Some(NOW), "pending", NOW),
            FollowUpState::Upcoming
        );
        assert_eq!(
            classify_follow_up(Some(NOW + 3600), "pending", NOW),
            FollowUpState::Upcoming
        );
    }

    #[test]
    fn test_non_pending_never_classifies() {
        assert_eq!(
            classify_follow_up(Some(NOW - 1), "completed", NOW),
            FollowUpState::None
        );
        assert_eq!(
            classify_follow_up(Some(NOW - 1), "cancelled", NOW),
            FollowUpState::None
        );
    }

    #[test]
    fn test_missing_date_is_none() {
        assert_eq!(classify_follow_up(None, "pending", NOW), FollowUpState::None);
    }
}
