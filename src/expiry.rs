//! Time-window evaluation for expiring resources.
//!
//! Pure functions over `chrono` values; no state, no errors. The managers
//! layer their refresh/reissue decisions on top of these.

use chrono::{DateTime, Duration, Utc};

/// Minimum remaining validity in minutes for an access token before it is
/// refreshed.
pub const ACCESS_TOKEN_THRESHOLD_MINUTES: i64 = 60;

/// Minimum remaining validity in minutes for a refresh token before full
/// reissue.
pub const REFRESH_TOKEN_THRESHOLD_MINUTES: i64 = 1;

/// Minimum remaining validity in minutes for a requisition before a new one
/// is created.
pub const REQUISITION_THRESHOLD_MINUTES: i64 = 60;

/// Consent validity window granted to a newly created requisition.
pub const REQUISITION_VALIDITY_DAYS: i64 = 90;

/// Time remaining until `expires_at`, negative once it has passed.
pub fn time_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    expires_at - now
}

/// A remaining window is valid while it is at least the threshold.
///
/// Exactly-at-threshold counts as valid: a token with 60 minutes left is not
/// refreshed, one with 59 minutes left is.
pub fn is_valid(remaining: Duration, threshold_minutes: i64) -> bool {
    remaining >= Duration::minutes(threshold_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn remaining_is_negative_after_expiry() {
        let remaining = time_remaining(at(1_000), at(2_000));
        assert_eq!(remaining, Duration::seconds(-1_000));
        assert!(!is_valid(remaining, REFRESH_TOKEN_THRESHOLD_MINUTES));
    }

    #[test]
    fn exactly_at_threshold_is_valid() {
        let now = at(1_700_000_000);
        let remaining = time_remaining(now + Duration::minutes(60), now);
        assert!(is_valid(remaining, ACCESS_TOKEN_THRESHOLD_MINUTES));
    }

    #[test]
    fn one_minute_under_threshold_is_invalid() {
        let now = at(1_700_000_000);
        let remaining = time_remaining(now + Duration::minutes(59), now);
        assert!(!is_valid(remaining, ACCESS_TOKEN_THRESHOLD_MINUTES));
    }
}
