//! Session invalidation on credential rotation.
//!
//! An access token stays valid unless the account's primary credential was
//! changed after the token was issued. The check is stateless: it needs only
//! the token's issue instant and the account's `credential_changed_at`.
//!
//! Both instants are truncated to whole milliseconds before comparison, so a
//! token issued earlier in the same second as a password change is rejected.

use chrono::{DateTime, Utc};

/// Anything that records when its primary credential last changed.
pub trait CredentialClock {
    fn credential_changed_at(&self) -> Option<DateTime<Utc>>;
}

/// Decide whether a token issued at `token_issued_at` is still honored for
/// `record`.
pub fn is_token_valid(token_issued_at: DateTime<Utc>, record: &impl CredentialClock) -> bool {
    match record.credential_changed_at() {
        Some(changed_at) => changed_at.timestamp_millis() <= token_issued_at.timestamp_millis(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    struct Account(Option<DateTime<Utc>>);

    impl CredentialClock for Account {
        fn credential_changed_at(&self) -> Option<DateTime<Utc>> {
            self.0
        }
    }

    fn changed_at() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_500).unwrap()
    }

    #[test]
    fn token_before_change_is_invalid() {
        let t = changed_at();
        assert!(!is_token_valid(t - Duration::seconds(1), &Account(Some(t))));
    }

    #[test]
    fn token_after_change_is_valid() {
        let t = changed_at();
        assert!(is_token_valid(t + Duration::seconds(1), &Account(Some(t))));
    }

    #[test]
    fn token_at_change_instant_is_valid() {
        let t = changed_at();
        assert!(is_token_valid(t, &Account(Some(t))));
    }

    #[test]
    fn no_change_recorded_is_always_valid() {
        let long_ago = Utc.timestamp_millis_opt(0).unwrap();
        assert!(is_token_valid(long_ago, &Account(None)));
    }

    #[test]
    fn same_second_earlier_millisecond_is_invalid() {
        // Issued at xx.000, password changed at xx.500 of the same second.
        let t = changed_at();
        let issued = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(issued.timestamp(), t.timestamp());
        assert!(!is_token_valid(issued, &Account(Some(t))));
    }

    #[test]
    fn sub_millisecond_difference_is_ignored() {
        let t = changed_at() + Duration::microseconds(900);
        let issued = changed_at() + Duration::microseconds(100);
        assert!(is_token_valid(issued, &Account(Some(t))));
    }
}
