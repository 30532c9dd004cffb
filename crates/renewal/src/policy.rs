//! Certificate expiry policy.

use chrono::{DateTime, Duration, Utc};

/// Renewal is due once `now` reaches `not_after - threshold` (inclusive).
pub fn is_renewal_due(not_after: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match not_after.checked_sub_signed(threshold) {
        Some(renew_from) => now >= renew_from,
        // Threshold reaches before the representable range: always due.
        None => true,
    }
}
