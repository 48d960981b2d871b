//! Frequency gate: the due/not-due decision
//!
//! Given the creation time of the latest managed snapshot and the policy
//! frequency, decides whether enough time has elapsed for a new one. A small
//! jitter tolerance is subtracted from the next-due threshold so a scheduler
//! invocation drifting a few minutes early does not skip an entire cycle.
//!
//! The gate is only consulted when a last snapshot exists; the zero-history
//! decision lives in the scheduler. All timestamps are `DateTime<Utc>`;
//! normalization to UTC happens once, at the wire boundary.

use chrono::{DateTime, Duration, Months, Utc};

use crate::errors::{Result, ShutterError};
use crate::policy::Frequency;

/// When the next snapshot becomes due, ignoring jitter.
///
/// Monthly means the same day of the following month, clamped to the last
/// valid day when the month is shorter (Jan 31 -> Feb 28/29).
pub fn next_due(last: DateTime<Utc>, frequency: Frequency) -> Result<DateTime<Utc>> {
    let next = match frequency {
        Frequency::Daily => last.checked_add_signed(Duration::days(1)),
        Frequency::Weekly => last.checked_add_signed(Duration::days(7)),
        Frequency::Monthly => last.checked_add_months(Months::new(1)),
    };

    next.ok_or_else(|| {
        ShutterError::Other(format!("next due time out of range from {}", last))
    })
}

/// Due/not-due at an explicit evaluation instant.
pub fn is_due_at(
    now: DateTime<Utc>,
    last: DateTime<Utc>,
    frequency: Frequency,
    jitter_minutes: i64,
) -> Result<bool> {
    let threshold = next_due(last, frequency)? - Duration::minutes(jitter_minutes);
    Ok(now >= threshold)
}

/// Due/not-due at the moment of evaluation.
pub fn is_due(last: DateTime<Utc>, frequency: Frequency, jitter_minutes: i64) -> Result<bool> {
    is_due_at(Utc::now(), last, frequency, jitter_minutes)
}
