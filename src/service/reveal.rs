//! Reveal periods and unlock timestamps.
//!
//! The unlock timestamp is computed once, when the capsule is created. Whether
//! a capsule is released is a flag stored with it; nothing here flips it.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::error::TimecapsuleError;

pub const DEFAULT_REVEAL_MONTHS: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RevealOption {
    pub label: &'static str,
    pub months: u32,
}

pub const REVEAL_OPTIONS: [RevealOption; 7] = [
    RevealOption { label: "3 Months", months: 3 },
    RevealOption { label: "6 Months", months: 6 },
    RevealOption { label: "1 Years", months: 12 },
    RevealOption { label: "2 Years", months: 24 },
    RevealOption { label: "3 Years", months: 36 },
    RevealOption { label: "4 Years", months: 48 },
    RevealOption { label: "5 Years", months: 60 },
];

/// Only the offered periods are accepted.
pub fn reveal_months(requested: Option<u32>) -> Result<u32, TimecapsuleError> {
    let months = requested.unwrap_or(DEFAULT_REVEAL_MONTHS);
    REVEAL_OPTIONS
        .iter()
        .find(|o| o.months == months)
        .map(|o| o.months)
        .ok_or_else(|| TimecapsuleError::validation("Please choose a reveal period."))
}

/// Adds calendar months; a day past the end of the target month clamps to its last day.
pub fn unlock_at(now: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, TimecapsuleError> {
    now.checked_add_months(Months::new(months))
        .ok_or_else(|| TimecapsuleError::validation("Reveal date is out of range."))
}

pub fn unlock_label(unlock_at: DateTime<Utc>, is_released: bool) -> String {
    if is_released {
        return "Released".to_string();
    }
    format!("Unlocks {}", unlock_at.format("%b %-d, %Y"))
}
