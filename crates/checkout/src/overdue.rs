use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived lateness of an open checkout, relative to a reference time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overdue {
    pub is_overdue: bool,
    /// Whole days elapsed since the expected return time; 0 when not overdue.
    pub days_overdue: i64,
}

impl Overdue {
    pub fn at(expected_return_time: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now <= expected_return_time {
            return Self::default();
        }
        Self {
            is_overdue: true,
            days_overdue: (now - expected_return_time).num_days(),
        }
    }
}
