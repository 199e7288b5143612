//! Run scope: which existing records a run reconciles against

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Field/value constraint narrowing the existing records loaded for a run
/// (e.g. `data_as_of_date = 2025-01-31` or `branch_id = 13`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub field: String,
    pub value: String,
}

impl ScopeFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for ScopeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Last day of the given month, the scope value for monthly imports
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    debug!(year, month, "month_end: called");
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month.checked_add(1)?, 1)?
    };
    let end = first_of_next.pred_opt()?;
    (end.month() == month).then_some(end)
}

/// `month_end` formatted as `YYYY-MM-DD`
pub fn month_end_string(year: i32, month: u32) -> Option<String> {
    month_end(year, month).map(|d| d.format("%Y-%m-%d").to_string())
}
