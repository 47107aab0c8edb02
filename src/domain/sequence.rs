use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DISPLAY_ID_PREFIX: &str = "MU";

/// Per-day order counters, one row per calendar day.
///
/// A day with no row starts at 1; nothing carries across days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyCounter {
    counts: BTreeMap<NaiveDate, u32>,
}

impl DailyCounter {
    /// Bump the counter for `date` and return the new sequence number.
    pub fn next(&mut self, date: NaiveDate) -> u32 {
        let count = self.counts.entry(date).or_insert(0);
        *count += 1;
        *count
    }

    pub fn current(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or(0)
    }
}

/// `MU-DDMMYY-NN`, sequence zero-padded to two digits.
pub fn format_display_id(date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}-{}-{:02}",
        DISPLAY_ID_PREFIX,
        date.format("%d%m%y"),
        sequence
    )
}
