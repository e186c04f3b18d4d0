use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{GeoExportError, Result};

/// A seasonal window given as month-day strings (`"MM-DD"`), applied to any
/// year. The resolved range is half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: String,
    pub end: String,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self { start: "05-01".into(), end: "07-31".into() }
    }
}

impl DateWindow {
    pub fn new(start: &str, end: &str) -> Self {
        Self { start: start.into(), end: end.into() }
    }

    fn resolve(year: i32, month_day: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&format!("{year}-{month_day}"), "%Y-%m-%d")
            .map_err(|e| GeoExportError::InvalidDateWindow(format!("{year}-{month_day}: {e}")))
    }

    /// The `[start, end)` range for `year`.
    pub fn range(&self, year: i32) -> Result<(NaiveDate, NaiveDate)> {
        let start = Self::resolve(year, &self.start)?;
        let end = Self::resolve(year, &self.end)?;
        if start >= end {
            return Err(GeoExportError::InvalidDateWindow(format!(
                "window {}..{} is empty in {year}",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }
}
