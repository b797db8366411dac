use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::enums::{Granularity, ServiceLine};

/// Location selector. "All" places no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationFilter {
    #[default]
    All,
    Named(String),
}

impl LocationFilter {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(name) => Some(name),
        }
    }

    /// Title used above KPI cards.
    pub fn title(&self) -> &str {
        self.name().unwrap_or("All Locations")
    }
}

/// The resolved user selection for one recompute pass.
///
/// Built once per interaction and read by every aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterContext {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: LocationFilter,
    pub granularity: Granularity,
    pub service_line: Option<ServiceLine>,
    pub provider: Option<String>,
    pub insurance: Option<String>,
    pub staff_role: Option<String>,
    pub day_of_week: Option<Weekday>,
    /// Subsample calendar days when the span is long.
    pub sample_long_ranges: bool,
}

impl FilterContext {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            location: LocationFilter::All,
            granularity: Granularity::Month,
            service_line: None,
            provider: None,
            insurance: None,
            staff_role: None,
            day_of_week: None,
            sample_long_ranges: false,
        }
    }

    /// Initial selection for a dataset spanning `min..=max`.
    ///
    /// The preferred start is used when it falls inside the data; a start
    /// before the data clamps to `min`, and so does a start after it.
    pub fn with_defaults(min: NaiveDate, max: NaiveDate, preferred_start: NaiveDate) -> Self {
        let start = if preferred_start < min || preferred_start > max {
            min
        } else {
            preferred_start
        };
        Self::new(start, max)
    }

    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn is_inverted(&self) -> bool {
        self.start_date > self.end_date
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// "Mar 01, 2024 to Jun 30, 2024"
    pub fn date_range_label(&self) -> String {
        format!(
            "{} to {}",
            self.start_date.format("%b %d, %Y"),
            self.end_date.format("%b %d, %Y")
        )
    }
}

/// Parse an optional secondary filter, treating "All" as no filter.
pub fn optional_selection(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}
