use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// Two consecutive years, second one in 2- or 4-digit form: 2014-15, 2014_2015, 2014 - 2015.
static FY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})\s*[-_–]\s*([0-9]{4}|[0-9]{2})(?:[^0-9]|$)")
        .expect("fiscal-year regex")
});

/// A fiscal year spanning `start`..=`end`, where `end == start + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FiscalYearLabel {
    pub start: i32,
    pub end: i32,
}

impl FiscalYearLabel {
    pub fn new(start: i32) -> Self {
        Self {
            start,
            end: start + 1,
        }
    }

    /// The integer written to the `FiscalYear` column.
    pub fn fiscal_year(&self) -> i32 {
        self.start
    }

    /// `"2014 - 2015"`.
    pub fn display(&self) -> String {
        format!("{} - {}", self.start, self.end)
    }

    /// Extract the first valid two-year token from a file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        FY_TOKEN
            .captures_iter(name)
            .find_map(|c| Self::from_parts(c.get(1)?.as_str(), c.get(2)?.as_str()))
    }

    /// Parse a value as it appears inside a row, e.g. `"2014 - 2015"` or `"2014-15"`.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = FY_TOKEN.captures(value.trim())?;
        Self::from_parts(caps.get(1)?.as_str(), caps.get(2)?.as_str())
    }

    fn from_parts(start: &str, end: &str) -> Option<Self> {
        let start: i32 = start.parse().ok()?;
        let end_raw: i32 = end.parse().ok()?;
        let consecutive = if end.len() == 2 {
            (start + 1) % 100 == end_raw
        } else {
            start + 1 == end_raw
        };
        consecutive.then(|| Self::new(start))
    }
}

impl fmt::Display for FiscalYearLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}
