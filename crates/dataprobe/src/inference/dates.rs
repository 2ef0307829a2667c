//! Date format matching over an ordered list of chrono patterns.

use chrono::{NaiveDate, NaiveDateTime};

/// Matches text against the configured date formats, in order.
#[derive(Debug, Clone)]
pub struct DateMatcher {
    formats: Vec<DateFormat>,
}

#[derive(Debug, Clone)]
struct DateFormat {
    pattern: String,
    has_time: bool,
}

impl DateMatcher {
    /// Create a matcher over chrono format strings.
    pub fn new(patterns: &[String]) -> Self {
        let formats = patterns
            .iter()
            .map(|p| DateFormat {
                has_time: ["%H", "%T", "%R", "%I", "%M:", "%S"]
                    .iter()
                    .any(|spec| p.contains(spec)),
                pattern: p.clone(),
            })
            .collect();
        Self { formats }
    }

    /// Index of the first format the value parses with.
    pub fn match_format(&self, value: &str) -> Option<usize> {
        self.matching_formats(value).next()
    }

    /// Indexes of every format the value parses with, in configured order.
    ///
    /// `05/06/2024` parses as both `%m/%d/%Y` and `%d/%m/%Y`.
    pub fn matching_formats<'a>(&'a self, value: &'a str) -> impl Iterator<Item = usize> + 'a {
        let trimmed = value.trim();
        self.formats
            .iter()
            .enumerate()
            .filter(move |(_, format)| !trimmed.is_empty() && format.parses(trimmed))
            .map(|(idx, _)| idx)
    }

    /// Whether the value parses with any format.
    pub fn is_date(&self, value: &str) -> bool {
        self.match_format(value).is_some()
    }

    /// The pattern string at an index.
    pub fn pattern(&self, index: usize) -> Option<&str> {
        self.formats.get(index).map(|f| f.pattern.as_str())
    }
}

impl DateFormat {
    fn parses(&self, value: &str) -> bool {
        if self.has_time {
            NaiveDateTime::parse_from_str(value, &self.pattern).is_ok()
        } else {
            NaiveDate::parse_from_str(value, &self.pattern).is_ok()
        }
    }
}
