//! Quality detectors, one per issue type.
//!
//! Every detector looks at a single column: its [`Profile`] and its raw
//! values. Duplicate rows are the one table-level check and live in
//! [`DuplicateRowDetector`].

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::inference::DateMatcher;
use crate::input::{DataTable, Value};
use crate::schema::{ColumnType, Profile, RunId, TableId};

use super::issue::{Evidence, Issue, IssueType, Severity};

/// Pattern a value must match to count as a plain number in SQL fixes.
pub const NUMERIC_PATTERN: &str = r"^-?\d+(\.\d+)?$";

/// Maximum number of example values and sample rows kept as evidence.
const MAX_EXAMPLES: usize = 5;

static REPEATED_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("repeated whitespace pattern"));

/// Everything a detector needs besides the column itself.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub config: &'a ProbeConfig,
    pub dates: &'a DateMatcher,
    pub table_id: &'a TableId,
    pub run_id: &'a RunId,
    /// Run timestamp; detectors never read the clock.
    pub detected_at: DateTime<Utc>,
}

impl<'a> DetectionContext<'a> {
    /// Build an issue, scoring severity from `affected / total`.
    pub fn issue(
        &self,
        column: Option<&str>,
        issue_type: IssueType,
        affected: usize,
        total: usize,
        description: impl Into<String>,
    ) -> Issue {
        let fraction = if total == 0 {
            0.0
        } else {
            affected as f64 / total as f64
        };
        Issue {
            id: Issue::make_id(self.run_id, column, issue_type),
            table_id: self.table_id.clone(),
            column: column.map(str::to_string),
            issue_type,
            severity: Severity::from_fraction(fraction, &self.config.severity_bands),
            affected_count: affected,
            affected_fraction: fraction,
            description: description.into(),
            evidence: Evidence::new(),
            detected_at: self.detected_at,
            run_id: self.run_id.clone(),
        }
    }

    fn is_null(&self, value: &Value) -> bool {
        value.is_null(&self.config.null_tokens)
    }
}

/// Trait for column-level detectors.
pub trait Detector: Send + Sync {
    /// Name reported when the detector fails.
    fn name(&self) -> &'static str;

    /// The issue type this detector reports.
    fn issue_type(&self) -> IssueType;

    /// Evaluate one column. `Ok(None)` means the column is clean.
    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>>;
}

/// Offending values found while scanning a column.
#[derive(Debug, Default)]
struct Matches {
    count: usize,
    rows: Vec<usize>,
    examples: IndexSet<String>,
}

impl Matches {
    fn record(&mut self, row: usize, value: &Value) {
        self.count += 1;
        if self.rows.len() < MAX_EXAMPLES {
            self.rows.push(row);
        }
        if self.examples.len() < MAX_EXAMPLES {
            self.examples.insert(value.render().into_owned());
        }
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn evidence(self) -> Evidence {
        Evidence::new()
            .with_examples(self.examples)
            .with_sample_rows(self.rows)
    }
}

/// Scan the non-null values of a column.
fn scan<F>(values: &[Value], ctx: &DetectionContext<'_>, mut offending: F) -> Matches
where
    F: FnMut(&Value) -> bool,
{
    let mut matches = Matches::default();
    for (row, value) in values.iter().enumerate() {
        if !ctx.is_null(value) && offending(value) {
            matches.record(row, value);
        }
    }
    matches
}

fn ensure_aligned(detector: &str, profile: &Profile, values: &[Value]) -> Result<()> {
    if profile.total_count != values.len() {
        return Err(ProbeError::detector(
            detector,
            &profile.column,
            format!(
                "profile covers {} values but {} were supplied",
                profile.total_count,
                values.len()
            ),
        ));
    }
    Ok(())
}

fn numeric_values<'v>(
    values: &'v [Value],
    ctx: &'v DetectionContext<'_>,
) -> impl Iterator<Item = (usize, &'v Value, f64)> + 'v {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !ctx.is_null(v))
        .filter_map(|(row, v)| v.as_f64().map(|n| (row, v, n)))
}

// =============================================================================
// MISSING VALUES
// =============================================================================

/// Flags columns that contain nulls or null tokens.
pub struct MissingValuesDetector;

impl Detector for MissingValuesDetector {
    fn name(&self) -> &'static str {
        "missing_values_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::MissingValues
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;
        if profile.null_count == 0 {
            return Ok(None);
        }

        let mut matches = Matches::default();
        for (row, value) in values.iter().enumerate() {
            if ctx.is_null(value) {
                matches.record(row, value);
            }
        }

        // Median for numbers, a marker for text, nothing safe for dates or booleans
        let fill_value = match &profile.numeric {
            Some(stats) if profile.inferred_type.is_numeric() => json!(stats.median),
            _ if profile.inferred_type.is_textual() => json!("UNKNOWN"),
            _ => JsonValue::Null,
        };

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::MissingValues,
                profile.null_count,
                profile.total_count,
                format!(
                    "{} null/missing values ({:.1}%)",
                    profile.null_count,
                    profile.null_fraction() * 100.0
                ),
            )
            .with_evidence(
                matches
                    .evidence()
                    .with_param("null_count", profile.null_count)
                    .with_param("fill_value", fill_value),
            );
        Ok(Some(issue))
    }
}

// =============================================================================
// INVALID NUMERIC
// =============================================================================

/// Flags text residue in numeric columns and numbers hiding in text columns.
pub struct InvalidNumericDetector;

impl Detector for InvalidNumericDetector {
    fn name(&self) -> &'static str {
        "invalid_numeric_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::InvalidNumeric
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        let (matches, expected, description) = if profile.inferred_type.is_numeric() {
            let matches = scan(values, ctx, |v| v.as_f64().is_none());
            let description = format!(
                "{} non-numeric values in numeric column",
                matches.count
            );
            (matches, "numeric", description)
        } else if profile.inferred_type.is_textual() {
            let matches = scan(values, ctx, |v| v.as_f64().is_some());
            let description = format!("{} numeric values in text column", matches.count);
            (matches, "text", description)
        } else {
            return Ok(None);
        };

        if matches.is_empty() {
            return Ok(None);
        }

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::InvalidNumeric,
                matches.count,
                profile.non_null_count(),
                description,
            )
            .with_evidence(
                matches
                    .evidence()
                    .with_param("expected", expected)
                    .with_param("numeric_pattern", NUMERIC_PATTERN),
            );
        Ok(Some(issue))
    }
}

// =============================================================================
// NEGATIVE VALUES
// =============================================================================

/// Flags negative numbers in columns declared or named as non-negative.
pub struct NegativeValuesDetector;

impl Detector for NegativeValuesDetector {
    fn name(&self) -> &'static str {
        "negative_values_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::NegativeValues
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_numeric() || !ctx.config.expects_non_negative(&profile.column)
        {
            return Ok(None);
        }
        match &profile.numeric {
            Some(stats) if stats.min < 0.0 => {}
            _ => return Ok(None),
        }

        let mut matches = Matches::default();
        let mut numeric = 0;
        for (row, value, n) in numeric_values(values, ctx) {
            numeric += 1;
            if n < 0.0 {
                matches.record(row, value);
            }
        }

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::NegativeValues,
                matches.count,
                numeric,
                format!(
                    "{} negative values in non-negative column '{}'",
                    matches.count, profile.column
                ),
            )
            .with_evidence(matches.evidence().with_param("lower_bound", 0.0));
        Ok(Some(issue))
    }
}

// =============================================================================
// OUTLIERS
// =============================================================================

/// Flags numeric values outside the profile's IQR bounds.
pub struct OutlierDetector;

impl Detector for OutlierDetector {
    fn name(&self) -> &'static str {
        "outlier_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::Outliers
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_numeric() {
            return Ok(None);
        }
        let bounds = profile.outlier_bounds.ok_or_else(|| {
            ProbeError::detector(self.name(), &profile.column, "numeric profile has no outlier bounds")
        })?;

        let mut matches = Matches::default();
        let mut numeric = 0;
        for (row, value, n) in numeric_values(values, ctx) {
            numeric += 1;
            if bounds.contains_outlier(n) {
                matches.record(row, value);
            }
        }

        if matches.is_empty() {
            return Ok(None);
        }

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::Outliers,
                matches.count,
                numeric,
                format!(
                    "{} values outside [{}, {}] (IQR method)",
                    matches.count, bounds.lower, bounds.upper
                ),
            )
            .with_evidence(
                matches
                    .evidence()
                    .with_param("lower_bound", bounds.lower)
                    .with_param("upper_bound", bounds.upper),
            );
        Ok(Some(issue))
    }
}

// =============================================================================
// MIXED DATE FORMATS
// =============================================================================

/// Flags date columns written in more than one format.
pub struct MixedDateFormatDetector;

impl Detector for MixedDateFormatDetector {
    fn name(&self) -> &'static str {
        "mixed_date_format_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::MixedDateFormats
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if profile.inferred_type != ColumnType::Date {
            return Ok(None);
        }

        // Format index -> rows it parses; a value counts for every format it fits
        let mut coverage: IndexMap<usize, Vec<usize>> = IndexMap::new();
        // Row -> first format it parses with
        let mut dated: Vec<(usize, usize)> = Vec::new();
        for (row, value) in values.iter().enumerate() {
            if ctx.is_null(value) {
                continue;
            }
            let Some(text) = value.as_str() else {
                continue;
            };
            let mut first = None;
            for idx in ctx.dates.matching_formats(text) {
                coverage.entry(idx).or_default().push(row);
                first.get_or_insert(idx);
            }
            if let Some(idx) = first {
                dated.push((row, idx));
            }
        }

        // Widest coverage wins; ties go to the earlier configured format
        let Some((dominant, dominant_rows)) = coverage
            .iter()
            .max_by(|(ia, ra), (ib, rb)| ra.len().cmp(&rb.len()).then(ib.cmp(ia)))
        else {
            return Ok(None);
        };

        let mut matches = Matches::default();
        let mut seen: IndexSet<usize> = IndexSet::from([*dominant]);
        for &(row, first) in &dated {
            if dominant_rows.binary_search(&row).is_err() {
                matches.record(row, &values[row]);
                seen.insert(first);
            }
        }
        if matches.is_empty() {
            return Ok(None);
        }

        let pattern = |idx: usize| ctx.dates.pattern(idx).unwrap_or_default().to_string();
        let seen: Vec<String> = seen.iter().map(|idx| pattern(*idx)).collect();
        let dominant = pattern(*dominant);

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::MixedDateFormats,
                matches.count,
                dated.len(),
                format!("{} date formats in use: {}", seen.len(), seen.join(", ")),
            )
            .with_evidence(
                matches
                    .evidence()
                    .with_param("dominant_format", dominant)
                    .with_param("formats", seen),
            );
        Ok(Some(issue))
    }
}

// =============================================================================
// TEXT CHECKS
// =============================================================================

/// Flags the same value spelled with different letter case.
pub struct CaseSensitivityDetector;

impl Detector for CaseSensitivityDetector {
    fn name(&self) -> &'static str {
        "case_sensitivity_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::CaseSensitivity
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_textual() {
            return Ok(None);
        }

        // Folded value -> raw spellings in first-seen order
        let mut groups: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for value in values.iter().filter(|v| !ctx.is_null(v)) {
            let raw = value.render();
            groups
                .entry(raw.to_lowercase())
                .or_default()
                .insert(raw.into_owned());
        }

        let raw_distinct: usize = groups.values().map(IndexSet::len).sum();
        let folded_distinct = groups.len();
        if folded_distinct >= raw_distinct {
            return Ok(None);
        }

        let examples: Vec<String> = groups
            .values()
            .filter(|spellings| spellings.len() > 1)
            .flat_map(|spellings| spellings.iter().cloned())
            .take(MAX_EXAMPLES)
            .collect();
        let redundant = raw_distinct - folded_distinct;

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::CaseSensitivity,
                redundant,
                raw_distinct,
                format!(
                    "{} distinct values collapse to {} when case is ignored",
                    raw_distinct, folded_distinct
                ),
            )
            .with_evidence(
                Evidence::new()
                    .with_examples(examples)
                    .with_param("canonical_case", "lower"),
            );
        Ok(Some(issue))
    }
}

/// Flags leading, trailing or repeated internal whitespace.
pub struct WhitespaceDetector;

impl Detector for WhitespaceDetector {
    fn name(&self) -> &'static str {
        "whitespace_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::WhitespaceIssues
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_textual() {
            return Ok(None);
        }

        let matches = scan(values, ctx, |v| {
            v.as_str()
                .is_some_and(|s| s.trim() != s || REPEATED_WHITESPACE.is_match(s))
        });
        if matches.is_empty() {
            return Ok(None);
        }

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::WhitespaceIssues,
                matches.count,
                profile.non_null_count(),
                format!("{} values with stray whitespace", matches.count),
            )
            .with_evidence(matches.evidence());
        Ok(Some(issue))
    }
}

/// Flags characters outside alphanumerics, whitespace and allowed punctuation.
pub struct SpecialCharacterDetector;

impl SpecialCharacterDetector {
    /// SQL character class matching disallowed characters. `[:alnum:]` keeps
    /// letters and digits of any script, as the detector does.
    pub fn disallowed_pattern(allowed_punctuation: &str) -> String {
        format!("[^[:alnum:]\\s{}]", regex::escape(allowed_punctuation))
    }
}

impl Detector for SpecialCharacterDetector {
    fn name(&self) -> &'static str {
        "special_character_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::SpecialCharacters
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_textual() {
            return Ok(None);
        }

        let allowed = &ctx.config.allowed_punctuation;
        let matches = scan(values, ctx, |v| {
            v.render().chars().any(|c| {
                !(c.is_alphanumeric() || c.is_whitespace() || allowed.contains(c))
            })
        });
        if matches.is_empty() {
            return Ok(None);
        }

        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::SpecialCharacters,
                matches.count,
                profile.non_null_count(),
                format!("{} values with special characters", matches.count),
            )
            .with_evidence(
                matches
                    .evidence()
                    .with_param("disallowed_pattern", Self::disallowed_pattern(allowed)),
            );
        Ok(Some(issue))
    }
}

/// Flags text longer than mean + 3 standard deviations of the column's lengths.
pub struct UnusuallyLongDetector;

impl Detector for UnusuallyLongDetector {
    fn name(&self) -> &'static str {
        "unusually_long_detector"
    }

    fn issue_type(&self) -> IssueType {
        IssueType::UnusuallyLongValues
    }

    fn detect(
        &self,
        profile: &Profile,
        values: &[Value],
        ctx: &DetectionContext<'_>,
    ) -> Result<Option<Issue>> {
        ensure_aligned(self.name(), profile, values)?;

        if !profile.inferred_type.is_textual() {
            return Ok(None);
        }
        let Some(stats) = &profile.text else {
            return Ok(None);
        };
        if stats.std_length == 0.0 {
            return Ok(None);
        }

        let limit = stats.mean_length + 3.0 * stats.std_length;
        let mut matches = scan(values, ctx, |v| v.render().chars().count() as f64 > limit);
        if matches.is_empty() {
            return Ok(None);
        }

        // Long values make poor examples; keep a prefix
        matches.examples = matches
            .examples
            .into_iter()
            .map(|e| match e.char_indices().nth(50) {
                Some((cut, _)) => format!("{}...", &e[..cut]),
                None => e,
            })
            .collect();

        let max_length = limit.floor() as u64;
        let issue = ctx
            .issue(
                Some(&profile.column),
                IssueType::UnusuallyLongValues,
                matches.count,
                profile.non_null_count(),
                format!(
                    "{} values longer than {} characters (max {})",
                    matches.count, max_length, stats.max_length
                ),
            )
            .with_evidence(matches.evidence().with_param("max_length", max_length));
        Ok(Some(issue))
    }
}

// =============================================================================
// DUPLICATE ROWS
// =============================================================================

/// Table-level check for exact-duplicate rows.
///
/// Rows are fingerprinted with SHA-256 over their rendered cells; null and
/// null tokens hash alike.
pub struct DuplicateRowDetector;

impl DuplicateRowDetector {
    pub fn name(&self) -> &'static str {
        "duplicate_row_detector"
    }

    fn fingerprint(table: &DataTable, row: usize, null_tokens: &[String]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for value in table.row(row) {
            if value.is_null(null_tokens) {
                hasher.update([0u8]);
            } else {
                let rendered = value.render();
                hasher.update([1u8]);
                hasher.update((rendered.len() as u64).to_le_bytes());
                hasher.update(rendered.as_bytes());
            }
        }
        hasher.finalize().into()
    }

    /// Evaluate the whole table.
    pub fn detect(&self, table: &DataTable, ctx: &DetectionContext<'_>) -> Result<Option<Issue>> {
        let mut seen: IndexMap<[u8; 32], usize> = IndexMap::new();
        let mut duplicate_rows = Vec::new();
        let mut first_copies = IndexSet::new();

        for row in 0..table.row_count() {
            let fingerprint = Self::fingerprint(table, row, &ctx.config.null_tokens);
            match seen.get(&fingerprint) {
                Some(&first) => {
                    duplicate_rows.push(row);
                    first_copies.insert(first);
                }
                None => {
                    seen.insert(fingerprint, row);
                }
            }
        }

        if duplicate_rows.is_empty() {
            return Ok(None);
        }

        let examples: Vec<String> = first_copies
            .iter()
            .take(MAX_EXAMPLES)
            .map(|&row| {
                table
                    .row(row)
                    .map(|v| v.render().into_owned())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();

        let count = duplicate_rows.len();
        let issue = ctx
            .issue(
                None,
                IssueType::Duplicates,
                count,
                table.row_count(),
                format!("{} duplicate rows", count),
            )
            .with_evidence(
                Evidence::new()
                    .with_examples(examples)
                    .with_sample_rows(duplicate_rows.into_iter().take(MAX_EXAMPLES).collect())
                    .with_param("key_columns", table.headers.clone()),
            );
        Ok(Some(issue))
    }
}
