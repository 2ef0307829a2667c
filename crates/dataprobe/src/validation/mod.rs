//! Quality detection: one detector per issue type, merged per column.

mod detectors;
mod engine;
mod issue;

pub use detectors::{
    CaseSensitivityDetector, DetectionContext, Detector, DuplicateRowDetector,
    InvalidNumericDetector, MissingValuesDetector, MixedDateFormatDetector,
    NegativeValuesDetector, OutlierDetector, SpecialCharacterDetector, UnusuallyLongDetector,
    WhitespaceDetector, NUMERIC_PATTERN,
};
pub use engine::{merge_issues, DetectorSet};
pub(crate) use engine::panic_message;
pub use issue::{Evidence, Issue, IssueType, Severity};
