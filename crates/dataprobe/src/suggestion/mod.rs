//! Fix suggestions for data quality issues.
//!
//! Each issue maps to a parameterized SQL template. Fixes are proposals for
//! a reviewer; nothing here touches data.

mod generator;
mod suggestion;

pub use generator::{generate_fix, generate_fixes, FixMapper};
pub use suggestion::{FixAction, FixSuggestion};
