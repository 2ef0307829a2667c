//! Type & stats engine: semantic type inference and column profiles.

mod dates;
mod distribution;
mod statistical;

pub use dates::DateMatcher;
pub use distribution::{numeric_statistics, outlier_bounds, quantile_sorted, text_statistics};
pub use statistical::{StatisticalAnalyzer, TypeCounts};
