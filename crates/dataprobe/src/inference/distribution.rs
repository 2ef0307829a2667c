//! Distribution statistics and IQR outlier bounds.

use crate::schema::{NumericStatistics, OutlierBounds, TextStatistics};

// =============================================================================
// STREAMING MOMENTS
// =============================================================================
// Welford's online algorithm for computing mean and variance in a single pass.

/// Streaming mean/variance accumulator using Welford's algorithm.
#[derive(Debug, Clone)]
pub(crate) struct StreamingStats {
    count: usize,
    mean: f64,
    m2: f64, // Sum of squared differences from mean
    min: f64,
    max: f64,
}

impl StreamingStats {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add a value using Welford's online algorithm.
    pub(crate) fn add(&mut self, value: f64) {
        self.count += 1;

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub(crate) fn mean(&self) -> f64 {
        self.mean
    }

    /// Get the population variance.
    pub(crate) fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    /// Get the population standard deviation.
    pub(crate) fn std(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl FromIterator<f64> for StreamingStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = StreamingStats::new();
        for value in iter {
            stats.add(value);
        }
        stats
    }
}

// =============================================================================
// QUANTILES
// =============================================================================

/// Quantile of sorted data by linear interpolation between closest ranks.
///
/// `p` is in [0, 1]. Position is `p * (n - 1)` on zero-based indices.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Compute numeric statistics over finite values. `None` when empty.
pub fn numeric_statistics(values: &[f64]) -> Option<NumericStatistics> {
    if values.is_empty() {
        return None;
    }

    let moments: StreamingStats = values.iter().copied().collect();

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(NumericStatistics {
        min: moments.min,
        max: moments.max,
        mean: moments.mean(),
        std: moments.std(),
        median: quantile_sorted(&sorted, 0.5)?,
        q1: quantile_sorted(&sorted, 0.25)?,
        q3: quantile_sorted(&sorted, 0.75)?,
    })
}

/// IQR bounds: `[q1 - m * iqr, q3 + m * iqr]`.
pub fn outlier_bounds(stats: &NumericStatistics, multiplier: f64) -> OutlierBounds {
    let iqr = stats.iqr();
    OutlierBounds {
        lower: stats.q1 - multiplier * iqr,
        upper: stats.q3 + multiplier * iqr,
    }
}

/// Length statistics over text values, measured in characters.
pub fn text_statistics<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<TextStatistics> {
    let lengths: Vec<usize> = values.into_iter().map(|v| v.chars().count()).collect();
    if lengths.is_empty() {
        return None;
    }

    let moments: StreamingStats = lengths.iter().map(|&l| l as f64).collect();

    Some(TextStatistics {
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        mean_length: moments.mean(),
        std_length: moments.std(),
    })
}
