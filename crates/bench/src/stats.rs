//! Summary statistics over measured repetitions.

use serde::{Deserialize, Serialize};

/// Statistics of per-repetition elapsed times, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl TimingStats {
    /// `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let len = sorted.len();
        let mean = sorted.iter().sum::<f64>() / len as f64;
        let median = if len % 2 == 0 {
            (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
        } else {
            sorted[len / 2]
        };
        let variance = sorted
            .iter()
            .map(|&s| {
                let diff = s - mean;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;

        Some(Self {
            min: sorted[0],
            median,
            mean,
            max: sorted[len - 1],
            std_dev: variance.sqrt(),
        })
    }
}
