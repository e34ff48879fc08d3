/// Monte Carlo replication and statistical summary module

use serde::Serialize;

use crate::rng::derive_seed;
use crate::stats::{percentile, sorted_copy, RunningStats};

/// Summary of one quantity across replications
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloStats {
    pub num_replications: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub std_error: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub percentile_50: f64, // Median
    pub percentile_75: f64,
    pub percentile_90: f64,
}

impl MonteCarloStats {
    /// Summarise replication totals
    pub fn from_values(values: &[f64]) -> Self {
        let stats = RunningStats::from_values(values);
        let sorted = sorted_copy(values);

        MonteCarloStats {
            num_replications: values.len(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
            std_error: stats.std_error(),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
            percentile_10: percentile(&sorted, 10.0),
            percentile_25: percentile(&sorted, 25.0),
            percentile_50: percentile(&sorted, 50.0),
            percentile_75: percentile(&sorted, 75.0),
            percentile_90: percentile(&sorted, 90.0),
        }
    }
}

/// Run `replications` independent replications, each with its own derived seed
/// Results come back in replication order
pub fn replicate<T, F>(replications: usize, base_seed: u32, mut run: F) -> Vec<T>
where
    F: FnMut(u32) -> T,
{
    (0..replications)
        .map(|index| run(derive_seed(base_seed, index)))
        .collect()
}
