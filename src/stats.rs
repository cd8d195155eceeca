use std::time::Duration;

/// Trimming needs at least this many rounds to leave something behind.
const MIN_ROUNDS_TO_TRIM: usize = 4;

/// Summary of one strategy's round timings, in nanoseconds.
#[derive(Clone, Debug, Default)]
pub struct StatResult {
    pub mean: f64,
    /// Mean without the fastest and slowest round, once there are enough
    /// rounds to spare them.
    pub trimmed_mean: f64,
    pub median: f64,
    /// Sample standard deviation; zero for a single round.
    pub stddev: f64,
    pub min: u64,
    pub max: u64,
    pub count: usize,
}

impl StatResult {
    pub fn from_durations(elapsed: &[Duration]) -> Self {
        let mut ns: Vec<u64> = elapsed
            .iter()
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .collect();
        if ns.is_empty() {
            return Self::default();
        }
        ns.sort_unstable();

        let n = ns.len();
        let mean = mean_of(&ns);
        let median = if n % 2 == 0 {
            (ns[n / 2 - 1] as f64 + ns[n / 2] as f64) / 2.0
        } else {
            ns[n / 2] as f64
        };
        let stddev = if n > 1 {
            let ss: f64 = ns.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        let trimmed_mean = if n >= MIN_ROUNDS_TO_TRIM {
            mean_of(&ns[1..n - 1])
        } else {
            mean
        };

        Self {
            mean,
            trimmed_mean,
            median,
            stddev,
            min: ns[0],
            max: ns[n - 1],
            count: n,
        }
    }

    /// Throughput of a run that classified `samples` items in `mean` time.
    pub fn samples_per_sec(&self, samples: u64) -> f64 {
        if self.mean <= 0.0 {
            0.0
        } else {
            samples as f64 * 1e9 / self.mean
        }
    }
}

fn mean_of(ns: &[u64]) -> f64 {
    ns.iter().map(|&v| v as f64).sum::<f64>() / ns.len() as f64
}
