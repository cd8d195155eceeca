use log::debug;

use crate::error::Result;
use crate::pipeline::{self, PipelineConfig};

const PROBE_MIN_SECS: f64 = 0.25;
const PROBE_START_N: u64 = 10_000;
const MIN_N: u64 = 10_000;
const MAX_N: u64 = 100_000_000;
const TARGET_RUN_SECS: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct CalibrationResult {
    pub target_count: u64,
    pub probe_samples_per_sec: f64,
}

/// Picks a sample count that makes one queued run take about
/// `TARGET_RUN_SECS` on this machine with this configuration.
pub fn calibrate(config: &PipelineConfig) -> Result<CalibrationResult> {
    // Exponentially scale up until a single probe takes long enough to trust.
    let mut probe_n = PROBE_START_N;
    let mut rate;

    loop {
        let probe = PipelineConfig {
            target_count: probe_n,
            ..config.clone()
        };
        let report = pipeline::run(&probe)?;
        let elapsed_s = report.elapsed.as_secs_f64();
        rate = report.samples_per_sec();
        debug!("calibration probe: {probe_n} samples in {elapsed_s:.3}s");

        if elapsed_s >= PROBE_MIN_SECS || probe_n >= MAX_N {
            break;
        }
        // Scale up: estimate needed N, with 1.5x margin
        let factor = if elapsed_s > 0.0 {
            (PROBE_MIN_SECS / elapsed_s * 1.5).max(2.0)
        } else {
            10.0
        };
        probe_n = ((probe_n as f64 * factor) as u64).min(MAX_N);
    }

    let n = if rate > 0.0 {
        (rate * TARGET_RUN_SECS) as u64
    } else {
        MIN_N
    };
    let n = n.clamp(MIN_N, MAX_N);
    let n = ((n + 500) / 1000) * 1000;

    Ok(CalibrationResult {
        target_count: n,
        probe_samples_per_sec: rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrated_count_is_rounded_and_bounded() {
        let config = PipelineConfig {
            producer_count: 2,
            consumer_count: 2,
            seed: Some(1),
            ..PipelineConfig::default()
        };
        let cal = calibrate(&config).unwrap();
        assert!((MIN_N..=MAX_N).contains(&cal.target_count));
        assert_eq!(cal.target_count % 1000, 0);
        assert!(cal.probe_samples_per_sec > 0.0);
    }

    #[test]
    fn invalid_config_fails_calibration() {
        let config = PipelineConfig {
            bin_count: 0,
            ..PipelineConfig::default()
        };
        assert!(calibrate(&config).is_err());
    }
}
