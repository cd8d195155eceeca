use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// A pipeline configuration that cannot be run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("bin count must be greater than zero")]
    NoBins,

    #[error("measurement range [{min}, {max}) is empty or not finite")]
    EmptyRange { min: f64, max: f64 },

    #[error("measurement range [{min}, {max}) is too wide to split into bins")]
    RangeOverflow { min: f64, max: f64 },

    #[error("at least one producer is required")]
    NoProducers,

    #[error("at least one consumer is required")]
    NoConsumers,

    #[error("queue capacity must be greater than zero")]
    NoCapacity,
}

/// A sampled value fell outside the configured measurement range.
///
/// This means the sampler broke its range contract, so the run is aborted
/// rather than retried.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("measurement {value} does not belong to any bin in [{min}, {max})")]
pub struct ClassificationError {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot hold {samples} pre-generated samples: {source}")]
    Pregenerate {
        samples: u64,
        #[source]
        source: TryReserveError,
    },

    #[error("{role} thread panicked")]
    WorkerPanicked { role: &'static str },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
