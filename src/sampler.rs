use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Source of synthetic measurements for one producer.
///
/// Implementations must return values in the configured `[min, max)`; a
/// value outside it aborts the run.
pub trait Sampler {
    fn sample(&mut self) -> f64;
}

pub struct UniformSampler {
    rng: StdRng,
    dist: Uniform<f64>,
}

impl UniformSampler {
    /// Requires a finite `min < max`.
    pub fn new(min: f64, max: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            dist: Uniform::new(min, max),
        }
    }

    /// Seed for producer `index`, spreading a base seed across workers.
    pub fn worker_seed(base: u64, index: usize) -> u64 {
        base.wrapping_mul(index as u64 + 1)
    }
}

impl Sampler for UniformSampler {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}
