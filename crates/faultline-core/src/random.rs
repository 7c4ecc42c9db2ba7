//! Deterministic random-number plumbing for Monte Carlo analyses.
//!
//! One master seed governs a whole run. Every trial derives its own
//! independent generator from the master seed and the trial index, so
//! results are bit-stable regardless of how trials are scheduled across
//! worker threads.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Resolves the run's master seed: the configured one, or a wall-clock
/// derived seed when the caller left it open.
pub fn resolve_seed(configured: Option<u64>) -> u64 {
    configured.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    })
}

/// The generator for one Monte Carlo trial.
pub fn trial_rng(master_seed: u64, trial: u64) -> StdRng {
    StdRng::seed_from_u64(master_seed ^ trial)
}

/// A seedable, forkable uniform generator, the engine-facing face of the
/// external RNG contract.
#[derive(Debug)]
pub struct AnalysisRng {
    inner: StdRng,
}

impl AnalysisRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// A draw from [0, 1).
    pub fn next_uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Reseeds this generator in place.
    pub fn seed(&mut self, seed: u64) {
        self.inner = StdRng::seed_from_u64(seed);
    }

    /// Splits off an independent generator for a parallel worker.
    pub fn fork(&mut self) -> Self {
        Self {
            inner: StdRng::seed_from_u64(self.inner.next_u64()),
        }
    }
}

impl RngCore for AnalysisRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
