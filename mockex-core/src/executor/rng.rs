use rand::Rng;
use std::fmt::Debug;

/// Randomness source driving the stochastic execution pass.
///
/// The skip gate and the fill-size draw are separate decisions, so deterministic
/// implementations can pin either one independently.
pub trait ExecutionRng: Debug + Send + Sync {
    /// Uniform draw from `[0, 1)`.
    fn roll(&self) -> f64;

    /// Exponential draw with the provided mean.
    fn exponential(&self, mean: f64) -> f64;
}

/// Production [`ExecutionRng`] drawing from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRng;

impl ExecutionRng for SystemRng {
    fn roll(&self) -> f64 {
        rand::rng().random()
    }

    fn exponential(&self, mean: f64) -> f64 {
        // Inverse transform sampling: -mean * ln(1 - U), U uniform in [0, 1).
        let uniform: f64 = rand::rng().random();
        -mean * (1.0 - uniform).ln()
    }
}

/// Deterministic [`ExecutionRng`] returning pinned values. Test support.
#[derive(Debug, Clone, Copy)]
pub struct FixedRng {
    pub roll: f64,
    pub exponential: f64,
}

impl ExecutionRng for FixedRng {
    fn roll(&self) -> f64 {
        self.roll
    }

    fn exponential(&self, _mean: f64) -> f64 {
        self.exponential
    }
}
