//! Path-integral stochastic model-predictive control over reduced 2D
//! multi-agent dynamics.
//!
//! - `model`: the pluggable dynamics trait and its two variants
//! - `sampler`: horizon rollouts (running reward/cost, one-step prediction)
//! - `controller`: the receding-horizon path-integral control law

pub mod controller;
pub mod model;
pub mod sampler;

pub use controller::{ControlDecision, CycleDiagnostics, PiController, PiError};
pub use model::{build_model, DynamicsModel, FreeRollout, Pursuit};
pub use sampler::Sampler;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_nonempty() {
        assert!(!VERSION.is_empty());
    }
}

#[cfg(test)]
mod controller_tests;
