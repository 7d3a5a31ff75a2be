//! Receding-horizon path-integral controller.
//!
//! Keeps one exploring control trajectory `u_exp` across invocations
//! (the warm start), perturbs it with Gaussian rollouts, reweights them
//! by exponentiated value, and emits the weighted first-step control.

use qrs_core::{ModelKind, PiParams};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::model::build_model;
use crate::sampler::Sampler;

/// Rollouts whose value falls more than this many `lambda` below the
/// ensemble maximum get a hard zero weight.
const WEIGHT_CUTOFF_LAMBDAS: f64 = 20.0;

#[derive(Debug, Error)]
pub enum PiError {
    #[error("all {rollouts} rollout weights underflowed (v_max = {v_max})")]
    DegenerateWeights { rollouts: usize, v_max: f64 },
    #[error("got {got} per-agent state vectors, model has {expected} agents")]
    AgentCountMismatch { got: usize, expected: usize },
    #[error("per-agent state vector too short: {got} components, need {need}")]
    StateTooShort { got: usize, need: usize },
    #[error("warm-start trajectory has wrong shape: {msg}")]
    BadTrajectory { msg: &'static str },
}

/// Per-cycle diagnostics for logging and tuning.
#[derive(Debug, Clone, Copy)]
pub struct CycleDiagnostics {
    /// Value of the exploring trajectory after all promotions.
    pub v_exp: f64,
    /// Maximum Girsanov-corrected rollout value.
    pub v_max: f64,
    /// Sum of importance weights.
    pub weight_sum: f64,
    /// Effective sample size, (ΣW)²/ΣW².
    pub ess: f64,
}

/// One control cycle's output.
#[derive(Debug, Clone)]
pub struct ControlDecision {
    /// Reduced control action, 2 components per agent.
    pub action: Vec<f64>,
    /// Per-agent simulator velocity commands [vx, vy, vz=0].
    pub sim_commands: Vec<Vec<f64>>,
    pub diagnostics: CycleDiagnostics,
}

pub struct PiController {
    params: PiParams,
    sampler: Sampler,
    rng: ChaCha8Rng,
    /// [H][dim_u] exploring trajectory, the only cross-cycle state.
    u_exp: Vec<Vec<f64>>,
}

impl PiController {
    /// Build a controller with a zeroed exploring trajectory and a
    /// deterministic noise stream.
    pub fn new(params: PiParams, model_kind: ModelKind, seed: u64) -> Self {
        let model = build_model(model_kind, params);
        Self {
            sampler: Sampler::new(model, params),
            rng: ChaCha8Rng::seed_from_u64(seed),
            u_exp: vec![vec![0.0; params.dim_u()]; params.horizon],
            params,
        }
    }

    /// The exploring trajectory as it will be shifted next cycle.
    pub fn trajectory(&self) -> &[Vec<f64>] {
        &self.u_exp
    }

    /// Replace the exploring trajectory, e.g. to resume a run.
    pub fn warm_start(&mut self, trajectory: Vec<Vec<f64>>) -> Result<(), PiError> {
        if trajectory.len() != self.params.horizon {
            return Err(PiError::BadTrajectory {
                msg: "length != horizon",
            });
        }
        if trajectory.iter().any(|u| u.len() != self.params.dim_u()) {
            return Err(PiError::BadTrajectory {
                msg: "control vector length != 2*units",
            });
        }
        self.u_exp = trajectory;
        Ok(())
    }

    /// One control cycle over the latest simulator state.
    pub fn compute_control(&mut self, x_sim: &[Vec<f64>]) -> Result<ControlDecision, PiError> {
        let state = self.reduce_state(x_sim)?;
        let h = self.params.horizon;
        let dim_u = self.params.dim_u();
        let n = self.params.rollouts;

        // Receding horizon: shift left, append a zero control.
        self.u_exp.rotate_left(1);
        self.u_exp[h - 1] = vec![0.0; dim_u];

        let mut v_exp = self.sampler.running_state_reward(&state, &self.u_exp)
            - self.sampler.running_control_cost(&self.u_exp);

        let normal = if self.params.stdv > 0.0 {
            // stdv is finite and positive here, Normal::new cannot fail
            Normal::new(0.0, self.params.stdv).ok()
        } else {
            None
        };

        let mut v_roll = vec![0.0; n];
        let mut u_init = vec![vec![0.0; dim_u]; n];
        let mut noise = vec![vec![0.0; dim_u]; h];
        let mut u_roll = vec![vec![0.0; dim_u]; h];
        let mut v_max = f64::NEG_INFINITY;

        for k in 0..n {
            // Perturb the CURRENT exploring trajectory; promotions below
            // redirect later rollouts around the improved one.
            for s in 0..h {
                for i in 0..dim_u {
                    noise[s][i] = match &normal {
                        Some(dist) => dist.sample(&mut self.rng),
                        None => 0.0,
                    };
                    u_roll[s][i] = self.u_exp[s][i] + noise[s][i];
                }
            }
            u_init[k].copy_from_slice(&u_roll[0]);

            v_roll[k] = self.sampler.running_state_reward(&state, &u_roll)
                - self.sampler.running_control_cost(&u_roll);

            // Elitist promotion: strictly better rollouts become the new
            // exploring trajectory immediately.
            if v_roll[k] > v_exp {
                v_exp = v_roll[k];
                self.u_exp.clone_from(&u_roll);
            }

            // Girsanov correction for sampling under the perturbed
            // measure; applied after promotion on purpose.
            v_roll[k] += self.sampler.running_control_cost(&noise);

            if v_roll[k] > v_max {
                v_max = v_roll[k];
            }
        }

        // Softmax reweighting, rescaled by v_max so exp never overflows.
        let lambda = self.params.lambda;
        let mut sum1 = 0.0;
        let mut sum2 = 0.0;
        let mut action = vec![0.0; dim_u];
        for k in 0..n {
            let dv = v_roll[k] - v_max;
            if dv >= -WEIGHT_CUTOFF_LAMBDAS * lambda {
                // lambda == 0 degenerates to counting only the maxima
                let w = if lambda == 0.0 { 1.0 } else { (dv / lambda).exp() };
                sum1 += w;
                sum2 += w * w;
                for i in 0..dim_u {
                    action[i] += w * u_init[k][i];
                }
            }
        }
        if sum1 == 0.0 {
            return Err(PiError::DegenerateWeights {
                rollouts: n,
                v_max,
            });
        }
        for a in &mut action {
            *a /= sum1;
        }

        // Translate the reduced action into per-agent velocity commands
        // by predicting one coarse step ahead.
        let next = self.sampler.predict_state(&state, &action);
        let sim_commands = (0..self.params.units)
            .map(|i| vec![next[4 * i + 2], next[4 * i + 3], 0.0])
            .collect();

        Ok(ControlDecision {
            action,
            sim_commands,
            diagnostics: CycleDiagnostics {
                v_exp,
                v_max,
                weight_sum: sum1,
                ess: if sum2 > 0.0 { sum1 * sum1 / sum2 } else { 0.0 },
            },
        })
    }

    /// Project per-agent simulator vectors onto the reduced state:
    /// position components 0,1 and body-frame velocity components 6,7.
    fn reduce_state(&self, x_sim: &[Vec<f64>]) -> Result<Vec<f64>, PiError> {
        if x_sim.len() != self.params.units {
            return Err(PiError::AgentCountMismatch {
                got: x_sim.len(),
                expected: self.params.units,
            });
        }
        let mut state = vec![0.0; self.params.dim_x()];
        for (i, xi) in x_sim.iter().enumerate() {
            if xi.len() < 8 {
                return Err(PiError::StateTooShort {
                    got: xi.len(),
                    need: 8,
                });
            }
            state[4 * i] = xi[0];
            state[4 * i + 1] = xi[1];
            state[4 * i + 2] = xi[6];
            state[4 * i + 3] = xi[7];
        }
        Ok(state)
    }
}
