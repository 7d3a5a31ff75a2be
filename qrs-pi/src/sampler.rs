//! Horizon rollouts over a dynamics model.
//!
//! A control sequence is `H` coarse steps; each coarse step applies the
//! same control for `dtperstep` fine steps of duration `dt`.

use qrs_core::PiParams;

use crate::model::DynamicsModel;

pub struct Sampler {
    model: Box<dyn DynamicsModel>,
    params: PiParams,
}

impl Sampler {
    pub fn new(model: Box<dyn DynamicsModel>, params: PiParams) -> Self {
        Self { model, params }
    }

    /// Accumulated state reward of one rollout from `x0` under `control`.
    ///
    /// Left Riemann sum: each fine step credits `immediate_state_reward
    /// * dt` at the state BEFORE stepping, and the terminal state adds
    /// `end_state_reward` once.
    pub fn running_state_reward(&mut self, x0: &[f64], control: &[Vec<f64>]) -> f64 {
        self.model.set_state(x0);
        let mut v = 0.0;
        for cs in control.iter().take(self.params.horizon) {
            for _ in 0..self.params.dtperstep {
                v += self.model.immediate_state_reward() * self.params.dt;
                self.model.step(cs);
            }
        }
        v + self.model.end_state_reward()
    }

    /// Total control cost of a sequence: Σ over coarse steps, scaled by
    /// the coarse step duration `dS`.
    pub fn running_control_cost(&self, control: &[Vec<f64>]) -> f64 {
        let c: f64 = control
            .iter()
            .take(self.params.horizon)
            .map(|cs| self.model.immediate_control_cost(cs))
            .sum();
        c * self.params.ds
    }

    /// State reached after one coarse step from `x` under `a`.
    pub fn predict_state(&mut self, x: &[f64], a: &[f64]) -> Vec<f64> {
        self.model.set_state(x);
        for _ in 0..self.params.dtperstep {
            self.model.step(a);
        }
        self.model.state().to_vec()
    }
}
