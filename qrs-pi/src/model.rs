//! Reduced planar dynamics used for rollout sampling.
//!
//! State is flat, 4 components per agent: [x, y, vx, vy]. Control is 2
//! components per agent (planar acceleration). Rewards are negative
//! costs; a rollout wants them large.

use qrs_core::{ModelKind, PiParams};

/// Squared-distance floor for the inverse-square collision term.
const MIN_DIST_SQ: f64 = 1e-5;

/// Capability set shared by all dynamics variants.
///
/// `step` advances the internal state by one fine increment `dt`.
/// `immediate_control_cost` and `end_state_reward` are uniform across
/// variants and provided here; variants differ in `step` and
/// `immediate_state_reward` only.
pub trait DynamicsModel {
    fn params(&self) -> &PiParams;

    /// Replace the running state.
    fn set_state(&mut self, x0: &[f64]);

    /// Read-only snapshot of the running state.
    fn state(&self) -> &[f64];

    /// Advance the state by one fine step `dt` under control `a`.
    fn step(&mut self, a: &[f64]);

    /// Reward of the current state (negative cost).
    fn immediate_state_reward(&self) -> f64;

    /// Reward credited at the terminal state of a rollout.
    fn end_state_reward(&self) -> f64 {
        self.immediate_state_reward()
    }

    /// Quadratic control penalty: R/2 · Σ aᵢ².
    fn immediate_control_cost(&self, a: &[f64]) -> f64 {
        let sq: f64 = a.iter().map(|v| v * v).sum();
        0.5 * self.params().r * sq
    }
}

/// Select and construct the configured dynamics variant.
pub fn build_model(kind: ModelKind, params: PiParams) -> Box<dyn DynamicsModel> {
    match kind {
        ModelKind::FreeRollout => Box::new(FreeRollout::new(params)),
        ModelKind::Pursuit => Box::new(Pursuit::new(params)),
    }
}

/// All agents integrate position by velocity and velocity by control.
///
/// Reward keeps every agent's speed in a band, its distance from the
/// origin under a radius, and agents apart from each other.
pub struct FreeRollout {
    params: PiParams,
    state: Vec<f64>,
}

impl FreeRollout {
    pub fn new(params: PiParams) -> Self {
        Self {
            state: vec![0.0; params.dim_x()],
            params,
        }
    }
}

impl DynamicsModel for FreeRollout {
    fn params(&self) -> &PiParams {
        &self.params
    }

    fn set_state(&mut self, x0: &[f64]) {
        self.state.clear();
        self.state.extend_from_slice(x0);
    }

    fn state(&self) -> &[f64] {
        &self.state
    }

    fn step(&mut self, a: &[f64]) {
        let dt = self.params.dt;
        for i in 0..self.params.units {
            self.state[4 * i] += self.state[4 * i + 2] * dt;
            self.state[4 * i + 1] += self.state[4 * i + 3] * dt;
            self.state[4 * i + 2] += a[2 * i] * dt;
            self.state[4 * i + 3] += a[2 * i + 1] * dt;
        }
    }

    fn immediate_state_reward(&self) -> f64 {
        let s = &self.state;
        let mut c = 0.0;
        for i in 0..self.params.units {
            let speed = (s[4 * i + 2] * s[4 * i + 2] + s[4 * i + 3] * s[4 * i + 3]).sqrt();
            // speed band: max allowed ~3, min allowed ~1
            c += (speed - 3.0).exp();
            c += (-speed + 1.0).exp();

            // distance from origin, max allowed ~4
            let d = (s[4 * i] * s[4 * i] + s[4 * i + 1] * s[4 * i + 1]).sqrt();
            c += (d - 4.0).exp();

            // pairwise collision penalty
            for j in (i + 1)..self.params.units {
                let dx = s[4 * i] - s[4 * j];
                let dy = s[4 * i + 1] - s[4 * j + 1];
                let d2 = (dx * dx + dy * dy).max(MIN_DIST_SQ);
                c += 1.0 / d2;
            }
        }
        -c
    }
}

/// Pursuit: the last agent is an evader steered by the model itself,
/// the rest are pursuers under external control.
///
/// The evader's velocity is the sum of inverse-square-distance repulsion
/// vectors away from every pursuer, capped at `MAX_EVADER_SPEED`, and is
/// written back into its velocity slots before integrating.
pub struct Pursuit {
    params: PiParams,
    state: Vec<f64>,
}

/// Evader speed cap.
const MAX_EVADER_SPEED: f64 = 1.0;

impl Pursuit {
    pub fn new(params: PiParams) -> Self {
        Self {
            state: vec![0.0; params.dim_x()],
            params,
        }
    }

    fn evader(&self) -> usize {
        self.params.units - 1
    }
}

impl DynamicsModel for Pursuit {
    fn params(&self) -> &PiParams {
        &self.params
    }

    fn set_state(&mut self, x0: &[f64]) {
        self.state.clear();
        self.state.extend_from_slice(x0);
    }

    fn state(&self) -> &[f64] {
        &self.state
    }

    fn step(&mut self, a: &[f64]) {
        let dt = self.params.dt;
        let e = self.evader();

        // Evader first: repulsion from each pursuer, inverse proportional
        // to squared distance.
        let (mut vx, mut vy) = (0.0, 0.0);
        for i in 0..e {
            let dx = self.state[4 * e] - self.state[4 * i];
            let dy = self.state[4 * e + 1] - self.state[4 * i + 1];
            let d2 = dx * dx + dy * dy;
            vx += dx / d2;
            vy += dy / d2;
        }
        let speed = (vx * vx + vy * vy).sqrt();
        if speed > MAX_EVADER_SPEED {
            vx *= MAX_EVADER_SPEED / speed;
            vy *= MAX_EVADER_SPEED / speed;
        }
        self.state[4 * e + 2] = vx;
        self.state[4 * e + 3] = vy;
        self.state[4 * e] += vx * dt;
        self.state[4 * e + 1] += vy * dt;

        // Pursuers under external control.
        for i in 0..e {
            self.state[4 * i] += self.state[4 * i + 2] * dt;
            self.state[4 * i + 1] += self.state[4 * i + 3] * dt;
            self.state[4 * i + 2] += a[2 * i] * dt;
            self.state[4 * i + 3] += a[2 * i + 1] * dt;
        }
    }

    fn immediate_state_reward(&self) -> f64 {
        let s = &self.state;
        let e = self.evader();
        let mut c = 0.0;
        for i in 0..self.params.units {
            if i != e {
                let speed =
                    (s[4 * i + 2] * s[4 * i + 2] + s[4 * i + 3] * s[4 * i + 3]).sqrt();
                // pursuer speed band: max allowed ~5, min allowed ~0
                c += (speed - 5.0).exp();
                c += (-speed).exp();
            }

            let d = (s[4 * i] * s[4 * i] + s[4 * i + 1] * s[4 * i + 1]).sqrt();
            if i == e {
                // evader pays linearly for running from the arena center
                c += d;
            } else {
                c += (d - 6.0).exp();
            }

            for j in (i + 1)..self.params.units {
                let dx = s[4 * i] - s[4 * j];
                let dy = s[4 * i + 1] - s[4 * j + 1];
                let d2 = (dx * dx + dy * dy).max(MIN_DIST_SQ);
                c += 1.0 / d2;
                if j == e {
                    // pursuer i pays for its squared distance to the evader
                    c += d2;
                }
            }
        }
        -c
    }
}
