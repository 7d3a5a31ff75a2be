//! Validated, immutable path-integral parameters.
//!
//! The controller, sampler, and models all read from one `PiParams`
//! value built once from the config; nothing mutates it afterwards.

use thiserror::Error;

use crate::config::PiConfig;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid parameters: {msg}")]
    Invalid { msg: &'static str },
}

/// Path-integral parameters with derived quantities.
///
/// `ds` is the coarse step duration `dt * dtperstep`; `stdv` is the
/// exploration noise standard deviation `sqrt(nu / ds)`; `lambda` is
/// the softmax temperature `r * nu`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiParams {
    pub dt: f64,
    pub units: usize,
    pub r: f64,
    pub nu: f64,
    pub lambda: f64,
    pub dtperstep: u32,
    pub horizon: usize,
    pub rollouts: usize,
    pub ds: f64,
    pub stdv: f64,
}

impl PiParams {
    pub fn from_config(cfg: &PiConfig) -> Result<Self, ParamsError> {
        if !(cfg.dt.is_finite() && cfg.dt > 0.0) {
            return Err(ParamsError::Invalid {
                msg: "dt must be finite and > 0",
            });
        }
        if cfg.units == 0 {
            return Err(ParamsError::Invalid {
                msg: "units must be > 0",
            });
        }
        if !(cfg.r.is_finite() && cfg.r >= 0.0) {
            return Err(ParamsError::Invalid {
                msg: "r must be finite and >= 0",
            });
        }
        if !(cfg.nu.is_finite() && cfg.nu >= 0.0) {
            return Err(ParamsError::Invalid {
                msg: "nu must be finite and >= 0",
            });
        }
        if cfg.dtperstep == 0 {
            return Err(ParamsError::Invalid {
                msg: "dtperstep must be > 0",
            });
        }
        if cfg.horizon == 0 {
            return Err(ParamsError::Invalid {
                msg: "horizon must be > 0",
            });
        }
        if cfg.rollouts == 0 {
            return Err(ParamsError::Invalid {
                msg: "rollouts must be > 0",
            });
        }

        let ds = cfg.dt * cfg.dtperstep as f64;
        Ok(Self {
            dt: cfg.dt,
            units: cfg.units,
            r: cfg.r,
            nu: cfg.nu,
            lambda: cfg.r * cfg.nu,
            dtperstep: cfg.dtperstep,
            horizon: cfg.horizon,
            rollouts: cfg.rollouts,
            ds,
            stdv: (cfg.nu / ds).sqrt(),
        })
    }

    /// Reduced state dimension: 4 components (x, y, vx, vy) per agent.
    pub fn dim_x(&self) -> usize {
        4 * self.units
    }

    /// Control dimension: 2 components per agent.
    pub fn dim_u(&self) -> usize {
        2 * self.units
    }

    /// Same parameters with a different agent count.
    ///
    /// Used when the simulator's negotiated task reports a different
    /// number of agents than the config; only the dimensions change.
    pub fn with_units(mut self, units: usize) -> Self {
        self.units = units;
        self
    }
}
