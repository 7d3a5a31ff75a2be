//! Unified configuration schema for the control client.
//!
//! One YAML file drives the whole run: where the simulator listens, the
//! path-integral tunables, and where run artifacts are written.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Simulator connection settings.
    pub connection: ConnectionConfig,
    /// Path-integral controller settings.
    pub pi: PiConfig,
    /// Run/orchestration settings.
    #[serde(default)]
    pub run: RunConfig,
}

/// Simulator connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Simulator host (e.g., "127.0.0.1").
    pub host: String,
    /// Simulator TCP port.
    pub port: u16,
    /// Task file the simulator loads on init (e.g., "TaskKeepSpot").
    pub task: String,
    /// If true the simulator runs no faster than real time.
    #[serde(default)]
    pub real_time: bool,
    /// Receive timeout for blocking replies, in seconds.
    #[serde(default = "default_recv_timeout_secs")]
    pub recv_timeout_secs: u64,
}

fn default_recv_timeout_secs() -> u64 {
    20
}

/// Dynamics model variant used for rollouts.
///
/// Selection is a configuration-time choice; the controller builds the
/// concrete model once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// All agents integrate the supplied control (keep-formation task).
    FreeRollout,
    /// Last agent is an evader with self-derived velocity; the rest pursue.
    Pursuit,
}

/// Path-integral controller configuration.
///
/// Field names follow the controller literature: `r` is the quadratic
/// control penalty, `nu` the exploration noise level, `horizon` the
/// number of coarse control steps, `dtperstep` the number of
/// infinitesimal model steps per coarse step.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PiConfig {
    /// Infinitesimal model time increment [s].
    pub dt: f64,
    /// Number of agents.
    pub units: usize,
    /// Quadratic control cost coefficient.
    pub r: f64,
    /// Exploration noise level; `lambda = r * nu`.
    pub nu: f64,
    /// Infinitesimal steps per coarse control step.
    pub dtperstep: u32,
    /// Coarse steps in the planning horizon.
    pub horizon: usize,
    /// Rollouts sampled per control cycle.
    pub rollouts: usize,
    /// RNG seed for the rollout noise stream.
    #[serde(default)]
    pub seed: u64,
    /// Dynamics model variant.
    #[serde(default = "default_model_kind")]
    pub model: ModelKind,
}

fn default_model_kind() -> ModelKind {
    ModelKind::FreeRollout
}

/// Run/orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Total simulated run duration [s]; cycles = (duration/dt)/dtperstep.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    /// Directory for run manifests and NDJSON event logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_duration_secs() -> f64 {
    60.0
}

fn default_log_dir() -> String {
    "runs".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: "127.0.0.1".to_string(),
                port: 10000,
                task: "TaskKeepSpot".to_string(),
                real_time: true,
                recv_timeout_secs: default_recv_timeout_secs(),
            },
            pi: PiConfig {
                dt: 0.02,
                units: 3,
                r: 1.0,
                nu: 1.0,
                dtperstep: 5,
                horizon: 10,
                rollouts: 100,
                seed: 0,
                model: default_model_kind(),
            },
            run: RunConfig::default(),
        }
    }
}
