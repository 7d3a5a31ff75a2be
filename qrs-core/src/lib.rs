//! qrs-core: configuration schema and path-integral parameters.

pub mod config;
pub mod params;

pub use config::{Config, ConfigError, ConnectionConfig, ModelKind, PiConfig, RunConfig};
pub use params::{ParamsError, PiParams};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
