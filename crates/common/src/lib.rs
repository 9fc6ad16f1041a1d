//! meshrecon common library
//!
//! Shared types, the topology configuration loader, and the pure validators
//! used by the reconciler.

pub mod config;
pub mod error;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::NetConfig;
pub use error::{Error, Result, TeardownPhase, ValidationError};
pub use types::*;

/// meshrecon version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default topology configuration path
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("/etc/meshrecon/meshrecon.conf")
}

/// Default runtime settings path
pub fn default_runtime_path() -> std::path::PathBuf {
    std::path::PathBuf::from("/etc/meshrecon/runtime.toml")
}
