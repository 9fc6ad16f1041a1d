//! Error types for meshrecon

use std::fmt;
use thiserror::Error;

/// Result type alias using meshrecon Error
pub type Result<T> = std::result::Result<T, Error>;

/// Teardown sub-phase that reported failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPhase {
    Mesh,
    Bridge,
    Interface,
    Route,
}

impl fmt::Display for TeardownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownPhase::Mesh => write!(f, "mesh interfaces"),
            TeardownPhase::Bridge => write!(f, "bridges"),
            TeardownPhase::Interface => write!(f, "network interfaces"),
            TeardownPhase::Route => write!(f, "routes"),
        }
    }
}

/// Precondition checks that failed against observed system state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid IPv4 address: {0}")]
    BadAddress(String),

    #[error("invalid netmask: {0}")]
    BadNetmask(String),

    #[error("unknown network device: {0}")]
    UnknownDevice(String),

    #[error("{0} does not support mesh point mode")]
    NoMeshPoint(String),

    #[error("channel {channel} is not enabled on {radio}")]
    BadChannel { radio: String, channel: String },

    #[error("frequency mode {mode} does not fit channel {channel} on {radio}")]
    BadCorridor {
        radio: String,
        mode: String,
        channel: u32,
    },

    #[error("invalid DHCP lease range {start}..{end} (bounds must be within 1-254)")]
    BadLeaseRange { start: String, end: String },

    #[error("WPA passphrase must be 8 to 63 characters")]
    BadPassphrase,
}

/// meshrecon error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to stop {daemon}: process still running")]
    ServiceStop { daemon: String },

    #[error("failed to flush {phase}: {failures} operation(s) failed")]
    Teardown {
        phase: TeardownPhase,
        failures: usize,
    },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot resolve {what} of {device}")]
    DeviceResolution { device: String, what: String },

    #[error("mesh build failed at '{step}': {reason}")]
    MeshBuild { step: String, reason: String },

    #[error("bridge has no members")]
    NoBridgeMembers,

    #[error("failed to add {} to bridge {bridge}", failed.join(", "))]
    BridgeMembers { bridge: String, failed: Vec<String> },

    #[error("failed to start {daemon}: {reason}")]
    ServiceStart { daemon: String, reason: String },

    #[error("no free name with prefix '{prefix}' below index {limit}")]
    NameExhausted { prefix: String, limit: u32 },

    #[error("command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

impl Error {
    /// Wrap any error raised while building the mesh interface
    pub fn mesh_build(step: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::MeshBuild {
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}
