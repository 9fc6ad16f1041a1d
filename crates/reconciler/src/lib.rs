//! meshrecon reconciler
//!
//! Tears down the host's mesh, bridge, interface and route state and rebuilds
//! the topology described by a meshrecon configuration file. All system
//! access goes through [`controller::NetworkController`].

pub mod allocator;
pub mod builder;
pub mod config;
pub mod controller;
pub mod daemon_conf;
pub mod flusher;
pub mod progress;
pub mod provisioner;
pub mod reconciler;
pub mod supervisor;
pub mod validator;

pub use config::{RuntimeConfig, ServiceConfig};
pub use controller::{FakeNetwork, NetworkController, SystemNetwork};
pub use progress::Progress;
pub use reconciler::Reconciler;
