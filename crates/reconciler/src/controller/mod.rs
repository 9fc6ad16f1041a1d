//! Network controller abstraction
//!
//! Every query or mutation of live host state goes through
//! [`NetworkController`]. [`SystemNetwork`] drives the real `ip`/`iw` tools
//! and process table; [`FakeNetwork`] keeps an in-memory host so the phases
//! can be exercised without root or radios.

pub mod fake;
pub mod parse;
pub mod system;

use async_trait::async_trait;
use meshrecon_common::{AdminState, HtMode, RadioInfo, Result, RouteEntry, WirelessInterface};
use std::net::Ipv4Addr;

pub use fake::FakeNetwork;
pub use system::SystemNetwork;

/// Capability interface over the host network stack and process table
#[async_trait]
pub trait NetworkController: Send + Sync {
    /// Names of all network interfaces
    async fn list_interfaces(&self) -> Result<Vec<String>>;

    async fn interface_exists(&self, name: &str) -> Result<bool>;

    /// Wireless interfaces with their radio and operating type
    async fn list_wireless(&self) -> Result<Vec<WirelessInterface>>;

    /// Supported modes and channels of a physical radio
    async fn radio_info(&self, phy: &str) -> Result<RadioInfo>;

    async fn add_mesh_interface(&self, phy: &str, name: &str, mesh_id: &str) -> Result<()>;

    async fn delete_wireless_interface(&self, name: &str) -> Result<()>;

    async fn set_channel(&self, name: &str, channel: u32, mode: HtMode) -> Result<()>;

    async fn set_link_state(&self, name: &str, state: AdminState) -> Result<()>;

    async fn list_bridges(&self) -> Result<Vec<String>>;

    async fn bridge_members(&self, bridge: &str) -> Result<Vec<String>>;

    async fn create_bridge(&self, name: &str) -> Result<()>;

    async fn delete_bridge(&self, name: &str) -> Result<()>;

    async fn add_bridge_member(&self, bridge: &str, member: &str) -> Result<()>;

    async fn remove_bridge_member(&self, bridge: &str, member: &str) -> Result<()>;

    async fn assign_address(&self, name: &str, addr: Ipv4Addr, prefix: u8) -> Result<()>;

    /// First IPv4 address currently assigned to the interface
    async fn interface_address(&self, name: &str) -> Result<Option<Ipv4Addr>>;

    async fn list_routes(&self) -> Result<Vec<RouteEntry>>;

    async fn delete_route(&self, route: &RouteEntry) -> Result<()>;

    /// Pids of live processes named exactly `name`
    async fn find_processes(&self, name: &str) -> Result<Vec<i32>>;

    /// Ask the service manager to stop a service
    async fn stop_service(&self, service: &str) -> Result<()>;

    /// Forcefully terminate a process
    async fn kill_process(&self, pid: i32) -> Result<()>;

    /// Launch a self-daemonizing binary
    async fn start_daemon(&self, binary: &str, args: &[String]) -> Result<()>;

    /// Wait for asynchronous kernel/driver effects to land
    async fn settle(&self);
}
