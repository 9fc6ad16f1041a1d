//! Core types for meshrecon

use ipnetwork::{IpNetworkError, Ipv4Network};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Kind of network interface as observed on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Wired,
    WirelessStation,
    WirelessMesh,
    Bridge,
}

/// Administrative link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Up,
    Down,
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

/// HT channel width/offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtMode {
    Ht20,
    Ht40Plus,
    Ht40Minus,
}

impl FromStr for HtMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "HT20" => Ok(HtMode::Ht20),
            "HT40+" => Ok(HtMode::Ht40Plus),
            "HT40-" => Ok(HtMode::Ht40Minus),
            other => Err(format!("unknown HT mode '{}'", other)),
        }
    }
}

impl fmt::Display for HtMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HtMode::Ht20 => write!(f, "HT20"),
            HtMode::Ht40Plus => write!(f, "HT40+"),
            HtMode::Ht40Minus => write!(f, "HT40-"),
        }
    }
}

/// A logical wireless interface and the radio it is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessInterface {
    pub name: String,
    /// Physical radio, e.g. `phy0`
    pub phy: String,
    pub kind: InterfaceKind,
}

/// One channel as advertised by a radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub number: u32,
    pub frequency_mhz: u32,
    pub disabled: bool,
}

/// Capabilities of a physical radio
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioInfo {
    pub name: String,
    /// Supported interface modes, lowercased (`managed`, `mesh point`, ...)
    pub modes: Vec<String>,
    pub channels: Vec<Channel>,
}

impl RadioInfo {
    pub fn supports_mesh_point(&self) -> bool {
        self.modes.iter().any(|m| m == "mesh point")
    }

    /// Channels not disabled by regulatory constraints, ascending
    pub fn enabled_channels(&self) -> Vec<u32> {
        let mut channels: Vec<u32> = self
            .channels
            .iter()
            .filter(|c| !c.disabled)
            .map(|c| c.number)
            .collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }
}

/// IPv4 routing table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub device: String,
}

impl RouteEntry {
    pub fn new(network: Ipv4Network, device: impl Into<String>) -> Self {
        Self {
            destination: network.network(),
            netmask: network.mask(),
            device: device.into(),
        }
    }

    pub fn network(&self) -> std::result::Result<Ipv4Network, IpNetworkError> {
        Ipv4Network::with_netmask(self.destination, self.netmask)
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network() {
            Ok(net) => write!(f, "{} dev {}", net, self.device),
            Err(_) => write!(
                f,
                "{} netmask {} dev {}",
                self.destination, self.netmask, self.device
            ),
        }
    }
}

/// The two dependent services the reconciler manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonKind {
    AccessPoint,
    Dhcp,
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonKind::AccessPoint => write!(f, "hostapd"),
            DaemonKind::Dhcp => write!(f, "dnsmasq"),
        }
    }
}

/// Outcome status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

/// Status and operator-facing message of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub status: Status,
    pub message: String,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Process exit code: 0 on success, 1 on any failure
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Status::Success => 0,
            Status::Failure => 1,
        }
    }
}

impl<T> From<&crate::Result<T>> for PipelineResult {
    fn from(result: &crate::Result<T>) -> Self {
        match result {
            Ok(_) => PipelineResult {
                status: Status::Success,
                message: "network topology reconciled".to_string(),
            },
            Err(e) => PipelineResult {
                status: Status::Failure,
                message: e.to_string(),
            },
        }
    }
}

/// What a successful reconciliation built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySummary {
    pub mesh_interface: Option<String>,
    pub bridge: Option<String>,
    pub bridge_members: Vec<String>,
    pub daemons: Vec<DaemonKind>,
}
