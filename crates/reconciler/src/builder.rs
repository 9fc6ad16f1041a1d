//! Construction of the mesh interface and the bridge
//!
//! Both builders validate everything they can against live state before the
//! first mutation, so a rejected configuration leaves the flushed host alone.

use crate::allocator::next_free;
use crate::config::RuntimeConfig;
use crate::controller::NetworkController;
use crate::flusher::MESH_PREFIX;
use crate::progress::Progress;
use crate::validator::{self, check_address, check_channel, check_corridor};
use meshrecon_common::config::{BridgeConfig, MeshConfig};
use meshrecon_common::{AdminState, Error, HtMode, Result, ValidationError};
use tracing::{debug, info, warn};

pub const BRIDGE_PREFIX: &str = "bridge";

/// Result of a bridge build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltBridge {
    pub name: String,
    pub members: Vec<String>,
}

/// Tag a failed mesh step and report it
fn mesh_step<T>(progress: &Progress, step: &str, result: Result<T>) -> Result<T> {
    progress.track(step, result.map_err(|e| Error::mesh_build(step, e)))
}

/// Create the configured mesh point interface.
///
/// Returns `None` when the mesh feature is not requested.
pub async fn build_mesh(
    ctl: &dyn NetworkController,
    cfg: &MeshConfig,
    runtime: &RuntimeConfig,
    progress: &Progress,
) -> Result<Option<String>> {
    if !cfg.is_requested() {
        debug!("Mesh not requested, skipping");
        progress.note("mesh not requested");
        return Ok(None);
    }
    let (Some(device), Some(mesh_id), Some(channel), Some(mode)) = (
        cfg.device.as_deref(),
        cfg.mesh_id.as_deref(),
        cfg.channel.as_deref(),
        cfg.ht_mode.as_deref(),
    ) else {
        return Ok(None);
    };

    mesh_step(progress, "Validating wireless device", validator::require_wireless(ctl, device).await)?;
    let phy = mesh_step(
        progress,
        "Resolving physical radio",
        validator::resolve_physical_radio(ctl, device).await,
    )?;
    let radio = mesh_step(progress, "Reading radio capabilities", ctl.radio_info(&phy).await)?;

    let supported = if radio.supports_mesh_point() {
        Ok(())
    } else {
        Err(ValidationError::NoMeshPoint(phy.clone()).into())
    };
    mesh_step(progress, "Checking mesh point support", supported)?;

    let channel = mesh_step(progress, "Validating channel", check_channel(&radio, channel))?;
    let ht_mode = check_corridor(&radio, mode, channel)
        .and_then(|()| mode.parse::<HtMode>().map_err(Error::Config));
    let ht_mode = mesh_step(progress, "Validating frequency corridor", ht_mode)?;

    let address = match cfg.ip.as_deref() {
        Some(ip) => Some(mesh_step(
            progress,
            "Validating IP address",
            check_address(ip, cfg.netmask.as_deref(), &runtime.default_netmask),
        )?),
        None => None,
    };

    let name = match &cfg.interface {
        Some(name) => name.clone(),
        None => mesh_step(
            progress,
            "Allocating interface name",
            next_free(ctl, MESH_PREFIX, runtime.name_probe_limit).await,
        )?,
    };

    info!("Creating mesh interface {} on {} ({})", name, phy, mesh_id);
    mesh_step(
        progress,
        &format!("Creating {} on {}", name, phy),
        ctl.add_mesh_interface(&phy, &name, mesh_id).await,
    )?;
    ctl.settle().await;

    mesh_step(
        progress,
        &format!("Setting channel {} {}", channel, ht_mode),
        ctl.set_channel(&name, channel, ht_mode).await,
    )?;
    mesh_step(
        progress,
        &format!("Taking {} down", device),
        ctl.set_link_state(device, AdminState::Down).await,
    )?;
    mesh_step(
        progress,
        &format!("Bringing {} up", name),
        ctl.set_link_state(&name, AdminState::Up).await,
    )?;
    ctl.settle().await;

    if let Some((addr, prefix)) = address {
        mesh_step(
            progress,
            &format!("Assigning {}/{}", addr, prefix),
            ctl.assign_address(&name, addr, prefix).await,
        )?;
    }

    Ok(Some(name))
}

/// Create the bridge and enslave its members.
///
/// The built mesh interface, if any, joins the configured members.
pub async fn build_bridge(
    ctl: &dyn NetworkController,
    cfg: &BridgeConfig,
    mesh_if: Option<&str>,
    runtime: &RuntimeConfig,
    progress: &Progress,
) -> Result<BuiltBridge> {
    if !cfg.enabled {
        return progress.track("Checking bridge members", Err(Error::NoBridgeMembers));
    }

    let mut members = cfg.members.clone();
    if let Some(mesh) = mesh_if {
        if !members.iter().any(|m| m == mesh) {
            members.push(mesh.to_string());
        }
    }
    if members.is_empty() {
        return progress.track("Checking bridge members", Err(Error::NoBridgeMembers));
    }

    let mut unknown = Vec::new();
    for member in &members {
        if !validator::valid_wired_device(ctl, member).await? {
            unknown.push(member.clone());
        }
    }
    let checked = if unknown.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UnknownDevice(unknown.join(", ")).into())
    };
    progress.track("Validating bridge members", checked)?;

    let address = match cfg.ip.as_deref() {
        Some(ip) => Some(progress.track(
            "Validating IP address",
            check_address(ip, cfg.netmask.as_deref(), &runtime.default_netmask),
        )?),
        None => None,
    };

    let name = match &cfg.interface {
        Some(name) => name.clone(),
        None => progress.track(
            "Allocating bridge name",
            next_free(ctl, BRIDGE_PREFIX, runtime.name_probe_limit).await,
        )?,
    };

    info!("Creating bridge {} with {}", name, members.join(", "));
    progress.track(&format!("Creating bridge {}", name), ctl.create_bridge(&name).await)?;
    ctl.settle().await;

    let mut failed = Vec::new();
    for member in &members {
        let result = match ctl.add_bridge_member(&name, member).await {
            Ok(()) => ctl.set_link_state(member, AdminState::Up).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!("Failed to add {} to {}: {}", member, name, e);
            failed.push(member.clone());
        }
        progress.step(&format!("Adding {} to {}", member, name), result.is_ok());
    }
    if !failed.is_empty() {
        return Err(Error::BridgeMembers { bridge: name, failed });
    }

    if let Some((addr, prefix)) = address {
        progress.track(
            &format!("Assigning {}/{}", addr, prefix),
            ctl.assign_address(&name, addr, prefix).await,
        )?;
    }
    progress.track(
        &format!("Bringing {} up", name),
        ctl.set_link_state(&name, AdminState::Up).await,
    )?;
    ctl.settle().await;

    Ok(BuiltBridge { name, members })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FakeNetwork;
    use meshrecon_common::InterfaceKind;
    use std::net::Ipv4Addr;
    use std::path::Path;

    fn runtime() -> RuntimeConfig {
        RuntimeConfig::for_testing(Path::new("/tmp"))
    }

    fn host() -> FakeNetwork {
        FakeNetwork::new()
            .with_radio(FakeNetwork::radio("phy0", 1..=11, true))
            .with_station("wlan0", "phy0")
            .with_wired("eth0")
            .with_wired("eth1")
    }

    fn mesh_cfg() -> MeshConfig {
        MeshConfig {
            enabled: true,
            device: Some("wlan0".into()),
            mesh_id: Some("meshnet".into()),
            channel: Some("6".into()),
            ht_mode: Some("HT20".into()),
            ..Default::default()
        }
    }

    fn bridge_cfg(members: &[&str]) -> BridgeConfig {
        BridgeConfig {
            enabled: true,
            members: members.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mesh_is_created_and_up() {
        let net = host();
        let cfg = MeshConfig {
            ip: Some("10.10.0.1".into()),
            ..mesh_cfg()
        };
        let name = build_mesh(&net, &cfg, &runtime(), &Progress::captured())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("mesh0"));

        let link = net.link("mesh0").unwrap();
        assert_eq!(link.kind, InterfaceKind::WirelessMesh);
        assert_eq!(link.state, AdminState::Up);
        assert_eq!(link.channel, Some((6, HtMode::Ht20)));
        assert_eq!(link.mesh_id.as_deref(), Some("meshnet"));
        assert_eq!(link.addresses, vec![(Ipv4Addr::new(10, 10, 0, 1), 24)]);
        assert_eq!(net.link("wlan0").unwrap().state, AdminState::Down);
    }

    #[tokio::test]
    async fn test_mesh_skipped_without_parameters() {
        let net = host();
        let cfg = MeshConfig {
            ht_mode: None,
            ..mesh_cfg()
        };
        assert_eq!(
            build_mesh(&net, &cfg, &runtime(), &Progress::captured()).await.unwrap(),
            None
        );
        assert!(net.log().is_empty());
    }

    #[tokio::test]
    async fn test_mesh_uses_configured_name() {
        let net = host();
        let cfg = MeshConfig {
            interface: Some("backhaul".into()),
            ..mesh_cfg()
        };
        let name = build_mesh(&net, &cfg, &runtime(), &Progress::captured())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("backhaul"));
    }

    #[tokio::test]
    async fn test_mesh_rejects_radio_without_mesh_point() {
        let net = FakeNetwork::new()
            .with_radio(FakeNetwork::radio("phy0", 1..=11, false))
            .with_station("wlan0", "phy0");
        let err = build_mesh(&net, &mesh_cfg(), &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        match err {
            Error::MeshBuild { step, reason } => {
                assert_eq!(step, "Checking mesh point support");
                assert_eq!(reason, "validation failed: phy0 does not support mesh point mode");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(net.mesh_interfaces().is_empty());
    }

    #[tokio::test]
    async fn test_mesh_rejects_bad_corridor_before_mutation() {
        let net = host();
        let cfg = MeshConfig {
            channel: Some("11".into()),
            ht_mode: Some("HT40+".into()),
            ..mesh_cfg()
        };
        let err = build_mesh(&net, &cfg, &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MeshBuild { ref step, .. } if step == "Validating frequency corridor"));
        assert!(net.log().is_empty());
    }

    #[tokio::test]
    async fn test_mesh_rejects_unknown_device() {
        let net = host();
        let cfg = MeshConfig {
            device: Some("eth0".into()),
            ..mesh_cfg()
        };
        let err = build_mesh(&net, &cfg, &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MeshBuild { ref step, .. } if step == "Validating wireless device"));
    }

    #[tokio::test]
    async fn test_bridge_merges_mesh_interface() {
        let net = host().with_mesh("mesh0", "phy0");
        let built = build_bridge(
            &net,
            &bridge_cfg(&["eth0", "mesh0"]),
            Some("mesh0"),
            &runtime(),
            &Progress::captured(),
        )
        .await
        .unwrap();
        assert_eq!(built.name, "bridge0");
        assert_eq!(built.members, vec!["eth0", "mesh0"]);
        assert_eq!(net.members_of("bridge0"), vec!["eth0", "mesh0"]);
        assert_eq!(net.link("bridge0").unwrap().state, AdminState::Up);
        assert_eq!(net.link("eth0").unwrap().state, AdminState::Up);
    }

    #[tokio::test]
    async fn test_bridge_disabled_has_no_members() {
        let net = host();
        let cfg = BridgeConfig::default();
        let err = build_bridge(&net, &cfg, Some("mesh0"), &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoBridgeMembers));
    }

    #[tokio::test]
    async fn test_bridge_without_members_fails() {
        let net = host();
        let err = build_bridge(&net, &bridge_cfg(&[]), None, &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoBridgeMembers));
        assert!(net.bridges().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_validates_before_creating() {
        let net = host();
        let err = build_bridge(
            &net,
            &bridge_cfg(&["eth0", "eth9"]),
            None,
            &runtime(),
            &Progress::captured(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("eth9"));
        assert!(net.bridges().is_empty());
        assert!(net.log().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_rejects_bad_address_before_creating() {
        let net = host();
        let cfg = BridgeConfig {
            ip: Some("192.168.4.0".into()),
            ..bridge_cfg(&["eth0"])
        };
        let err = build_bridge(&net, &cfg, None, &runtime(), &Progress::captured())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::BadAddress(_))));
        assert!(net.bridges().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_member_failures_are_aggregated() {
        let net = host().with_wired("eth2").failing("eth0").failing("eth2");
        let err = build_bridge(
            &net,
            &bridge_cfg(&["eth0", "eth1", "eth2"]),
            None,
            &runtime(),
            &Progress::captured(),
        )
        .await
        .unwrap_err();
        match err {
            Error::BridgeMembers { bridge, failed } => {
                assert_eq!(bridge, "bridge0");
                assert_eq!(failed, vec!["eth0", "eth2"]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(net.members_of("bridge0"), vec!["eth1"]);
    }

    #[tokio::test]
    async fn test_bridge_address_assigned() {
        let net = host();
        let cfg = BridgeConfig {
            interface: Some("br-lan".into()),
            ip: Some("192.168.4.1".into()),
            netmask: Some("255.255.0.0".into()),
            ..bridge_cfg(&["eth1"])
        };
        let built = build_bridge(&net, &cfg, None, &runtime(), &Progress::captured())
            .await
            .unwrap();
        assert_eq!(built.name, "br-lan");
        assert_eq!(
            net.link("br-lan").unwrap().addresses,
            vec![(Ipv4Addr::new(192, 168, 4, 1), 16)]
        );
    }
}
