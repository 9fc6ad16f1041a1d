//! hostapd and dnsmasq provisioning
//!
//! Each provisioner writes its daemon's configuration, starts the daemon,
//! checks once after the settle delay that it is still running, and finally
//! attaches its interface to the bridge when one was built.

use crate::config::{RuntimeConfig, ServiceConfig};
use crate::controller::NetworkController;
use crate::daemon_conf::{dnsmasq_settings, hostapd_settings, write_settings};
use crate::progress::Progress;
use crate::supervisor::process_name;
use crate::validator::{self, check_channel};
use meshrecon_common::config::{AccessPointConfig, DhcpConfig};
use meshrecon_common::validation::{lease_bounds, subnet_prefix, valid_ipv4, valid_passphrase};
use meshrecon_common::{AdminState, Error, Result, ValidationError};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

const DEFAULT_LEASE_TIME: &str = "12h";

/// Provision the access point; `Ok(false)` when not requested
pub async fn provision_access_point(
    ctl: &dyn NetworkController,
    cfg: &AccessPointConfig,
    bridge: Option<&str>,
    runtime: &RuntimeConfig,
    progress: &Progress,
) -> Result<bool> {
    if !cfg.is_requested() {
        debug!("Access point not requested, skipping");
        progress.note("access point not requested");
        return Ok(false);
    }
    let (Some(interface), Some(ssid), Some(channel), Some(passphrase)) = (
        cfg.interface.as_deref(),
        cfg.ssid.as_deref(),
        cfg.channel.as_deref(),
        cfg.passphrase.as_deref(),
    ) else {
        return Ok(false);
    };

    progress.track(
        &format!("Validating wireless device {}", interface),
        validator::require_wireless(ctl, interface).await,
    )?;
    let phy = progress.track(
        "Resolving physical radio",
        validator::resolve_physical_radio(ctl, interface).await,
    )?;
    let radio = progress.track("Reading radio capabilities", ctl.radio_info(&phy).await)?;
    let channel = progress.track("Validating channel", check_channel(&radio, channel))?;

    let passphrase_ok = if valid_passphrase(passphrase) {
        Ok(())
    } else {
        Err(ValidationError::BadPassphrase.into())
    };
    progress.track("Validating passphrase", passphrase_ok)?;

    let service = &runtime.hostapd;
    let settings = hostapd_settings(cfg, interface, ssid, passphrase, channel, bridge);
    progress.track(
        &format!("Writing {}", service.config_path.display()),
        write_settings(&service.config_path, &settings).await,
    )?;

    let args = vec!["-B".to_string(), service.config_path.display().to_string()];
    start_and_verify(ctl, service, &args, progress).await?;

    if let Some(bridge) = bridge {
        attach(ctl, bridge, interface, progress).await?;
    }
    Ok(true)
}

/// Provision the DHCP server; `Ok(false)` when not requested
pub async fn provision_dhcp(
    ctl: &dyn NetworkController,
    cfg: &DhcpConfig,
    bridge: Option<&str>,
    runtime: &RuntimeConfig,
    progress: &Progress,
) -> Result<bool> {
    if !cfg.is_requested() {
        debug!("DHCP not requested, skipping");
        progress.note("DHCP not requested");
        return Ok(false);
    }
    let (Some(interface), Some(start), Some(end)) = (
        cfg.interface.as_deref(),
        cfg.range_start.as_deref(),
        cfg.range_end.as_deref(),
    ) else {
        return Ok(false);
    };

    progress.track(
        &format!("Validating device {}", interface),
        validator::require_wired(ctl, interface).await,
    )?;

    let range = lease_bounds(start, end).ok_or_else(|| ValidationError::BadLeaseRange {
        start: start.to_string(),
        end: end.to_string(),
    });
    let range = progress.track("Validating lease range", range.map_err(Error::from))?;

    let subnet = progress.track("Resolving subnet", resolve_subnet(ctl, cfg, interface).await)?;
    let lease_time = cfg.lease_time.as_deref().unwrap_or(DEFAULT_LEASE_TIME);

    let service = &runtime.dnsmasq;
    let settings = dnsmasq_settings(interface, &subnet, range, lease_time, &runtime.lease_file);
    progress.track(
        &format!("Writing {}", service.config_path.display()),
        write_settings(&service.config_path, &settings).await,
    )?;

    let args = vec!["-C".to_string(), service.config_path.display().to_string()];
    start_and_verify(ctl, service, &args, progress).await?;

    if let Some(bridge) = bridge {
        attach(ctl, bridge, interface, progress).await?;
    }
    Ok(true)
}

/// Subnet prefix from the configured address, else from the live one
async fn resolve_subnet(
    ctl: &dyn NetworkController,
    cfg: &DhcpConfig,
    interface: &str,
) -> Result<String> {
    if let Some(ip) = cfg.ip.as_deref() {
        if !valid_ipv4(ip) {
            return Err(ValidationError::BadAddress(ip.to_string()).into());
        }
        let addr: Ipv4Addr = ip
            .parse()
            .map_err(|_| ValidationError::BadAddress(ip.to_string()))?;
        return Ok(subnet_prefix(addr));
    }

    ctl.interface_address(interface)
        .await?
        .map(subnet_prefix)
        .ok_or_else(|| Error::DeviceResolution {
            device: interface.to_string(),
            what: "IPv4 address".to_string(),
        })
}

async fn start_and_verify(
    ctl: &dyn NetworkController,
    service: &ServiceConfig,
    args: &[String],
    progress: &Progress,
) -> Result<()> {
    let name = process_name(&service.binary);
    info!("Starting {}", name);

    let started = ctl
        .start_daemon(&service.binary, args)
        .await
        .map_err(|e| Error::ServiceStart {
            daemon: name.to_string(),
            reason: e.to_string(),
        });
    progress.track(&format!("Starting {}", name), started)?;
    ctl.settle().await;

    let running = if ctl.find_processes(name).await?.is_empty() {
        Err(Error::ServiceStart {
            daemon: name.to_string(),
            reason: "not running after start".to_string(),
        })
    } else {
        Ok(())
    };
    progress.track(&format!("Verifying {} is running", name), running)
}

/// Enslave `interface` to `bridge` unless it already is, or is the bridge
async fn attach(
    ctl: &dyn NetworkController,
    bridge: &str,
    interface: &str,
    progress: &Progress,
) -> Result<()> {
    if interface == bridge {
        debug!("{} is the bridge itself, not attaching", interface);
        return Ok(());
    }
    if ctl.bridge_members(bridge).await?.iter().any(|m| m == interface) {
        debug!("{} already a member of {}", interface, bridge);
        return Ok(());
    }

    let result = match ctl.add_bridge_member(bridge, interface).await {
        Ok(()) => ctl.set_link_state(interface, AdminState::Up).await,
        Err(e) => Err(e),
    };
    let result = result.map_err(|e| {
        warn!("Failed to add {} to {}: {}", interface, bridge, e);
        Error::BridgeMembers {
            bridge: bridge.to_string(),
            failed: vec![interface.to_string()],
        }
    });
    progress.track(&format!("Adding {} to {}", interface, bridge), result)?;
    ctl.settle().await;
    Ok(())
}
