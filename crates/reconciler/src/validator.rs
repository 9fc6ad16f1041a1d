//! Preconditions checked against live state
//!
//! Device predicates query the controller; everything else delegates to the
//! pure checks in `meshrecon_common::validation` and turns a `false` into the
//! matching [`ValidationError`].

use crate::controller::NetworkController;
use meshrecon_common::validation;
use meshrecon_common::{Error, HtMode, NetConfig, RadioInfo, Result, ValidationError};
use std::net::Ipv4Addr;

/// True iff the interface query reports the device
pub async fn valid_wired_device(ctl: &dyn NetworkController, name: &str) -> Result<bool> {
    ctl.interface_exists(name).await
}

/// True iff the wireless query reports the device
pub async fn valid_wireless_device(ctl: &dyn NetworkController, name: &str) -> Result<bool> {
    Ok(ctl.list_wireless().await?.iter().any(|w| w.name == name))
}

pub async fn require_wired(ctl: &dyn NetworkController, name: &str) -> Result<()> {
    if valid_wired_device(ctl, name).await? {
        Ok(())
    } else {
        Err(ValidationError::UnknownDevice(name.to_string()).into())
    }
}

pub async fn require_wireless(ctl: &dyn NetworkController, name: &str) -> Result<()> {
    if valid_wireless_device(ctl, name).await? {
        Ok(())
    } else {
        Err(ValidationError::UnknownDevice(name.to_string()).into())
    }
}

/// Map a wireless device to its physical radio (`phyN`)
pub async fn resolve_physical_radio(ctl: &dyn NetworkController, device: &str) -> Result<String> {
    ctl.list_wireless()
        .await?
        .into_iter()
        .find(|w| w.name == device)
        .map(|w| w.phy)
        .ok_or_else(|| Error::DeviceResolution {
            device: device.to_string(),
            what: "physical radio".to_string(),
        })
}

/// Parse a configured channel and check it is enabled on the radio
pub fn check_channel(radio: &RadioInfo, channel: &str) -> Result<u32> {
    let bad = || ValidationError::BadChannel {
        radio: radio.name.clone(),
        channel: channel.to_string(),
    };
    let number: u32 = channel.trim().parse().map_err(|_| bad())?;
    if validation::valid_channel(radio, number) {
        Ok(number)
    } else {
        Err(bad().into())
    }
}

pub fn check_corridor(radio: &RadioInfo, mode: &str, channel: u32) -> Result<()> {
    if validation::valid_frequency_corridor(radio, mode, channel) {
        Ok(())
    } else {
        Err(ValidationError::BadCorridor {
            radio: radio.name.clone(),
            mode: mode.to_string(),
            channel,
        }
        .into())
    }
}

/// Validate an address and optional netmask, yielding `(address, prefix)`
pub fn check_address(ip: &str, netmask: Option<&str>, default_netmask: &str) -> Result<(Ipv4Addr, u8)> {
    if !validation::valid_ipv4(ip) {
        return Err(ValidationError::BadAddress(ip.to_string()).into());
    }
    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| ValidationError::BadAddress(ip.to_string()))?;
    let mask = netmask.unwrap_or(default_netmask);
    let prefix = validation::netmask_prefix(mask)
        .ok_or_else(|| ValidationError::BadNetmask(mask.to_string()))?;
    Ok((addr, prefix))
}

/// Checks that need no live state, for `--check`
pub fn check_offline(cfg: &NetConfig, default_netmask: &str) -> Result<()> {
    let mesh = &cfg.mesh;
    if mesh.is_requested() {
        if let Some(mode) = mesh.ht_mode.as_deref() {
            mode.parse::<HtMode>().map_err(Error::Config)?;
        }
        if let Some(ip) = mesh.ip.as_deref() {
            check_address(ip, mesh.netmask.as_deref(), default_netmask)?;
        }
    }
    if let Some(ip) = cfg.bridge.ip.as_deref() {
        check_address(ip, cfg.bridge.netmask.as_deref(), default_netmask)?;
    }

    let ap = &cfg.hostapd;
    if ap.is_requested() && !ap.passphrase.as_deref().is_some_and(validation::valid_passphrase) {
        return Err(ValidationError::BadPassphrase.into());
    }

    let dhcp = &cfg.dnsmasq;
    if let (true, Some(start), Some(end)) = (
        dhcp.is_requested(),
        dhcp.range_start.as_deref(),
        dhcp.range_end.as_deref(),
    ) {
        if validation::lease_bounds(start, end).is_none() {
            return Err(ValidationError::BadLeaseRange {
                start: start.to_string(),
                end: end.to_string(),
            }
            .into());
        }
        if let Some(ip) = dhcp.ip.as_deref() {
            if !validation::valid_ipv4(ip) {
                return Err(ValidationError::BadAddress(ip.to_string()).into());
            }
        }
    }
    Ok(())
}
