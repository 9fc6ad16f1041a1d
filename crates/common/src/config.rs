//! Topology configuration loading
//!
//! The configuration file is a sectioned key/value document:
//!
//! ```text
//! # comment
//! [mesh]
//! mesh=yes
//! mesh_dev=wlan0
//! mesh_id="meshnet"
//! ```
//!
//! Every section has a fixed allow-list of option names. Parsing produces a
//! flat [`ConfigVars`] set (last write wins), which is then turned into the
//! immutable [`NetConfig`] that the reconciler phases receive by reference.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Recognized sections and the options each may set
pub const SECTIONS: &[(&str, &[&str])] = &[
    (
        "mesh",
        &[
            "mesh",
            "mesh_if",
            "mesh_dev",
            "mesh_id",
            "mesh_channel",
            "mesh_htmode",
            "mesh_ip",
            "mesh_netmask",
        ],
    ),
    (
        "bridge",
        &[
            "bridge",
            "bridge_if",
            "bridge_members",
            "bridge_ip",
            "bridge_netmask",
        ],
    ),
    (
        "hostapd",
        &[
            "hostapd",
            "hostapd_if",
            "hostapd_ssid",
            "hostapd_channel",
            "hostapd_passphrase",
            "hostapd_hidden",
            "hostapd_hw_mode",
        ],
    ),
    (
        "dnsmasq",
        &[
            "dnsmasq",
            "dnsmasq_if",
            "dnsmasq_ip",
            "dnsmasq_range_start",
            "dnsmasq_range_end",
            "dnsmasq_lease_time",
        ],
    ),
];

/// Flat option set produced by the parser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigVars {
    vars: BTreeMap<String, String>,
}

impl ConfigVars {
    /// Value of an option; missing options read as the empty string
    pub fn get(&self, key: &str) -> &str {
        self.vars.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value of an option, `None` when missing or empty
    pub fn value(&self, key: &str) -> Option<String> {
        let v = self.get(key);
        if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        }
    }

    pub fn is_yes(&self, key: &str) -> bool {
        self.get(key).eq_ignore_ascii_case("yes")
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }
}

/// Parse configuration text into a flat option set
pub fn parse_str(text: &str) -> Result<ConfigVars> {
    let mut vars = ConfigVars::default();
    let mut section: Option<&'static [&'static str]> = None;

    for (idx, raw) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| Error::Config(format!("line {}: unterminated section header", lineno)))?
                .trim();
            let keys = SECTIONS
                .iter()
                .find(|(s, _)| *s == name)
                .map(|(_, keys)| *keys)
                .ok_or_else(|| Error::Config(format!("line {}: unknown section [{}]", lineno, name)))?;
            section = Some(keys);
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("line {}: expected key=value", lineno)))?;
        let key = key.trim();
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(Error::Config(format!("line {}: invalid option name '{}'", lineno, key)));
        }

        let allowed = section
            .ok_or_else(|| Error::Config(format!("line {}: option '{}' outside of a section", lineno, key)))?;
        if !allowed.contains(&key) {
            return Err(Error::Config(format!(
                "line {}: option '{}' is not recognized in this section",
                lineno, key
            )));
        }

        vars.set(key, unquote(value.trim()));
    }

    if vars.is_empty() {
        return Err(Error::Config("configuration is empty".to_string()));
    }

    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Load and parse the configuration file at `path`
pub fn load(path: &Path) -> Result<NetConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let vars = parse_str(&text)?;
    debug!("Loaded {} option(s) from {}", vars.len(), path.display());
    Ok(NetConfig::from_vars(&vars))
}

/// Mesh point feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshConfig {
    pub enabled: bool,
    /// Mesh interface name; allocated as `meshN` when unset
    pub interface: Option<String>,
    /// Wireless station device whose radio hosts the mesh
    pub device: Option<String>,
    pub mesh_id: Option<String>,
    pub channel: Option<String>,
    pub ht_mode: Option<String>,
    pub ip: Option<String>,
    pub netmask: Option<String>,
}

impl MeshConfig {
    /// Enabled and every mandatory parameter present
    pub fn is_requested(&self) -> bool {
        self.enabled
            && self.device.is_some()
            && self.mesh_id.is_some()
            && self.channel.is_some()
            && self.ht_mode.is_some()
    }
}

/// Ethernet bridge feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub enabled: bool,
    /// Bridge name; allocated as `bridgeN` when unset
    pub interface: Option<String>,
    /// Member NICs, de-duplicated in configuration order
    pub members: Vec<String>,
    pub ip: Option<String>,
    pub netmask: Option<String>,
}

/// hostapd access point feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub enabled: bool,
    pub interface: Option<String>,
    pub ssid: Option<String>,
    pub channel: Option<String>,
    pub passphrase: Option<String>,
    pub hidden: bool,
    pub hw_mode: Option<String>,
}

impl AccessPointConfig {
    pub fn is_requested(&self) -> bool {
        self.enabled
            && self.interface.is_some()
            && self.ssid.is_some()
            && self.channel.is_some()
            && self.passphrase.is_some()
    }
}

/// dnsmasq DHCP/DNS feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpConfig {
    pub enabled: bool,
    pub interface: Option<String>,
    /// Address whose first three octets name the served subnet
    pub ip: Option<String>,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub lease_time: Option<String>,
}

impl DhcpConfig {
    pub fn is_requested(&self) -> bool {
        self.enabled
            && self.interface.is_some()
            && self.range_start.is_some()
            && self.range_end.is_some()
    }
}

/// Desired topology, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetConfig {
    pub mesh: MeshConfig,
    pub bridge: BridgeConfig,
    pub hostapd: AccessPointConfig,
    pub dnsmasq: DhcpConfig,
}

impl NetConfig {
    pub fn from_vars(vars: &ConfigVars) -> Self {
        Self {
            mesh: MeshConfig {
                enabled: vars.is_yes("mesh"),
                interface: vars.value("mesh_if"),
                device: vars.value("mesh_dev"),
                mesh_id: vars.value("mesh_id"),
                channel: vars.value("mesh_channel"),
                ht_mode: vars.value("mesh_htmode"),
                ip: vars.value("mesh_ip"),
                netmask: vars.value("mesh_netmask"),
            },
            bridge: BridgeConfig {
                enabled: vars.is_yes("bridge"),
                interface: vars.value("bridge_if"),
                members: split_members(vars.get("bridge_members")),
                ip: vars.value("bridge_ip"),
                netmask: vars.value("bridge_netmask"),
            },
            hostapd: AccessPointConfig {
                enabled: vars.is_yes("hostapd"),
                interface: vars.value("hostapd_if"),
                ssid: vars.value("hostapd_ssid"),
                channel: vars.value("hostapd_channel"),
                passphrase: vars.value("hostapd_passphrase"),
                hidden: matches!(vars.get("hostapd_hidden"), "yes" | "1" | "true"),
                hw_mode: vars.value("hostapd_hw_mode"),
            },
            dnsmasq: DhcpConfig {
                enabled: vars.is_yes("dnsmasq"),
                interface: vars.value("dnsmasq_if"),
                ip: vars.value("dnsmasq_ip"),
                range_start: vars.value("dnsmasq_range_start"),
                range_end: vars.value("dnsmasq_range_end"),
                lease_time: vars.value("dnsmasq_lease_time"),
            },
        }
    }

    /// Parse configuration text directly
    pub fn parse(text: &str) -> Result<Self> {
        parse_str(text).map(|vars| Self::from_vars(&vars))
    }
}

fn split_members(list: &str) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();
    for name in list.split(|c: char| c == ',' || c.is_whitespace()) {
        if !name.is_empty() && !members.iter().any(|m| m == name) {
            members.push(name.to_string());
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
# mesh backhaul
[mesh]
mesh=yes
mesh_dev=wlan0
mesh_id="meshnet"
mesh_channel=6
mesh_htmode=HT20

[bridge]
bridge=yes
bridge_members=eth0, eth1 eth0

[hostapd]
hostapd=no
"#;

    #[test]
    fn test_parse_sections() {
        let cfg = NetConfig::parse(SAMPLE).unwrap();
        assert!(cfg.mesh.enabled);
        assert!(cfg.mesh.is_requested());
        assert_eq!(cfg.mesh.mesh_id.as_deref(), Some("meshnet"));
        assert_eq!(cfg.mesh.interface, None);
        assert!(cfg.bridge.enabled);
        assert_eq!(cfg.bridge.members, vec!["eth0", "eth1"]);
        assert!(!cfg.hostapd.enabled);
        assert!(!cfg.dnsmasq.is_requested());
    }

    #[test]
    fn test_missing_keys_read_empty() {
        let vars = parse_str("[mesh]\nmesh=yes\n").unwrap();
        assert_eq!(vars.get("mesh_dev"), "");
        assert_eq!(vars.value("mesh_dev"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let vars = parse_str("[mesh]\nmesh_channel=1\n[mesh]\nmesh_channel=11\n").unwrap();
        assert_eq!(vars.get("mesh_channel"), "11");
    }

    #[test]
    fn test_rejects_unknown_option() {
        let err = parse_str("[mesh]\nmesh_dev=wlan0\nhostapd_ssid=x\n").unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("line 3")));
    }

    #[test]
    fn test_rejects_unknown_section() {
        assert!(matches!(parse_str("[firewall]\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_option_outside_section() {
        assert!(matches!(parse_str("mesh=yes\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_line_without_equals() {
        let err = parse_str("[mesh]\nmesh yes\n").unwrap_err();
        assert!(err.to_string().contains("expected key=value"));
    }

    #[test]
    fn test_rejects_shell_like_lines() {
        assert!(parse_str("[mesh]\n$(reboot)=1\n").is_err());
        assert!(parse_str("[mesh]\nmesh_dev=wlan0; rm -rf /\n")
            .map(|v| v.get("mesh_dev").to_string())
            .is_ok_and(|dev| dev == "wlan0; rm -rf /"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(parse_str(""), Err(Error::Config(_))));
        assert!(matches!(parse_str("# nothing\n\n[mesh]\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/meshrecon.conf")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.mesh.device.as_deref(), Some("wlan0"));
    }

    #[test]
    fn test_hidden_flag() {
        let cfg = NetConfig::parse("[hostapd]\nhostapd_hidden=1\n").unwrap();
        assert!(cfg.hostapd.hidden);
        let cfg = NetConfig::parse("[hostapd]\nhostapd_hidden=no\n").unwrap();
        assert!(!cfg.hostapd.hidden);
    }
}
