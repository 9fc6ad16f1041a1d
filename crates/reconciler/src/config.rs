//! Runtime settings
//!
//! Host-specific knobs that are not part of the desired topology: tool
//! timing, daemon binaries, and where generated files live.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reconciler runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Pause after state-mutating calls, in milliseconds
    pub settle_delay_ms: u64,

    /// Highest index probed when allocating `meshN` / `bridgeN`
    pub name_probe_limit: u32,

    /// Leave the loopback interface up during the interface flush
    pub preserve_loopback: bool,

    /// Netmask used when an address is configured without one
    pub default_netmask: String,

    /// hostapd configuration
    pub hostapd: ServiceConfig,

    /// dnsmasq configuration
    pub dnsmasq: ServiceConfig,

    /// dnsmasq lease database
    pub lease_file: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            name_probe_limit: 64,
            preserve_loopback: false,
            default_netmask: "255.255.255.0".to_string(),
            hostapd: ServiceConfig {
                binary: "hostapd".to_string(),
                service: "hostapd".to_string(),
                config_path: PathBuf::from("/etc/hostapd/hostapd.conf"),
            },
            dnsmasq: ServiceConfig {
                binary: "dnsmasq".to_string(),
                service: "dnsmasq".to_string(),
                config_path: PathBuf::from("/etc/dnsmasq.conf"),
            },
            lease_file: PathBuf::from("/var/lib/misc/dnsmasq.leases"),
        }
    }
}

/// How to reach one managed daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Executable, also the process name looked up in the process table
    pub binary: String,

    /// Name passed to the service-control hook for graceful stops
    pub service: String,

    /// Generated configuration file
    pub config_path: PathBuf,
}

impl RuntimeConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Settings suitable for tests: no delays, files under `dir`
    pub fn for_testing(dir: &Path) -> Self {
        let mut config = Self {
            settle_delay_ms: 0,
            lease_file: dir.join("dnsmasq.leases"),
            ..Self::default()
        };
        config.hostapd.config_path = dir.join("hostapd.conf");
        config.dnsmasq.config_path = dir.join("dnsmasq.conf");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RuntimeConfig::load(Path::new("/nonexistent/runtime.toml")).unwrap();
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.name_probe_limit, 64);
        assert_eq!(config.hostapd.binary, "hostapd");
    }

    #[test]
    fn test_partial_file_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("runtime.toml");
        std::fs::write(
            &path,
            "settle_delay_ms = 250\n\n[dnsmasq]\nbinary = \"/usr/sbin/dnsmasq\"\nservice = \"dnsmasq\"\nconfig_path = \"/tmp/dnsmasq.conf\"\n",
        )
        .unwrap();

        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.dnsmasq.binary, "/usr/sbin/dnsmasq");
        assert_eq!(config.hostapd.binary, "hostapd");
        assert!(!config.preserve_loopback);
    }

    #[test]
    fn test_loopback_can_be_preserved() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("runtime.toml");
        std::fs::write(&path, "preserve_loopback = true\n").unwrap();
        assert!(RuntimeConfig::load(&path).unwrap().preserve_loopback);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("runtime.toml");
        std::fs::write(&path, "settle_delay_ms = \"soon\"\n").unwrap();
        assert!(RuntimeConfig::load(&path).is_err());
    }
}
