//! hostapd / dnsmasq configuration files
//!
//! Both daemons read flat `key=value` files. A missing file is created from
//! scratch; an existing one is patched key by key so that operator comments
//! and unrelated options survive.

use meshrecon_common::{config::AccessPointConfig, Result};
use std::path::Path;
use tokio::fs;
use tracing::debug;

const HEADER: &str = "# Generated by meshrecon";

/// Line-preserving view of a `key=value` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueFile {
    lines: Vec<String>,
}

fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    trimmed.split_once('=').map(|(k, _)| k.trim())
}

impl KeyValueFile {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Value of the first uncommented line carrying `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            if line_key(line) == Some(key) {
                line.split_once('=').map(|(_, v)| v.trim())
            } else {
                None
            }
        })
    }

    /// Rewrite the first line carrying `key`, drop later duplicates, or append
    pub fn set(&mut self, key: &str, value: &str) {
        let entry = format!("{}={}", key, value);
        let mut seen = false;
        self.lines.retain_mut(|line| {
            if line_key(line) != Some(key) {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            *line = entry.clone();
            true
        });
        if !seen {
            self.lines.push(entry);
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Create `path` with `settings`, or patch them into the existing file
pub async fn write_settings(path: &Path, settings: &[(&str, String)]) -> Result<()> {
    let mut file = match fs::read_to_string(path).await {
        Ok(text) => {
            debug!("Patching {}", path.display());
            KeyValueFile::parse(&text)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Creating {}", path.display());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            KeyValueFile::parse(HEADER)
        }
        Err(e) => return Err(e.into()),
    };

    for (key, value) in settings {
        file.set(key, value);
    }
    fs::write(path, file.render()).await?;
    Ok(())
}

/// hostapd options for an access point on `interface`
pub fn hostapd_settings(
    cfg: &AccessPointConfig,
    interface: &str,
    ssid: &str,
    passphrase: &str,
    channel: u32,
    bridge: Option<&str>,
) -> Vec<(&'static str, String)> {
    let hw_mode = cfg.hw_mode.clone().unwrap_or_else(|| {
        if channel > 14 { "a" } else { "g" }.to_string()
    });

    let mut settings = vec![
        ("interface", interface.to_string()),
        ("driver", "nl80211".to_string()),
        ("ssid", ssid.to_string()),
        ("ignore_broadcast_ssid", if cfg.hidden { "1" } else { "0" }.to_string()),
        ("channel", channel.to_string()),
        ("hw_mode", hw_mode),
        ("wpa", "2".to_string()),
        ("wpa_passphrase", passphrase.to_string()),
        ("wpa_key_mgmt", "WPA-PSK".to_string()),
        ("rsn_pairwise", "CCMP".to_string()),
    ];
    if let Some(bridge) = bridge {
        settings.push(("bridge", bridge.to_string()));
    }
    settings
}

/// dnsmasq options serving `subnet`.start..`subnet`.end on `interface`
pub fn dnsmasq_settings(
    interface: &str,
    subnet: &str,
    range: (u8, u8),
    lease_time: &str,
    lease_file: &Path,
) -> Vec<(&'static str, String)> {
    vec![
        ("interface", interface.to_string()),
        (
            "dhcp-range",
            format!("{0}.{1},{0}.{2},{3}", subnet, range.0, range.1, lease_time),
        ),
        ("dhcp-leasefile", lease_file.display().to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_set_replaces_first_and_drops_duplicates() {
        let mut file = KeyValueFile::parse(
            "# dhcp\ndhcp-range=10.0.0.2,10.0.0.9,1h\nport=0\ndhcp-range=10.1.0.2,10.1.0.9,1h\n#dhcp-range=old",
        );
        file.set("dhcp-range", "192.168.4.100,192.168.4.200,12h");
        assert_eq!(
            file.render(),
            "# dhcp\ndhcp-range=192.168.4.100,192.168.4.200,12h\nport=0\n#dhcp-range=old\n"
        );
    }

    #[test]
    fn test_set_appends_missing_key() {
        let mut file = KeyValueFile::parse("interface=wlan0");
        file.set("channel", "6");
        assert_eq!(file.get("channel"), Some("6"));
        assert_eq!(file.render(), "interface=wlan0\nchannel=6\n");
    }

    #[test]
    fn test_get_ignores_comments() {
        let file = KeyValueFile::parse("#ssid=old\nssid=new");
        assert_eq!(file.get("ssid"), Some("new"));
        assert_eq!(file.get("channel"), None);
    }

    #[test]
    fn test_hostapd_hw_mode_follows_channel() {
        let cfg = AccessPointConfig::default();
        let settings = hostapd_settings(&cfg, "wlan1", "lab", "secretpass", 36, None);
        assert!(settings.contains(&("hw_mode", "a".to_string())));
        let settings = hostapd_settings(&cfg, "wlan1", "lab", "secretpass", 6, Some("bridge0"));
        assert!(settings.contains(&("hw_mode", "g".to_string())));
        assert!(settings.contains(&("bridge", "bridge0".to_string())));
        assert!(settings.contains(&("ignore_broadcast_ssid", "0".to_string())));
    }

    #[test]
    fn test_dnsmasq_range_directive() {
        let settings = dnsmasq_settings(
            "eth0",
            "192.168.4",
            (100, 200),
            "12h",
            &PathBuf::from("/var/lib/misc/dnsmasq.leases"),
        );
        assert_eq!(settings[1].1, "192.168.4.100,192.168.4.200,12h");
    }

    #[tokio::test]
    async fn test_write_creates_then_patches() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conf/hostapd.conf");

        write_settings(&path, &[("ssid", "one".to_string()), ("channel", "1".to_string())])
            .await
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));

        std::fs::write(&path, format!("{}# keep me\nssid=one\n", text)).unwrap();
        write_settings(&path, &[("ssid", "two".to_string())]).await.unwrap();

        let file = KeyValueFile::parse(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(file.get("ssid"), Some("two"));
        assert_eq!(file.get("channel"), Some("1"));
        assert!(file.render().contains("# keep me"));
        assert_eq!(file.render().matches("ssid=").count(), 1);
    }
}
