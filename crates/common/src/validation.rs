//! Pure validation predicates
//!
//! These never touch the system; callers pass in whatever state they have
//! already observed (a radio's channel list, a configured string).

use crate::types::{HtMode, RadioInfo};
use std::net::Ipv4Addr;

/// Check an assignable host address.
///
/// Exactly four decimal octets. The first and last octets must be in
/// 1..=254, the middle two in 0..=254. This is narrower than what
/// `Ipv4Addr` accepts: network and broadcast looking addresses are refused.
pub fn valid_ipv4(addr: &str) -> bool {
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 {
        return false;
    }

    octets.iter().enumerate().all(|(idx, octet)| {
        let Some(value) = parse_octet(octet) else {
            return false;
        };
        match idx {
            0 | 3 => (1..=254).contains(&value),
            _ => value <= 254,
        }
    })
}

fn parse_octet(octet: &str) -> Option<u16> {
    if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    octet.parse().ok()
}

/// Prefix length of a contiguous netmask, `None` when the mask is not one
pub fn netmask_prefix(mask: &str) -> Option<u8> {
    let addr: Ipv4Addr = mask.parse().ok()?;
    ipnetwork::ipv4_mask_to_prefix(addr).ok()
}

/// True iff `channel` is enabled on the radio
pub fn valid_channel(radio: &RadioInfo, channel: u32) -> bool {
    radio.enabled_channels().contains(&channel)
}

/// Check that a 20/40 MHz corridor fits inside the radio's enabled range.
///
/// HT40+ needs room above the primary channel, HT40- room below it.
pub fn valid_frequency_corridor(radio: &RadioInfo, mode: &str, channel: u32) -> bool {
    let Ok(mode) = mode.parse::<HtMode>() else {
        return false;
    };
    let enabled = radio.enabled_channels();

    match mode {
        HtMode::Ht20 => true,
        HtMode::Ht40Plus => enabled.last().is_some_and(|&highest| channel < highest),
        HtMode::Ht40Minus => enabled.first().is_some_and(|&lowest| channel > lowest),
    }
}

/// Parse DHCP lease range bounds; both must lie in 1..=254 with start <= end
pub fn lease_bounds(start: &str, end: &str) -> Option<(u8, u8)> {
    let start: u8 = start.trim().parse().ok()?;
    let end: u8 = end.trim().parse().ok()?;
    let in_range = |v: u8| (1..=254).contains(&v);
    if in_range(start) && in_range(end) && start <= end {
        Some((start, end))
    } else {
        None
    }
}

/// WPA-PSK passphrase: 8 to 63 printable ASCII characters
pub fn valid_passphrase(passphrase: &str) -> bool {
    (8..=63).contains(&passphrase.len())
        && passphrase.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

/// First three octets of an address, e.g. `192.168.4` for `192.168.4.1`
pub fn subnet_prefix(addr: Ipv4Addr) -> String {
    let [a, b, c, _] = addr.octets();
    format!("{}.{}.{}", a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    fn radio_with_channels(numbers: &[u32]) -> RadioInfo {
        RadioInfo {
            name: "phy0".into(),
            modes: vec!["managed".into(), "mesh point".into()],
            channels: numbers
                .iter()
                .map(|&n| Channel {
                    number: n,
                    frequency_mhz: 2407 + 5 * n,
                    disabled: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_valid_ipv4_accepts_host_addresses() {
        assert!(valid_ipv4("192.168.1.50"));
        assert!(valid_ipv4("10.0.0.1"));
        assert!(valid_ipv4("1.0.0.254"));
        assert!(valid_ipv4("254.254.254.254"));
    }

    #[test]
    fn test_valid_ipv4_rejects_edges() {
        assert!(!valid_ipv4("192.168.1.0"));
        assert!(!valid_ipv4("10.0.0.255"));
        assert!(!valid_ipv4("0.1.2.3"));
        assert!(!valid_ipv4("255.1.2.3"));
        assert!(!valid_ipv4("10.255.0.1"));
        assert!(!valid_ipv4("10.0.255.1"));
    }

    #[test]
    fn test_valid_ipv4_rejects_malformed() {
        assert!(!valid_ipv4("10.0.0"));
        assert!(!valid_ipv4("10.0.0.1.5"));
        assert!(!valid_ipv4(""));
        assert!(!valid_ipv4("10..0.1"));
        assert!(!valid_ipv4("10.0.0.a"));
        assert!(!valid_ipv4("10.0.0.-1"));
        assert!(!valid_ipv4("10.0.0.1000"));
        assert!(!valid_ipv4(" 10.0.0.1"));
    }

    #[test]
    fn test_netmask_prefix() {
        assert_eq!(netmask_prefix("255.255.255.0"), Some(24));
        assert_eq!(netmask_prefix("255.255.0.0"), Some(16));
        assert_eq!(netmask_prefix("255.0.255.0"), None);
        assert_eq!(netmask_prefix("nope"), None);
    }

    #[test]
    fn test_valid_channel() {
        let mut radio = radio_with_channels(&[1, 6, 11]);
        radio.channels.push(Channel {
            number: 13,
            frequency_mhz: 2472,
            disabled: true,
        });
        assert!(valid_channel(&radio, 6));
        assert!(!valid_channel(&radio, 3));
        assert!(!valid_channel(&radio, 13));
    }

    #[test]
    fn test_frequency_corridor() {
        let radio = radio_with_channels(&(1..=11).collect::<Vec<_>>());

        assert!(!valid_frequency_corridor(&radio, "HT40+", 11));
        assert!(valid_frequency_corridor(&radio, "HT40+", 5));
        assert!(!valid_frequency_corridor(&radio, "HT40-", 1));
        assert!(valid_frequency_corridor(&radio, "HT40-", 6));
        for channel in 1..=11 {
            assert!(valid_frequency_corridor(&radio, "HT20", channel));
        }
        assert!(!valid_frequency_corridor(&radio, "HT80", 6));
    }

    #[test]
    fn test_frequency_corridor_without_channels() {
        let radio = radio_with_channels(&[]);
        assert!(!valid_frequency_corridor(&radio, "HT40+", 1));
        assert!(!valid_frequency_corridor(&radio, "HT40-", 1));
    }

    #[test]
    fn test_lease_bounds() {
        assert_eq!(lease_bounds("100", "200"), Some((100, 200)));
        assert_eq!(lease_bounds("1", "254"), Some((1, 254)));
        assert_eq!(lease_bounds("0", "200"), None);
        assert_eq!(lease_bounds("100", "255"), None);
        assert_eq!(lease_bounds("200", "100"), None);
        assert_eq!(lease_bounds("x", "100"), None);
    }

    #[test]
    fn test_passphrase_length() {
        assert!(valid_passphrase("correcthorse"));
        assert!(!valid_passphrase("short"));
        assert!(!valid_passphrase(&"a".repeat(64)));
    }

    #[test]
    fn test_subnet_prefix() {
        assert_eq!(subnet_prefix(Ipv4Addr::new(192, 168, 4, 1)), "192.168.4");
    }
}
