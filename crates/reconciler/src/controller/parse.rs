//! Parsers for `ip`, `iw` and `pgrep` output

use ipnetwork::Ipv4Network;
use meshrecon_common::{Channel, InterfaceKind, RadioInfo, RouteEntry, WirelessInterface};
use std::net::Ipv4Addr;

/// Interface names from `ip -o link show`
///
/// Lines look like `3: wlan0: <BROADCAST,...> mtu 1500 ...`; names of
/// stacked devices carry an `@parent` suffix that is dropped.
pub fn parse_link_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, ": ");
            let index = fields.next()?.trim();
            if index.parse::<u32>().is_err() {
                return None;
            }
            let name = fields.next()?.split('@').next()?.trim();
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// Wireless interfaces from `iw dev`
pub fn parse_iw_dev(output: &str) -> Vec<WirelessInterface> {
    let mut result = Vec::new();
    let mut phy: Option<String> = None;
    let mut current: Option<WirelessInterface> = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(index) = trimmed.strip_prefix("phy#") {
            result.extend(current.take());
            phy = Some(format!("phy{}", index));
        } else if let Some(name) = trimmed.strip_prefix("Interface ") {
            result.extend(current.take());
            if let Some(phy) = &phy {
                current = Some(WirelessInterface {
                    name: name.trim().to_string(),
                    phy: phy.clone(),
                    kind: InterfaceKind::WirelessStation,
                });
            }
        } else if let Some(iftype) = trimmed.strip_prefix("type ") {
            if let Some(iface) = current.as_mut() {
                if iftype.trim() == "mesh point" {
                    iface.kind = InterfaceKind::WirelessMesh;
                }
            }
        }
    }
    result.extend(current);
    result
}

#[derive(PartialEq)]
enum PhySection {
    Modes,
    Frequencies,
    Other,
}

/// Radio capabilities from `iw phy <phy> info`
pub fn parse_phy_info(name: &str, output: &str) -> RadioInfo {
    let mut radio = RadioInfo {
        name: name.to_string(),
        ..Default::default()
    };
    let mut section = PhySection::Other;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.ends_with(':') {
            section = match trimmed {
                "Supported interface modes:" => PhySection::Modes,
                "Frequencies:" => PhySection::Frequencies,
                _ => PhySection::Other,
            };
            continue;
        }

        let Some(item) = trimmed.strip_prefix("* ") else {
            continue;
        };
        match section {
            PhySection::Modes => radio.modes.push(item.trim().to_lowercase()),
            PhySection::Frequencies => radio.channels.extend(parse_frequency(item)),
            PhySection::Other => {}
        }
    }
    radio
}

// "2412 MHz [1] (20.0 dBm)" or "2484.0 MHz [14] (disabled)"
fn parse_frequency(item: &str) -> Option<Channel> {
    let frequency: f64 = item.split_whitespace().next()?.parse().ok()?;
    let open = item.find('[')?;
    let close = item[open..].find(']')? + open;
    let number: u32 = item[open + 1..close].trim().parse().ok()?;
    Some(Channel {
        number,
        frequency_mhz: frequency.round() as u32,
        disabled: item.contains("(disabled)"),
    })
}

/// Routes with an egress device from `ip -4 route show`
pub fn parse_routes(output: &str) -> Vec<RouteEntry> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let destination = *tokens.first()?;
            let network = if destination == "default" {
                Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0).ok()?
            } else {
                destination.parse::<Ipv4Network>().ok()?
            };
            let dev_pos = tokens.iter().position(|t| *t == "dev")?;
            let device = tokens.get(dev_pos + 1)?;
            Some(RouteEntry::new(network, *device))
        })
        .collect()
}

/// First address from `ip -4 -o addr show dev <name>`
pub fn parse_inet_address(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        tokens.find(|t| *t == "inet")?;
        let cidr = tokens.next()?;
        cidr.split('/').next()?.parse().ok()
    })
}

/// Pids from `pgrep` output, one per line
pub fn parse_pids(output: &str) -> Vec<i32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_LINK: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN mode DEFAULT group default qlen 1000\\    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP mode DEFAULT group default qlen 1000\\    link/ether b8:27:eb:00:00:01 brd ff:ff:ff:ff:ff:ff
3: wlan0: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DORMANT group default qlen 1000\\    link/ether b8:27:eb:00:00:02 brd ff:ff:ff:ff:ff:ff
7: veth1@if6: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP\\    link/ether 3a:00:00:00:00:01 brd ff:ff:ff:ff:ff:ff link-netnsid 0
";

    const IW_DEV: &str = "\
phy#1
\tInterface mesh0
\t\tifindex 9
\t\twdev 0x100000002
\t\taddr 00:c0:ca:00:00:01
\t\ttype mesh point
\t\tchannel 6 (2437 MHz), width: 20 MHz, center1: 2437 MHz
phy#0
\tUnnamed/non-netdev interface
\t\twdev 0x2
\t\ttype P2P-device
\tInterface wlan0
\t\tifindex 3
\t\twdev 0x1
\t\taddr b8:27:eb:00:00:02
\t\ttype managed
";

    const PHY_INFO: &str = "\
Wiphy phy0
\tmax # scan SSIDs: 4
\tSupported interface modes:
\t\t * IBSS
\t\t * managed
\t\t * AP
\t\t * mesh point
\tBand 1:
\t\tCapabilities: 0x1062
\t\tBitrates (non-HT):
\t\t\t* 1.0 Mbps
\t\t\t* 2.0 Mbps (short preamble supported)
\t\tFrequencies:
\t\t\t* 2412 MHz [1] (20.0 dBm)
\t\t\t* 2437.0 MHz [6] (20.0 dBm)
\t\t\t* 2462 MHz [11] (20.0 dBm)
\t\t\t* 2472 MHz [13] (disabled)
\tSupported commands:
\t\t * new_interface
\t\t * set_interface
\tsoftware interface modes (can always be added):
\t\t * AP/VLAN
\t\t * monitor
";

    const ROUTES: &str = "\
default via 192.168.1.1 dev eth0 proto dhcp metric 100
192.168.1.0/24 dev eth0 proto kernel scope link src 192.168.1.5 metric 100
10.8.0.1 dev tun0 scope link
unreachable 10.99.0.0/16
";

    #[test]
    fn test_parse_link_names() {
        assert_eq!(parse_link_names(IP_LINK), vec!["lo", "eth0", "wlan0", "veth1"]);
        assert!(parse_link_names("").is_empty());
    }

    #[test]
    fn test_parse_iw_dev() {
        let ifaces = parse_iw_dev(IW_DEV);
        assert_eq!(ifaces.len(), 2);
        assert_eq!(ifaces[0].name, "mesh0");
        assert_eq!(ifaces[0].phy, "phy1");
        assert_eq!(ifaces[0].kind, InterfaceKind::WirelessMesh);
        assert_eq!(ifaces[1].name, "wlan0");
        assert_eq!(ifaces[1].phy, "phy0");
        assert_eq!(ifaces[1].kind, InterfaceKind::WirelessStation);
    }

    #[test]
    fn test_parse_phy_info() {
        let radio = parse_phy_info("phy0", PHY_INFO);
        assert_eq!(radio.modes, vec!["ibss", "managed", "ap", "mesh point"]);
        assert!(radio.supports_mesh_point());
        assert_eq!(radio.channels.len(), 4);
        assert_eq!(radio.channels[1].frequency_mhz, 2437);
        assert!(radio.channels[3].disabled);
        assert_eq!(radio.enabled_channels(), vec![1, 6, 11]);
    }

    #[test]
    fn test_parse_routes() {
        let routes = parse_routes(ROUTES);
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].destination, Ipv4Addr::UNSPECIFIED);
        assert_eq!(routes[0].netmask, Ipv4Addr::UNSPECIFIED);
        assert_eq!(routes[0].device, "eth0");
        assert_eq!(routes[1].to_string(), "192.168.1.0/24 dev eth0");
        assert_eq!(routes[2].netmask, Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(routes[2].device, "tun0");
    }

    #[test]
    fn test_parse_inet_address() {
        let out = "2: eth0    inet 192.168.4.1/24 brd 192.168.4.255 scope global eth0\\       valid_lft forever preferred_lft forever\n";
        assert_eq!(parse_inet_address(out), Some(Ipv4Addr::new(192, 168, 4, 1)));
        assert_eq!(parse_inet_address(""), None);
    }

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids("123\n456\n\n"), vec![123, 456]);
        assert!(parse_pids("").is_empty());
    }
}
