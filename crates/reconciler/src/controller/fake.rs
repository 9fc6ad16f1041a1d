//! In-memory controller for tests
//!
//! Models links, radios, bridges, routes and processes well enough for the
//! reconciliation phases to run end to end. Faults can be injected per link
//! or per daemon, and every mutation is appended to a log.

use super::NetworkController;
use async_trait::async_trait;
use meshrecon_common::{
    AdminState, Channel, Error, HtMode, InterfaceKind, RadioInfo, Result, RouteEntry,
    WirelessInterface,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Observable state of one fake link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLink {
    pub kind: InterfaceKind,
    pub state: AdminState,
    pub phy: Option<String>,
    pub master: Option<String>,
    pub addresses: Vec<(Ipv4Addr, u8)>,
    pub channel: Option<(u32, HtMode)>,
    pub mesh_id: Option<String>,
}

impl FakeLink {
    fn new(kind: InterfaceKind, phy: Option<String>) -> Self {
        Self {
            kind,
            state: AdminState::Down,
            phy,
            master: None,
            addresses: Vec::new(),
            channel: None,
            mesh_id: None,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    links: BTreeMap<String, FakeLink>,
    radios: BTreeMap<String, RadioInfo>,
    routes: Vec<RouteEntry>,
    processes: BTreeMap<i32, String>,
    next_pid: i32,
    installed: BTreeSet<String>,
    stubborn: BTreeSet<String>,
    unkillable: BTreeSet<String>,
    crashing: BTreeSet<String>,
    failing: BTreeSet<String>,
    log: Vec<String>,
    settles: usize,
}

impl FakeState {
    fn check(&self, name: &str, op: &str) -> Result<()> {
        if self.failing.contains(name) {
            return Err(fake_error(op, name, "injected failure"));
        }
        if !self.links.contains_key(name) {
            return Err(fake_error(op, name, "no such device"));
        }
        Ok(())
    }

    fn link_mut(&mut self, name: &str, op: &str) -> Result<&mut FakeLink> {
        self.check(name, op)?;
        self.links
            .get_mut(name)
            .ok_or_else(|| fake_error(op, name, "no such device"))
    }

    fn detach_from(&mut self, bridge: &str) {
        for link in self.links.values_mut() {
            if link.master.as_deref() == Some(bridge) {
                link.master = None;
            }
        }
    }
}

fn fake_error(op: &str, name: &str, reason: &str) -> Error {
    Error::Command {
        command: format!("{} {}", op, name),
        stderr: reason.to_string(),
    }
}

/// In-memory host network
#[derive(Debug)]
pub struct FakeNetwork {
    state: Mutex<FakeState>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeNetwork {
    /// A host with only an active loopback interface
    pub fn new() -> Self {
        let mut state = FakeState {
            next_pid: 1000,
            ..Default::default()
        };
        let mut lo = FakeLink::new(InterfaceKind::Wired, None);
        lo.state = AdminState::Up;
        state.links.insert("lo".to_string(), lo);
        Self {
            state: Mutex::new(state),
        }
    }

    /// 2.4 GHz radio with the given enabled channels
    pub fn radio(name: &str, channels: impl IntoIterator<Item = u32>, mesh_capable: bool) -> RadioInfo {
        let mut modes = vec!["managed".to_string(), "ap".to_string()];
        if mesh_capable {
            modes.push("mesh point".to_string());
        }
        RadioInfo {
            name: name.to_string(),
            modes,
            channels: channels
                .into_iter()
                .map(|number| Channel {
                    number,
                    frequency_mhz: 2407 + 5 * number,
                    disabled: false,
                })
                .collect(),
        }
    }

    pub fn with_radio(mut self, radio: RadioInfo) -> Self {
        let state = self.state.get_mut();
        state.radios.insert(radio.name.clone(), radio);
        self
    }

    pub fn with_wired(mut self, name: &str) -> Self {
        self.state
            .get_mut()
            .links
            .insert(name.to_string(), FakeLink::new(InterfaceKind::Wired, None));
        self
    }

    pub fn with_station(mut self, name: &str, phy: &str) -> Self {
        self.state.get_mut().links.insert(
            name.to_string(),
            FakeLink::new(InterfaceKind::WirelessStation, Some(phy.to_string())),
        );
        self
    }

    pub fn with_mesh(mut self, name: &str, phy: &str) -> Self {
        self.state.get_mut().links.insert(
            name.to_string(),
            FakeLink::new(InterfaceKind::WirelessMesh, Some(phy.to_string())),
        );
        self
    }

    /// Bridge with existing members; members must already be added
    pub fn with_bridge(mut self, name: &str, members: &[&str]) -> Self {
        let state = self.state.get_mut();
        state
            .links
            .insert(name.to_string(), FakeLink::new(InterfaceKind::Bridge, None));
        for member in members {
            if let Some(link) = state.links.get_mut(*member) {
                link.master = Some(name.to_string());
            }
        }
        self
    }

    pub fn with_route(mut self, route: RouteEntry) -> Self {
        self.state.get_mut().routes.push(route);
        self
    }

    pub fn with_address(mut self, name: &str, addr: Ipv4Addr, prefix: u8) -> Self {
        if let Some(link) = self.state.get_mut().links.get_mut(name) {
            link.addresses.push((addr, prefix));
        }
        self
    }

    /// A running process
    pub fn with_process(mut self, name: &str) -> Self {
        let state = self.state.get_mut();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(pid, name.to_string());
        self
    }

    /// Make a daemon binary available to `start_daemon`
    pub fn with_daemon_binary(mut self, binary: &str) -> Self {
        self.state.get_mut().installed.insert(binary.to_string());
        self
    }

    /// Processes with this name ignore the graceful service stop
    pub fn stubborn(mut self, name: &str) -> Self {
        self.state.get_mut().stubborn.insert(name.to_string());
        self
    }

    /// Processes with this name survive SIGKILL
    pub fn unkillable(mut self, name: &str) -> Self {
        self.state.get_mut().unkillable.insert(name.to_string());
        self
    }

    /// Daemon starts cleanly but exits before the post-start check
    pub fn crashing(mut self, binary: &str) -> Self {
        self.state.get_mut().crashing.insert(binary.to_string());
        self
    }

    /// Every mutation of this link fails, as do member queries on it
    pub fn failing(mut self, name: &str) -> Self {
        self.state.get_mut().failing.insert(name.to_string());
        self
    }

    pub fn link(&self, name: &str) -> Option<FakeLink> {
        self.state.lock().links.get(name).cloned()
    }

    pub fn link_names(&self) -> Vec<String> {
        self.state.lock().links.keys().cloned().collect()
    }

    pub fn bridges(&self) -> Vec<String> {
        self.state
            .lock()
            .links
            .iter()
            .filter(|(_, l)| l.kind == InterfaceKind::Bridge)
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn mesh_interfaces(&self) -> Vec<String> {
        self.state
            .lock()
            .links
            .iter()
            .filter(|(_, l)| l.kind == InterfaceKind::WirelessMesh)
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn members_of(&self, bridge: &str) -> Vec<String> {
        self.state
            .lock()
            .links
            .iter()
            .filter(|(_, l)| l.master.as_deref() == Some(bridge))
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn routes(&self) -> Vec<RouteEntry> {
        self.state.lock().routes.clone()
    }

    pub fn running(&self, name: &str) -> usize {
        self.state
            .lock()
            .processes
            .values()
            .filter(|p| *p == name)
            .count()
    }

    /// Mutations applied so far, in order
    pub fn log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn settle_count(&self) -> usize {
        self.state.lock().settles
    }
}

#[async_trait]
impl NetworkController for FakeNetwork {
    async fn list_interfaces(&self) -> Result<Vec<String>> {
        Ok(self.link_names())
    }

    async fn interface_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().links.contains_key(name))
    }

    async fn list_wireless(&self) -> Result<Vec<WirelessInterface>> {
        Ok(self
            .state
            .lock()
            .links
            .iter()
            .filter_map(|(name, link)| {
                link.phy.as_ref().map(|phy| WirelessInterface {
                    name: name.clone(),
                    phy: phy.clone(),
                    kind: link.kind,
                })
            })
            .collect())
    }

    async fn radio_info(&self, phy: &str) -> Result<RadioInfo> {
        self.state
            .lock()
            .radios
            .get(phy)
            .cloned()
            .ok_or_else(|| fake_error("iw phy info", phy, "no such radio"))
    }

    async fn add_mesh_interface(&self, phy: &str, name: &str, mesh_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.radios.contains_key(phy) {
            return Err(fake_error("iw interface add", phy, "no such radio"));
        }
        if state.links.contains_key(name) || state.failing.contains(name) {
            return Err(fake_error("iw interface add", name, "cannot create interface"));
        }
        let mut link = FakeLink::new(InterfaceKind::WirelessMesh, Some(phy.to_string()));
        link.mesh_id = Some(mesh_id.to_string());
        state.links.insert(name.to_string(), link);
        state.log.push(format!("mesh add {} on {} id {}", name, phy, mesh_id));
        Ok(())
    }

    async fn delete_wireless_interface(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check(name, "iw del")?;
        state.links.remove(name);
        state.log.push(format!("wireless del {}", name));
        Ok(())
    }

    async fn set_channel(&self, name: &str, channel: u32, mode: HtMode) -> Result<()> {
        let mut state = self.state.lock();
        let link = state.link_mut(name, "iw set channel")?;
        link.channel = Some((channel, mode));
        state.log.push(format!("channel {} {} {}", name, channel, mode));
        Ok(())
    }

    async fn set_link_state(&self, name: &str, admin: AdminState) -> Result<()> {
        let mut state = self.state.lock();
        state.link_mut(name, "ip link set")?.state = admin;
        state.log.push(format!("link {} {}", name, admin));
        Ok(())
    }

    async fn list_bridges(&self) -> Result<Vec<String>> {
        Ok(self.bridges())
    }

    async fn bridge_members(&self, bridge: &str) -> Result<Vec<String>> {
        self.state.lock().check(bridge, "ip -o link show master")?;
        Ok(self.members_of(bridge))
    }

    async fn create_bridge(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.links.contains_key(name) || state.failing.contains(name) {
            return Err(fake_error("ip link add", name, "cannot create bridge"));
        }
        state
            .links
            .insert(name.to_string(), FakeLink::new(InterfaceKind::Bridge, None));
        state.log.push(format!("bridge add {}", name));
        Ok(())
    }

    async fn delete_bridge(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check(name, "ip link delete")?;
        state.detach_from(name);
        state.links.remove(name);
        state.log.push(format!("bridge del {}", name));
        Ok(())
    }

    async fn add_bridge_member(&self, bridge: &str, member: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check(bridge, "ip link set master")?;
        state.link_mut(member, "ip link set master")?.master = Some(bridge.to_string());
        state.log.push(format!("bridge {} addif {}", bridge, member));
        Ok(())
    }

    async fn remove_bridge_member(&self, bridge: &str, member: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.link_mut(member, "ip link set nomaster")?.master = None;
        state.log.push(format!("bridge {} delif {}", bridge, member));
        Ok(())
    }

    async fn assign_address(&self, name: &str, addr: Ipv4Addr, prefix: u8) -> Result<()> {
        let mut state = self.state.lock();
        let link = state.link_mut(name, "ip addr replace")?;
        link.addresses.retain(|(a, _)| *a != addr);
        link.addresses.push((addr, prefix));
        state.log.push(format!("addr {}/{} dev {}", addr, prefix, name));
        Ok(())
    }

    async fn interface_address(&self, name: &str) -> Result<Option<Ipv4Addr>> {
        let state = self.state.lock();
        let link = state
            .links
            .get(name)
            .ok_or_else(|| fake_error("ip addr show", name, "no such device"))?;
        Ok(link.addresses.first().map(|(a, _)| *a))
    }

    async fn list_routes(&self) -> Result<Vec<RouteEntry>> {
        Ok(self.routes())
    }

    async fn delete_route(&self, route: &RouteEntry) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing.contains(&route.device) {
            return Err(fake_error("ip route del", &route.to_string(), "injected failure"));
        }
        let before = state.routes.len();
        state.routes.retain(|r| r != route);
        if state.routes.len() == before {
            return Err(fake_error("ip route del", &route.to_string(), "no such route"));
        }
        state.log.push(format!("route del {}", route));
        Ok(())
    }

    async fn find_processes(&self, name: &str) -> Result<Vec<i32>> {
        Ok(self
            .state
            .lock()
            .processes
            .iter()
            .filter(|(_, p)| *p == name)
            .map(|(pid, _)| *pid)
            .collect())
    }

    async fn stop_service(&self, service: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.log.push(format!("service {} stop", service));
        if !state.stubborn.contains(service) {
            state.processes.retain(|_, p| p.as_str() != service);
        }
        Ok(())
    }

    async fn kill_process(&self, pid: i32) -> Result<()> {
        let mut state = self.state.lock();
        let name = state
            .processes
            .get(&pid)
            .cloned()
            .ok_or_else(|| fake_error("kill", &pid.to_string(), "no such process"))?;
        state.log.push(format!("kill {} ({})", pid, name));
        if !state.unkillable.contains(&name) {
            state.processes.remove(&pid);
        }
        Ok(())
    }

    async fn start_daemon(&self, binary: &str, args: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.installed.contains(binary) {
            return Err(fake_error(binary, &args.join(" "), "executable not found"));
        }
        state.log.push(format!("start {} {}", binary, args.join(" ")));
        if !state.crashing.contains(binary) {
            let name = binary.rsplit('/').next().unwrap_or(binary).to_string();
            let pid = state.next_pid;
            state.next_pid += 1;
            state.processes.insert(pid, name);
        }
        Ok(())
    }

    async fn settle(&self) {
        self.state.lock().settles += 1;
    }
}
