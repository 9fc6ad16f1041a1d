//! OS-backed controller
//!
//! Shells out to iproute2 (`ip`), `iw`, `pgrep` and `service`, and signals
//! processes directly through `nix`.

use super::parse;
use super::NetworkController;
use async_trait::async_trait;
use meshrecon_common::{
    AdminState, Error, HtMode, RadioInfo, Result, RouteEntry, WirelessInterface,
};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Controller that acts on the live host
pub struct SystemNetwork {
    settle_delay: Duration,
}

impl SystemNetwork {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    async fn exec(&self, program: &str, args: &[&str]) -> Result<(String, Output)> {
        let command = format!("{} {}", program, args.join(" "));
        debug!("exec: {}", command);

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Command {
                command: command.clone(),
                stderr: if e.kind() == ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                },
            })?;
        Ok((command, output))
    }

    /// Run a command and return stdout, failing on a non-zero exit
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let (command, output) = self.exec(program, args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("stdout: {}", stdout);

        if output.status.success() {
            Ok(stdout)
        } else {
            Err(Error::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl NetworkController for SystemNetwork {
    async fn list_interfaces(&self) -> Result<Vec<String>> {
        let out = self.run("ip", &["-o", "link", "show"]).await?;
        Ok(parse::parse_link_names(&out))
    }

    async fn interface_exists(&self, name: &str) -> Result<bool> {
        let (_, output) = self.exec("ip", &["link", "show", "dev", name]).await?;
        Ok(output.status.success())
    }

    async fn list_wireless(&self) -> Result<Vec<WirelessInterface>> {
        let out = self.run("iw", &["dev"]).await?;
        Ok(parse::parse_iw_dev(&out))
    }

    async fn radio_info(&self, phy: &str) -> Result<RadioInfo> {
        let out = self.run("iw", &["phy", phy, "info"]).await?;
        Ok(parse::parse_phy_info(phy, &out))
    }

    async fn add_mesh_interface(&self, phy: &str, name: &str, mesh_id: &str) -> Result<()> {
        self.run(
            "iw",
            &["phy", phy, "interface", "add", name, "type", "mp", "mesh_id", mesh_id],
        )
        .await
        .map(drop)
    }

    async fn delete_wireless_interface(&self, name: &str) -> Result<()> {
        self.run("iw", &["dev", name, "del"]).await.map(drop)
    }

    async fn set_channel(&self, name: &str, channel: u32, mode: HtMode) -> Result<()> {
        let channel = channel.to_string();
        let mode = mode.to_string();
        self.run("iw", &["dev", name, "set", "channel", &channel, &mode])
            .await
            .map(drop)
    }

    async fn set_link_state(&self, name: &str, state: AdminState) -> Result<()> {
        let state = state.to_string();
        self.run("ip", &["link", "set", "dev", name, &state])
            .await
            .map(drop)
    }

    async fn list_bridges(&self) -> Result<Vec<String>> {
        let out = self.run("ip", &["-o", "link", "show", "type", "bridge"]).await?;
        Ok(parse::parse_link_names(&out))
    }

    async fn bridge_members(&self, bridge: &str) -> Result<Vec<String>> {
        let out = self.run("ip", &["-o", "link", "show", "master", bridge]).await?;
        Ok(parse::parse_link_names(&out))
    }

    async fn create_bridge(&self, name: &str) -> Result<()> {
        self.run("ip", &["link", "add", "name", name, "type", "bridge"])
            .await
            .map(drop)
    }

    async fn delete_bridge(&self, name: &str) -> Result<()> {
        self.run("ip", &["link", "delete", "dev", name, "type", "bridge"])
            .await
            .map(drop)
    }

    async fn add_bridge_member(&self, bridge: &str, member: &str) -> Result<()> {
        self.run("ip", &["link", "set", "dev", member, "master", bridge])
            .await
            .map(drop)
    }

    async fn remove_bridge_member(&self, _bridge: &str, member: &str) -> Result<()> {
        self.run("ip", &["link", "set", "dev", member, "nomaster"])
            .await
            .map(drop)
    }

    async fn assign_address(&self, name: &str, addr: Ipv4Addr, prefix: u8) -> Result<()> {
        let cidr = format!("{}/{}", addr, prefix);
        self.run("ip", &["addr", "replace", &cidr, "dev", name])
            .await
            .map(drop)
    }

    async fn interface_address(&self, name: &str) -> Result<Option<Ipv4Addr>> {
        let out = self.run("ip", &["-4", "-o", "addr", "show", "dev", name]).await?;
        Ok(parse::parse_inet_address(&out))
    }

    async fn list_routes(&self) -> Result<Vec<RouteEntry>> {
        let out = self.run("ip", &["-4", "route", "show"]).await?;
        Ok(parse::parse_routes(&out))
    }

    async fn delete_route(&self, route: &RouteEntry) -> Result<()> {
        let network = route
            .network()
            .map_err(|e| Error::Command {
                command: format!("ip route del {}", route),
                stderr: e.to_string(),
            })?
            .to_string();
        self.run("ip", &["route", "del", &network, "dev", &route.device])
            .await
            .map(drop)
    }

    async fn find_processes(&self, name: &str) -> Result<Vec<i32>> {
        let (command, output) = self.exec("pgrep", &["-x", name]).await?;
        match output.status.code() {
            Some(0) => Ok(parse::parse_pids(&String::from_utf8_lossy(&output.stdout))),
            // pgrep exits 1 when nothing matched
            Some(1) => Ok(Vec::new()),
            _ => Err(Error::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn stop_service(&self, service: &str) -> Result<()> {
        self.run("service", &[service, "stop"]).await.map(drop)
    }

    async fn kill_process(&self, pid: i32) -> Result<()> {
        debug!("SIGKILL {}", pid);
        kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(|e| Error::Command {
            command: format!("kill -9 {}", pid),
            stderr: e.to_string(),
        })
    }

    async fn start_daemon(&self, binary: &str, args: &[String]) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(binary, &args).await.map(drop)
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settle_delay).await;
    }
}
