//! Reconciliation pipeline
//!
//! Drives the phases in fixed order against one controller: stop daemons,
//! flush the old topology, build mesh and bridge, then provision hostapd and
//! dnsmasq. The first failing phase ends the run.

use crate::builder::{build_bridge, build_mesh};
use crate::config::RuntimeConfig;
use crate::controller::NetworkController;
use crate::flusher::flush_all;
use crate::progress::Progress;
use crate::provisioner::{provision_access_point, provision_dhcp};
use crate::supervisor::stop_if_running;
use meshrecon_common::{config, DaemonKind, NetConfig, Result, TopologySummary};
use std::path::Path;
use tracing::{error, info};

/// Reconciler that rebuilds the host topology from a configuration
pub struct Reconciler<'a> {
    ctl: &'a dyn NetworkController,
    runtime: &'a RuntimeConfig,
    progress: &'a Progress,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        ctl: &'a dyn NetworkController,
        runtime: &'a RuntimeConfig,
        progress: &'a Progress,
    ) -> Self {
        Self {
            ctl,
            runtime,
            progress,
        }
    }

    /// Load the configuration at `path` and reconcile it
    pub async fn run(&self, path: &Path) -> Result<TopologySummary> {
        self.progress.banner("Loading configuration");
        let cfg = self
            .progress
            .track(&format!("Reading {}", path.display()), config::load(path))?;
        self.reconcile(&cfg).await
    }

    /// Tear down and rebuild
    pub async fn reconcile(&self, cfg: &NetConfig) -> Result<TopologySummary> {
        let result = self.phases(cfg).await;
        match &result {
            Ok(summary) => info!(
                "Reconciliation complete: mesh={:?} bridge={:?}",
                summary.mesh_interface, summary.bridge
            ),
            Err(e) => error!("Reconciliation failed: {}", e),
        }
        result
    }

    async fn phases(&self, cfg: &NetConfig) -> Result<TopologySummary> {
        let (ctl, runtime, progress) = (self.ctl, self.runtime, self.progress);

        progress.banner("Stopping services");
        stop_if_running(ctl, &runtime.hostapd, progress).await?;
        stop_if_running(ctl, &runtime.dnsmasq, progress).await?;

        flush_all(ctl, runtime.preserve_loopback, progress).await?;

        progress.banner("Building mesh interface");
        let mesh = build_mesh(ctl, &cfg.mesh, runtime, progress).await?;

        progress.banner("Building bridge");
        let bridge = build_bridge(ctl, &cfg.bridge, mesh.as_deref(), runtime, progress).await?;

        let mut daemons = Vec::new();
        progress.banner("Provisioning hostapd");
        if provision_access_point(ctl, &cfg.hostapd, Some(&bridge.name), runtime, progress).await? {
            daemons.push(DaemonKind::AccessPoint);
        }
        progress.banner("Provisioning dnsmasq");
        if provision_dhcp(ctl, &cfg.dnsmasq, Some(&bridge.name), runtime, progress).await? {
            daemons.push(DaemonKind::Dhcp);
        }

        Ok(TopologySummary {
            mesh_interface: mesh,
            bridge: Some(bridge.name),
            bridge_members: bridge.members,
            daemons,
        })
    }
}
