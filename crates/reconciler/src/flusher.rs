//! Teardown of pre-existing topology
//!
//! Each sub-phase walks everything it can discover, counts failures instead
//! of stopping at the first one, and reports a single [`Error::Teardown`] at
//! the end. Running them on an already clean host is a no-op.

use crate::allocator::in_namespace;
use crate::controller::NetworkController;
use crate::progress::Progress;
use meshrecon_common::{AdminState, Error, InterfaceKind, Result, TeardownPhase};
use tracing::{debug, info, warn};

pub const MESH_PREFIX: &str = "mesh";

const LOOPBACK: &str = "lo";

fn finish(phase: TeardownPhase, failures: usize) -> Result<()> {
    if failures == 0 {
        Ok(())
    } else {
        Err(Error::Teardown { phase, failures })
    }
}

/// Delete every mesh interface
pub async fn flush_mesh(ctl: &dyn NetworkController, progress: &Progress) -> Result<()> {
    let targets: Vec<String> = ctl
        .list_wireless()
        .await?
        .into_iter()
        .filter(|w| in_namespace(MESH_PREFIX, &w.name) || w.kind == InterfaceKind::WirelessMesh)
        .map(|w| w.name)
        .collect();

    if targets.is_empty() {
        progress.note("no mesh interfaces");
    }

    let mut failures = 0;
    for name in &targets {
        match ctl.delete_wireless_interface(name).await {
            Ok(()) => progress.step(&format!("Deleting {}", name), true),
            Err(e) => {
                warn!("Failed to delete mesh interface {}: {}", name, e);
                progress.step(&format!("Deleting {}", name), false);
                failures += 1;
            }
        }
    }
    if !targets.is_empty() {
        ctl.settle().await;
    }

    finish(TeardownPhase::Mesh, failures)
}

/// Empty and delete every bridge
///
/// A bridge is only deleted once all of its members were detached.
pub async fn flush_bridges(ctl: &dyn NetworkController, progress: &Progress) -> Result<()> {
    let bridges = ctl.list_bridges().await?;
    if bridges.is_empty() {
        progress.note("no bridges");
    }

    let mut failures = 0;
    for bridge in &bridges {
        let members = match ctl.bridge_members(bridge).await {
            Ok(members) => members,
            Err(e) => {
                warn!("Failed to list members of {}: {}", bridge, e);
                progress.step(&format!("Listing members of {}", bridge), false);
                failures += 1;
                continue;
            }
        };

        let mut detach_failures = 0;
        for member in members {
            let ok = match ctl.remove_bridge_member(bridge, &member).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to remove {} from {}: {}", member, bridge, e);
                    detach_failures += 1;
                    false
                }
            };
            progress.step(&format!("Removing {} from {}", member, bridge), ok);
        }

        if detach_failures > 0 {
            warn!("Keeping bridge {}: {} member(s) still attached", bridge, detach_failures);
            failures += detach_failures;
            continue;
        }

        let deleted = ctl.delete_bridge(bridge).await;
        if let Err(e) = &deleted {
            warn!("Failed to delete bridge {}: {}", bridge, e);
            failures += 1;
        }
        progress.step(&format!("Deleting bridge {}", bridge), deleted.is_ok());
    }
    if !bridges.is_empty() {
        ctl.settle().await;
    }

    finish(TeardownPhase::Bridge, failures)
}

/// Set every interface administratively down; nothing is deleted
pub async fn flush_interfaces(
    ctl: &dyn NetworkController,
    preserve_loopback: bool,
    progress: &Progress,
) -> Result<()> {
    let mut failures = 0;
    for name in ctl.list_interfaces().await? {
        if preserve_loopback && name == LOOPBACK {
            debug!("Leaving {} up", name);
            continue;
        }
        let result = ctl.set_link_state(&name, AdminState::Down).await;
        if let Err(e) = &result {
            warn!("Failed to take {} down: {}", name, e);
            failures += 1;
        }
        progress.step(&format!("Taking {} down", name), result.is_ok());
    }
    ctl.settle().await;

    finish(TeardownPhase::Interface, failures)
}

/// Delete every IPv4 route
pub async fn flush_routes(ctl: &dyn NetworkController, progress: &Progress) -> Result<()> {
    let routes = ctl.list_routes().await?;
    if routes.is_empty() {
        progress.note("no routes");
    }

    let mut failures = 0;
    for route in &routes {
        let result = ctl.delete_route(route).await;
        if let Err(e) = &result {
            warn!("Failed to delete route {}: {}", route, e);
            failures += 1;
        }
        progress.step(&format!("Deleting route {}", route), result.is_ok());
    }

    finish(TeardownPhase::Route, failures)
}

/// All four sub-phases in order, stopping after the first that failed
pub async fn flush_all(
    ctl: &dyn NetworkController,
    preserve_loopback: bool,
    progress: &Progress,
) -> Result<()> {
    info!("Flushing existing topology");
    progress.banner("Flushing mesh interfaces");
    flush_mesh(ctl, progress).await?;
    progress.banner("Flushing bridges");
    flush_bridges(ctl, progress).await?;
    progress.banner("Flushing network interfaces");
    flush_interfaces(ctl, preserve_loopback, progress).await?;
    progress.banner("Flushing routes");
    flush_routes(ctl, progress).await
}
