//! Stopping the managed daemons before teardown

use crate::config::ServiceConfig;
use crate::controller::NetworkController;
use crate::progress::Progress;
use meshrecon_common::{Error, Result};
use tracing::{debug, info, warn};

/// Process-table name of a daemon binary (`/usr/sbin/hostapd` -> `hostapd`)
pub fn process_name(binary: &str) -> &str {
    binary.rsplit('/').next().unwrap_or(binary)
}

/// Make sure no instance of the daemon survives.
///
/// Asks the service manager first, then sends SIGKILL to every remaining
/// pid. Succeeds only when the process table is empty afterwards.
pub async fn stop_if_running(
    ctl: &dyn NetworkController,
    service: &ServiceConfig,
    progress: &Progress,
) -> Result<()> {
    let name = process_name(&service.binary);

    if ctl.find_processes(name).await?.is_empty() {
        debug!("{} is not running", name);
        progress.step(&format!("{} not running", name), true);
        return Ok(());
    }

    info!("Stopping {} via service {}", name, service.service);
    if let Err(e) = ctl.stop_service(&service.service).await {
        warn!("Graceful stop of {} failed: {}", service.service, e);
    }
    ctl.settle().await;

    let survivors = ctl.find_processes(name).await?;
    if !survivors.is_empty() {
        info!("Force killing {} ({} process(es))", name, survivors.len());
        for pid in survivors {
            if let Err(e) = ctl.kill_process(pid).await {
                warn!("Failed to kill {} pid {}: {}", name, pid, e);
            }
        }
        ctl.settle().await;
    }

    let result = if ctl.find_processes(name).await?.is_empty() {
        Ok(())
    } else {
        Err(Error::ServiceStop {
            daemon: name.to_string(),
        })
    };
    progress.track(&format!("Stopping {}", name), result)
}
