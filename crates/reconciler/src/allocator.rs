//! Auto-numbered interface names (`mesh0`, `bridge3`, ...)

use crate::controller::NetworkController;
use meshrecon_common::{Error, Result};
use tracing::debug;

/// Lowest `{prefix}{index}` that does not exist yet, probing up to `limit`
pub async fn next_free(ctl: &dyn NetworkController, prefix: &str, limit: u32) -> Result<String> {
    for index in 0..limit {
        let name = format!("{}{}", prefix, index);
        if !ctl.interface_exists(&name).await? {
            debug!("Allocated interface name {}", name);
            return Ok(name);
        }
    }
    Err(Error::NameExhausted {
        prefix: prefix.to_string(),
        limit,
    })
}

/// True iff `name` is `prefix` followed by a decimal index
pub fn in_namespace(prefix: &str, name: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}
