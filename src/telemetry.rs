// Logging setup.
//
// Diagnostics go through `tracing` to stderr, so they never land between a
// prompt and its answer. The level comes from `HOSTME_LOG` (or `RUST_LOG`)
// and defaults to warnings only.

use anyhow::{anyhow, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Filter from `HOSTME_LOG`, then `RUST_LOG`, else warnings only.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("HOSTME_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Later calls keep the first one.
pub fn init_tracing(filter: EnvFilter) -> Result<()> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;
    INSTALLED.set(()).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_tracing(EnvFilter::new("debug")).unwrap();
        init_tracing(EnvFilter::new("warn")).unwrap();
        tracing::debug!("still logging after a second init");
    }
}
