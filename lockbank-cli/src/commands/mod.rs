//! CLI command implementations

pub mod config;
pub mod history;
pub mod phase;
pub mod prompt;
pub mod render;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use lockbank_core::config::Config;
use lockbank_core::{LockbankContext, RunHistory, RunRecord};

/// Per-run overrides for the harness schedule
#[derive(Args, Debug, Default)]
pub struct HarnessArgs {
    /// Deadlock detection timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
    /// How long an unsafe transfer holds its first lock, in milliseconds
    #[arg(long, global = true)]
    pub hold_ms: Option<u64>,
    /// Delay before the mirrored transfer starts, in milliseconds
    #[arg(long, global = true)]
    pub stagger_ms: Option<u64>,
}

impl HarnessArgs {
    /// Apply overrides on top of the loaded settings
    pub fn apply(&self, config: &mut Config) {
        if let Some(ms) = self.timeout_ms {
            config.harness.deadlock_timeout_ms = ms;
        }
        if let Some(ms) = self.hold_ms {
            config.harness.hold_ms = ms;
        }
        if let Some(ms) = self.stagger_ms {
            config.harness.stagger_ms = ms;
        }
    }
}

/// Append a finished run to the history
///
/// A history that cannot be written never fails the run itself.
pub fn record_run(ctx: &LockbankContext, record: &RunRecord) {
    let recorded = RunHistory::open(&ctx.lockbank_dir).and_then(|history| history.record(record));
    if let Err(e) = recorded {
        tracing::warn!(error = %e, "could not record run history");
    }
}

/// Get the lockbank directory from LOCKBANK_DIR or default to ~/.lockbank
pub fn get_lockbank_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LOCKBANK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".lockbank"))
        .context("Could not find home directory; set LOCKBANK_DIR")
}

/// Load settings, apply overrides and build the context
pub fn get_context(overrides: &HarnessArgs) -> Result<LockbankContext> {
    let lockbank_dir = get_lockbank_dir()?;
    std::fs::create_dir_all(&lockbank_dir)
        .with_context(|| format!("Failed to create lockbank directory: {:?}", lockbank_dir))?;

    let mut config = Config::load(&lockbank_dir)?;
    overrides.apply(&mut config);
    tracing::debug!(dir = %lockbank_dir.display(), harness = ?config.harness, "settings loaded");

    LockbankContext::with_config(&lockbank_dir, config)
        .context("Failed to initialize lockbank context")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_only_given_fields() {
        let mut config = Config::default();
        let args = HarnessArgs {
            timeout_ms: Some(1200),
            ..HarnessArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.harness.deadlock_timeout_ms, 1200);
        assert_eq!(config.harness.hold_ms, 1000);
        assert_eq!(config.harness.stagger_ms, 50);
    }
}
