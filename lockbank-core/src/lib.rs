//! Lockbank Core - account locking and transfer protocols
//!
//! A teaching crate for deadlock causation and avoidance:
//!
//! - **domain**: the [`Account`] entity, [`CancellationToken`] and the two
//!   transfer protocols (order-dependent and identity-ordered)
//! - **ports**: trait definitions for external collaborators
//! - **services**: the demo harness and the run history
//! - **config**: harness parameters loaded from `settings.json`

pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};

use anyhow::Result;

use config::Config;
use services::DemoHarness;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    lock_order, transfer_safe, transfer_unsafe, transfer_unsafe_with_hold, try_transfer_safe,
    Account, AccountId, CancellationToken, TransferOutcome, DEFAULT_HOLD_DELAY,
};
pub use ports::{FixedBalances, OpeningBalanceSource, OpeningBalances};
pub use services::{RunHistory, RunRecord};

/// Main context for lockbank operations
///
/// Holds the configuration and the harness built from it.
pub struct LockbankContext {
    pub lockbank_dir: PathBuf,
    pub config: Config,
    pub harness: DemoHarness,
}

impl LockbankContext {
    /// Load configuration from `lockbank_dir` and build the harness
    pub fn new(lockbank_dir: &Path) -> Result<Self> {
        let config = Config::load(lockbank_dir)?;
        Self::with_config(lockbank_dir, config)
    }

    /// Build a context from an already adjusted configuration
    pub fn with_config(lockbank_dir: &Path, config: Config) -> Result<Self> {
        let harness = DemoHarness::new(config.harness.clone())?;
        Ok(Self {
            lockbank_dir: lockbank_dir.to_path_buf(),
            config,
            harness,
        })
    }
}
