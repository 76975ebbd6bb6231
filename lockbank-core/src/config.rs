//! Configuration management
//!
//! Settings live in `settings.json` inside the lockbank directory:
//! ```json
//! {
//!   "harness": { "holdMs": 1000, "staggerMs": 50, "deadlockTimeoutMs": 3000, ... }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;

/// Environment variable overriding the deadlock timeout (for CI)
pub const DEADLOCK_TIMEOUT_ENV: &str = "LOCKBANK_DEADLOCK_TIMEOUT_MS";

pub const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    harness: HarnessConfig,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Parameters for the demo harness phases
///
/// Defaults reproduce the reference schedule: 10 workers doing 100
/// deposit/withdraw pairs of 10.00, mirrored transfers of 100 and 50
/// started 50 ms apart with a 1 s hold, and a 3 s deadlock timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    pub workers: usize,
    pub iterations: usize,
    pub contention_amount: Decimal,
    pub first_amount: Decimal,
    pub second_amount: Decimal,
    pub stagger_ms: u64,
    pub hold_ms: u64,
    pub deadlock_timeout_ms: u64,
    pub cancel_grace_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            iterations: 100,
            contention_amount: Decimal::new(10, 0),
            first_amount: Decimal::new(100, 0),
            second_amount: Decimal::new(50, 0),
            stagger_ms: 50,
            hold_ms: 1000,
            deadlock_timeout_ms: 3000,
            cancel_grace_ms: 1000,
        }
    }
}

impl HarnessConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn deadlock_timeout(&self) -> Duration {
        Duration::from_millis(self.deadlock_timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    /// Reject schedules the harness cannot run meaningfully
    ///
    /// The hold delay must cover the stagger, otherwise the first unsafe
    /// transfer can finish before the mirrored one takes its first lock.
    pub fn validate(&self) -> crate::domain::result::Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.hold_ms < self.stagger_ms {
            return Err(Error::config(format!(
                "holdMs ({}) must be at least staggerMs ({})",
                self.hold_ms, self.stagger_ms
            )));
        }
        if self.deadlock_timeout_ms == 0 {
            return Err(Error::config("deadlockTimeoutMs must be positive"));
        }
        for (name, amount) in [
            ("contentionAmount", self.contention_amount),
            ("firstAmount", self.first_amount),
            ("secondAmount", self.second_amount),
        ] {
            if amount < Decimal::ZERO {
                return Err(Error::config(format!("{} cannot be negative", name)));
            }
        }
        Ok(())
    }
}

/// Lockbank configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub harness: HarnessConfig,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the lockbank directory
    ///
    /// A missing or malformed settings file yields defaults. The
    /// deadlock timeout can be overridden through [`DEADLOCK_TIMEOUT_ENV`].
    pub fn load(lockbank_dir: &Path) -> Result<Self> {
        let settings_path = lockbank_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut harness = raw.harness.clone();
        apply_timeout_override(&mut harness, std::env::var(DEADLOCK_TIMEOUT_ENV).ok().as_deref());

        Ok(Self {
            harness,
            _raw_settings: raw,
        })
    }

    /// Save config to the lockbank directory
    pub fn save(&self, lockbank_dir: &Path) -> Result<()> {
        let settings_path = lockbank_dir.join(SETTINGS_FILE);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.harness = self.harness.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

/// Apply the env override; unparsable values are ignored
fn apply_timeout_override(harness: &mut HarnessConfig, value: Option<&str>) {
    if let Some(ms) = value.and_then(|v| v.trim().parse::<u64>().ok()) {
        harness.deadlock_timeout_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_reference_schedule() {
        let config = HarnessConfig::default();
        assert_eq!(config.deadlock_timeout(), Duration::from_secs(3));
        assert_eq!(config.hold(), Duration::from_secs(1));
        assert_eq!(config.stagger(), Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_hold() {
        let config = HarnessConfig {
            hold_ms: 10,
            stagger_ms: 50,
            ..HarnessConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("holdMs"));

        let config = HarnessConfig {
            workers: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_settings_file_uses_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"harness": {"holdMs": 250, "staggerMs": 20}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.harness.hold_ms, 250);
        assert_eq!(config.harness.stagger_ms, 20);
        assert_eq!(config.harness.workers, 10);
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.harness.workers, HarnessConfig::default().workers);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "harness": {"workers": 4}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.harness.iterations = 7;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["harness"]["workers"], 4);
        assert_eq!(value["harness"]["iterations"], 7);
    }

    #[test]
    fn test_timeout_override() {
        let mut harness = HarnessConfig::default();
        apply_timeout_override(&mut harness, Some("1500"));
        assert_eq!(harness.deadlock_timeout_ms, 1500);

        apply_timeout_override(&mut harness, Some("soon"));
        assert_eq!(harness.deadlock_timeout_ms, 1500);

        apply_timeout_override(&mut harness, None);
        assert_eq!(harness.deadlock_timeout_ms, 1500);
    }
}
