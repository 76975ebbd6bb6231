//! Config command - show or initialize harness settings

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use lockbank_core::config::{Config, DEADLOCK_TIMEOUT_ENV, SETTINGS_FILE};

use super::{get_context, get_lockbank_dir, HarnessArgs};
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings, including environment and flag overrides
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write default settings to settings.json
    Init {
        /// Overwrite existing settings without asking
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(command: ConfigCommands, overrides: &HarnessArgs) -> Result<()> {
    match command {
        ConfigCommands::Show { json } => show(json, overrides),
        ConfigCommands::Init { force } => init(force),
    }
}

fn show(json: bool, overrides: &HarnessArgs) -> Result<()> {
    let ctx = get_context(overrides)?;
    let harness = &ctx.config.harness;

    if json {
        println!("{}", serde_json::to_string_pretty(harness)?);
        return Ok(());
    }

    let settings_path = ctx.lockbank_dir.join(SETTINGS_FILE);
    println!("{}", "Harness Settings".bold());
    println!(
        "  Source: {}",
        if settings_path.exists() {
            settings_path.display().to_string()
        } else {
            "defaults (no settings.json)".to_string()
        }
    );

    let mut table = output::create_table();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["workers".to_string(), harness.workers.to_string()]);
    table.add_row(vec!["iterations".to_string(), harness.iterations.to_string()]);
    table.add_row(vec![
        "contentionAmount".to_string(),
        output::format_money(harness.contention_amount),
    ]);
    table.add_row(vec!["firstAmount".to_string(), output::format_money(harness.first_amount)]);
    table.add_row(vec!["secondAmount".to_string(), output::format_money(harness.second_amount)]);
    table.add_row(vec!["staggerMs".to_string(), harness.stagger_ms.to_string()]);
    table.add_row(vec!["holdMs".to_string(), harness.hold_ms.to_string()]);
    table.add_row(vec!["deadlockTimeoutMs".to_string(), harness.deadlock_timeout_ms.to_string()]);
    table.add_row(vec!["cancelGraceMs".to_string(), harness.cancel_grace_ms.to_string()]);
    println!("{}", table);

    if std::env::var(DEADLOCK_TIMEOUT_ENV).is_ok() {
        output::info(&format!("{} is set", DEADLOCK_TIMEOUT_ENV));
    }
    Ok(())
}

fn init(force: bool) -> Result<()> {
    let lockbank_dir = get_lockbank_dir()?;
    std::fs::create_dir_all(&lockbank_dir)
        .with_context(|| format!("Failed to create lockbank directory: {:?}", lockbank_dir))?;
    let settings_path = lockbank_dir.join(SETTINGS_FILE);

    if settings_path.exists() && !force {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Overwrite harness settings in {}?", settings_path.display()))
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    // Unknown keys in an existing file survive the save
    let mut config = Config::load(&lockbank_dir)?;
    config.harness = Default::default();
    config.save(&lockbank_dir)?;

    output::success(&format!("Wrote default settings to {}", settings_path.display()));
    Ok(())
}
