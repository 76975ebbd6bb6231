//! History command - what past runs showed

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use lockbank_core::services::{Phase, PhaseTally, Verdict};
use lockbank_core::{RunHistory, RunRecord};

use super::get_lockbank_dir;
use super::render::phase_title;
use crate::output;

const PHASES: [Phase; 3] = [Phase::Contention, Phase::UnsafeTransfers, Phase::SafeTransfers];

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recent runs with the verdict of each phase
    List {
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count verdicts per phase across all recorded runs
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop all but the newest runs
    Prune {
        /// Number of runs to keep
        #[arg(long, default_value = "100")]
        keep: usize,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(command: HistoryCommands) -> Result<()> {
    let history = RunHistory::open(&get_lockbank_dir()?)?;
    match command {
        HistoryCommands::List { limit, json } => list(&history, limit, json),
        HistoryCommands::Summary { json } => summary(&history, json),
        HistoryCommands::Prune { keep, force } => prune(&history, keep, force),
    }
}

fn verdict_label(verdict: Verdict) -> String {
    let label = match verdict {
        Verdict::BalancePreserved => "balance preserved",
        Verdict::BalanceChanged => "balance changed",
        Verdict::Deadlocked => "deadlocked",
        Verdict::FreedByCancellation => "freed by cancellation",
        Verdict::NoDeadlock => "no deadlock",
        Verdict::Resolved => "resolved",
        Verdict::Unresolved => "unresolved",
    };
    if verdict.expected() {
        label.green().to_string()
    } else {
        label.yellow().to_string()
    }
}

fn phase_cell(record: &RunRecord, phase: Phase) -> String {
    record
        .verdict(phase)
        .map_or_else(|| "-".dimmed().to_string(), verdict_label)
}

fn list(history: &RunHistory, limit: usize, json: bool) -> Result<()> {
    let records = history.recent(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Command", "Contention", "Unsafe", "Safe"]);
    for record in &records {
        let mut row = vec![
            record.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.command.clone(),
        ];
        row.extend(PHASES.iter().map(|&phase| phase_cell(record, phase)));
        table.add_row(row);
    }
    println!("{}", table);
    Ok(())
}

fn describe_tally(tally: &PhaseTally) -> String {
    tally
        .verdicts
        .iter()
        .map(|(&verdict, count)| format!("{} × {}", count, verdict_label(verdict)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn summary(history: &RunHistory, json: bool) -> Result<()> {
    let tallies = history.tally()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tallies)?);
        return Ok(());
    }

    if tallies.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!("{}", "Run Summary".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Phase", "Runs", "Verdicts"]);
    for tally in &tallies {
        table.add_row(vec![
            phase_title(tally.phase).to_string(),
            tally.runs.to_string(),
            describe_tally(tally),
        ]);
    }
    println!("{}", table);
    println!("History: {}", history.path().display());
    Ok(())
}

fn prune(history: &RunHistory, keep: usize, force: bool) -> Result<()> {
    if !force {
        use dialoguer::Confirm;
        if !Confirm::new()
            .with_prompt(format!("Keep only the newest {} runs?", keep))
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let dropped = history.prune(keep)?;
    output::success(&format!("Dropped {} runs", dropped));
    Ok(())
}
