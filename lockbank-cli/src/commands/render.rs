//! Human-readable rendering of harness reports

use std::cell::RefCell;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lockbank_core::config::HarnessConfig;
use lockbank_core::services::{
    BalanceReading, ContentionReport, DeadlockReport, Phase, PhaseObserver, SafeTransferReport,
    TransferAttempt,
};
use lockbank_core::TransferOutcome;

use crate::output::{self, format_money, format_reading};

pub fn phase_title(phase: Phase) -> &'static str {
    match phase {
        Phase::Contention => "Phase 1: Basic Thread Operations",
        Phase::UnsafeTransfers => "Phase 2: Resource Protection & Phase 3: Deadlock Creation",
        Phase::SafeTransfers => "Phase 4: Deadlock Resolution",
    }
}

/// Shows a spinner while a phase runs
#[derive(Default)]
pub struct SpinnerObserver {
    spinner: RefCell<Option<ProgressBar>>,
}

impl PhaseObserver for SpinnerObserver {
    fn phase_started(&self, phase: Phase) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            spinner.set_style(style);
        }
        spinner.set_message(phase_title(phase));
        spinner.enable_steady_tick(Duration::from_millis(100));
        *self.spinner.borrow_mut() = Some(spinner);
    }

    fn phase_finished(&self, _phase: Phase) {
        if let Some(spinner) = self.spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }
}

fn outcome_label(attempt: &TransferAttempt) -> String {
    match attempt.outcome {
        Some(TransferOutcome::Completed) => "completed".green().to_string(),
        Some(TransferOutcome::InsufficientFunds) => "insufficient funds".yellow().to_string(),
        Some(TransferOutcome::Cancelled) => "cancelled".yellow().to_string(),
        Some(TransferOutcome::SameAccount) => "same account".yellow().to_string(),
        None => "unresolved".red().to_string(),
    }
}

fn describe(slot: usize, attempt: &TransferAttempt) -> String {
    format!(
        "Thread {}: {} from {} to {}",
        slot,
        format_money(attempt.amount),
        attempt.from,
        attempt.to
    )
}

fn print_readings(readings: &[BalanceReading]) {
    for reading in readings {
        println!("  {}: {}", reading.id, format_reading(reading.balance));
    }
}

pub fn contention(report: &ContentionReport) {
    output::heading(phase_title(Phase::Contention));
    println!("{} starting balance: {}", report.account, format_money(report.starting_balance));
    println!(
        "{} workers × {} deposit/withdraw pairs ({} operations) in {} ms",
        report.workers, report.iterations, report.operations, report.elapsed_ms
    );
    println!(
        "{} final balance after basic operations: {}",
        report.account,
        format_money(report.final_balance)
    );
    if report.balance_preserved() {
        output::success("Balance unchanged: no lost updates");
    } else {
        output::error("Balance changed under contention");
    }
}

pub fn deadlock(report: &DeadlockReport, config: &HarnessConfig) {
    output::heading(phase_title(Phase::UnsafeTransfers));
    println!("Unsafe Transfer Demonstration:");
    println!("{} will attempt to transfer", describe(1, &report.first));
    println!("{} will attempt to transfer", describe(2, &report.second));

    if report.deadlock_detected {
        println!();
        output::error(&format!(
            "DEADLOCK DETECTED: One or both threads failed to complete within {} ms",
            config.deadlock_timeout_ms
        ));
        println!("Cancelling deadlocked transfers...");
        if report.still_blocked_after_cancel {
            output::warning(
                "Warning: Threads still alive after cancellation - true deadlock confirmed",
            );
        }
    } else {
        output::info("Both threads completed (no deadlock occurred unexpectedly)");
    }

    println!("Thread 1 result: {}", outcome_label(&report.first));
    println!("Thread 2 result: {}", outcome_label(&report.second));
    println!();
    println!("Balances after unsafe transfer attempt:");
    print_readings(&report.balances_after);
}

pub fn safe(report: &SafeTransferReport, fresh_accounts: bool) {
    output::heading(phase_title(Phase::SafeTransfers));
    println!("Safe Transfer Demonstration:");
    if fresh_accounts {
        output::info("Deadlocked accounts stay locked; using a fresh pair with the same balances");
    }
    print_readings(&report.balances_before);
    println!("Safe transfer 1 result: {}", outcome_label(&report.first));
    println!("Safe transfer 2 result: {}", outcome_label(&report.second));

    if !report.completed() {
        output::error("Safe transfers did not resolve within the timeout");
        return;
    }

    println!();
    println!("{}", "Final Balances:".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Account", "Before", "After"]);
    for (before, after) in report.balances_before.iter().zip(&report.balances_after) {
        table.add_row(vec![
            before.id.to_string(),
            format_reading(before.balance),
            format_reading(after.balance),
        ]);
    }
    println!("{}", table);

    if report.conserved() {
        output::success(&format!("Completed in {} ms; total balance conserved", report.elapsed_ms));
    } else {
        output::error("Total balance changed");
    }
}
