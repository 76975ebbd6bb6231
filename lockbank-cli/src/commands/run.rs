//! Run command - all four phases

use anyhow::Result;
use lockbank_core::{OpeningBalanceSource, RunRecord};

use super::prompt::ConsoleBalances;
use super::render::{self, SpinnerObserver};
use super::{get_context, record_run, HarnessArgs};
use crate::output;

pub fn run(
    first: Option<String>,
    second: Option<String>,
    json: bool,
    overrides: &HarnessArgs,
) -> Result<()> {
    let ctx = get_context(overrides)?;

    if !json {
        println!("Bank Account Setup");
        println!("------------------");
    }
    let source = ConsoleBalances {
        first,
        second,
        verbose: !json,
    };
    let opening = source.opening_balances()?;

    let report = if json {
        ctx.harness.run(opening, &())?
    } else {
        ctx.harness.run(opening, &SpinnerObserver::default())?
    };
    record_run(&ctx, &RunRecord::from_report("run", &report));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    render::contention(&report.contention);
    render::deadlock(&report.unsafe_transfers, &report.config);
    render::safe(&report.safe_transfers, report.safe_phase_on_fresh_accounts);

    println!();
    output::success("Demo completed.");
    Ok(())
}
