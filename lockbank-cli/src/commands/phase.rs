//! Single-phase commands

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use lockbank_core::services::{Phase, PhaseObserver, PhaseRecord};
use lockbank_core::{Account, AccountId, RunRecord};
use rust_decimal::Decimal;

use super::render::{self, SpinnerObserver};
use super::{get_context, record_run, HarnessArgs};

/// Opening balances for a single-phase run
#[derive(Args, Debug)]
pub struct AccountArgs {
    /// Opening balance for Account 1
    #[arg(long, default_value = "500")]
    pub first: Decimal,
    /// Opening balance for Account 2
    #[arg(long, default_value = "300")]
    pub second: Decimal,
}

impl AccountArgs {
    fn accounts(&self) -> Result<(Arc<Account>, Arc<Account>)> {
        Ok((
            Arc::new(Account::new(AccountId(1), self.first)?),
            Arc::new(Account::new(AccountId(2), self.second)?),
        ))
    }
}

/// Run `body` between observer notifications for `phase`
fn observed<T>(phase: Phase, json: bool, body: impl FnOnce() -> Result<T>) -> Result<T> {
    let spinner = SpinnerObserver::default();
    let observer: &dyn PhaseObserver = if json { &() } else { &spinner };
    observer.phase_started(phase);
    let result = body();
    observer.phase_finished(phase);
    result
}

pub fn contention(args: &AccountArgs, json: bool, overrides: &HarnessArgs) -> Result<()> {
    let ctx = get_context(overrides)?;
    let (a, _) = args.accounts()?;
    let report = observed(Phase::Contention, json, || Ok(ctx.harness.run_contention(&a)?))?;
    record_run(&ctx, &RunRecord::new("contention", vec![PhaseRecord::from(&report)]));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::contention(&report);
    }
    Ok(())
}

pub fn deadlock(args: &AccountArgs, json: bool, overrides: &HarnessArgs) -> Result<()> {
    let ctx = get_context(overrides)?;
    let (a, b) = args.accounts()?;
    let report = observed(Phase::UnsafeTransfers, json, || {
        Ok(ctx.harness.run_unsafe_transfers(&a, &b)?)
    })?;
    record_run(&ctx, &RunRecord::new("deadlock", vec![PhaseRecord::from(&report)]));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::deadlock(&report, ctx.harness.config());
    }
    Ok(())
}

pub fn safe(args: &AccountArgs, json: bool, overrides: &HarnessArgs) -> Result<()> {
    let ctx = get_context(overrides)?;
    let (a, b) = args.accounts()?;
    let report = observed(Phase::SafeTransfers, json, || {
        Ok(ctx.harness.run_safe_transfers(&a, &b)?)
    })?;
    record_run(&ctx, &RunRecord::new("safe", vec![PhaseRecord::from(&report)]));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render::safe(&report, false);
    }
    Ok(())
}
