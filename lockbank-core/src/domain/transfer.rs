//! Two-account transfer protocols
//!
//! Both protocols hold both account locks for the whole critical section
//! and validate funds only once both are held, so a failed transfer never
//! leaves a partial debit or credit behind.
//!
//! - [`transfer_unsafe`] locks `from` then `to`. Two transfers running in
//!   mirrored directions can each hold one lock and wait forever for the
//!   other. Cancellation is polled between acquisitions but cannot
//!   interrupt a blocked acquisition.
//! - [`transfer_safe`] locks in [`AccountId`] order regardless of
//!   direction, so no set of concurrent transfers can form a circular
//!   wait.

use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::account::{Account, AccountId};
use super::cancellation::CancellationToken;

/// Hold delay between the first and second acquisition in
/// [`transfer_unsafe`]; wide enough for a mirrored transfer to take the
/// other lock.
pub const DEFAULT_HOLD_DELAY: Duration = Duration::from_millis(1000);

/// Result of a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Money moved from source to destination
    Completed,
    /// Source balance was below the amount; nothing moved
    InsufficientFunds,
    /// Cancellation was observed at a checkpoint; nothing moved
    Cancelled,
    /// Source and destination are the same account; nothing locked
    SameAccount,
}

impl TransferOutcome {
    pub fn succeeded(self) -> bool {
        matches!(self, TransferOutcome::Completed)
    }
}

/// Order two accounts by identity: the global lock-acquisition order
pub fn lock_order<'a>(a: &'a Account, b: &'a Account) -> (&'a Account, &'a Account) {
    if a.id() <= b.id() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Order-dependent transfer with the default hold delay
///
/// May block forever when a mirrored transfer runs concurrently.
pub fn transfer_unsafe(
    from: &Account,
    to: &Account,
    amount: Decimal,
    cancel: &CancellationToken,
) -> bool {
    transfer_unsafe_with_hold(from, to, amount, cancel, DEFAULT_HOLD_DELAY).succeeded()
}

/// Order-dependent transfer with an explicit hold delay
///
/// Locks `from`, sleeps for `hold`, checks `cancel`, locks `to` (the
/// deadlock point), checks `cancel` again and only then validates funds.
pub fn transfer_unsafe_with_hold(
    from: &Account,
    to: &Account,
    amount: Decimal,
    cancel: &CancellationToken,
    hold: Duration,
) -> TransferOutcome {
    if from.id() == to.id() {
        return TransferOutcome::SameAccount;
    }

    let worker = thread::current().id();
    debug!(?worker, account = %from.id(), %amount, "acquiring first lock");
    let mut from_balance = from.lock();
    debug!(?worker, account = %from.id(), "first lock held");

    thread::sleep(hold);

    if cancel.is_cancelled() {
        info!(?worker, account = %from.id(), "cancelled while holding first lock");
        return TransferOutcome::Cancelled;
    }

    debug!(?worker, account = %to.id(), "acquiring second lock");
    let mut to_balance = to.lock();
    debug!(?worker, account = %to.id(), "second lock held");

    if cancel.is_cancelled() {
        info!(?worker, from = %from.id(), to = %to.id(), "cancelled after both locks");
        return TransferOutcome::Cancelled;
    }

    // Guards drop in reverse declaration order: `to` first, then `from`.
    settle(from.id(), to.id(), &mut from_balance, &mut to_balance, amount)
}

/// Deadlock-free transfer
pub fn transfer_safe(from: &Account, to: &Account, amount: Decimal) -> bool {
    try_transfer_safe(from, to, amount).succeeded()
}

/// Deadlock-free transfer reporting why it failed
pub fn try_transfer_safe(from: &Account, to: &Account, amount: Decimal) -> TransferOutcome {
    if from.id() == to.id() {
        return TransferOutcome::SameAccount;
    }

    let worker = thread::current().id();
    let (first, second) = lock_order(from, to);

    debug!(?worker, account = %first.id(), %amount, "acquiring lower-ordered lock");
    let mut first_balance = first.lock();
    debug!(?worker, account = %second.id(), "acquiring higher-ordered lock");
    let mut second_balance = second.lock();

    if first.id() == from.id() {
        settle(from.id(), to.id(), &mut first_balance, &mut second_balance, amount)
    } else {
        settle(from.id(), to.id(), &mut second_balance, &mut first_balance, amount)
    }
}

/// Move `amount` between two balances whose locks are both held
fn settle(
    from: AccountId,
    to: AccountId,
    from_balance: &mut Decimal,
    to_balance: &mut Decimal,
    amount: Decimal,
) -> TransferOutcome {
    if *from_balance < amount {
        info!(%from, %to, %amount, "transfer rejected: insufficient funds");
        return TransferOutcome::InsufficientFunds;
    }
    *from_balance -= amount;
    *to_balance += amount;
    info!(%from, %to, %amount, "transfer completed");
    TransferOutcome::Completed
}
