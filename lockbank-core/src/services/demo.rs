//! Demo harness - drives concurrent workloads against accounts
//!
//! Four phases, each usable on its own:
//!
//! 1. Contention: many workers deposit and withdraw the same amount on one
//!    account; the balance must come back unchanged.
//! 2. / 3. Unsafe transfers: two mirrored [`transfer_unsafe_with_hold`]
//!    calls, staggered, detected as deadlocked by an external timeout.
//!    Cancellation is then issued to show it cannot free a thread parked
//!    on its second acquisition. The workers are abandoned, never joined.
//! 4. Safe transfers: the same mirrored pattern through
//!    [`try_transfer_safe`] resolves within the timeout.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::domain::result::{Error, Result};
use crate::domain::{
    transfer_unsafe_with_hold, try_transfer_safe, Account, AccountId, CancellationToken,
    TransferOutcome,
};
use crate::ports::OpeningBalances;

/// Harness phase, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Contention,
    UnsafeTransfers,
    SafeTransfers,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Contention => "contention",
            Phase::UnsafeTransfers => "unsafe-transfers",
            Phase::SafeTransfers => "safe-transfers",
        };
        f.write_str(name)
    }
}

/// Receives phase boundaries during [`DemoHarness::run`]
pub trait PhaseObserver {
    fn phase_started(&self, _phase: Phase) {}
    fn phase_finished(&self, _phase: Phase) {}
}

impl PhaseObserver for () {}

/// Balance read without blocking; `None` means the lock was held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceReading {
    pub id: AccountId,
    pub balance: Option<Decimal>,
}

impl BalanceReading {
    fn of(account: &Account) -> Self {
        Self {
            id: account.id(),
            balance: account.try_balance(),
        }
    }
}

/// One transfer worker and what became of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferAttempt {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    /// `None` while the worker never reported back
    pub outcome: Option<TransferOutcome>,
}

impl TransferAttempt {
    fn new(from: &Account, to: &Account, amount: Decimal) -> Self {
        Self {
            from: from.id(),
            to: to.id(),
            amount,
            outcome: None,
        }
    }

    pub fn resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.map_or(false, TransferOutcome::succeeded)
    }
}

/// Result of phase 1
#[derive(Debug, Clone, Serialize)]
pub struct ContentionReport {
    pub account: AccountId,
    pub starting_balance: Decimal,
    pub final_balance: Decimal,
    pub workers: usize,
    pub iterations: usize,
    pub operations: usize,
    pub elapsed_ms: u64,
}

impl ContentionReport {
    pub fn balance_preserved(&self) -> bool {
        self.starting_balance == self.final_balance
    }
}

/// Result of phases 2 and 3
#[derive(Debug, Clone, Serialize)]
pub struct DeadlockReport {
    pub first: TransferAttempt,
    pub second: TransferAttempt,
    /// Some worker was still unresolved when the timeout expired
    pub deadlock_detected: bool,
    pub cancellation_issued: bool,
    /// Some worker was still unresolved after cancellation and grace
    pub still_blocked_after_cancel: bool,
    pub elapsed_ms: u64,
    pub balances_after: Vec<BalanceReading>,
}

/// Result of phase 4
#[derive(Debug, Clone, Serialize)]
pub struct SafeTransferReport {
    pub first: TransferAttempt,
    pub second: TransferAttempt,
    pub balances_before: Vec<BalanceReading>,
    pub balances_after: Vec<BalanceReading>,
    pub elapsed_ms: u64,
}

impl SafeTransferReport {
    /// Both workers resolved within the timeout
    pub fn completed(&self) -> bool {
        self.first.resolved() && self.second.resolved()
    }

    /// The combined balance is unchanged
    pub fn conserved(&self) -> bool {
        match (total(&self.balances_before), total(&self.balances_after)) {
            (Some(before), Some(after)) => before == after,
            _ => false,
        }
    }
}

fn total(readings: &[BalanceReading]) -> Option<Decimal> {
    readings.iter().map(|r| r.balance).sum()
}

/// Full four-phase run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: HarnessConfig,
    pub opening: OpeningBalances,
    pub contention: ContentionReport,
    pub unsafe_transfers: DeadlockReport,
    pub safe_transfers: SafeTransferReport,
    /// Phase 4 ran on a fresh pair because the deadlocked pair stayed locked
    pub safe_phase_on_fresh_accounts: bool,
}

/// Holds spawned workers until the whole batch exists
///
/// Workers released by [`StartGate::open`] run; workers released by
/// [`StartGate::abort`] return without touching any account.
#[derive(Debug, Default)]
struct StartGate {
    go: Mutex<Option<bool>>,
    released: Condvar,
}

impl StartGate {
    fn open(&self) {
        self.release(true);
    }

    fn abort(&self) {
        self.release(false);
    }

    fn release(&self, go: bool) {
        *self.go.lock().unwrap_or_else(PoisonError::into_inner) = Some(go);
        self.released.notify_all();
    }

    /// Block until released; `true` when the worker should run
    fn wait(&self) -> bool {
        let mut go = self.go.lock().unwrap_or_else(PoisonError::into_inner);
        while go.is_none() {
            go = self.released.wait(go).unwrap_or_else(PoisonError::into_inner);
        }
        *go == Some(true)
    }
}

/// Demo harness; holds configuration only, no shared state between runs
#[derive(Debug, Clone)]
pub struct DemoHarness {
    config: HarnessConfig,
}

impl DemoHarness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Phase 1: concurrent deposit/withdraw pairs on one account
    pub fn run_contention(&self, account: &Arc<Account>) -> Result<ContentionReport> {
        let workers = self.config.workers;
        let iterations = self.config.iterations;
        let amount = self.config.contention_amount;
        let starting_balance = account.balance();
        let gate = Arc::new(StartGate::default());
        let started = Instant::now();

        info!(account = %account.id(), workers, iterations, "contention phase started");

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let account = Arc::clone(account);
            let worker_gate = Arc::clone(&gate);
            let spawned = thread::Builder::new()
                .name(format!("contention-{}", worker))
                .spawn(move || {
                    if !worker_gate.wait() {
                        return;
                    }
                    for _ in 0..iterations {
                        account.deposit(amount);
                        account.withdraw(amount);
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    gate.abort();
                    return Err(e.into());
                }
            }
        }
        gate.open();

        for handle in handles {
            handle
                .join()
                .map_err(|_| Error::Worker("contention worker panicked".to_string()))?;
        }

        let report = ContentionReport {
            account: account.id(),
            starting_balance,
            final_balance: account.balance(),
            workers,
            iterations,
            operations: workers * iterations * 2,
            elapsed_ms: elapsed_ms(started),
        };
        info!(
            account = %report.account,
            preserved = report.balance_preserved(),
            elapsed_ms = report.elapsed_ms,
            "contention phase finished"
        );
        Ok(report)
    }

    /// Phases 2 and 3: mirrored unsafe transfers, timeout detection, cancellation
    ///
    /// Workers still blocked at the end are detached; when deadlocked they
    /// keep both accounts locked for the rest of the process.
    pub fn run_unsafe_transfers(
        &self,
        a: &Arc<Account>,
        b: &Arc<Account>,
    ) -> Result<DeadlockReport> {
        let mut first = TransferAttempt::new(a, b, self.config.first_amount);
        let mut second = TransferAttempt::new(b, a, self.config.second_amount);
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();

        info!(from = %first.from, to = %first.to, "unsafe phase started");

        let first_worker = self.spawn_unsafe(0, a, b, first.amount, &token, tx.clone())?;
        thread::sleep(self.config.stagger());
        let second_worker = self.spawn_unsafe(1, b, a, second.amount, &token, tx)?;

        let mut outcomes = [None, None];
        collect_until(&rx, &mut outcomes, started + self.config.deadlock_timeout());

        let deadlock_detected = outcomes.iter().any(Option::is_none);
        let mut still_blocked_after_cancel = false;
        if deadlock_detected {
            warn!(
                timeout_ms = self.config.deadlock_timeout_ms,
                "deadlock detected: transfers unresolved after timeout, cancelling"
            );
            token.cancel();
            collect_until(&rx, &mut outcomes, Instant::now() + self.config.cancel_grace());
            still_blocked_after_cancel = outcomes.iter().any(Option::is_none);
            if still_blocked_after_cancel {
                warn!("workers still blocked after cancellation; abandoning them");
            }
        }

        // Dropping the handles detaches the workers
        drop((first_worker, second_worker));

        first.outcome = outcomes[0];
        second.outcome = outcomes[1];

        Ok(DeadlockReport {
            first,
            second,
            deadlock_detected,
            cancellation_issued: deadlock_detected,
            still_blocked_after_cancel,
            elapsed_ms: elapsed_ms(started),
            balances_after: vec![BalanceReading::of(a), BalanceReading::of(b)],
        })
    }

    fn spawn_unsafe(
        &self,
        slot: usize,
        from: &Arc<Account>,
        to: &Arc<Account>,
        amount: Decimal,
        token: &CancellationToken,
        tx: Sender<(usize, TransferOutcome)>,
    ) -> Result<JoinHandle<()>> {
        let from = Arc::clone(from);
        let to = Arc::clone(to);
        let token = token.clone();
        let hold = self.config.hold();
        let handle = thread::Builder::new()
            .name(format!("unsafe-transfer-{}", slot + 1))
            .spawn(move || {
                let outcome = transfer_unsafe_with_hold(&from, &to, amount, &token, hold);
                // The harness may have stopped listening
                let _ = tx.send((slot, outcome));
            })?;
        Ok(handle)
    }

    /// Phase 4: mirrored transfers under the ordered-locking protocol
    pub fn run_safe_transfers(
        &self,
        a: &Arc<Account>,
        b: &Arc<Account>,
    ) -> Result<SafeTransferReport> {
        let mut first = TransferAttempt::new(a, b, self.config.first_amount);
        let mut second = TransferAttempt::new(b, a, self.config.second_amount);
        let balances_before = vec![BalanceReading::of(a), BalanceReading::of(b)];
        let gate = Arc::new(StartGate::default());
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();

        info!(from = %first.from, to = %first.to, "safe phase started");

        for (slot, from, to, amount) in [(0, a, b, first.amount), (1, b, a, second.amount)] {
            let from = Arc::clone(from);
            let to = Arc::clone(to);
            let worker_gate = Arc::clone(&gate);
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("safe-transfer-{}", slot + 1))
                .spawn(move || {
                    if worker_gate.wait() {
                        let _ = tx.send((slot, try_transfer_safe(&from, &to, amount)));
                    }
                });
            if let Err(e) = spawned {
                gate.abort();
                return Err(e.into());
            }
        }
        drop(tx);
        gate.open();

        let mut outcomes = [None, None];
        collect_until(&rx, &mut outcomes, started + self.config.deadlock_timeout());
        first.outcome = outcomes[0];
        second.outcome = outcomes[1];

        let report = SafeTransferReport {
            first,
            second,
            balances_before,
            balances_after: vec![BalanceReading::of(a), BalanceReading::of(b)],
            elapsed_ms: elapsed_ms(started),
        };
        if report.completed() {
            info!(
                conserved = report.conserved(),
                elapsed_ms = report.elapsed_ms,
                "safe phase finished"
            );
        } else {
            warn!("safe transfers unresolved after timeout");
        }
        Ok(report)
    }

    /// Run all phases on accounts 1 and 2 seeded from `opening`
    ///
    /// A deadlocked pair stays locked, so phase 4 then runs on a fresh
    /// pair with the same identities and the balances held when phase 2
    /// began; the unsafe protocol never mutates a pair it deadlocked on.
    pub fn run(
        &self,
        opening: OpeningBalances,
        observer: &dyn PhaseObserver,
    ) -> Result<DemoReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let a = Arc::new(Account::new(1, opening.first())?);
        let b = Arc::new(Account::new(2, opening.second())?);

        info!(%run_id, "demo run started");

        observer.phase_started(Phase::Contention);
        let contention = self.run_contention(&a)?;
        observer.phase_finished(Phase::Contention);

        let before_unsafe = (a.balance(), b.balance());

        observer.phase_started(Phase::UnsafeTransfers);
        let unsafe_transfers = self.run_unsafe_transfers(&a, &b)?;
        observer.phase_finished(Phase::UnsafeTransfers);

        let safe_phase_on_fresh_accounts = unsafe_transfers.deadlock_detected;
        let (safe_a, safe_b) = if safe_phase_on_fresh_accounts {
            (
                Arc::new(Account::new(a.id(), before_unsafe.0)?),
                Arc::new(Account::new(b.id(), before_unsafe.1)?),
            )
        } else {
            (a, b)
        };

        observer.phase_started(Phase::SafeTransfers);
        let safe_transfers = self.run_safe_transfers(&safe_a, &safe_b)?;
        observer.phase_finished(Phase::SafeTransfers);

        info!(%run_id, "demo run finished");

        Ok(DemoReport {
            run_id,
            started_at,
            config: self.config.clone(),
            opening,
            contention,
            unsafe_transfers,
            safe_transfers,
            safe_phase_on_fresh_accounts,
        })
    }
}

/// Collect worker outcomes until every slot is filled, the deadline
/// passes, or every sender is gone
fn collect_until(
    rx: &Receiver<(usize, TransferOutcome)>,
    outcomes: &mut [Option<TransferOutcome>],
    deadline: Instant,
) {
    while outcomes.iter().any(Option::is_none) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            break;
        }
        match rx.recv_timeout(remaining) {
            Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> HarnessConfig {
        HarnessConfig {
            workers: 4,
            iterations: 50,
            stagger_ms: 30,
            hold_ms: 300,
            deadlock_timeout_ms: 1000,
            cancel_grace_ms: 200,
            ..HarnessConfig::default()
        }
    }

    fn account(id: u32, units: i64) -> Arc<Account> {
        Arc::new(Account::new(id, Decimal::new(units, 0)).unwrap())
    }

    fn reading(id: u32, units: Option<i64>) -> BalanceReading {
        BalanceReading {
            id: AccountId(id),
            balance: units.map(|u| Decimal::new(u, 0)),
        }
    }

    #[test]
    fn test_harness_rejects_invalid_config() {
        let config = HarnessConfig {
            workers: 0,
            ..HarnessConfig::default()
        };
        assert!(DemoHarness::new(config).is_err());
    }

    #[test]
    fn test_contention_preserves_balance() {
        let harness = DemoHarness::new(quick_config()).unwrap();
        let acct = account(1, 100);

        let report = harness.run_contention(&acct).unwrap();

        assert!(report.balance_preserved());
        assert_eq!(report.final_balance, Decimal::new(100, 0));
        assert_eq!(report.operations, 4 * 50 * 2);
    }

    #[test]
    fn test_safe_phase_moves_net_amount() {
        let harness = DemoHarness::new(quick_config()).unwrap();
        let (a, b) = (account(1, 500), account(2, 300));

        let report = harness.run_safe_transfers(&a, &b).unwrap();

        assert!(report.completed());
        assert!(report.conserved());
        assert!(report.first.succeeded() && report.second.succeeded());
        assert_eq!(a.balance(), Decimal::new(450, 0));
        assert_eq!(b.balance(), Decimal::new(350, 0));
    }

    #[test]
    fn test_safe_phase_one_side_short_of_funds() {
        let harness = DemoHarness::new(quick_config()).unwrap();
        let (a, b) = (account(1, 0), account(2, 300));

        let report = harness.run_safe_transfers(&a, &b).unwrap();

        assert!(report.completed());
        assert!(report.conserved());
        // b -> a (50) always succeeds; a -> b (100) succeeds only if it ran
        // after a had been credited, which it cannot have: 50 < 100.
        assert_eq!(report.first.outcome, Some(TransferOutcome::InsufficientFunds));
        assert_eq!(report.second.outcome, Some(TransferOutcome::Completed));
        assert_eq!(a.balance(), Decimal::new(50, 0));
        assert_eq!(b.balance(), Decimal::new(250, 0));
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl PhaseObserver for Recorder {
        fn phase_started(&self, phase: Phase) {
            self.0.lock().unwrap().push(format!("start {}", phase));
        }
        fn phase_finished(&self, phase: Phase) {
            self.0.lock().unwrap().push(format!("end {}", phase));
        }
    }

    #[test]
    fn test_run_reports_phases_in_order() {
        let harness = DemoHarness::new(quick_config()).unwrap();
        let opening = OpeningBalances::new(Decimal::new(500, 0), Decimal::new(300, 0)).unwrap();
        let recorder = Recorder::default();

        let report = harness.run(opening, &recorder).unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "start contention",
                "end contention",
                "start unsafe-transfers",
                "end unsafe-transfers",
                "start safe-transfers",
                "end safe-transfers",
            ]
        );
        assert!(report.contention.balance_preserved());
        assert!(report.unsafe_transfers.deadlock_detected);
        assert!(report.safe_phase_on_fresh_accounts);
        assert!(report.safe_transfers.completed());
        assert_eq!(
            report.safe_transfers.balances_after,
            vec![reading(1, Some(450)), reading(2, Some(350))]
        );
    }

    #[test]
    fn test_run_without_deadlock_reuses_accounts() {
        let config = HarnessConfig {
            hold_ms: 0,
            stagger_ms: 0,
            ..quick_config()
        };
        let harness = DemoHarness::new(config).unwrap();
        let opening = OpeningBalances::new(Decimal::new(500, 0), Decimal::new(300, 0)).unwrap();

        let report = harness.run(opening, &()).unwrap();

        let unsafe_phase = &report.unsafe_transfers;
        assert!(!unsafe_phase.deadlock_detected);
        assert!(!unsafe_phase.cancellation_issued);
        assert_eq!(unsafe_phase.first.outcome, Some(TransferOutcome::Completed));
        assert_eq!(unsafe_phase.second.outcome, Some(TransferOutcome::Completed));
        assert_eq!(
            unsafe_phase.balances_after,
            vec![reading(1, Some(450)), reading(2, Some(350))]
        );

        // Phase 4 continues from the unsafe phase's balances
        assert!(!report.safe_phase_on_fresh_accounts);
        assert_eq!(report.safe_transfers.balances_before, unsafe_phase.balances_after);
        assert_eq!(
            report.safe_transfers.balances_after,
            vec![reading(1, Some(400)), reading(2, Some(400))]
        );
    }

    #[test]
    fn test_start_gate_open_releases_workers_to_run() {
        let gate = Arc::new(StartGate::default());
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        gate.open();

        for worker in workers {
            assert!(worker.join().unwrap());
        }
    }

    #[test]
    fn test_start_gate_abort_releases_workers_without_running() {
        let gate = Arc::new(StartGate::default());
        let account = account(1, 100);
        let worker = {
            let gate = Arc::clone(&gate);
            let account = Arc::clone(&account);
            thread::spawn(move || {
                if gate.wait() {
                    account.deposit(Decimal::new(1, 0));
                }
            })
        };

        gate.abort();
        worker.join().unwrap();
        assert_eq!(account.balance(), Decimal::new(100, 0));

        // A worker arriving after release does not block
        assert!(!gate.wait());
    }

    #[test]
    fn test_collect_until_respects_deadline() {
        let (_tx, rx) = mpsc::channel::<(usize, TransferOutcome)>();
        let mut outcomes = [None, None];
        let started = Instant::now();

        collect_until(&rx, &mut outcomes, started + Duration::from_millis(100));

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(outcomes, [None, None]);
    }
}
