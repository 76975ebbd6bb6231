//! Service layer - orchestration on top of the domain
//!
//! The demo harness drives concurrent workloads; the run history keeps
//! what past runs showed.

mod demo;
mod history;

pub use demo::{
    BalanceReading, ContentionReport, DeadlockReport, DemoHarness, DemoReport, Phase,
    PhaseObserver, SafeTransferReport, TransferAttempt,
};
pub use history::{PhaseRecord, PhaseTally, RunHistory, RunRecord, Verdict};
