//! Run history - what past demo runs showed, phase by phase
//!
//! Each finished run appends one [`RunRecord`] as a JSON line to
//! `history.jsonl` in the lockbank directory. Records carry verdicts and
//! timings only; balances and amounts are never written.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::demo::{ContentionReport, DeadlockReport, DemoReport, Phase, SafeTransferReport};

const HISTORY_FILE: &str = "history.jsonl";

/// What a phase demonstrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    BalancePreserved,
    BalanceChanged,
    /// Timed out and still blocked after cancellation
    Deadlocked,
    /// Timed out, then cancellation let both workers return
    FreedByCancellation,
    NoDeadlock,
    /// Both transfers resolved within the timeout and the total held
    Resolved,
    Unresolved,
}

impl Verdict {
    /// Whether the phase behaved the way the demo expects
    pub fn expected(self) -> bool {
        matches!(self, Verdict::BalancePreserved | Verdict::Deadlocked | Verdict::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub verdict: Verdict,
    pub elapsed_ms: u64,
}

impl From<&ContentionReport> for PhaseRecord {
    fn from(report: &ContentionReport) -> Self {
        let verdict = if report.balance_preserved() {
            Verdict::BalancePreserved
        } else {
            Verdict::BalanceChanged
        };
        Self {
            phase: Phase::Contention,
            verdict,
            elapsed_ms: report.elapsed_ms,
        }
    }
}

impl From<&DeadlockReport> for PhaseRecord {
    fn from(report: &DeadlockReport) -> Self {
        let verdict = match (report.deadlock_detected, report.still_blocked_after_cancel) {
            (false, _) => Verdict::NoDeadlock,
            (true, true) => Verdict::Deadlocked,
            (true, false) => Verdict::FreedByCancellation,
        };
        Self {
            phase: Phase::UnsafeTransfers,
            verdict,
            elapsed_ms: report.elapsed_ms,
        }
    }
}

impl From<&SafeTransferReport> for PhaseRecord {
    fn from(report: &SafeTransferReport) -> Self {
        let verdict = if report.completed() && report.conserved() {
            Verdict::Resolved
        } else {
            Verdict::Unresolved
        };
        Self {
            phase: Phase::SafeTransfers,
            verdict,
            elapsed_ms: report.elapsed_ms,
        }
    }
}

/// One run, full or single-phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// Front-end command that started the run
    pub command: String,
    pub phases: Vec<PhaseRecord>,
}

impl RunRecord {
    pub fn new(command: impl Into<String>, phases: Vec<PhaseRecord>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            command: command.into(),
            phases,
        }
    }

    /// Record of a full run, keeping the report's id and start time
    pub fn from_report(command: impl Into<String>, report: &DemoReport) -> Self {
        Self {
            run_id: report.run_id,
            recorded_at: report.started_at,
            command: command.into(),
            phases: vec![
                (&report.contention).into(),
                (&report.unsafe_transfers).into(),
                (&report.safe_transfers).into(),
            ],
        }
    }

    pub fn verdict(&self, phase: Phase) -> Option<Verdict> {
        self.phases
            .iter()
            .find(|record| record.phase == phase)
            .map(|record| record.verdict)
    }
}

/// Verdict counts for one phase across the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTally {
    pub phase: Phase,
    pub runs: usize,
    pub verdicts: BTreeMap<Verdict, usize>,
}

/// Append-only history file
///
/// Appends are serialized through an internal lock so concurrent callers
/// never interleave partial lines.
pub struct RunHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RunHistory {
    /// Open (creating if needed) the history in `lockbank_dir`
    pub fn open(lockbank_dir: &Path) -> Result<Self> {
        fs::create_dir_all(lockbank_dir)
            .with_context(|| format!("Failed to create {:?}", lockbank_dir))?;
        let path = lockbank_dir.join(HISTORY_FILE);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open run history {:?}", path))?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn record(&self, record: &RunRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.lock();
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Newest records first, up to `limit`
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut records = self.read_all()?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    /// Per-phase verdict counts, in phase order
    pub fn tally(&self) -> Result<Vec<PhaseTally>> {
        let mut by_phase: BTreeMap<Phase, PhaseTally> = BTreeMap::new();
        for record in self.read_all()? {
            for phase in &record.phases {
                let tally = by_phase.entry(phase.phase).or_insert_with(|| PhaseTally {
                    phase: phase.phase,
                    runs: 0,
                    verdicts: BTreeMap::new(),
                });
                tally.runs += 1;
                *tally.verdicts.entry(phase.verdict).or_insert(0) += 1;
            }
        }
        Ok(by_phase.into_values().collect())
    }

    /// Keep the newest `keep` records, returning how many were dropped
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let _guard = self.lock();
        let records = self.read_all()?;
        let dropped = records.len().saturating_sub(keep);

        let mut content = String::new();
        for record in &records[dropped..] {
            content.push_str(&serde_json::to_string(record)?);
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(dropped)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every record in append order; unreadable lines are skipped
    fn read_all(&self) -> Result<Vec<RunRecord>> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("Failed to read run history {:?}", self.path))?;

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = number + 1, error = %e, "skipping unreadable history line"),
            }
        }
        Ok(records)
    }
}
