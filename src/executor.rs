use crate::error::Result;
use crate::hasher::{HashMode, Identity};
use crate::plan::{Operation, Plan};
use crate::progress::ProgressReporter;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Operator gate in front of destructive work.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way.
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Dry run: report the plan, touch nothing.
    pub test: bool,
    pub skip_confirm: bool,
    /// Used to verify copies and removal guards.
    pub hash_mode: HashMode,
    pub workers: Option<usize>,
    pub use_trash: bool,
    /// Operations not started by this instant are skipped.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Conflict,
    /// A copy did not match its planned identity.
    VerificationFailure,
    ConfirmationDeclined,
    /// The copy a removal depended on did not complete.
    DependencyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    /// Dry run only.
    Planned,
    Skipped { reason: String },
    Failed { kind: FailureKind, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub operation: Operation,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub dirs_created: usize,
    pub copied: usize,
    pub removed: usize,
    pub dirs_removed: usize,
    pub planned: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub declined: usize,
    /// Failures of any kind other than a declined confirmation.
    pub failed: usize,
}

/// Per-operation outcome of one plan execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub label: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub counts: ReportCounts,
    pub entries: Vec<ReportEntry>,
}

impl ExecutionReport {
    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| {
            matches!(&e.outcome, Outcome::Failed { kind, .. } if *kind != FailureKind::ConfirmationDeclined)
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_json_report(path, self)
    }

    fn finish(label: &str, dry_run: bool, started: (DateTime<Utc>, Instant), entries: Vec<ReportEntry>) -> Self {
        let mut counts = ReportCounts::default();
        for entry in &entries {
            match (&entry.outcome, &entry.operation) {
                (Outcome::Done, Operation::CreateDir { .. }) => counts.dirs_created += 1,
                (Outcome::Done, Operation::Copy { .. }) => counts.copied += 1,
                (Outcome::Done, Operation::Remove { .. }) => counts.removed += 1,
                (Outcome::Done, Operation::RemoveDir { .. }) => counts.dirs_removed += 1,
                (Outcome::Done, _) => {}
                (Outcome::Planned, _) => counts.planned += 1,
                (Outcome::Skipped { .. }, _) => counts.skipped += 1,
                (Outcome::Failed { kind, .. }, _) => match kind {
                    FailureKind::ConfirmationDeclined => counts.declined += 1,
                    FailureKind::Conflict => {
                        counts.conflicts += 1;
                        counts.failed += 1;
                    }
                    _ => counts.failed += 1,
                },
            }
        }
        Self {
            label: label.to_string(),
            dry_run,
            started_at: started.0,
            duration_secs: started.1.elapsed().as_secs_f64(),
            counts,
            entries,
        }
    }
}

/// Writes any serializable report as pretty JSON.
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    info!("Execution report written to {}", path.display());
    Ok(())
}

struct Failure {
    kind: FailureKind,
    reason: String,
}

impl Failure {
    fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Failure::new(FailureKind::Io, err.to_string())
    }
}

impl From<crate::error::Error> for Failure {
    fn from(err: crate::error::Error) -> Self {
        Failure::new(FailureKind::Io, err.to_string())
    }
}

fn outcome_of(result: std::result::Result<Outcome, Failure>) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(f) => Outcome::Failed {
            kind: f.kind,
            reason: f.reason,
        },
    }
}

/// Applies a plan in two phases.
///
/// Phase one creates directories and performs copies onto free destinations.
/// Phase two, behind the confirmation gate, removes files standing where a
/// directory must go (and then does the work waiting on them), performs
/// replacements, then file removals, then directory removals. A removal whose guard names a keeper is
/// only carried out when that keeper still verifies against the guard, so a
/// failed or tampered copy never costs the original.
pub struct PlanExecutor<'a> {
    options: ExecutorOptions,
    confirm: &'a dyn Confirm,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(options: ExecutorOptions, confirm: &'a dyn Confirm, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            options,
            confirm,
            reporter,
        }
    }

    pub fn execute(&self, plan: &Plan, label: &str) -> ExecutionReport {
        let started = (Utc::now(), Instant::now());
        let ops = plan.operations();
        let mut outcomes: Vec<Option<Outcome>> = vec![None; ops.len()];

        for (i, op) in ops.iter().enumerate() {
            match op {
                Operation::Skip { reason, .. } => {
                    outcomes[i] = Some(Outcome::Skipped {
                        reason: reason.to_string(),
                    })
                }
                Operation::Conflict { path, reason } => {
                    warn!("Conflict at {}: {}", path.display(), reason);
                    outcomes[i] = Some(Outcome::Failed {
                        kind: FailureKind::Conflict,
                        reason: reason.clone(),
                    })
                }
                _ if self.options.test => {
                    info!("[dry run] {}", op);
                    outcomes[i] = Some(Outcome::Planned);
                }
                _ => {}
            }
        }

        if !self.options.test {
            let total = ops.iter().filter(|op| op.is_mutating()).count();
            self.reporter.on_execute_start(total);
            let done = AtomicUsize::new(0);

            self.run_safe_phase(ops, &mut outcomes, &done, total);
            self.run_destructive_phase(ops, &mut outcomes, &done, total, label);
        }

        let entries: Vec<ReportEntry> = ops
            .iter()
            .zip(outcomes)
            .map(|(op, outcome)| ReportEntry {
                operation: op.clone(),
                outcome: outcome.unwrap_or(Outcome::Skipped {
                    reason: "not executed".to_string(),
                }),
            })
            .collect();
        let report = ExecutionReport::finish(label, self.options.test, started, entries);
        if !self.options.test {
            self.reporter
                .on_execute_complete(report.counts.failed, report.duration_secs);
        }
        debug!("Executed '{}' in {:.2}s: {:?}", label, report.duration_secs, report.counts);
        report
    }

    fn run_safe_phase(&self, ops: &[Operation], outcomes: &mut [Option<Outcome>], done: &AtomicUsize, total: usize) {
        let displaced = displaced_paths(ops);
        for (i, op) in ops.iter().enumerate() {
            if waits_on_displacement(op, &displaced) {
                continue;
            }
            if let Operation::CreateDir { path } = op {
                let result = self.guarded(|| {
                    fs::create_dir_all(path)?;
                    debug!("Created directory {}", path.display());
                    Ok(Outcome::Done)
                });
                outcomes[i] = Some(self.settle(op, result, done, total));
            }
        }

        let copies: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Operation::Copy { replace: false, .. }))
            .filter(|(_, op)| !waits_on_displacement(op, &displaced))
            .map(|(i, _)| i)
            .collect();
        for (i, outcome) in self.run_copies(ops, &copies, done, total) {
            outcomes[i] = Some(outcome);
        }
    }

    fn run_destructive_phase(
        &self,
        ops: &[Operation],
        outcomes: &mut [Option<Outcome>],
        done: &AtomicUsize,
        total: usize,
        label: &str,
    ) {
        let destructive: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_destructive())
            .map(|(i, _)| i)
            .collect();
        if destructive.is_empty() {
            return;
        }

        if !self.options.skip_confirm {
            let prompt = format!(
                "{}: apply {} destructive operation(s) (replacements and removals)?",
                label,
                destructive.len()
            );
            if !self.confirm.confirm(&prompt) {
                warn!("Destructive operations for '{}' declined", label);
                for i in destructive {
                    outcomes[i] = Some(Outcome::Failed {
                        kind: FailureKind::ConfirmationDeclined,
                        reason: "operator declined".to_string(),
                    });
                }
                let displaced = displaced_paths(ops);
                for (i, op) in ops.iter().enumerate() {
                    if waits_on_displacement(op, &displaced) {
                        outcomes[i] = Some(Outcome::Failed {
                            kind: FailureKind::ConfirmationDeclined,
                            reason: "waits on a declined removal".to_string(),
                        });
                    }
                }
                return;
            }
        }

        for &i in &destructive {
            let op = &ops[i];
            if let Operation::Remove { path, .. } = op {
                if op.is_displacement() {
                    let result = self.guarded(|| self.remove_file(path));
                    outcomes[i] = Some(self.settle(op, result, done, total));
                }
            }
        }
        self.run_waiting(ops, outcomes, done, total);

        let replacements: Vec<usize> = destructive
            .iter()
            .copied()
            .filter(|&i| matches!(ops[i], Operation::Copy { .. }))
            .collect();
        for (i, outcome) in self.run_copies(ops, &replacements, done, total) {
            outcomes[i] = Some(outcome);
        }

        // Keepers written by this run that did not land.
        let failed_keepers: HashSet<PathBuf> = ops
            .iter()
            .zip(outcomes.iter())
            .filter_map(|(op, outcome)| match op {
                Operation::Copy { dst, .. } if *outcome != Some(Outcome::Done) => Some(dst.clone()),
                _ => None,
            })
            .collect();

        for &i in &destructive {
            let op = &ops[i];
            let result = match op {
                _ if op.is_displacement() => continue,
                Operation::Remove { path, guard, .. } => self.guarded(|| {
                    if let Some(guard) = guard {
                        if failed_keepers.contains(&guard.keeper) {
                            return Err(Failure::new(
                                FailureKind::DependencyFailed,
                                format!("copy to {} did not complete", guard.keeper.display()),
                            ));
                        }
                        self.check_keeper(&guard.keeper, &guard.identity, guard.size)?;
                    }
                    self.remove_file(path)
                }),
                _ => continue,
            };
            outcomes[i] = Some(self.settle(op, result, done, total));
        }

        for &i in &destructive {
            let op = &ops[i];
            if let Operation::RemoveDir { path } = op {
                let result = self.guarded(|| remove_empty_dir(path));
                outcomes[i] = Some(self.settle(op, result, done, total));
            }
        }
    }

    /// Creates the directories and performs the copies that had to wait for a
    /// displaced file to be removed. Anything still blocked by a file fails.
    fn run_waiting(&self, ops: &[Operation], outcomes: &mut [Option<Outcome>], done: &AtomicUsize, total: usize) {
        let displaced = displaced_paths(ops);
        if displaced.is_empty() {
            return;
        }
        let still_blocked: Vec<&Path> = displaced
            .iter()
            .copied()
            .filter(|path| fs::symlink_metadata(path).map(|m| !m.is_dir()).unwrap_or(false))
            .collect();

        let mut copies = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            if outcomes[i].is_some() || !waits_on_displacement(op, &displaced) {
                continue;
            }
            if still_blocked.iter().any(|b| op.path().starts_with(b)) {
                let result = self.guarded(|| {
                    Err(Failure::new(
                        FailureKind::DependencyFailed,
                        "a file still occupies the directory path",
                    ))
                });
                outcomes[i] = Some(self.settle(op, result, done, total));
                continue;
            }
            match op {
                Operation::CreateDir { path } => {
                    let result = self.guarded(|| {
                        fs::create_dir_all(path)?;
                        debug!("Created directory {}", path.display());
                        Ok(Outcome::Done)
                    });
                    outcomes[i] = Some(self.settle(op, result, done, total));
                }
                _ => copies.push(i),
            }
        }
        for (i, outcome) in self.run_copies(ops, &copies, done, total) {
            outcomes[i] = Some(outcome);
        }
    }

    fn run_copies(&self, ops: &[Operation], indices: &[usize], done: &AtomicUsize, total: usize) -> Vec<(usize, Outcome)> {
        let work = || {
            indices
                .par_iter()
                .map(|&i| {
                    let op = &ops[i];
                    let result = match op {
                        Operation::Copy {
                            src,
                            dst,
                            identity,
                            size,
                            replace,
                        } => self.guarded(|| self.copy_file(src, dst, identity, *size, *replace)),
                        _ => Ok(Outcome::Skipped {
                            reason: "not a copy".to_string(),
                        }),
                    };
                    (i, self.settle(op, result, done, total))
                })
                .collect::<Vec<_>>()
        };
        match self.options.workers {
            Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n.max(1)).build() {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    warn!("Could not build a {} worker pool ({}), using the global pool", n, e);
                    work()
                }
            },
            None => work(),
        }
    }

    /// Runs `f` unless the deadline has passed.
    fn guarded<F>(&self, f: F) -> std::result::Result<Outcome, Failure>
    where
        F: FnOnce() -> std::result::Result<Outcome, Failure>,
    {
        match self.options.deadline {
            Some(deadline) if Instant::now() >= deadline => Ok(Outcome::Skipped {
                reason: "deadline reached".to_string(),
            }),
            _ => f(),
        }
    }

    fn settle(
        &self,
        op: &Operation,
        result: std::result::Result<Outcome, Failure>,
        done: &AtomicUsize,
        total: usize,
    ) -> Outcome {
        let outcome = outcome_of(result);
        if let Outcome::Failed { kind, reason } = &outcome {
            error!("{} failed ({:?}): {}", op, kind, reason);
        }
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        self.reporter.on_execute_progress(n, total);
        outcome
    }

    /// Copies into a temp file beside `dst`, verifies it, then moves it into place.
    fn copy_file(
        &self,
        src: &Path,
        dst: &Path,
        identity: &Identity,
        size: u64,
        replace: bool,
    ) -> std::result::Result<Outcome, Failure> {
        let parent = dst
            .parent()
            .ok_or_else(|| Failure::new(FailureKind::Io, "destination has no parent directory"))?;
        fs::create_dir_all(parent)?;
        if !replace && fs::symlink_metadata(dst).is_ok() {
            return Err(Failure::new(
                FailureKind::Conflict,
                "destination appeared after planning",
            ));
        }

        let mut input = File::open(src)?;
        let modified = input.metadata()?.modified().ok();
        let mut staged = tempfile::Builder::new()
            .prefix(".refacdir-")
            .suffix(".part")
            .tempfile_in(parent)?;
        io::copy(&mut input, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        if let Some(modified) = modified {
            staged.as_file().set_modified(modified)?;
        }

        if !self.options.hash_mode.verify(staged.path(), identity, size)? {
            return Err(Failure::new(
                FailureKind::VerificationFailure,
                format!("copy of {} does not match its scanned identity", src.display()),
            ));
        }

        let persisted = if replace {
            staged.persist(dst)
        } else {
            staged.persist_noclobber(dst)
        };
        match persisted {
            Ok(_) => {
                debug!("Copied {} -> {}", src.display(), dst.display());
                Ok(Outcome::Done)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Err(Failure::new(
                FailureKind::Conflict,
                "destination appeared after planning",
            )),
            Err(e) => Err(e.error.into()),
        }
    }

    fn check_keeper(&self, keeper: &Path, identity: &Identity, size: u64) -> std::result::Result<(), Failure> {
        if self.options.hash_mode.verify(keeper, identity, size)? {
            Ok(())
        } else {
            Err(Failure::new(
                FailureKind::VerificationFailure,
                format!("{} no longer holds {}", keeper.display(), identity),
            ))
        }
    }

    fn remove_file(&self, path: &Path) -> std::result::Result<Outcome, Failure> {
        if fs::symlink_metadata(path).is_err() {
            return Ok(Outcome::Skipped {
                reason: "no longer exists".to_string(),
            });
        }
        if self.options.use_trash {
            trash::delete(path).map_err(|e| Failure::new(FailureKind::Io, format!("trash error: {}", e)))?;
        } else {
            fs::remove_file(path)?;
        }
        debug!("Removed {}", path.display());
        Ok(Outcome::Done)
    }
}

fn displaced_paths(ops: &[Operation]) -> Vec<&Path> {
    ops.iter()
        .filter(|op| op.is_displacement())
        .map(Operation::path)
        .collect()
}

/// Directory creations and new copies at or below a displaced file.
fn waits_on_displacement(op: &Operation, displaced: &[&Path]) -> bool {
    matches!(op, Operation::CreateDir { .. } | Operation::Copy { replace: false, .. })
        && displaced.iter().any(|d| op.path().starts_with(d))
}

/// Removes `path` if it is an empty directory. Directories that still hold
/// entries (for instance unscanned files) are skipped.
fn remove_empty_dir(path: &Path) -> std::result::Result<Outcome, Failure> {
    let mut entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Outcome::Skipped {
                reason: "no longer exists".to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    if entries.next().is_some() {
        return Ok(Outcome::Skipped {
            reason: "directory not empty".to_string(),
        });
    }
    fs::remove_dir(path)?;
    debug!("Removed directory {}", path.display());
    Ok(Outcome::Done)
}
