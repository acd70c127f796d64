use crate::analysis::{DuplicateResolutionPlan, DuplicateResolver};
use crate::config::{AppConfig, BackupMapping, DuplicateRemoverConfig};
use crate::error::Result;
use crate::executor::{Confirm, ExecutionReport, ExecutorOptions, PlanExecutor};
use crate::plan::PlanSummary;
use crate::progress::ProgressReporter;
use crate::scanner::{self, ScanOptions};
use crate::snapshot::{ScanIssue, TreeSnapshot};
use crate::sync::SyncPlanner;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run-wide switches that override per-mapping settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Forces a dry run for every mapping.
    pub test: bool,
    pub skip_confirm: bool,
    /// Restricts the run to the mapping or remover with this name.
    pub only: Option<String>,
    pub deadline: Option<Instant>,
    /// Directory receiving one duplicate CSV report per remover.
    pub duplicate_report_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub name: String,
    pub plan: Option<PlanSummary>,
    pub report: Option<ExecutionReport>,
    /// Files that could not be read while scanning.
    pub scan_issues: Vec<ScanIssue>,
    /// Set when the job was aborted before executing anything.
    pub error: Option<String>,
}

impl JobOutcome {
    fn aborted(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            plan: None,
            report: None,
            scan_issues: Vec::new(),
            error: Some(error),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.error.is_some()
            || !self.scan_issues.is_empty()
            || self.report.as_ref().map(|r| r.has_failures()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub jobs: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.jobs.iter().any(JobOutcome::has_failures)
    }
}

/// Runs configured backup mappings and duplicate removers one after another,
/// in declared order. Every job scans fresh, so a later mapping sees what an
/// earlier one moved.
pub struct SyncEngine<'a> {
    config: &'a AppConfig,
    confirm: &'a dyn Confirm,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> SyncEngine<'a> {
    pub fn new(config: &'a AppConfig, confirm: &'a dyn Confirm, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            config,
            confirm,
            reporter,
        }
    }

    /// Mappings that a run with `options` would execute.
    pub fn selected_mappings(&self, options: &RunOptions) -> Vec<&'a BackupMapping> {
        self.config
            .backup_mappings
            .iter()
            .filter(|m| m.will_run && selected(&m.name, options))
            .collect()
    }

    pub fn selected_removers(&self, options: &RunOptions) -> Vec<&'a DuplicateRemoverConfig> {
        self.config
            .duplicate_removers
            .iter()
            .filter(|r| r.will_run && selected(&r.name, options))
            .collect()
    }

    pub fn run_backups(&self, options: &RunOptions) -> RunSummary {
        let mut summary = RunSummary::default();
        for mapping in self.selected_mappings(options) {
            if past_deadline(options) {
                warn!("Deadline reached, not starting mapping '{}'", mapping.name);
                summary
                    .jobs
                    .push(JobOutcome::aborted(&mapping.name, "deadline reached".to_string()));
                continue;
            }
            let outcome = match self.run_mapping(mapping, options) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Mapping '{}' aborted: {}", mapping.name, e);
                    JobOutcome::aborted(&mapping.name, e.to_string())
                }
            };
            summary.jobs.push(outcome);
        }
        summary
    }

    /// Scans, plans and executes one mapping. A source that cannot be scanned
    /// aborts this mapping only.
    pub fn run_mapping(&self, mapping: &BackupMapping, options: &RunOptions) -> Result<JobOutcome> {
        info!(
            "Running {} mapping '{}': {} -> {}",
            mapping.mode, mapping.name, mapping.source_dir, mapping.target_dir
        );
        let filter = mapping.path_filter(self.config);
        let scan_options = ScanOptions {
            recursive: mapping.recursive,
            filter: &filter,
            hash_mode: mapping.hash_mode,
            scope: mapping.file_mode,
            workers: self.config.workers,
        };

        let phase = Instant::now();
        let source = scanner::scan(&mapping.source_root(), &scan_options, self.reporter)?;
        let target = scanner::scan_or_empty(&mapping.target_root(), &scan_options, self.reporter)?;
        debug!(
            "Scanned both trees in {:.2}s: source {} bytes, target {} bytes",
            phase.elapsed().as_secs_f64(),
            source.total_size(),
            target.total_size()
        );

        if mapping.warn_duplicates {
            warn_duplicates(&source);
        }
        for issue in source.issues().iter().chain(target.issues()) {
            warn!("Unreadable: {} ({})", issue.path.display(), issue.reason);
        }

        let planner = SyncPlanner::new(mapping.mode, mapping.file_mode, mapping.overwrite, &filter);
        let plan = planner.plan(&source, &target);
        let plan_summary = plan.summary();
        info!(
            "Plan for '{}': {} copies ({} bytes), {} removals, {} skipped, {} conflicts",
            mapping.name,
            plan_summary.copies,
            plan_summary.copy_bytes,
            plan_summary.removals + plan_summary.dirs_to_remove,
            plan_summary.skips,
            plan_summary.conflicts
        );

        let executor = PlanExecutor::new(
            ExecutorOptions {
                test: options.test || mapping.test,
                skip_confirm: options.skip_confirm || mapping.skip_confirm,
                hash_mode: mapping.hash_mode,
                workers: self.config.workers,
                use_trash: self.config.use_trash,
                deadline: options.deadline,
            },
            self.confirm,
            self.reporter,
        );
        let report = executor.execute(&plan, &mapping.name);

        let mut scan_issues = source.issues().to_vec();
        scan_issues.extend_from_slice(target.issues());
        Ok(JobOutcome {
            name: mapping.name.clone(),
            plan: Some(plan_summary),
            report: Some(report),
            scan_issues,
            error: None,
        })
    }

    pub fn run_duplicate_removers(&self, options: &RunOptions) -> RunSummary {
        let mut summary = RunSummary::default();
        for remover in self.selected_removers(options) {
            if past_deadline(options) {
                warn!("Deadline reached, not starting duplicate remover '{}'", remover.name);
                summary
                    .jobs
                    .push(JobOutcome::aborted(&remover.name, "deadline reached".to_string()));
                continue;
            }
            let outcome = match self.run_remover(remover, options) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Duplicate remover '{}' aborted: {}", remover.name, e);
                    JobOutcome::aborted(&remover.name, e.to_string())
                }
            };
            summary.jobs.push(outcome);
        }
        summary
    }

    /// Scans every source dir of `remover` and decides which copies go.
    pub fn resolve_duplicates(&self, remover: &DuplicateRemoverConfig) -> Result<(DuplicateResolutionPlan, Vec<ScanIssue>)> {
        let filter = remover.path_filter();
        let scan_options = ScanOptions {
            recursive: remover.recursive,
            filter: &filter,
            hash_mode: remover.hash_mode,
            scope: Default::default(),
            workers: self.config.workers,
        };
        let snapshots = remover
            .source_roots()
            .iter()
            .map(|root| scanner::scan(root, &scan_options, self.reporter))
            .collect::<Result<Vec<TreeSnapshot>>>()?;
        let issues: Vec<ScanIssue> = snapshots
            .iter()
            .flat_map(|s| s.issues().iter().cloned())
            .collect();

        let resolver = DuplicateResolver {
            preferred_delete_dirs: remover.preferred_delete_roots(),
            select_for_folder_depth: remover.select_for_folder_depth,
            match_dir: remover.match_dir,
        };
        Ok((resolver.resolve(&snapshots), issues))
    }

    fn run_remover(&self, remover: &DuplicateRemoverConfig, options: &RunOptions) -> Result<JobOutcome> {
        info!("Running duplicate remover '{}' over {:?}", remover.name, remover.source_dirs);
        let (resolution, scan_issues) = self.resolve_duplicates(remover)?;
        info!(
            "'{}': {} duplicate group(s), {} removal(s), {} bytes reclaimable",
            remover.name,
            resolution.groups.len(),
            resolution.removal_count(),
            resolution.reclaimable_bytes()
        );

        if let Some(dir) = &options.duplicate_report_dir {
            if !resolution.is_empty() {
                resolution.write_csv(&report_path(dir, &remover.name))?;
            }
        }

        let executor = PlanExecutor::new(
            ExecutorOptions {
                test: options.test || remover.test,
                skip_confirm: options.skip_confirm || remover.skip_confirm,
                hash_mode: remover.hash_mode,
                workers: self.config.workers,
                use_trash: self.config.use_trash,
                deadline: options.deadline,
            },
            self.confirm,
            self.reporter,
        );
        let report = executor.execute(&resolution.plan, &remover.name);
        Ok(JobOutcome {
            name: remover.name.clone(),
            plan: Some(resolution.plan.summary()),
            report: Some(report),
            scan_issues,
            error: None,
        })
    }
}

fn selected(name: &str, options: &RunOptions) -> bool {
    options.only.as_deref().map(|only| only == name).unwrap_or(true)
}

fn past_deadline(options: &RunOptions) -> bool {
    options.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
}

fn report_path(dir: &Path, name: &str) -> PathBuf {
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    dir.join(format!("{}_duplicates.csv", safe))
}

fn warn_duplicates(source: &TreeSnapshot) {
    let mut groups: Vec<_> = source
        .identity_index()
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .collect();
    groups.sort_by(|a, b| a.1.cmp(&b.1));
    for (identity, paths) in groups {
        warn!("Duplicate files in source ({}): {:?}", identity, paths);
    }
}
