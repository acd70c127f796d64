mod walk;

use crate::error::{Error, Result};
use crate::filter::PathFilter;
use crate::hasher::HashMode;
use crate::progress::ProgressReporter;
use crate::snapshot::TreeSnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Which entries take part in a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileScope {
    #[default]
    FilesAndDirs,
    /// Directory structure only; files are neither recorded nor hashed.
    DirsOnly,
}

#[derive(Debug, Clone)]
pub struct ScanOptions<'a> {
    pub recursive: bool,
    pub filter: &'a PathFilter,
    pub hash_mode: HashMode,
    pub scope: FileScope,
    /// Upper bound on concurrent hashing; `None` uses the global rayon pool.
    pub workers: Option<usize>,
}

/// Walks `root` and returns its snapshot. A missing or unreadable root is a
/// scan error.
pub fn scan(
    root: &Path,
    options: &ScanOptions<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<TreeSnapshot> {
    check_root(root)?;
    build_snapshot(root, options, reporter)
}

/// Like [`scan`], but a root that does not exist yet is an empty tree. Used
/// for the target side of a first backup.
pub fn scan_or_empty(
    root: &Path,
    options: &ScanOptions<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<TreeSnapshot> {
    match fs::metadata(root) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Target '{}' does not exist yet, treating it as empty", root.display());
            Ok(TreeSnapshot::empty(root.to_path_buf(), options.hash_mode))
        }
        _ => scan(root, options, reporter),
    }
}

fn check_root(root: &Path) -> Result<()> {
    let scan_error = |source: io::Error| Error::Scan {
        root: root.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(root).map_err(scan_error)?;
    if !metadata.is_dir() {
        return Err(scan_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }
    fs::read_dir(root).map_err(scan_error)?;
    Ok(())
}

fn build_snapshot(
    root: &Path,
    options: &ScanOptions<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<TreeSnapshot> {
    let root_label = root.display().to_string();
    reporter.on_scan_start(&root_label);
    let scan_start = Instant::now();

    let (entries, mut issues) = walk::collect_entries(root, options);
    let walk_duration = scan_start.elapsed();
    debug!(
        "Walked '{}' in {:.2}s, {} entries, {} unreadable",
        root_label,
        walk_duration.as_secs_f64(),
        entries.len(),
        issues.len(),
    );

    let (records, hash_issues) = walk::identify_entries(entries, options, reporter)?;
    issues.extend(hash_issues);
    issues.sort_by(|a, b| a.path.cmp(&b.path));

    let duration = scan_start.elapsed();
    reporter.on_scan_complete(&root_label, records.len(), duration.as_secs_f64());
    debug!(
        "Snapshot of '{}' completed in {:.2}s, {} records",
        root_label,
        duration.as_secs_f64(),
        records.len(),
    );

    Ok(TreeSnapshot::new(root.to_path_buf(), options.hash_mode, records, issues))
}
