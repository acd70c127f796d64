use super::{FileScope, ScanOptions};
use crate::error::{Error, Result};
use crate::progress::ProgressReporter;
use crate::snapshot::{FileRecord, RecordKind, ScanIssue};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;
use walkdir::WalkDir;

pub(super) struct WalkEntry {
    absolute: PathBuf,
    relative: PathBuf,
    kind: RecordKind,
    metadata: Metadata,
}

/// Walks the tree, pruning excluded directories before descending into them.
/// Symlinks are recorded but never followed.
pub(super) fn collect_entries(
    root: &Path,
    options: &ScanOptions<'_>,
) -> (Vec<WalkEntry>, Vec<ScanIssue>) {
    let mut entries = Vec::new();
    let mut issues = Vec::new();
    let max_depth = if options.recursive { usize::MAX } else { 1 };

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !options.filter.is_excluded(entry.path(), relative)
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                error!("Error reading entry {}: {}", path.display(), err);
                issues.push(ScanIssue {
                    path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            RecordKind::Symlink
        } else if file_type.is_dir() {
            RecordKind::Directory
        } else {
            RecordKind::File
        };

        if kind != RecordKind::Directory && options.scope == FileScope::DirsOnly {
            continue;
        }
        if kind == RecordKind::File && !options.filter.includes_file(entry.path(), relative) {
            continue;
        }
        if kind == RecordKind::Symlink && options.filter.is_excluded(entry.path(), relative) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                error!("Error getting metadata for {}: {}", entry.path().display(), err);
                issues.push(ScanIssue {
                    path: entry.path().to_path_buf(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        entries.push(WalkEntry {
            absolute: entry.path().to_path_buf(),
            relative: relative.to_path_buf(),
            kind,
            metadata,
        });
    }

    (entries, issues)
}

/// Computes identities for the regular files in parallel, bounded by the
/// configured worker count.
pub(super) fn identify_entries(
    entries: Vec<WalkEntry>,
    options: &ScanOptions<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<(BTreeMap<PathBuf, FileRecord>, Vec<ScanIssue>)> {
    let records: DashMap<PathBuf, FileRecord> = DashMap::new();
    let issues: DashMap<PathBuf, String> = DashMap::new();
    let total_files = entries.iter().filter(|e| e.kind == RecordKind::File).count();
    let hashed = AtomicUsize::new(0);

    reporter.on_hash_start(total_files);

    let identify = |entry: &WalkEntry| {
        let identity = if entry.kind == RecordKind::File {
            match options.hash_mode.identity(&entry.absolute, &entry.relative) {
                Ok(identity) => {
                    let done = hashed.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.on_hash_progress(done, total_files);
                    Some(identity)
                }
                Err(e) => {
                    error!("{}", e);
                    issues.insert(entry.absolute.clone(), e.to_string());
                    return;
                }
            }
        } else {
            None
        };

        records.insert(
            entry.relative.clone(),
            FileRecord {
                relative_path: entry.relative.clone(),
                absolute_path: entry.absolute.clone(),
                kind: entry.kind,
                size: if entry.kind == RecordKind::File {
                    entry.metadata.len()
                } else {
                    0
                },
                modified: entry.metadata.modified().ok().map(DateTime::<Utc>::from),
                created: entry.metadata.created().ok().map(DateTime::<Utc>::from),
                identity,
            },
        );
    };

    match options.workers {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers.max(1))
                .build()
                .map_err(|e| Error::Other(format!("Failed to build hashing pool: {}", e)))?;
            pool.install(|| entries.par_iter().for_each(identify));
        }
        None => entries.par_iter().for_each(identify),
    }

    let records: BTreeMap<PathBuf, FileRecord> = records.into_iter().collect();
    let issues: Vec<ScanIssue> = issues
        .into_iter()
        .map(|(path, reason)| ScanIssue { path, reason })
        .collect();
    Ok((records, issues))
}
