use crate::hasher::{HashMode, Identity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    File,
    Directory,
    Symlink,
}

/// A file system entry as it was at scan time.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub kind: RecordKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    /// Only regular files carry an identity.
    pub identity: Option<Identity>,
}

impl FileRecord {
    pub fn is_file(&self) -> bool {
        self.kind == RecordKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == RecordKind::Directory
    }

    /// Creation time when the platform reports one, modified time otherwise.
    pub fn birth_time(&self) -> Option<DateTime<Utc>> {
        self.created.or(self.modified)
    }
}

/// An entry the scanner saw but could not identify.
#[derive(Debug, Clone, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub reason: String,
}

/// Immutable, ordered view of one tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeSnapshot {
    pub root: PathBuf,
    pub captured_at: DateTime<Utc>,
    pub hash_mode: HashMode,
    records: BTreeMap<PathBuf, FileRecord>,
    issues: Vec<ScanIssue>,
}

impl TreeSnapshot {
    pub fn new(
        root: PathBuf,
        hash_mode: HashMode,
        records: BTreeMap<PathBuf, FileRecord>,
        issues: Vec<ScanIssue>,
    ) -> Self {
        Self {
            root,
            captured_at: Utc::now(),
            hash_mode,
            records,
            issues,
        }
    }

    /// Snapshot of a tree that does not exist yet.
    pub fn empty(root: PathBuf, hash_mode: HashMode) -> Self {
        Self::new(root, hash_mode, BTreeMap::new(), Vec::new())
    }

    pub fn get(&self, relative: &Path) -> Option<&FileRecord> {
        self.records.get(relative)
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values().filter(|r| r.is_file())
    }

    pub fn dirs(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values().filter(|r| r.is_dir())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entries that could not be identified. A snapshot with issues is an
    /// incomplete picture of its tree.
    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues
    }

    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// Identity -> relative paths of every file holding it, in path order.
    pub fn identity_index(&self) -> HashMap<&Identity, Vec<&Path>> {
        let mut index: HashMap<&Identity, Vec<&Path>> = HashMap::new();
        for record in self.files() {
            if let Some(identity) = &record.identity {
                index
                    .entry(identity)
                    .or_default()
                    .push(record.relative_path.as_path());
            }
        }
        index
    }

    pub fn total_size(&self) -> u64 {
        self.files().map(|r| r.size).sum()
    }
}
