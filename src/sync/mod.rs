mod naming;

use crate::filter::PathFilter;
use crate::hasher::Identity;
use crate::plan::{Operation, Plan, RemovalGuard, RemoveReason, SkipReason};
use crate::scanner::FileScope;
use crate::snapshot::{FileRecord, RecordKind, TreeSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use naming::{suffixed_sibling, MAX_DUPLICATE_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMode {
    /// Copy source to target, never delete.
    #[default]
    Push,
    /// Copy, then delete each source original once its copy is verified.
    PushAndRemove,
    /// Push even when the identity already exists elsewhere in the target.
    PushDuplicates,
    /// Make the target's identity set equal to the source's.
    Mirror,
    /// Mirror even when the identity already exists elsewhere in the target.
    MirrorDuplicates,
}

impl SyncMode {
    pub fn is_mirror(&self) -> bool {
        matches!(self, SyncMode::Mirror | SyncMode::MirrorDuplicates)
    }

    pub fn allows_duplicates(&self) -> bool {
        matches!(self, SyncMode::PushDuplicates | SyncMode::MirrorDuplicates)
    }

    pub fn removes_source(&self) -> bool {
        matches!(self, SyncMode::PushAndRemove)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncMode::Push => "PUSH",
            SyncMode::PushAndRemove => "PUSH_AND_REMOVE",
            SyncMode::PushDuplicates => "PUSH_DUPLICATES",
            SyncMode::Mirror => "MIRROR",
            SyncMode::MirrorDuplicates => "MIRROR_DUPLICATES",
        };
        write!(f, "{}", name)
    }
}

/// Where a source file should land in the target.
enum Destination {
    /// Target already holds the identity at this relative path.
    Present(PathBuf),
    /// Target holds the identity at another relative path.
    PresentElsewhere(PathBuf),
    Copy { relative: PathBuf, replace: bool },
    Conflict(String),
}

/// Diffs a source snapshot against a target snapshot.
pub struct SyncPlanner<'a> {
    pub mode: SyncMode,
    pub scope: FileScope,
    pub overwrite: bool,
    pub filter: &'a PathFilter,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(mode: SyncMode, scope: FileScope, overwrite: bool, filter: &'a PathFilter) -> Self {
        Self {
            mode,
            scope,
            overwrite,
            filter,
        }
    }

    pub fn plan(&self, source: &TreeSnapshot, target: &TreeSnapshot) -> Plan {
        let mut ops = Vec::new();
        let source_ids: HashSet<&Identity> =
            source.files().filter_map(|r| r.identity.as_ref()).collect();
        let target_ids = target.identity_index();
        // Target relative paths this plan writes to.
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        // Source directories whose target path cannot be turned into a directory.
        let mut blocked: Vec<&Path> = Vec::new();

        for record in source.dirs() {
            let relative = record.relative_path.as_path();
            if blocked.iter().any(|b| relative.starts_with(b)) {
                continue;
            }
            match target.get(relative) {
                Some(existing) if existing.is_dir() => {}
                Some(existing)
                    if existing.is_file() && self.is_replaceable_stale(existing, source, &source_ids) =>
                {
                    ops.push(Operation::Remove {
                        path: existing.absolute_path.clone(),
                        reason: RemoveReason::Displaced,
                        guard: None,
                    });
                    ops.push(Operation::CreateDir {
                        path: target.root.join(relative),
                    });
                    // Keeps the stale pass from removing it a second time.
                    claimed.insert(relative.to_path_buf());
                }
                Some(_) => {
                    ops.push(Operation::Conflict {
                        path: target.root.join(relative),
                        reason: "a non-directory occupies the directory path".to_string(),
                    });
                    blocked.push(relative);
                }
                None => ops.push(Operation::CreateDir {
                    path: target.root.join(relative),
                }),
            }
        }

        if self.scope == FileScope::FilesAndDirs {
            for record in source.records() {
                match record.kind {
                    RecordKind::Directory => {}
                    RecordKind::Symlink => ops.push(Operation::Skip {
                        path: record.absolute_path.clone(),
                        reason: SkipReason::Symlink,
                    }),
                    RecordKind::File if blocked.iter().any(|b| record.relative_path.starts_with(b)) => {
                        ops.push(Operation::Conflict {
                            path: target.root.join(&record.relative_path),
                            reason: "a parent directory path is occupied".to_string(),
                        })
                    }
                    RecordKind::File => self.plan_file(
                        record,
                        source,
                        target,
                        &source_ids,
                        &target_ids,
                        &mut claimed,
                        &mut ops,
                    ),
                }
            }
        }

        if self.mode.is_mirror() {
            self.plan_stale_removals(source, target, &source_ids, &claimed, &mut ops);
        }

        let plan = Plan::new(ops);
        debug!(
            "Planned {} for '{}' -> '{}': {:?}",
            self.mode,
            source.root.display(),
            target.root.display(),
            plan.summary()
        );
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_file(
        &self,
        record: &FileRecord,
        source: &TreeSnapshot,
        target: &TreeSnapshot,
        source_ids: &HashSet<&Identity>,
        target_ids: &HashMap<&Identity, Vec<&Path>>,
        claimed: &mut HashSet<PathBuf>,
        ops: &mut Vec<Operation>,
    ) {
        let Some(identity) = &record.identity else {
            return;
        };

        let destination = self.destination(
            record, identity, source, target, source_ids, target_ids, claimed,
        );
        let keeper = match destination {
            Destination::Present(relative) => {
                ops.push(Operation::Skip {
                    path: record.absolute_path.clone(),
                    reason: SkipReason::AlreadyPresent,
                });
                Some(target.root.join(relative))
            }
            Destination::PresentElsewhere(relative) => {
                let keeper = target.root.join(relative);
                ops.push(Operation::Skip {
                    path: record.absolute_path.clone(),
                    reason: SkipReason::PresentElsewhere(keeper.clone()),
                });
                Some(keeper)
            }
            Destination::Copy { relative, replace } => {
                let dst = target.root.join(&relative);
                ops.push(Operation::Copy {
                    src: record.absolute_path.clone(),
                    dst: dst.clone(),
                    identity: identity.clone(),
                    size: record.size,
                    replace,
                });
                claimed.insert(relative);
                Some(dst)
            }
            Destination::Conflict(reason) => {
                ops.push(Operation::Conflict {
                    path: target.root.join(&record.relative_path),
                    reason,
                });
                None
            }
        };

        if !self.mode.removes_source() {
            return;
        }
        let Some(keeper) = keeper else {
            return;
        };
        if self
            .filter
            .is_removal_excluded(&record.absolute_path, &record.relative_path)
        {
            ops.push(Operation::Skip {
                path: record.absolute_path.clone(),
                reason: SkipReason::RemovalProtected,
            });
            return;
        }
        ops.push(Operation::Remove {
            path: record.absolute_path.clone(),
            reason: RemoveReason::BackedUp,
            guard: Some(RemovalGuard {
                keeper,
                identity: identity.clone(),
                size: record.size,
            }),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn destination(
        &self,
        record: &FileRecord,
        identity: &Identity,
        source: &TreeSnapshot,
        target: &TreeSnapshot,
        source_ids: &HashSet<&Identity>,
        target_ids: &HashMap<&Identity, Vec<&Path>>,
        claimed: &HashSet<PathBuf>,
    ) -> Destination {
        let relative = &record.relative_path;
        let occupant = target.get(relative);

        if let Some(existing) = occupant {
            if existing.identity.as_ref() == Some(identity) {
                return Destination::Present(relative.clone());
            }
        }

        if !self.mode.allows_duplicates() {
            if let Some(first) = target_ids.get(identity).and_then(|paths| paths.first()) {
                return Destination::PresentElsewhere(first.to_path_buf());
            }
        }

        let occupant = match occupant {
            None if !claimed.contains(relative) => {
                return Destination::Copy {
                    relative: relative.clone(),
                    replace: false,
                }
            }
            None => None,
            Some(existing) if !existing.is_file() => {
                return Destination::Conflict(format!(
                    "a {} occupies the destination",
                    if existing.is_dir() { "directory" } else { "symbolic link" }
                ))
            }
            Some(existing) => Some(existing),
        };

        if let Some(existing) = occupant {
            if self.overwrite || self.is_replaceable_stale(existing, source, source_ids) {
                return Destination::Copy {
                    relative: relative.clone(),
                    replace: true,
                };
            }
            if !self.mode.allows_duplicates() {
                return Destination::Conflict(
                    "destination exists with different content".to_string(),
                );
            }
        }

        // Duplicate modes keep both files by moving to the first free `name (N).ext`.
        for n in 1..=MAX_DUPLICATE_SUFFIX {
            let candidate = suffixed_sibling(relative, n);
            if claimed.contains(&candidate) {
                continue;
            }
            match target.get(&candidate) {
                None => {
                    return Destination::Copy {
                        relative: candidate,
                        replace: false,
                    }
                }
                Some(existing) if existing.identity.as_ref() == Some(identity) => {
                    return Destination::Present(candidate)
                }
                Some(_) => continue,
            }
        }
        Destination::Conflict("no free duplicate name for destination".to_string())
    }

    /// A mirror would remove this occupant anyway, so the copy may replace it.
    fn is_replaceable_stale(
        &self,
        occupant: &FileRecord,
        source: &TreeSnapshot,
        source_ids: &HashSet<&Identity>,
    ) -> bool {
        self.mode.is_mirror()
            && source.is_complete()
            && occupant
                .identity
                .as_ref()
                .map(|id| !source_ids.contains(id))
                .unwrap_or(false)
            && !self
                .filter
                .is_removal_excluded(&occupant.absolute_path, &occupant.relative_path)
    }

    fn plan_stale_removals(
        &self,
        source: &TreeSnapshot,
        target: &TreeSnapshot,
        source_ids: &HashSet<&Identity>,
        claimed: &HashSet<PathBuf>,
        ops: &mut Vec<Operation>,
    ) {
        let complete = source.is_complete();
        // Target entries that survive this plan; their ancestors must stay.
        let mut kept: HashSet<&Path> = HashSet::new();

        if self.scope == FileScope::FilesAndDirs {
            for record in target.records().filter(|r| !r.is_dir()) {
                let relative = record.relative_path.as_path();
                let stale = record.is_file()
                    && !claimed.contains(relative)
                    && record
                        .identity
                        .as_ref()
                        .map(|id| !source_ids.contains(id))
                        .unwrap_or(false);
                if !stale {
                    kept.insert(relative);
                    continue;
                }
                if self
                    .filter
                    .is_removal_excluded(&record.absolute_path, relative)
                {
                    kept.insert(relative);
                    ops.push(Operation::Skip {
                        path: record.absolute_path.clone(),
                        reason: SkipReason::RemovalProtected,
                    });
                } else if !complete {
                    kept.insert(relative);
                    ops.push(Operation::Skip {
                        path: record.absolute_path.clone(),
                        reason: SkipReason::SourceIncomplete,
                    });
                } else {
                    ops.push(Operation::Remove {
                        path: record.absolute_path.clone(),
                        reason: RemoveReason::Stale,
                        guard: None,
                    });
                }
            }
        }

        let mut pinned: HashSet<&Path> = HashSet::new();
        for path in &kept {
            pinned.extend(path.ancestors().skip(1));
        }
        for record in target.dirs() {
            let relative = record.relative_path.as_path();
            if source.get(relative).map(|r| r.is_dir()).unwrap_or(false) {
                continue;
            }
            if self
                .filter
                .is_removal_excluded(&record.absolute_path, relative)
            {
                ops.push(Operation::Skip {
                    path: record.absolute_path.clone(),
                    reason: SkipReason::RemovalProtected,
                });
            } else if !complete {
                ops.push(Operation::Skip {
                    path: record.absolute_path.clone(),
                    reason: SkipReason::SourceIncomplete,
                });
            } else if !pinned.contains(relative) {
                ops.push(Operation::RemoveDir {
                    path: record.absolute_path.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashMode;
    use crate::snapshot::ScanIssue;
    use std::collections::BTreeMap;

    fn file(root: &str, rel: &str, content: &str) -> FileRecord {
        FileRecord {
            relative_path: PathBuf::from(rel),
            absolute_path: Path::new(root).join(rel),
            kind: RecordKind::File,
            size: content.len() as u64,
            modified: None,
            created: None,
            identity: Some(Identity::Digest(content.to_string())),
        }
    }

    fn dir(root: &str, rel: &str) -> FileRecord {
        FileRecord {
            relative_path: PathBuf::from(rel),
            absolute_path: Path::new(root).join(rel),
            kind: RecordKind::Directory,
            size: 0,
            modified: None,
            created: None,
            identity: None,
        }
    }

    fn tree(root: &str, records: Vec<FileRecord>) -> TreeSnapshot {
        tree_with_issues(root, records, Vec::new())
    }

    fn tree_with_issues(root: &str, records: Vec<FileRecord>, issues: Vec<ScanIssue>) -> TreeSnapshot {
        let records: BTreeMap<PathBuf, FileRecord> = records
            .into_iter()
            .map(|r| (r.relative_path.clone(), r))
            .collect();
        TreeSnapshot::new(PathBuf::from(root), HashMode::Content, records, issues)
    }

    fn planner(mode: SyncMode, filter: &PathFilter) -> SyncPlanner<'_> {
        SyncPlanner::new(mode, FileScope::FilesAndDirs, false, filter)
    }

    fn copies(plan: &Plan) -> Vec<(PathBuf, bool)> {
        plan.operations()
            .iter()
            .filter_map(|op| match op {
                Operation::Copy { dst, replace, .. } => Some((dst.clone(), *replace)),
                _ => None,
            })
            .collect()
    }

    fn removals(plan: &Plan) -> Vec<PathBuf> {
        plan.operations()
            .iter()
            .filter_map(|op| match op {
                Operation::Remove { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_push_copies_missing_and_skips_present() {
        let filter = PathFilter::default();
        let source = tree(
            "/s",
            vec![dir("/s", "d"), file("/s", "d/a.png", "A"), file("/s", "b.png", "B")],
        );
        let target = tree("/t", vec![file("/t", "b.png", "B")]);

        let plan = planner(SyncMode::Push, &filter).plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/d/a.png"), false)]);
        assert_eq!(plan.summary().dirs_to_create, 1);
        assert!(removals(&plan).is_empty());
    }

    #[test]
    fn test_push_skips_identity_present_elsewhere() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "A")]);
        let target = tree("/t", vec![dir("/t", "old"), file("/t", "old/a.png", "A")]);

        let plan = planner(SyncMode::Push, &filter).plan(&source, &target);
        assert!(copies(&plan).is_empty());
        assert!(plan.operations().iter().any(|op| matches!(
            op,
            Operation::Skip { reason: SkipReason::PresentElsewhere(p), .. } if p == Path::new("/t/old/a.png")
        )));
    }

    #[test]
    fn test_push_reports_conflict_for_different_content() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "new")]);
        let target = tree("/t", vec![file("/t", "a.png", "old")]);

        let plan = planner(SyncMode::Push, &filter).plan(&source, &target);
        assert!(copies(&plan).is_empty());
        assert_eq!(plan.summary().conflicts, 1);

        let overwriting = SyncPlanner::new(SyncMode::Push, FileScope::FilesAndDirs, true, &filter);
        let plan = overwriting.plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/a.png"), true)]);
        assert!(plan.has_destructive());
    }

    #[test]
    fn test_push_and_remove_guards_every_removal() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "A"), file("/s", "b.png", "B")]);
        let target = tree("/t", vec![file("/t", "b.png", "B")]);

        let plan = planner(SyncMode::PushAndRemove, &filter).plan(&source, &target);
        assert_eq!(
            removals(&plan),
            vec![PathBuf::from("/s/a.png"), PathBuf::from("/s/b.png")]
        );
        for op in plan.operations() {
            if let Operation::Remove { path, guard, .. } = op {
                let guard = guard.as_ref().unwrap();
                assert_eq!(guard.keeper, Path::new("/t").join(path.file_name().unwrap()));
            }
        }
        let first_remove = plan
            .operations()
            .iter()
            .position(|op| matches!(op, Operation::Remove { .. }))
            .unwrap();
        let last_copy = plan
            .operations()
            .iter()
            .rposition(|op| matches!(op, Operation::Copy { .. }))
            .unwrap();
        assert!(last_copy < first_remove);
    }

    #[test]
    fn test_push_and_remove_never_removes_after_conflict() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "new")]);
        let target = tree("/t", vec![file("/t", "a.png", "old")]);

        let plan = planner(SyncMode::PushAndRemove, &filter).plan(&source, &target);
        assert!(removals(&plan).is_empty());
    }

    #[test]
    fn test_push_and_remove_respects_removal_protection() {
        let filter = PathFilter::new(&[] as &[&str], &["keep"], &[]);
        let source = tree("/s", vec![dir("/s", "keep"), file("/s", "keep/a.png", "A")]);
        let target = tree("/t", vec![]);

        let plan = planner(SyncMode::PushAndRemove, &filter).plan(&source, &target);
        assert_eq!(copies(&plan).len(), 1);
        assert!(removals(&plan).is_empty());
    }

    #[test]
    fn test_mirror_removes_stale_and_copies_missing() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "x.png", "X")]);
        let target = tree("/t", vec![file("/t", "y.png", "Y")]);

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/x.png"), false)]);
        assert_eq!(removals(&plan), vec![PathBuf::from("/t/y.png")]);
    }

    #[test]
    fn test_mirror_replaces_stale_occupant() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "new")]);
        let target = tree("/t", vec![file("/t", "a.png", "old")]);

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/a.png"), true)]);
        assert!(removals(&plan).is_empty());
    }

    #[test]
    fn test_mirror_withholds_removals_when_source_incomplete() {
        let filter = PathFilter::default();
        let issue = ScanIssue {
            path: PathBuf::from("/s/locked.png"),
            reason: "permission denied".to_string(),
        };
        let source = tree_with_issues("/s", vec![file("/s", "x.png", "X")], vec![issue]);
        let target = tree("/t", vec![dir("/t", "old"), file("/t", "old/y.png", "Y")]);

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        assert!(removals(&plan).is_empty());
        assert_eq!(plan.summary().dirs_to_remove, 0);
        assert_eq!(copies(&plan).len(), 1);
    }

    #[test]
    fn test_mirror_removes_stale_dirs_deepest_first_but_keeps_pinned() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "x.png", "X")]);
        let target = tree(
            "/t",
            vec![
                dir("/t", "gone"),
                dir("/t", "gone/deeper"),
                file("/t", "gone/deeper/y.png", "Y"),
                dir("/t", "moved"),
                file("/t", "moved/x.png", "X"),
            ],
        );

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        let dirs: Vec<_> = plan
            .operations()
            .iter()
            .filter_map(|op| match op {
                Operation::RemoveDir { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(dirs, vec![PathBuf::from("/t/gone/deeper"), PathBuf::from("/t/gone")]);
        // x.png is present elsewhere, so it is neither copied nor removed.
        assert!(copies(&plan).is_empty());
        assert_eq!(removals(&plan), vec![PathBuf::from("/t/gone/deeper/y.png")]);
    }

    #[test]
    fn test_mirror_displaces_stale_file_on_directory_path() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![dir("/s", "d"), file("/s", "d/a.txt", "A")]);
        let target = tree("/t", vec![file("/t", "d", "old")]);

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        let ops = plan.operations();
        assert_eq!(
            ops[0],
            Operation::Remove {
                path: PathBuf::from("/t/d"),
                reason: RemoveReason::Displaced,
                guard: None,
            }
        );
        assert_eq!(
            ops[1],
            Operation::CreateDir {
                path: PathBuf::from("/t/d")
            }
        );
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/d/a.txt"), false)]);
        assert_eq!(removals(&plan), vec![PathBuf::from("/t/d")]);
        assert_eq!(plan.summary().conflicts, 0);
    }

    #[test]
    fn test_push_withholds_files_under_occupied_directory_path() {
        let filter = PathFilter::default();
        let source = tree(
            "/s",
            vec![
                dir("/s", "d"),
                dir("/s", "d/e"),
                file("/s", "d/a.txt", "A"),
                file("/s", "d/e/b.txt", "B"),
            ],
        );
        let target = tree("/t", vec![file("/t", "d", "old")]);

        for mode in [SyncMode::Push, SyncMode::PushAndRemove] {
            let plan = planner(mode, &filter).plan(&source, &target);
            assert!(copies(&plan).is_empty());
            assert!(removals(&plan).is_empty());
            assert_eq!(plan.summary().dirs_to_create, 0);
            assert_eq!(plan.summary().conflicts, 3);
        }
    }

    #[test]
    fn test_push_duplicates_uses_first_free_suffix() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "new")]);
        let target = tree(
            "/t",
            vec![file("/t", "a.png", "old"), file("/t", "a (1).png", "older")],
        );

        let plan = planner(SyncMode::PushDuplicates, &filter).plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/a (2).png"), false)]);
    }

    #[test]
    fn test_push_duplicates_is_idempotent_on_suffixed_copy() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "new")]);
        let target = tree(
            "/t",
            vec![file("/t", "a.png", "old"), file("/t", "a (1).png", "new")],
        );

        let plan = planner(SyncMode::PushDuplicates, &filter).plan(&source, &target);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_push_duplicates_copies_even_if_present_elsewhere() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![file("/s", "a.png", "A")]);
        let target = tree("/t", vec![file("/t", "other.png", "A")]);

        let plan = planner(SyncMode::PushDuplicates, &filter).plan(&source, &target);
        assert_eq!(copies(&plan), vec![(PathBuf::from("/t/a.png"), false)]);
    }

    #[test]
    fn test_dirs_only_scope_ignores_files() {
        let filter = PathFilter::default();
        let source = tree("/s", vec![dir("/s", "d"), file("/s", "d/a.png", "A")]);
        let target = tree("/t", vec![]);

        let planner = SyncPlanner::new(SyncMode::Push, FileScope::DirsOnly, false, &filter);
        let plan = planner.plan(&source, &target);
        assert!(copies(&plan).is_empty());
        assert_eq!(plan.summary().dirs_to_create, 1);
    }

    #[test]
    fn test_symlinks_are_skipped() {
        let filter = PathFilter::default();
        let mut link = file("/s", "link.png", "");
        link.kind = RecordKind::Symlink;
        link.identity = None;
        let source = tree("/s", vec![link]);
        let target = tree("/t", vec![]);

        let plan = planner(SyncMode::Mirror, &filter).plan(&source, &target);
        assert!(plan.is_noop());
        assert_eq!(plan.summary().skips, 1);
    }
}
