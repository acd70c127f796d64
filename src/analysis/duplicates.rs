use crate::error::Result;
use crate::hasher::Identity;
use crate::plan::{Operation, Plan, RemovalGuard, RemoveReason};
use crate::snapshot::{FileRecord, TreeSnapshot};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

lazy_static::lazy_static! {
    /// Names like `photo (1).png` or `notes (12)`.
    static ref INDEX_SUFFIX: Regex = Regex::new(r"\s\(\d+\)(\.[A-Za-z0-9]{1,5})?$").unwrap();
    static ref NORMAL_FILE_CHARS: Regex = Regex::new(r"^[\w\-. ]+$").unwrap();
    static ref STARTS_WITH_ALPHA: Regex = Regex::new(r"^[A-Za-z]").unwrap();
}

/// Picks one survivor per duplicate group and schedules the rest for removal.
///
/// Survivor selection, applied in order until a single candidate remains:
/// 1. members under a preferred-delete directory are dropped, unless every
///    member is under one;
/// 2. candidates are ordered by creation time (modified time when the platform
///    has none), then by path;
/// 3. with `select_for_folder_depth`, only the deepest candidates are kept;
/// 4. the first candidate whose name has no ` (N)` index, uses only ordinary
///    filename characters and starts with a letter wins, otherwise the first
///    candidate meeting the most of those conditions.
#[derive(Debug, Clone, Default)]
pub struct DuplicateResolver {
    pub preferred_delete_dirs: Vec<PathBuf>,
    pub select_for_folder_depth: bool,
    /// Only files within the same directory count as duplicates of each other.
    pub match_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    identity: Identity,
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGroup {
    pub identity: Identity,
    pub size: u64,
    pub survivor: PathBuf,
    pub removals: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateResolutionPlan {
    pub plan: Plan,
    pub groups: Vec<ResolvedGroup>,
}

impl DuplicateResolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn removal_count(&self) -> usize {
        self.groups.iter().map(|g| g.removals.len()).sum()
    }

    /// Bytes freed if every removal succeeds.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.groups
            .iter()
            .map(|g| g.size * g.removals.len() as u64)
            .sum()
    }

    /// One row per removed file: `survivor,removed,identity`.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["survivor", "removed", "identity"])?;
        for group in &self.groups {
            let survivor = group.survivor.to_string_lossy();
            let identity = group.identity.to_string();
            for removed in &group.removals {
                writer.write_record([
                    survivor.as_ref(),
                    removed.to_string_lossy().as_ref(),
                    identity.as_str(),
                ])?;
            }
        }
        writer.flush()?;
        info!("Duplicate report written to {}", path.display());
        Ok(())
    }
}

impl DuplicateResolver {
    pub fn resolve(&self, snapshots: &[TreeSnapshot]) -> DuplicateResolutionPlan {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut groups: BTreeMap<GroupKey, Vec<&FileRecord>> = BTreeMap::new();

        for snapshot in snapshots {
            // Name identities cannot prove two files hold the same bytes.
            if !snapshot.hash_mode.is_content_exact() {
                warn!(
                    "Skipping '{}': {} identities cannot identify duplicates",
                    snapshot.root.display(),
                    snapshot.hash_mode
                );
                continue;
            }
            for record in snapshot.files() {
                let Some(identity) = &record.identity else {
                    continue;
                };
                // Overlapping roots must not turn one file into its own duplicate.
                if !seen.insert(record.absolute_path.as_path()) {
                    continue;
                }
                let dir = if self.match_dir {
                    record.absolute_path.parent().map(Path::to_path_buf)
                } else {
                    None
                };
                groups
                    .entry(GroupKey {
                        identity: identity.clone(),
                        dir,
                    })
                    .or_default()
                    .push(record);
            }
        }

        let mut ops = Vec::new();
        let mut resolved = Vec::new();
        for (key, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let survivor = self.select_survivor(&members);
            let removals: Vec<PathBuf> = members
                .iter()
                .filter(|m| m.absolute_path != survivor.absolute_path)
                .map(|m| m.absolute_path.clone())
                .collect();
            debug!(
                "Keeping {} over {} duplicate(s)",
                survivor.absolute_path.display(),
                removals.len()
            );
            for path in &removals {
                ops.push(Operation::Remove {
                    path: path.clone(),
                    reason: RemoveReason::Duplicate,
                    guard: Some(RemovalGuard {
                        keeper: survivor.absolute_path.clone(),
                        identity: key.identity.clone(),
                        size: survivor.size,
                    }),
                });
            }
            resolved.push(ResolvedGroup {
                identity: key.identity,
                size: survivor.size,
                survivor: survivor.absolute_path.clone(),
                removals,
            });
        }

        if resolved.is_empty() {
            info!("No duplicates found");
        } else {
            warn!(
                "Found {} duplicate group(s), {} file(s) to remove",
                resolved.len(),
                ops.len()
            );
        }
        DuplicateResolutionPlan {
            plan: Plan::new(ops),
            groups: resolved,
        }
    }

    fn is_preferred_delete(&self, path: &Path) -> bool {
        self.preferred_delete_dirs.iter().any(|dir| path.starts_with(dir))
    }

    fn select_survivor<'r>(&self, members: &[&'r FileRecord]) -> &'r FileRecord {
        let mut candidates: Vec<&FileRecord> = members
            .iter()
            .copied()
            .filter(|m| !self.is_preferred_delete(&m.absolute_path))
            .collect();
        if candidates.len() == 1 {
            return candidates[0];
        }
        if candidates.is_empty() {
            candidates = members.to_vec();
        }

        candidates.sort_by(|a, b| {
            a.birth_time()
                .cmp(&b.birth_time())
                .then_with(|| a.absolute_path.cmp(&b.absolute_path))
        });

        if self.select_for_folder_depth {
            let deepest = candidates
                .iter()
                .map(|c| c.absolute_path.components().count())
                .max()
                .unwrap_or(0);
            candidates.retain(|c| c.absolute_path.components().count() == deepest);
            if candidates.len() == 1 {
                return candidates[0];
            }
        }

        let mut best = candidates[0];
        let mut best_score = 0;
        for candidate in &candidates {
            let score = name_score(&candidate.absolute_path);
            if score == 3 {
                return candidate;
            }
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        best
    }
}

/// Number of "looks like an original" traits the file name has, 0 to 3.
fn name_score(path: &Path) -> u8 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    [
        !INDEX_SUFFIX.is_match(&name),
        NORMAL_FILE_CHARS.is_match(&name),
        STARTS_WITH_ALPHA.is_match(&name),
    ]
    .iter()
    .filter(|t| **t)
    .count() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashMode;
    use crate::snapshot::RecordKind;
    use chrono::{TimeZone, Utc};

    fn record(root: &str, rel: &str, content: &str, created_secs: i64) -> FileRecord {
        FileRecord {
            relative_path: PathBuf::from(rel),
            absolute_path: Path::new(root).join(rel),
            kind: RecordKind::File,
            size: content.len() as u64,
            modified: None,
            created: Utc.timestamp_opt(created_secs, 0).single(),
            identity: Some(Identity::Digest(content.to_string())),
        }
    }

    fn snapshot(root: &str, records: Vec<FileRecord>) -> TreeSnapshot {
        let records = records
            .into_iter()
            .map(|r| (r.relative_path.clone(), r))
            .collect();
        TreeSnapshot::new(PathBuf::from(root), HashMode::Content, records, Vec::new())
    }

    fn survivors(plan: &DuplicateResolutionPlan) -> Vec<PathBuf> {
        plan.groups.iter().map(|g| g.survivor.clone()).collect()
    }

    #[test]
    fn test_name_score() {
        assert_eq!(name_score(Path::new("/d/photo.png")), 3);
        assert_eq!(name_score(Path::new("/d/photo (1).png")), 1);
        assert_eq!(name_score(Path::new("/d/1photo.png")), 2);
        assert_eq!(name_score(Path::new("/d/_x#y (2).png")), 0);
    }

    #[test]
    fn test_group_of_n_removes_n_minus_one() {
        let snap = snapshot(
            "/d",
            vec![
                record("/d", "a.png", "H", 3),
                record("/d", "b.png", "H", 2),
                record("/d", "c.png", "H", 1),
                record("/d", "unique.png", "U", 1),
            ],
        );
        let plan = DuplicateResolver::default().resolve(&[snap]);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.removal_count(), 2);
        assert_eq!(plan.plan.len(), 2);
        // Oldest clean name wins.
        assert_eq!(survivors(&plan), vec![PathBuf::from("/d/c.png")]);
    }

    #[test]
    fn test_indexed_copy_loses_even_when_older() {
        let snap = snapshot(
            "/d",
            vec![record("/d", "img (1).png", "H", 1), record("/d", "img.png", "H", 5)],
        );
        let plan = DuplicateResolver::default().resolve(&[snap]);
        assert_eq!(survivors(&plan), vec![PathBuf::from("/d/img.png")]);
    }

    #[test]
    fn test_preferred_delete_dirs_lose() {
        let snap = snapshot(
            "/d",
            vec![
                record("/d", "inbox/a.png", "H", 1),
                record("/d", "sorted/a.png", "H", 9),
            ],
        );
        let resolver = DuplicateResolver {
            preferred_delete_dirs: vec![PathBuf::from("/d/inbox")],
            ..Default::default()
        };
        let plan = resolver.resolve(&[snap]);
        assert_eq!(survivors(&plan), vec![PathBuf::from("/d/sorted/a.png")]);
        assert_eq!(plan.groups[0].removals, vec![PathBuf::from("/d/inbox/a.png")]);
    }

    #[test]
    fn test_all_preferred_delete_still_keeps_one() {
        let snap = snapshot(
            "/d",
            vec![record("/d", "inbox/a.png", "H", 2), record("/d", "inbox/b.png", "H", 1)],
        );
        let resolver = DuplicateResolver {
            preferred_delete_dirs: vec![PathBuf::from("/d/inbox")],
            ..Default::default()
        };
        let plan = resolver.resolve(&[snap]);
        assert_eq!(plan.removal_count(), 1);
        assert_eq!(survivors(&plan), vec![PathBuf::from("/d/inbox/b.png")]);
    }

    #[test]
    fn test_select_for_folder_depth_keeps_deepest() {
        let snap = snapshot(
            "/d",
            vec![record("/d", "a.png", "H", 1), record("/d", "x/y/a.png", "H", 2)],
        );
        let resolver = DuplicateResolver {
            select_for_folder_depth: true,
            ..Default::default()
        };
        let plan = resolver.resolve(&[snap]);
        assert_eq!(survivors(&plan), vec![PathBuf::from("/d/x/y/a.png")]);
    }

    #[test]
    fn test_match_dir_only_groups_within_a_directory() {
        let snap = snapshot(
            "/d",
            vec![
                record("/d", "one/a.png", "H", 1),
                record("/d", "two/a.png", "H", 1),
                record("/d", "two/b.png", "H", 2),
            ],
        );
        let resolver = DuplicateResolver {
            match_dir: true,
            ..Default::default()
        };
        let plan = resolver.resolve(&[snap]);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].removals, vec![PathBuf::from("/d/two/b.png")]);
    }

    #[test]
    fn test_overlapping_roots_do_not_duplicate_a_file() {
        let outer = snapshot("/d", vec![record("/d", "sub/a.png", "H", 1)]);
        let inner = snapshot("/d/sub", vec![record("/d/sub", "a.png", "H", 1)]);
        let plan = DuplicateResolver::default().resolve(&[outer, inner]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let build = || {
            snapshot(
                "/d",
                vec![record("/d", "img1.png", "H", 7), record("/d", "img2.png", "H", 7)],
            )
        };
        let first = DuplicateResolver::default().resolve(&[build()]);
        let second = DuplicateResolver::default().resolve(&[build()]);
        assert_eq!(survivors(&first), vec![PathBuf::from("/d/img1.png")]);
        assert_eq!(survivors(&first), survivors(&second));
    }
}
