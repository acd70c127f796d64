use crate::hasher::Identity;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a candidate was left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The destination already holds this identity.
    AlreadyPresent,
    /// The identity exists elsewhere in the target.
    PresentElsewhere(PathBuf),
    Symlink,
    /// Removal withheld because the path is protected.
    RemovalProtected,
    /// Removal withheld because the source snapshot is incomplete.
    SourceIncomplete,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyPresent => write!(f, "already present"),
            SkipReason::PresentElsewhere(p) => write!(f, "already present at {}", p.display()),
            SkipReason::Symlink => write!(f, "symbolic link"),
            SkipReason::RemovalProtected => write!(f, "removal protected"),
            SkipReason::SourceIncomplete => write!(f, "source scan incomplete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveReason {
    /// Source original whose copy is verified at the destination.
    BackedUp,
    /// Target file whose identity no longer exists in the source.
    Stale,
    /// Redundant member of a duplicate group.
    Duplicate,
    /// Stale target file standing where the source has a directory.
    Displaced,
}

/// Precondition for a removal: `keeper` must still hold `identity` (and
/// `size`) when the removal runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalGuard {
    pub keeper: PathBuf,
    pub identity: Identity,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateDir {
        path: PathBuf,
    },
    Copy {
        src: PathBuf,
        dst: PathBuf,
        identity: Identity,
        size: u64,
        /// The destination holds other content that this copy replaces.
        replace: bool,
    },
    Remove {
        path: PathBuf,
        reason: RemoveReason,
        guard: Option<RemovalGuard>,
    },
    RemoveDir {
        path: PathBuf,
    },
    Skip {
        path: PathBuf,
        reason: SkipReason,
    },
    Conflict {
        path: PathBuf,
        reason: String,
    },
}

impl Operation {
    pub fn path(&self) -> &Path {
        match self {
            Operation::CreateDir { path }
            | Operation::Remove { path, .. }
            | Operation::RemoveDir { path }
            | Operation::Skip { path, .. }
            | Operation::Conflict { path, .. } => path,
            Operation::Copy { dst, .. } => dst,
        }
    }

    /// Changes the file system when executed.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Skip { .. } | Operation::Conflict { .. })
    }

    /// Can lose data when executed, and therefore sits behind the
    /// confirmation gate.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Operation::Copy { replace: true, .. }
                | Operation::Remove { .. }
                | Operation::RemoveDir { .. }
        )
    }

    /// True for a removal that clears the way for a directory.
    pub fn is_displacement(&self) -> bool {
        matches!(
            self,
            Operation::Remove {
                reason: RemoveReason::Displaced,
                ..
            }
        )
    }

    fn rank(&self) -> u8 {
        match self {
            op if op.is_displacement() => 0,
            Operation::CreateDir { .. } => 1,
            Operation::Copy { .. } => 2,
            Operation::Conflict { .. } => 3,
            Operation::Skip { .. } => 4,
            Operation::Remove { .. } => 5,
            Operation::RemoveDir { .. } => 6,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateDir { path } => write!(f, "mkdir    {}", path.display()),
            Operation::Copy {
                src, dst, replace, ..
            } => {
                let verb = if *replace { "replace " } else { "copy    " };
                write!(f, "{} {} -> {}", verb, src.display(), dst.display())
            }
            Operation::Remove { path, guard, .. } => match guard {
                Some(g) => write!(
                    f,
                    "remove   {} (kept at {})",
                    path.display(),
                    g.keeper.display()
                ),
                None => write!(f, "remove   {}", path.display()),
            },
            Operation::RemoveDir { path } => write!(f, "rmdir    {}", path.display()),
            Operation::Skip { path, reason } => {
                write!(f, "skip     {} ({})", path.display(), reason)
            }
            Operation::Conflict { path, reason } => {
                write!(f, "conflict {} ({})", path.display(), reason)
            }
        }
    }
}

/// Ordered, inspectable list of operations. Files displaced by a new
/// directory come first, then directory creation, copies, informational
/// entries, file removals, and finally directory removals deepest first.
/// Removals therefore always follow the copies they depend on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    operations: Vec<Operation>,
}

impl Plan {
    pub fn new(mut operations: Vec<Operation>) -> Self {
        operations.sort_by(|a, b| {
            a.rank().cmp(&b.rank()).then_with(|| match (a, b) {
                (Operation::CreateDir { path: pa }, Operation::CreateDir { path: pb }) => {
                    depth(pa).cmp(&depth(pb)).then_with(|| pa.cmp(pb))
                }
                (Operation::RemoveDir { path: pa }, Operation::RemoveDir { path: pb }) => {
                    depth(pb).cmp(&depth(pa)).then_with(|| pa.cmp(pb))
                }
                _ => a.path().cmp(b.path()),
            })
        });
        Self { operations }
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// True when executing the plan would not touch the file system.
    pub fn is_noop(&self) -> bool {
        !self.operations.iter().any(Operation::is_mutating)
    }

    pub fn has_destructive(&self) -> bool {
        self.operations.iter().any(Operation::is_destructive)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for op in &self.operations {
            match op {
                Operation::CreateDir { .. } => summary.dirs_to_create += 1,
                Operation::Copy { size, replace, .. } => {
                    summary.copies += 1;
                    summary.copy_bytes += size;
                    if *replace {
                        summary.replacements += 1;
                    }
                }
                Operation::Remove { .. } => summary.removals += 1,
                Operation::RemoveDir { .. } => summary.dirs_to_remove += 1,
                Operation::Skip { .. } => summary.skips += 1,
                Operation::Conflict { .. } => summary.conflicts += 1,
            }
        }
        summary
    }
}

fn depth(path: &Path) -> usize {
    path.components().count()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub dirs_to_create: usize,
    pub copies: usize,
    pub copy_bytes: u64,
    pub replacements: usize,
    pub removals: usize,
    pub dirs_to_remove: usize,
    pub skips: usize,
    pub conflicts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(src: &str, dst: &str) -> Operation {
        Operation::Copy {
            src: PathBuf::from(src),
            dst: PathBuf::from(dst),
            identity: Identity::Name(dst.to_string()),
            size: 1,
            replace: false,
        }
    }

    #[test]
    fn test_plan_orders_removals_after_copies() {
        let plan = Plan::new(vec![
            Operation::RemoveDir {
                path: PathBuf::from("/t/a"),
            },
            Operation::Remove {
                path: PathBuf::from("/s/x"),
                reason: RemoveReason::BackedUp,
                guard: None,
            },
            copy("/s/x", "/t/x"),
            Operation::RemoveDir {
                path: PathBuf::from("/t/a/b"),
            },
            Operation::CreateDir {
                path: PathBuf::from("/t/n/m"),
            },
            Operation::CreateDir {
                path: PathBuf::from("/t/n"),
            },
        ]);
        let paths: Vec<_> = plan.operations().iter().map(|o| o.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/t/n"),
                PathBuf::from("/t/n/m"),
                PathBuf::from("/t/x"),
                PathBuf::from("/s/x"),
                PathBuf::from("/t/a/b"),
                PathBuf::from("/t/a"),
            ]
        );
    }

    #[test]
    fn test_displacement_precedes_directory_creation() {
        let plan = Plan::new(vec![
            copy("/s/d/a", "/t/d/a"),
            Operation::CreateDir {
                path: PathBuf::from("/t/d"),
            },
            Operation::Remove {
                path: PathBuf::from("/t/d"),
                reason: RemoveReason::Displaced,
                guard: None,
            },
        ]);
        assert!(plan.operations()[0].is_displacement());
        assert!(matches!(plan.operations()[1], Operation::CreateDir { .. }));
        assert!(plan.has_destructive());
    }

    #[test]
    fn test_noop_ignores_skips_and_conflicts() {
        let plan = Plan::new(vec![
            Operation::Skip {
                path: PathBuf::from("/s/a"),
                reason: SkipReason::AlreadyPresent,
            },
            Operation::Conflict {
                path: PathBuf::from("/t/b"),
                reason: "exists".to_string(),
            },
        ]);
        assert!(plan.is_noop());
        assert!(!plan.has_destructive());
        assert_eq!(plan.summary().conflicts, 1);
    }
}
