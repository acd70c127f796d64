use glob::Pattern;
use std::collections::HashSet;
use std::path::Path;
use tracing::error;

/// Inclusion rules for one mapping or duplicate remover.
///
/// Directory rules come in three shapes:
/// - absolute paths (`/data/photos/raw`) match that directory and everything below it,
/// - relative paths with several segments (`photos/raw`) match the same prefix of the
///   path relative to the scanned root,
/// - single names (`.git`) match any ancestor segment.
///
/// Entries containing glob metacharacters are compiled with `glob` and matched
/// against the full normalized path. All matching is case-insensitive and
/// treats `\` and `/` alike.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    exclude_dirs: Vec<DirRule>,
    exclude_removal_dirs: Vec<DirRule>,
    file_types: Option<HashSet<String>>,
}

#[derive(Debug, Clone)]
enum DirRule {
    Absolute(String),
    Relative(String),
    Segment(String),
    Glob(Pattern),
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(exclude_dirs: &[S], exclude_removal_dirs: &[S], file_types: &[S]) -> Self {
        let file_types: HashSet<String> = file_types
            .iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        Self {
            exclude_dirs: compile_rules(exclude_dirs),
            exclude_removal_dirs: compile_rules(exclude_removal_dirs),
            file_types: if file_types.is_empty() {
                None
            } else {
                Some(file_types)
            },
        }
    }

    /// True if the entry lies under an excluded directory.
    pub fn is_excluded(&self, absolute: &Path, relative: &Path) -> bool {
        matches_any(&self.exclude_dirs, absolute, relative)
    }

    /// True if the entry must never be removed: it is excluded outright or
    /// sits under a removal-protected directory.
    pub fn is_removal_excluded(&self, absolute: &Path, relative: &Path) -> bool {
        self.is_excluded(absolute, relative)
            || matches_any(&self.exclude_removal_dirs, absolute, relative)
    }

    /// True if the file name ends with an allowed suffix (so `.tar.gz`
    /// works) or its extension is allowed. Everything is allowed when no
    /// file types are configured.
    pub fn allows_file_type(&self, path: &Path) -> bool {
        let Some(types) = &self.file_types else {
            return true;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if types.iter().any(|suffix| name.ends_with(suffix.as_str())) {
            return true;
        }
        path.extension()
            .map(|ext| types.contains(&normalize_extension(&ext.to_string_lossy())))
            .unwrap_or(false)
    }

    /// Full decision for a regular file.
    pub fn includes_file(&self, absolute: &Path, relative: &Path) -> bool {
        !self.is_excluded(absolute, relative) && self.allows_file_type(absolute)
    }
}

fn compile_rules<S: AsRef<str>>(entries: &[S]) -> Vec<DirRule> {
    entries
        .iter()
        .filter_map(|entry| {
            let raw = entry.as_ref();
            let normalized = normalize(raw);
            if normalized.is_empty() {
                return None;
            }
            if raw.contains(['*', '?', '[']) {
                return match Pattern::new(&normalized) {
                    Ok(p) => Some(DirRule::Glob(p)),
                    Err(e) => {
                        error!("Invalid glob pattern '{}': {}", raw, e);
                        None
                    }
                };
            }
            if is_absolute_like(&normalized) {
                Some(DirRule::Absolute(normalized))
            } else if normalized.contains('/') {
                Some(DirRule::Relative(normalized))
            } else {
                Some(DirRule::Segment(normalized))
            }
        })
        .collect()
}

fn matches_any(rules: &[DirRule], absolute: &Path, relative: &Path) -> bool {
    if rules.is_empty() {
        return false;
    }
    let abs = normalize(&absolute.to_string_lossy());
    let rel = normalize(&relative.to_string_lossy());
    rules.iter().any(|rule| match rule {
        DirRule::Absolute(dir) => is_under(&abs, dir),
        DirRule::Relative(dir) => is_under(&rel, dir),
        DirRule::Segment(name) => rel.split('/').any(|seg| seg == name),
        DirRule::Glob(pattern) => pattern.matches(&abs) || pattern.matches(&rel),
    })
}

fn is_under(path: &str, dir: &str) -> bool {
    path == dir
        || (path.len() > dir.len()
            && path.starts_with(dir)
            && (dir.ends_with('/') || path.as_bytes()[dir.len()] == b'/'))
}

fn is_absolute_like(path: &str) -> bool {
    path.starts_with('/') || path.as_bytes().get(1) == Some(&b':')
}

fn normalize(path: &str) -> String {
    let mut s = path.replace('\\', "/").to_lowercase();
    while s.len() > 1 && s.ends_with('/') && !s.ends_with(":/") {
        s.pop();
    }
    if let Some(stripped) = s.strip_prefix("./") {
        s = stripped.to_string();
    }
    s
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(exclude: &[&str], removal: &[&str], types: &[&str]) -> PathFilter {
        PathFilter::new(exclude, removal, types)
    }

    #[test]
    fn test_no_rules_includes_everything() {
        let f = PathFilter::default();
        assert!(f.includes_file(Path::new("/src/a/b.txt"), Path::new("a/b.txt")));
        assert!(!f.is_removal_excluded(Path::new("/src/a/b.txt"), Path::new("a/b.txt")));
    }

    #[test]
    fn test_absolute_exclude_matches_on_segment_boundary() {
        let f = filter(&["/src/raw"], &[], &[]);
        assert!(f.is_excluded(Path::new("/src/raw"), Path::new("raw")));
        assert!(f.is_excluded(Path::new("/src/raw/x.png"), Path::new("raw/x.png")));
        assert!(!f.is_excluded(Path::new("/src/rawness/x.png"), Path::new("rawness/x.png")));
    }

    #[test]
    fn test_exclude_is_case_and_separator_normalized() {
        let f = filter(&["C:\\Users\\Me\\Img\\Tmp\\"], &[], &[]);
        assert!(f.is_excluded(Path::new("c:/users/me/img/tmp/a.png"), Path::new("tmp/a.png")));
    }

    #[test]
    fn test_segment_rule_matches_any_ancestor() {
        let f = filter(&[".git"], &[], &[]);
        assert!(f.is_excluded(Path::new("/r/proj/.git/HEAD"), Path::new("proj/.git/HEAD")));
        assert!(!f.is_excluded(Path::new("/r/proj/.github/x"), Path::new("proj/.github/x")));
    }

    #[test]
    fn test_relative_rule_is_anchored_at_root() {
        let f = filter(&["photos/raw"], &[], &[]);
        assert!(f.is_excluded(Path::new("/r/photos/raw/1.png"), Path::new("photos/raw/1.png")));
        assert!(!f.is_excluded(
            Path::new("/r/old/photos/raw/1.png"),
            Path::new("old/photos/raw/1.png")
        ));
    }

    #[test]
    fn test_glob_rule() {
        let f = filter(&["*/cache*"], &[], &[]);
        assert!(f.is_excluded(Path::new("/r/a/cache01"), Path::new("a/cache01")));
    }

    #[test]
    fn test_removal_exclusion_is_a_superset_of_exclusion() {
        let f = filter(&["/src/skip"], &["/src/keep"], &[]);
        assert!(f.is_removal_excluded(Path::new("/src/keep/a.png"), Path::new("keep/a.png")));
        assert!(f.is_removal_excluded(Path::new("/src/skip/a.png"), Path::new("skip/a.png")));
        assert!(!f.is_excluded(Path::new("/src/keep/a.png"), Path::new("keep/a.png")));
    }

    #[test]
    fn test_file_type_allow_list() {
        let f = filter(&[], &[], &[".PNG", "jpg"]);
        assert!(f.allows_file_type(Path::new("/x/a.png")));
        assert!(f.allows_file_type(Path::new("/x/b.JPG")));
        assert!(!f.allows_file_type(Path::new("/x/c.txt")));
        assert!(!f.allows_file_type(Path::new("/x/noext")));
    }

    #[test]
    fn test_file_type_multi_part_suffix() {
        let f = filter(&[], &[], &[".tar.gz"]);
        assert!(f.allows_file_type(Path::new("/x/x.tar.gz")));
        assert!(f.allows_file_type(Path::new("/x/Backup.TAR.GZ")));
        assert!(!f.allows_file_type(Path::new("/x/x.gz")));
        assert!(!f.allows_file_type(Path::new("/x/x.tar")));
    }
}
