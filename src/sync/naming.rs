use std::path::{Path, PathBuf};

/// Upper bound on `name (N).ext` candidates tried for one file.
pub const MAX_DUPLICATE_SUFFIX: usize = 9999;

/// `photos/a.png` -> `photos/a (2).png` for `n == 2`.
pub fn suffixed_sibling(relative: &Path, n: usize) -> PathBuf {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match relative.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    relative.with_file_name(name)
}
