use crate::error::{Error, Result};
use crate::filter::PathFilter;
use crate::hasher::HashMode;
use crate::scanner::FileScope;
use crate::sync::SyncMode;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const USER_HOME: &str = "{{USER_HOME}}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Worker threads for hashing and copying. Defaults to the rayon pool.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub use_trash: bool,
    /// Named extension sets, e.g. `visual_media = [".png", ".jpg"]`.
    #[serde(default)]
    pub file_types: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub backup_mappings: Vec<BackupMapping>,
    #[serde(default)]
    pub duplicate_removers: Vec<DuplicateRemoverConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMapping {
    pub name: String,
    pub source_dir: String,
    pub target_dir: String,
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub file_mode: FileScope,
    #[serde(default)]
    pub hash_mode: HashMode,
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Set names from [`AppConfig::file_types`] or literal extensions.
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub exclude_removal_dirs: Vec<String>,
    #[serde(default = "default_true")]
    pub will_run: bool,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub warn_duplicates: bool,
    #[serde(default)]
    pub skip_confirm: bool,
    #[serde(default)]
    pub test: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRemoverConfig {
    pub name: String,
    pub source_dirs: Vec<String>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub select_for_folder_depth: bool,
    #[serde(default)]
    pub match_dir: bool,
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub preferred_delete_dirs: Vec<String>,
    #[serde(default)]
    pub hash_mode: HashMode,
    #[serde(default = "default_true")]
    pub will_run: bool,
    #[serde(default)]
    pub skip_confirm: bool,
    #[serde(default)]
    pub test: bool,
}

/// Loads `Config.toml` (or `path`) overlaid by `REFACDIR_*` environment variables.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig> {
    let file_source = match path {
        Some(p) => ConfigFile::from(p).required(true),
        None => ConfigFile::with_name("Config").required(false),
    };
    let builder = Config::builder()
        .add_source(file_source)
        .add_source(Environment::with_prefix("REFACDIR").separator("__"))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<AppConfig> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Report(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for mapping in &self.backup_mappings {
            let source = expand_home(&mapping.source_dir);
            let target = expand_home(&mapping.target_dir);
            if source.starts_with(&target) || target.starts_with(&source) {
                return Err(Error::InvalidConfig(format!(
                    "backup mapping '{}': source '{}' and target '{}' overlap",
                    mapping.name,
                    source.display(),
                    target.display()
                )));
            }
            for entry in &mapping.file_types {
                if !self.file_types.contains_key(entry) && !looks_like_extension(entry) {
                    return Err(Error::InvalidConfig(format!(
                        "backup mapping '{}': unknown file type set '{}'",
                        mapping.name, entry
                    )));
                }
            }
        }
        for remover in &self.duplicate_removers {
            if remover.source_dirs.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "duplicate remover '{}' has no source dirs",
                    remover.name
                )));
            }
            if !remover.hash_mode.is_content_exact() {
                return Err(Error::InvalidConfig(format!(
                    "duplicate remover '{}': hash_mode {} cannot prove files are duplicates, use CONTENT",
                    remover.name, remover.hash_mode
                )));
            }
        }
        Ok(())
    }

    /// Expands set names into their extensions; literal extensions pass through.
    pub fn resolve_file_types(&self, entries: &[String]) -> Vec<String> {
        entries
            .iter()
            .flat_map(|entry| match self.file_types.get(entry) {
                Some(set) => set.clone(),
                None => vec![entry.clone()],
            })
            .collect()
    }
}

impl BackupMapping {
    pub fn source_root(&self) -> PathBuf {
        expand_home(&self.source_dir)
    }

    pub fn target_root(&self) -> PathBuf {
        expand_home(&self.target_dir)
    }

    pub fn path_filter(&self, app: &AppConfig) -> PathFilter {
        let exclude: Vec<String> = self.exclude_dirs.iter().map(|d| expand_home_str(d)).collect();
        let removal: Vec<String> = self
            .exclude_removal_dirs
            .iter()
            .map(|d| expand_home_str(d))
            .collect();
        PathFilter::new(&exclude, &removal, &app.resolve_file_types(&self.file_types))
    }
}

impl DuplicateRemoverConfig {
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let dirs: Vec<String> = self
            .source_dirs
            .iter()
            .map(|d| expand_home_str(d))
            .collect();
        non_overlapping_directories(dirs)
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    pub fn path_filter(&self) -> PathFilter {
        let exclude: Vec<String> = self
            .exclude_dirs
            .iter()
            .map(|d| self.resolve_dir(d).to_string_lossy().into_owned())
            .collect();
        PathFilter::new(&exclude, &[] as &[String], &[] as &[String])
    }

    pub fn preferred_delete_roots(&self) -> Vec<PathBuf> {
        self.preferred_delete_dirs
            .iter()
            .map(|d| self.resolve_dir(d))
            .collect()
    }

    /// Absolute entries are used as-is; relative ones resolve against the
    /// first source dir holding a directory of that name.
    fn resolve_dir(&self, dir: &str) -> PathBuf {
        let expanded = expand_home(dir);
        if expanded.is_absolute() {
            return expanded;
        }
        let roots = self.source_roots();
        roots
            .iter()
            .map(|root| root.join(&expanded))
            .find(|candidate| candidate.is_dir())
            .or_else(|| roots.first().map(|root| root.join(&expanded)))
            .unwrap_or(expanded)
    }
}

fn expand_home_str(dir: &str) -> String {
    if !dir.contains(USER_HOME) {
        return dir.to_string();
    }
    match dirs::home_dir() {
        Some(home) => dir.replace(USER_HOME, &home.to_string_lossy()),
        None => dir.to_string(),
    }
}

/// Replaces `{{USER_HOME}}` with the current user's home directory.
pub fn expand_home(dir: &str) -> PathBuf {
    PathBuf::from(expand_home_str(dir))
}

fn looks_like_extension(entry: &str) -> bool {
    entry.starts_with('.')
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
workers = 4

[file_types]
visual_media = [".png", ".jpg"]

[[backup_mappings]]
name = "photos"
source_dir = "/data/photos"
target_dir = "/backup/photos"
mode = "MIRROR"
file_types = ["visual_media", ".heic"]
exclude_removal_dirs = ["keep"]

[[backup_mappings]]
name = "inbox"
source_dir = "/data/inbox"
target_dir = "/backup/inbox"
mode = "PUSH_AND_REMOVE"
hash_mode = "SHA256"
will_run = false

[[duplicate_removers]]
name = "photos"
source_dirs = ["/data/photos", "/data/photos/2024", "/data/other"]
preferred_delete_dirs = ["/data/photos/inbox"]
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.workers, Some(4));
        let photos = &config.backup_mappings[0];
        assert_eq!(photos.mode, SyncMode::Mirror);
        assert_eq!(photos.file_mode, FileScope::FilesAndDirs);
        assert_eq!(photos.hash_mode, HashMode::Content);
        assert!(photos.recursive);
        assert!(photos.will_run);
        assert!(!photos.overwrite);

        let inbox = &config.backup_mappings[1];
        assert_eq!(inbox.mode, SyncMode::PushAndRemove);
        assert_eq!(inbox.hash_mode, HashMode::Content);
        assert!(!inbox.will_run);
    }

    #[test]
    fn test_file_type_sets_expand() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let types = config.resolve_file_types(&config.backup_mappings[0].file_types);
        assert_eq!(types, vec![".png", ".jpg", ".heic"]);
    }

    #[test]
    fn test_overlapping_mapping_is_rejected() {
        let text = r#"
[[backup_mappings]]
name = "nested"
source_dir = "/data"
target_dir = "/data/backup"
"#;
        let err = AppConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_file_type_set_is_rejected() {
        let text = r#"
[[backup_mappings]]
name = "docs"
source_dir = "/a"
target_dir = "/b"
file_types = ["office_docs"]
"#;
        assert!(AppConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_remover_without_sources_is_rejected() {
        let text = r#"
[[duplicate_removers]]
name = "empty"
source_dirs = []
"#;
        assert!(AppConfig::from_toml(text).is_err());
    }

    #[test]
    fn test_remover_with_name_hash_mode_is_rejected() {
        for mode in ["FILENAME", "FILENAME_AND_PARENT"] {
            let text = format!(
                r#"
[[duplicate_removers]]
name = "by-name"
source_dirs = ["/data"]
hash_mode = "{}"
"#,
                mode
            );
            let err = AppConfig::from_toml(&text).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_remover_roots_drop_nested_dirs() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let roots = config.duplicate_removers[0].source_roots();
        assert_eq!(
            roots,
            vec![PathBuf::from("/data/photos"), PathBuf::from("/data/other")]
        );
    }

    #[test]
    fn test_user_home_is_expanded() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home("{{USER_HOME}}/Pictures"), home.join("Pictures"));
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_print_round_trip() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let text = config.to_toml().unwrap();
        let again = AppConfig::from_toml(&text).unwrap();
        assert_eq!(again.backup_mappings.len(), 2);
        assert_eq!(again.backup_mappings[1].mode, SyncMode::PushAndRemove);
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            "/home/user/docs".to_string(),
            "/home/user".to_string(),
            "/var/data".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result, vec!["/home/user".to_string(), "/var/data".to_string()]);
    }
}
