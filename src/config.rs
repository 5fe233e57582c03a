use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TranslateError};
use crate::resolve::RenameRules;

/// Default configuration file name, looked up under the workspace root.
pub const CONFIG_FILE: &str = "translate.json";

/// Root configuration (`translate.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub file_types: FileTypes,
    #[serde(default)]
    pub paths: StoragePaths,
    #[serde(default)]
    pub translation: TranslationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Language code of the canonical tree, e.g. `en`.
    pub language: String,
    /// Root-relative folder holding the canonical tree.
    pub folder: String,
}

/// One target language tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub language: String,
    pub language_name: String,
    pub folder: String,
    #[serde(default)]
    pub rename_rules: RenameRules,
    #[serde(default)]
    pub translation_notes: Vec<String>,
}

/// Extensions whose files are extracted into tasks; everything else is copied as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypes {
    #[serde(default = "default_translatable")]
    pub translatable: Vec<String>,
}

impl Default for FileTypes {
    fn default() -> Self {
        Self {
            translatable: default_translatable(),
        }
    }
}

fn default_translatable() -> Vec<String> {
    vec![".svg".to_string(), ".md".to_string()]
}

/// Root-relative storage locations for tasks and the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoragePaths {
    #[serde(default = "default_tasks_path")]
    pub tasks: String,
    #[serde(default = "default_events_path")]
    pub events: String,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            tasks: default_tasks_path(),
            events: default_events_path(),
        }
    }
}

fn default_tasks_path() -> String {
    "tasks".to_string()
}

fn default_events_path() -> String {
    ".transync".to_string()
}

/// Hints forwarded to the translation capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationSettings {
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Fixed source-term -> target-term table sent with every request.
    #[serde(default)]
    pub terminology: BTreeMap<String, String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            terminology: BTreeMap::new(),
            model: None,
        }
    }
}

fn default_domain() -> String {
    "architectural drawings".to_string()
}

impl Config {
    /// Check the invariants the pipeline relies on.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.source.language.trim().is_empty() {
            return Err(TranslateError::config(path, "source.language is empty"));
        }
        if self.source.folder.trim().is_empty() {
            return Err(TranslateError::config(path, "source.folder is empty"));
        }
        if self.targets.is_empty() {
            return Err(TranslateError::config(path, "no targets configured"));
        }
        let source_folder = Path::new(&self.source.folder);
        for target in &self.targets {
            if target.language.trim().is_empty() || target.folder.trim().is_empty() {
                return Err(TranslateError::config(
                    path,
                    "every target needs a language and a folder",
                ));
            }
            let folder = Path::new(&target.folder);
            if folder.starts_with(source_folder) || source_folder.starts_with(folder) {
                return Err(TranslateError::config(
                    path,
                    format!(
                        "target folder '{}' overlaps source folder '{}'",
                        target.folder, self.source.folder
                    ),
                ));
            }
            for rule in target.rename_rules.iter() {
                if rule.from.is_empty() || rule.to.is_empty() {
                    return Err(TranslateError::config(
                        path,
                        format!("empty rename rule suffix for target '{}'", target.language),
                    ));
                }
            }
            for (a, b) in target.rename_rules.overlapping() {
                tracing::warn!(
                    event = "rename_rules_overlap",
                    target = %target.language,
                    first = %a.from,
                    second = %b.from,
                    "overlapping rename rules; first match in file order wins"
                );
            }
        }
        Ok(())
    }

    pub fn target(&self, language: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.language == language)
    }

    pub fn source_root(&self, root: &Path) -> PathBuf {
        root.join(&self.source.folder)
    }

    pub fn tasks_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.tasks)
    }

    pub fn events_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.events)
    }

    /// Whether a path's extension is listed as translatable.
    pub fn is_translatable(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.file_types
            .translatable
            .iter()
            .any(|ext| name.ends_with(ext.as_str()))
    }
}

impl TargetConfig {
    pub fn target_root(&self, root: &Path) -> PathBuf {
        root.join(&self.folder)
    }
}

/// Load and validate the configuration file.
pub fn load(path: &Path) -> Result<Config> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| TranslateError::config(path, format!("cannot read file: {e}")))?;
    let config: Config = serde_json::from_str(&data)
        .map_err(|e| TranslateError::config(path, format!("cannot parse JSON: {e}")))?;
    config.validate(path)?;
    tracing::debug!(
        event = "config_loaded",
        path = %path.display(),
        source = %config.source.language,
        targets = config.targets.len()
    );
    Ok(config)
}
