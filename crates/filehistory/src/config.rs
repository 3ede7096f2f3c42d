//! Configuration loading for the filehistory CLI.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/filehistory/config.json` (or `.jsonc`)
//! 2. Environment variable: `FILEHISTORY_CONFIG_CONTENT`
//! 3. Project config: `filehistory.json` or `filehistory.jsonc` in the workspace
//! 4. Command-line flags
//!
//! Files may contain `//` and `/* */` comments. A layer that cannot be read
//! or parsed is logged and skipped.

use filehistory_snapshot::{HistoryConfig, HistoryError, HistoryResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable holding an inline configuration layer.
pub const CONFIG_CONTENT_ENV: &str = "FILEHISTORY_CONFIG_CONTENT";

/// One configuration layer. Unset fields defer to earlier layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_history_entries: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

/// Where a configuration layer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Env,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Env => write!(f, "${CONFIG_CONTENT_ENV}"),
        }
    }
}

impl FileConfig {
    /// Load and merge every layer.
    ///
    /// Returns the merged layer and the sources that contributed to it.
    pub async fn load(project_dir: Option<&Path>) -> (Self, Vec<ConfigSource>) {
        let global_dir = filehistory_util::path::config_dir();
        let env_content = std::env::var(CONFIG_CONTENT_ENV).ok();
        Self::load_layers(global_dir.as_deref(), env_content.as_deref(), project_dir).await
    }

    /// [`FileConfig::load`] with every input explicit.
    pub async fn load_layers(
        global_dir: Option<&Path>,
        env_content: Option<&str>,
        project_dir: Option<&Path>,
    ) -> (Self, Vec<ConfigSource>) {
        let mut config = FileConfig::default();
        let mut sources = Vec::new();

        // 1. Global config
        if let Some(dir) = global_dir {
            if let Some((loaded, path)) = Self::load_first(dir, &["config.json", "config.jsonc"]).await {
                config = config.merge(loaded);
                sources.push(ConfigSource::File(path));
            }
        }

        // 2. Environment variable
        if let Some(content) = env_content {
            match Self::parse_jsonc(content, CONFIG_CONTENT_ENV) {
                Ok(loaded) => {
                    config = config.merge(loaded);
                    sources.push(ConfigSource::Env);
                }
                Err(e) => warn!(error = %e, "Ignoring configuration from environment"),
            }
        }

        // 3. Project config
        if let Some(dir) = project_dir {
            if let Some((loaded, path)) =
                Self::load_first(dir, &["filehistory.jsonc", "filehistory.json"]).await
            {
                config = config.merge(loaded);
                sources.push(ConfigSource::File(path));
            }
        }

        (config, sources)
    }

    /// Load the first of `names` that exists in `dir`.
    async fn load_first(dir: &Path, names: &[&str]) -> Option<(Self, PathBuf)> {
        for name in names {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            return match Self::load_file(&path).await {
                Ok(loaded) => Some((loaded, path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring configuration file");
                    None
                }
            };
        }
        None
    }

    /// Load one configuration file.
    pub async fn load_file(path: &Path) -> HistoryResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HistoryError::from_io(e, path))?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> HistoryResult<Self> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped)
            .map_err(|e| HistoryError::config_invalid(format!("{source}: {e}")))
    }

    /// Merge another layer into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
            max_history_entries: other.max_history_entries.or(self.max_history_entries),
            max_age_days: other.max_age_days.or(self.max_age_days),
            excluded_patterns: other.excluded_patterns.or(self.excluded_patterns),
            store_root: other.store_root.or(self.store_root),
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
        }
    }

    /// Apply the merged layers on top of the defaults.
    ///
    /// A relative `storeRoot` is resolved against `base`.
    pub fn resolve(self, base: &Path) -> HistoryConfig {
        let defaults = HistoryConfig::default();
        HistoryConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            max_history_entries: self
                .max_history_entries
                .unwrap_or(defaults.max_history_entries),
            max_age_days: self.max_age_days.unwrap_or(defaults.max_age_days),
            excluded_patterns: self.excluded_patterns.unwrap_or(defaults.excluded_patterns),
            store_root: self
                .store_root
                .map(|root| filehistory_util::path::absolutize(&root, base)),
            debounce_ms: self.debounce_ms.unwrap_or(defaults.debounce_ms),
        }
    }
}

/// Strip `//` and `/* */` comments outside of strings.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if in_string || c != '/' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('/') => {
                chars.next();
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            Some('*') => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // Keep line numbers stable for parse errors
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}
