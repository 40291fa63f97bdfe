use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{CodeMapError, Result};

/// Name of the configuration file stored inside the `.codemap` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store codemap state.
pub const CODEMAP_DIR: &str = ".codemap";

/// Subdirectory of `.codemap` holding synthesized extractor rules.
pub const EXTRACTORS_DIR: &str = "extractors";

/// How the synthesis service reaches its generation oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OracleConfig {
    /// Spawn a program, write the prompt to its stdin and read the reply from stdout.
    Command {
        program: String,
        args: Vec<String>,
        /// Environment variables removed before spawning.
        #[serde(default)]
        unset_env: Vec<String>,
    },
    /// POST a messages-style request to an HTTP endpoint.
    Http {
        endpoint: String,
        model: String,
        /// Name of the environment variable holding the API key.
        api_key_env: String,
        max_tokens: u32,
        timeout_secs: u64,
    },
    /// Never synthesize; only built-in and already cached extractors are used.
    Disabled,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig::Command {
            program: "claude".to_string(),
            args: vec!["-p".to_string(), "-".to_string()],
            unset_env: vec!["CLAUDECODE".to_string()],
        }
    }
}

/// Configuration for a codemap project.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeMapConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Directory names that are never descended into.
    pub exclude_dirs: Vec<String>,
    /// Glob patterns (relative to the project root) for paths to skip.
    pub exclude: Vec<String>,
    /// Maximum file size in bytes; larger files are skipped.
    pub max_file_size: u64,
    /// A sample file must have more than this many lines to be preferred.
    pub sample_min_lines: usize,
    /// Maximum directory depth searched for a sample file.
    pub sample_max_depth: usize,
    /// Depth of the syntax tree dump sent with a synthesis request.
    pub tree_dump_depth: usize,
    /// Number of characters of the sample source included in a synthesis request.
    pub source_excerpt_chars: usize,
    /// Memory ceiling in bytes for a synthesized extractor's Lua state.
    pub script_memory_limit: usize,
    pub oracle: OracleConfig,
}

impl Default for CodeMapConfig {
    fn default() -> Self {
        Self {
            version: 1,
            exclude_dirs: [
                "node_modules",
                "__pycache__",
                ".git",
                CODEMAP_DIR,
                "vendor",
                "dist",
                "build",
                "target",
                ".next",
                ".nuxt",
                "coverage",
                "tmp",
                ".bundle",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude: vec!["**/*.min.*".to_string()],
            max_file_size: 1_048_576,
            sample_min_lines: 5,
            sample_max_depth: 5,
            tree_dump_depth: 3,
            source_excerpt_chars: 3000,
            script_memory_limit: 64 * 1024 * 1024,
            oracle: OracleConfig::default(),
        }
    }
}

/// Returns the path to the `.codemap` directory within the given project root.
pub fn get_codemap_dir(project_root: &Path) -> PathBuf {
    project_root.join(CODEMAP_DIR)
}

/// Returns the path to the configuration file within the `.codemap` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_codemap_dir(project_root).join(CONFIG_FILENAME)
}

/// Returns the directory where synthesized extractors are cached.
pub fn get_extractors_dir(project_root: &Path) -> PathBuf {
    get_codemap_dir(project_root).join(EXTRACTORS_DIR)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns the default configuration.
pub fn load_config(project_root: &Path) -> Result<CodeMapConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(CodeMapConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| CodeMapError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    serde_json::from_str(&contents).map_err(|e| CodeMapError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })
}

/// Saves the configuration to disk using an atomic write.
pub fn save_config(project_root: &Path, config: &CodeMapConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).map_err(|e| CodeMapError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;
    write_atomic(&get_config_path(project_root), &json).map_err(|e| CodeMapError::Config {
        message: e.to_string(),
    })
}

/// Writes `contents` to `path` through a sibling temporary file and a rename,
/// creating parent directories as needed. A partial write never replaces `path`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CodeMapError::File {
            message: format!("failed to create directory: {}", e),
            path: parent.display().to_string(),
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).map_err(|e| CodeMapError::File {
        message: format!("failed to write temporary file: {}", e),
        path: tmp_path.display().to_string(),
    })?;

    fs::rename(&tmp_path, path).map_err(|e| CodeMapError::File {
        message: format!(
            "failed to rename temporary file '{}': {}",
            tmp_path.display(),
            e
        ),
        path: path.display().to_string(),
    })
}

/// Returns `true` if the directory name should never be walked: hidden
/// directories and anything listed in `exclude_dirs`.
pub fn is_excluded_dir(name: &str, config: &CodeMapConfig) -> bool {
    name.starts_with('.') || config.exclude_dirs.iter().any(|d| d == name)
}

/// Returns `true` if a path relative to the project root matches one of the
/// configured exclude glob patterns.
pub fn is_excluded_path(relative_path: &str, config: &CodeMapConfig) -> bool {
    let match_opts = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    config.exclude.iter().any(|pattern_str| {
        Pattern::new(pattern_str)
            .map(|pattern| pattern.matches_with(relative_path, match_opts))
            .unwrap_or(false)
    })
}
