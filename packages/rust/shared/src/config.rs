//! Application configuration for GraphOps.
//!
//! User config lives at `~/.graphops/graphops.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphOpsError, Result};
use crate::types::{QueryMethod, SelectionMethod};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "graphops.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".graphops";

// ---------------------------------------------------------------------------
// Config structs (matching graphops.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Prompt-tuning parameters passed to the external tool.
    #[serde(default)]
    pub tuning: TuningConfig,

    /// HTML ingestion parameters.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// How the external tool is invoked.
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default workspace directory for the external tool.
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Maximum number of files per batch subdirectory.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Default query retrieval method.
    #[serde(default)]
    pub query_method: QueryMethod,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            batch_size: default_batch_size(),
            query_method: QueryMethod::default(),
        }
    }
}

fn default_workspace() -> String {
    "./graphrag-workspace".into()
}
fn default_batch_size() -> usize {
    7_500
}

/// `[tuning]` section — mirrors the external tool's `prompt-tune` flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Domain description used to adapt prompts (e.g., "US Legal Code").
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Text-unit selection method.
    #[serde(default)]
    pub selection_method: SelectionMethod,

    /// Number of text units used for prompt generation.
    #[serde(default = "default_tuning_limit")]
    pub limit: usize,

    /// Prompt language.
    #[serde(default = "default_language")]
    pub language: String,

    /// Token cap for generated prompts.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Chunk size for tuning text units.
    #[serde(default = "default_tuning_chunk_size")]
    pub chunk_size: usize,

    /// Minimum examples required per generated prompt.
    #[serde(default = "default_min_examples")]
    pub min_examples_required: usize,

    /// Whether the tool should discover entity types automatically.
    #[serde(default = "default_true")]
    pub discover_entity_types: bool,

    /// Output directory for generated prompts, relative to the workspace.
    #[serde(default = "default_prompts_output")]
    pub output: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            selection_method: SelectionMethod::default(),
            limit: default_tuning_limit(),
            language: default_language(),
            max_tokens: default_max_tokens(),
            chunk_size: default_tuning_chunk_size(),
            min_examples_required: default_min_examples(),
            discover_entity_types: default_true(),
            output: default_prompts_output(),
        }
    }
}

fn default_domain() -> String {
    "document analysis".into()
}
fn default_tuning_limit() -> usize {
    50
}
fn default_language() -> String {
    "English".into()
}
fn default_max_tokens() -> usize {
    4_096
}
fn default_tuning_chunk_size() -> usize {
    512
}
fn default_min_examples() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_prompts_output() -> String {
    "prompts".into()
}

/// `[ingest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Maximum characters per chunk file.
    #[serde(default = "default_ingest_chunk_size")]
    pub chunk_size: usize,

    /// Character overlap between adjacent chunks.
    #[serde(default = "default_ingest_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_ingest_chunk_size(),
            chunk_overlap: default_ingest_overlap(),
        }
    }
}

fn default_ingest_chunk_size() -> usize {
    1_000
}
fn default_ingest_overlap() -> usize {
    100
}

/// `[runner]` section — how the external knowledge-graph tool is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Executable to spawn (e.g., "python").
    #[serde(default = "default_runner_command")]
    pub command: String,

    /// Arguments prepended before the tool subcommand (e.g., ["-m", "graphrag"]).
    #[serde(default = "default_runner_args")]
    pub args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: default_runner_command(),
            args: default_runner_args(),
        }
    }
}

fn default_runner_command() -> String {
    "python".into()
}
fn default_runner_args() -> Vec<String> {
    vec!["-m".into(), "graphrag".into()]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.graphops/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GraphOpsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.graphops/graphops.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GraphOpsError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GraphOpsError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GraphOpsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GraphOpsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GraphOpsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("workspace"));
        assert!(toml_str.contains("batch_size"));
        assert!(toml_str.contains("graphrag"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.batch_size, 7_500);
        assert_eq!(parsed.tuning.limit, 50);
        assert_eq!(parsed.runner.command, "python");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
workspace = "/data/uscode"
batch_size = 500

[tuning]
domain = "US Legal Code"
selection_method = "random"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.workspace, "/data/uscode");
        assert_eq!(config.defaults.batch_size, 500);
        assert_eq!(config.tuning.domain, "US Legal Code");
        assert_eq!(config.tuning.selection_method, SelectionMethod::Random);
        // Untouched sections keep defaults.
        assert_eq!(config.tuning.max_tokens, 4_096);
        assert_eq!(config.ingest.chunk_size, 1_000);
        assert_eq!(config.runner.args, vec!["-m", "graphrag"]);
    }

    #[test]
    fn query_method_in_config() {
        let toml_str = r#"
[defaults]
query_method = "global"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.query_method, QueryMethod::Global);
    }
}
