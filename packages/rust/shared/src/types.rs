//! Core domain types for GraphOps runs and workspaces.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SelectionMethod
// ---------------------------------------------------------------------------

/// Text-unit selection method for prompt tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    Random,
    Top,
    All,
    #[default]
    Auto,
}

impl SelectionMethod {
    /// The flag value the external tool expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Top => "top",
            Self::All => "all",
            Self::Auto => "auto",
        }
    }
}

impl std::fmt::Display for SelectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SelectionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "top" => Ok(Self::Top),
            "all" => Ok(Self::All),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown selection method '{other}': expected random, top, all, or auto"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// QueryMethod
// ---------------------------------------------------------------------------

/// Retrieval method for queries against an indexed workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    #[default]
    Local,
    Global,
    Drift,
    Basic,
}

impl QueryMethod {
    /// The flag value the external tool expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Drift => "drift",
            Self::Basic => "basic",
        }
    }
}

impl std::fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueryMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "drift" => Ok(Self::Drift),
            "basic" => Ok(Self::Basic),
            other => Err(format!(
                "unknown query method '{other}': expected local, global, drift, or basic"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkspacePaths
// ---------------------------------------------------------------------------

/// Well-known locations inside an external-tool workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    /// Workspace root directory.
    pub root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `settings.yaml` written by the tool's `init`.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.yaml")
    }

    /// `.env` written by the tool's `init`.
    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// Input corpus directory consumed by indexing.
    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    /// Output directory populated by indexing.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Prompts directory, relative name configured per tuning run.
    pub fn prompts_dir(&self, output: &str) -> PathBuf {
        self.root.join(output)
    }
}

// ---------------------------------------------------------------------------
// IndexState
// ---------------------------------------------------------------------------

/// Completeness of a workspace's index output.
///
/// `Complete` requires every expected output table to be present; a partial
/// set is reported with the missing table names so the caller can resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    /// No output tables exist yet.
    NotStarted,
    /// Some but not all expected tables exist.
    Incomplete { missing: Vec<String> },
    /// All expected tables exist.
    Complete,
}

impl IndexState {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn selection_method_parsing() {
        assert_eq!("auto".parse::<SelectionMethod>(), Ok(SelectionMethod::Auto));
        assert_eq!("top".parse::<SelectionMethod>(), Ok(SelectionMethod::Top));
        assert!("best".parse::<SelectionMethod>().is_err());
        assert_eq!(SelectionMethod::Random.to_string(), "random");
    }

    #[test]
    fn query_method_parsing() {
        assert_eq!("local".parse::<QueryMethod>(), Ok(QueryMethod::Local));
        assert_eq!("drift".parse::<QueryMethod>(), Ok(QueryMethod::Drift));
        assert!("graph".parse::<QueryMethod>().is_err());
    }

    #[test]
    fn workspace_paths_layout() {
        let ws = WorkspacePaths::new("/data/msgragtest");
        assert_eq!(ws.settings_file(), PathBuf::from("/data/msgragtest/settings.yaml"));
        assert_eq!(ws.env_file(), PathBuf::from("/data/msgragtest/.env"));
        assert_eq!(ws.input_dir(), PathBuf::from("/data/msgragtest/input"));
        assert_eq!(ws.prompts_dir("prompts"), PathBuf::from("/data/msgragtest/prompts"));
    }

    #[test]
    fn index_state_serialization() {
        let state = IndexState::Incomplete {
            missing: vec!["entities.parquet".into()],
        };
        let json = serde_json::to_string(&state).expect("serialize");
        assert!(json.contains("incomplete"));
        assert!(json.contains("entities.parquet"));

        let parsed: IndexState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, state);
        assert!(!parsed.is_complete());
        assert!(IndexState::Complete.is_complete());
    }
}
