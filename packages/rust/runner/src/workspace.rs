//! Workspace state inspection.
//!
//! Resume decisions are made from filesystem evidence: `init` artifacts,
//! a populated prompts directory, and the presence of the indexer's
//! output tables. Index completeness requires every expected table, not
//! a subset.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use graphops_shared::{GraphOpsError, IndexState, Result, WorkspacePaths};

/// Output tables the indexer is expected to produce.
pub const EXPECTED_TABLES: [&str; 6] = [
    "entities.parquet",
    "relationships.parquet",
    "communities.parquet",
    "community_reports.parquet",
    "text_units.parquet",
    "documents.parquet",
];

/// A workspace is initialized once `init` has written both its settings
/// file and its `.env`.
pub fn is_initialized(ws: &WorkspacePaths) -> bool {
    ws.settings_file().exists() && ws.env_file().exists()
}

/// Prompts are ready when the tuning output directory exists and contains
/// at least one file.
pub fn prompts_ready(ws: &WorkspacePaths, output: &str) -> bool {
    let dir = ws.prompts_dir(output);
    let Ok(mut entries) = std::fs::read_dir(&dir) else {
        return false;
    };
    entries.any(|e| e.map(|e| e.path().is_file()).unwrap_or(false))
}

/// Determine index completeness from the output tables on disk.
pub fn index_state(ws: &WorkspacePaths) -> IndexState {
    let output = ws.output_dir();

    let missing: Vec<String> = EXPECTED_TABLES
        .iter()
        .filter(|table| !output.join(table).exists())
        .map(|table| table.to_string())
        .collect();

    let state = if missing.len() == EXPECTED_TABLES.len() {
        IndexState::NotStarted
    } else if missing.is_empty() {
        IndexState::Complete
    } else {
        IndexState::Incomplete { missing }
    };

    debug!(?state, output = %output.display(), "index state probed");
    state
}

/// Snapshot of everything the pipeline needs to decide what to skip.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    /// Workspace root directory.
    pub root: String,
    /// `settings.yaml` and `.env` both present.
    pub initialized: bool,
    /// Tuning output directory populated.
    pub prompts_ready: bool,
    /// Number of files under the input directory (including batch subdirs).
    pub input_files: usize,
    /// Index output completeness.
    pub index: IndexState,
}

/// Inspect a workspace directory.
pub fn inspect(ws: &WorkspacePaths, prompts_output: &str) -> Result<WorkspaceStatus> {
    Ok(WorkspaceStatus {
        root: ws.root.to_string_lossy().into_owned(),
        initialized: is_initialized(ws),
        prompts_ready: prompts_ready(ws, prompts_output),
        input_files: count_files(&ws.input_dir())?,
        index: index_state(ws),
    })
}

/// Count regular files under `dir`, descending into subdirectories.
/// A missing directory counts as zero.
fn count_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| GraphOpsError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| GraphOpsError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            count += count_files(&path)?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_workspace() -> (PathBuf, WorkspacePaths) {
        let root = std::env::temp_dir().join(format!("graphops-ws-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("create temp workspace");
        let ws = WorkspacePaths::new(&root);
        (root, ws)
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn initialization_requires_both_files() {
        let (root, ws) = temp_workspace();
        assert!(!is_initialized(&ws));

        touch(&ws.settings_file());
        assert!(!is_initialized(&ws));

        touch(&ws.env_file());
        assert!(is_initialized(&ws));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn prompts_ready_needs_a_populated_directory() {
        let (root, ws) = temp_workspace();
        assert!(!prompts_ready(&ws, "prompts"));

        std::fs::create_dir_all(ws.prompts_dir("prompts")).unwrap();
        assert!(!prompts_ready(&ws, "prompts"));

        touch(&ws.prompts_dir("prompts").join("extract_graph.txt"));
        assert!(prompts_ready(&ws, "prompts"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn index_state_not_started_without_tables() {
        let (root, ws) = temp_workspace();
        assert_eq!(index_state(&ws), IndexState::NotStarted);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn partial_tables_are_incomplete_not_complete() {
        let (root, ws) = temp_workspace();
        // Two of six tables present: historically treated as "done",
        // now reported as incomplete with the missing set.
        touch(&ws.output_dir().join("entities.parquet"));
        touch(&ws.output_dir().join("relationships.parquet"));

        match index_state(&ws) {
            IndexState::Incomplete { missing } => {
                assert_eq!(missing.len(), 4);
                assert!(missing.contains(&"communities.parquet".to_string()));
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn all_tables_mean_complete() {
        let (root, ws) = temp_workspace();
        for table in EXPECTED_TABLES {
            touch(&ws.output_dir().join(table));
        }
        assert_eq!(index_state(&ws), IndexState::Complete);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn inspect_counts_files_in_batch_subdirectories() {
        let (root, ws) = temp_workspace();
        touch(&ws.settings_file());
        touch(&ws.env_file());
        touch(&ws.input_dir().join("a_1.txt"));
        touch(&ws.input_dir().join("usc06").join("usc06_1.txt"));
        touch(&ws.input_dir().join("usc06").join("usc06_2.txt"));

        let status = inspect(&ws, "prompts").expect("inspect");
        assert!(status.initialized);
        assert!(!status.prompts_ready);
        assert_eq!(status.input_files, 3);
        assert_eq!(status.index, IndexState::NotStarted);

        let json = serde_json::to_string(&status).expect("serialize status");
        assert!(json.contains("not_started"));

        std::fs::remove_dir_all(&root).ok();
    }
}
