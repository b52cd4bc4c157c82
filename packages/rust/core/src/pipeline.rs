//! End-to-end `run` pipeline: init → ingest → prompt-tune → index → query.
//!
//! Each phase is skipped when filesystem evidence says its work is already
//! done: an initialized workspace, a populated prompts directory, a
//! complete set of index output tables. An incomplete index is resumed
//! rather than restarted.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use graphops_ingest::{IngestOptions, IngestReport};
use graphops_runner::{GraphRagCli, workspace};
use graphops_shared::{
    GraphOpsError, IndexState, IngestConfig, QueryMethod, Result, RunId, RunnerConfig,
    TuningConfig, WorkspacePaths,
};

/// Configuration for the `run` pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Workspace root for the external tool.
    pub workspace: PathBuf,
    /// Directory of HTML sources to ingest before indexing, if any.
    pub source_dir: Option<PathBuf>,
    /// Prompt-tuning parameters.
    pub tuning: TuningConfig,
    /// Ingestion parameters.
    pub ingest: IngestConfig,
    /// How the external tool is invoked.
    pub runner: RunnerConfig,
    /// Query to run after indexing, if any.
    pub query: Option<String>,
    /// Retrieval method for the query.
    pub query_method: QueryMethod,
    /// Re-run tuning even when prompts are already present.
    pub force_tune: bool,
    /// Re-run indexing even when the output is complete.
    pub force_index: bool,
}

/// What happened to one phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The phase executed.
    Ran,
    /// The phase was skipped because its output already existed.
    Skipped,
    /// The phase failed but the run continued (tuning only).
    Failed,
}

/// Result of the `run` pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    /// Identifier for this run.
    pub run_id: RunId,
    /// Workspace initialization outcome.
    pub init: PhaseOutcome,
    /// Ingestion report, when a source directory was configured.
    pub ingest: Option<IngestReport>,
    /// Prompt-tuning outcome.
    pub tune: PhaseOutcome,
    /// Indexing outcome.
    pub index: PhaseOutcome,
    /// Index completeness after the run.
    pub index_state: IndexState,
    /// Query answer (captured tool stdout), when a query was configured.
    pub answer: Option<String>,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called per item within a phase (1-based index), e.g. one ingested
    /// source file. Default is a no-op.
    fn item(&self, label: &str, index: usize, total: usize) {
        let _ = (label, index, total);
    }
    /// Called when the pipeline completes.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// Run the full pipeline against one workspace.
///
/// Tool invocations block the current thread; callers on a runtime with
/// other work should wrap this in `spawn_blocking`.
#[instrument(skip_all, fields(workspace = %config.workspace.display()))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let run_id = RunId::new();

    let ws = WorkspacePaths::new(&config.workspace);
    let cli = GraphRagCli::new(&config.runner, &config.workspace);

    info!(%run_id, "starting pipeline");

    // --- Phase 1: Initialize workspace ---
    progress.phase("Initializing workspace");
    let init = if workspace::is_initialized(&ws) {
        info!("workspace already initialized, skipping init");
        PhaseOutcome::Skipped
    } else {
        cli.init()?;
        if !workspace::is_initialized(&ws) {
            return Err(GraphOpsError::validation(format!(
                "init reported success but '{}' is missing settings.yaml or .env",
                ws.root.display()
            )));
        }
        PhaseOutcome::Ran
    };

    // --- Phase 2: Ingest HTML sources ---
    let ingest = match &config.source_dir {
        Some(source_dir) => {
            progress.phase("Ingesting HTML sources");
            let options = IngestOptions::from(&config.ingest);
            let report = graphops_ingest::ingest_dir_with_progress(
                source_dir,
                &ws.input_dir(),
                &options,
                &mut |name, index, total| progress.item(name, index, total),
            )?;
            Some(report)
        }
        None => None,
    };

    // --- Phase 3: Prompt tuning ---
    progress.phase("Tuning prompts");
    let tune = if workspace::prompts_ready(&ws, &config.tuning.output) && !config.force_tune {
        info!("prompts directory already populated, skipping tuning");
        PhaseOutcome::Skipped
    } else {
        // Tuning failure is not fatal: the tool falls back to its
        // default prompts.
        match cli.prompt_tune(&config.tuning) {
            Ok(_) => PhaseOutcome::Ran,
            Err(e) => {
                warn!(error = %e, "prompt tuning failed, proceeding with default prompts");
                PhaseOutcome::Failed
            }
        }
    };

    // --- Phase 4: Indexing ---
    progress.phase("Indexing");
    let state_before = workspace::index_state(&ws);
    let index = match &state_before {
        IndexState::Complete if !config.force_index => {
            info!("index output complete, skipping indexing");
            PhaseOutcome::Skipped
        }
        state => {
            let resume = matches!(state, IndexState::Incomplete { .. });
            if resume {
                info!("index output incomplete, resuming");
            }
            cli.index(resume)?;
            PhaseOutcome::Ran
        }
    };

    let index_state = workspace::index_state(&ws);
    if !index_state.is_complete() {
        warn!(?index_state, "index output still incomplete after indexing");
    }

    // --- Phase 5: Query ---
    let answer = match &config.query {
        Some(text) => {
            progress.phase("Querying");
            let output = cli.query(config.query_method, text)?;
            Some(output.stdout)
        }
        None => None,
    };

    let result = PipelineResult {
        run_id,
        init,
        ingest,
        tune,
        index,
        index_state,
        answer,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        ?result.init,
        ?result.tune,
        ?result.index,
        elapsed_ms = result.elapsed.as_millis(),
        "pipeline complete"
    );

    Ok(result)
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::path::Path;
    use uuid::Uuid;

    // A shell stand-in for the external tool. `$0` is the subcommand and
    // `$2` the --root value; it fabricates the artifacts each subcommand
    // would produce and appends every call to calls.log in the root.
    const FAKE_TOOL: &str = r#"
echo "$0 $@" >> "$2/calls.log"
case "$0" in
  init)
    mkdir -p "$2"
    : > "$2/settings.yaml"
    : > "$2/.env"
    ;;
  prompt-tune)
    mkdir -p "$2/prompts"
    : > "$2/prompts/extract_graph.txt"
    ;;
  index)
    mkdir -p "$2/output"
    for t in entities relationships communities community_reports text_units documents; do
      : > "$2/output/$t.parquet"
    done
    ;;
  query)
    echo "THE ANSWER"
    ;;
esac
"#;

    fn fake_runner(script: &str) -> RunnerConfig {
        RunnerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("graphops-pipe-{tag}-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn config(workspace: &Path, script: &str) -> PipelineConfig {
        PipelineConfig {
            workspace: workspace.to_path_buf(),
            source_dir: None,
            tuning: TuningConfig::default(),
            ingest: IngestConfig::default(),
            runner: fake_runner(script),
            query: None,
            query_method: QueryMethod::Local,
            force_tune: false,
            force_index: false,
        }
    }

    fn calls(workspace: &Path) -> String {
        std::fs::read_to_string(workspace.join("calls.log")).unwrap_or_default()
    }

    #[tokio::test]
    async fn fresh_workspace_runs_every_phase() {
        let root = temp_root("fresh");
        let ws = root.join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        let mut cfg = config(&ws, FAKE_TOOL);
        cfg.query = Some("What does the Coast Guard do?".into());

        let result = run_pipeline(&cfg, &SilentProgress).await.expect("pipeline");
        assert_eq!(result.init, PhaseOutcome::Ran);
        assert_eq!(result.tune, PhaseOutcome::Ran);
        assert_eq!(result.index, PhaseOutcome::Ran);
        assert!(result.index_state.is_complete());
        assert!(result.answer.unwrap().contains("THE ANSWER"));

        let log = calls(&ws);
        assert!(log.contains("init --root"));
        assert!(log.contains("prompt-tune --root"));
        assert!(log.contains("index --root"));
        assert!(log.contains("query --root"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn second_run_skips_completed_phases() {
        let root = temp_root("rerun");
        let ws = root.join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        let cfg = config(&ws, FAKE_TOOL);
        run_pipeline(&cfg, &SilentProgress).await.expect("first run");
        let result = run_pipeline(&cfg, &SilentProgress).await.expect("second run");

        assert_eq!(result.init, PhaseOutcome::Skipped);
        assert_eq!(result.tune, PhaseOutcome::Skipped);
        assert_eq!(result.index, PhaseOutcome::Skipped);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn incomplete_index_is_resumed() {
        let root = temp_root("resume");
        let ws = root.join("ws");
        std::fs::create_dir_all(ws.join("output")).unwrap();
        // Pre-initialize and leave a partial table set behind.
        std::fs::write(ws.join("settings.yaml"), b"").unwrap();
        std::fs::write(ws.join(".env"), b"").unwrap();
        std::fs::write(ws.join("output/entities.parquet"), b"").unwrap();

        let mut cfg = config(&ws, FAKE_TOOL);
        cfg.force_tune = false;
        let result = run_pipeline(&cfg, &SilentProgress).await.expect("pipeline");

        assert_eq!(result.index, PhaseOutcome::Ran);
        assert!(result.index_state.is_complete());
        assert!(calls(&ws).contains("index --root"));
        assert!(calls(&ws).contains("--resume"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn tuning_failure_does_not_abort_the_run() {
        let root = temp_root("tunefail");
        let ws = root.join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        // prompt-tune exits non-zero; everything else behaves.
        let script = FAKE_TOOL.replace(
            "  prompt-tune)\n    mkdir -p \"$2/prompts\"\n    : > \"$2/prompts/extract_graph.txt\"\n    ;;",
            "  prompt-tune)\n    exit 1\n    ;;",
        );

        let result = run_pipeline(&config(&ws, &script), &SilentProgress)
            .await
            .expect("pipeline");
        assert_eq!(result.tune, PhaseOutcome::Failed);
        assert_eq!(result.index, PhaseOutcome::Ran);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn failed_init_verification_aborts() {
        let root = temp_root("badinit");
        let ws = root.join("ws");
        std::fs::create_dir_all(&ws).unwrap();

        // init succeeds but writes nothing.
        let script = r#"echo ok"#;
        let err = run_pipeline(&config(&ws, script), &SilentProgress)
            .await
            .expect_err("init verification should fail");
        assert!(err.to_string().contains("settings.yaml"));

        std::fs::remove_dir_all(&root).ok();
    }

    struct RecordingProgress {
        items: std::sync::Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn item(&self, label: &str, index: usize, total: usize) {
            self.items
                .lock()
                .unwrap()
                .push(format!("{label} {index}/{total}"));
        }
        fn done(&self, _result: &PipelineResult) {}
    }

    #[tokio::test]
    async fn per_source_progress_is_reported() {
        let root = temp_root("progress");
        let ws = root.join("ws");
        let sources = root.join("titles");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(sources.join("a.html"), "<h1>A</h1><p>First.</p>").unwrap();
        std::fs::write(sources.join("b.html"), "<h1>B</h1><p>Second.</p>").unwrap();

        let mut cfg = config(&ws, FAKE_TOOL);
        cfg.source_dir = Some(sources);

        let reporter = RecordingProgress {
            items: std::sync::Mutex::new(Vec::new()),
        };
        run_pipeline(&cfg, &reporter).await.expect("pipeline");

        let items = reporter.items.lock().unwrap();
        assert_eq!(*items, ["a.html 1/2", "b.html 2/2"]);

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn pipeline_ingests_sources_when_configured() {
        let root = temp_root("ingest");
        let ws = root.join("ws");
        let sources = root.join("titles");
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::create_dir_all(&sources).unwrap();
        std::fs::write(
            sources.join("title06.htm"),
            "<h1>Title 6</h1><p>Domestic security.</p>",
        )
        .unwrap();

        let mut cfg = config(&ws, FAKE_TOOL);
        cfg.source_dir = Some(sources);

        let result = run_pipeline(&cfg, &SilentProgress).await.expect("pipeline");
        let report = result.ingest.expect("ingest report");
        assert_eq!(report.sources_ingested, 1);
        assert!(ws.join("input/title06_chunk_000.txt").exists());

        std::fs::remove_dir_all(&root).ok();
    }
}
