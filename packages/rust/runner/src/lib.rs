//! Driver for the external knowledge-graph tool's command-line interface.
//!
//! Assembles and spawns `init`, `prompt-tune`, `index`, and `query`
//! invocations as blocking subprocesses with captured output. Success and
//! failure are read from the exit status; a failure surfaces the rendered
//! command line and a stderr tail in the error.

pub mod workspace;

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use graphops_shared::{
    GraphOpsError, QueryMethod, Result, RunnerConfig, TuningConfig, WorkspacePaths,
};

/// Disables a third-party JIT cache that conflicts with one of the tool's
/// transitive dependencies.
const NUMBA_DISABLE_JIT: (&str, &str) = ("NUMBA_DISABLE_JIT", "1");

/// Maximum number of stderr bytes carried into a `Tool` error.
const STDERR_TAIL_LIMIT: usize = 4_096;

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// A configured handle to the external tool for one workspace.
#[derive(Debug, Clone)]
pub struct GraphRagCli {
    command: String,
    args_prefix: Vec<String>,
    workspace: WorkspacePaths,
}

impl GraphRagCli {
    pub fn new(runner: &RunnerConfig, workspace_root: impl AsRef<Path>) -> Self {
        Self {
            command: runner.command.clone(),
            args_prefix: runner.args.clone(),
            workspace: WorkspacePaths::new(workspace_root.as_ref()),
        }
    }

    /// The workspace this handle operates on.
    pub fn workspace(&self) -> &WorkspacePaths {
        &self.workspace
    }

    /// Initialize the workspace (`init --root <ws>`).
    #[instrument(skip(self), fields(root = %self.workspace.root.display()))]
    pub fn init(&self) -> Result<ToolOutput> {
        self.run(self.init_args())
    }

    /// Run auto prompt tuning (`prompt-tune --root <ws> …`).
    #[instrument(skip(self, tuning), fields(root = %self.workspace.root.display(), domain = %tuning.domain))]
    pub fn prompt_tune(&self, tuning: &TuningConfig) -> Result<ToolOutput> {
        self.run(self.prompt_tune_args(tuning))
    }

    /// Run indexing (`index --root <ws>`, optionally with `--resume`).
    #[instrument(skip(self), fields(root = %self.workspace.root.display(), resume))]
    pub fn index(&self, resume: bool) -> Result<ToolOutput> {
        self.run(self.index_args(resume))
    }

    /// Run a query (`query --root <ws> --method <m> --query <q>`).
    ///
    /// The answer is the captured stdout of the tool.
    #[instrument(skip(self, text), fields(root = %self.workspace.root.display(), method = %method))]
    pub fn query(&self, method: QueryMethod, text: &str) -> Result<ToolOutput> {
        self.run(self.query_args(method, text))
    }

    // -- argument assembly --------------------------------------------------

    fn root_arg(&self) -> String {
        self.workspace.root.to_string_lossy().into_owned()
    }

    fn init_args(&self) -> Vec<String> {
        vec!["init".into(), "--root".into(), self.root_arg()]
    }

    fn prompt_tune_args(&self, tuning: &TuningConfig) -> Vec<String> {
        let mut args = vec![
            "prompt-tune".into(),
            "--root".into(),
            self.root_arg(),
            "--config".into(),
            self.workspace.settings_file().to_string_lossy().into_owned(),
            "--domain".into(),
            tuning.domain.clone(),
            "--selection-method".into(),
            tuning.selection_method.to_string(),
            "--limit".into(),
            tuning.limit.to_string(),
            "--language".into(),
            tuning.language.clone(),
            "--max-tokens".into(),
            tuning.max_tokens.to_string(),
            "--chunk-size".into(),
            tuning.chunk_size.to_string(),
            "--min-examples-required".into(),
            tuning.min_examples_required.to_string(),
            "--output".into(),
            tuning.output.clone(),
        ];
        if tuning.discover_entity_types {
            args.push("--discover-entity-types".into());
        } else {
            args.push("--no-discover-entity-types".into());
        }
        args
    }

    fn index_args(&self, resume: bool) -> Vec<String> {
        let mut args = vec!["index".into(), "--root".into(), self.root_arg()];
        if resume {
            args.push("--resume".into());
        }
        args
    }

    fn query_args(&self, method: QueryMethod, text: &str) -> Vec<String> {
        vec![
            "query".into(),
            "--root".into(),
            self.root_arg(),
            "--method".into(),
            method.to_string(),
            "--query".into(),
            text.to_string(),
        ]
    }

    // -- execution ----------------------------------------------------------

    /// Render the full command line for logs and errors.
    fn render(&self, tool_args: &[String]) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args_prefix.iter().cloned());
        parts.extend(tool_args.iter().cloned());
        parts.join(" ")
    }

    /// Spawn the tool, block until it exits, and capture its output.
    fn run(&self, tool_args: Vec<String>) -> Result<ToolOutput> {
        let rendered = self.render(&tool_args);
        info!(command = %rendered, "invoking external tool");

        let start = Instant::now();
        let output = Command::new(&self.command)
            .args(&self.args_prefix)
            .args(&tool_args)
            .env(NUMBA_DISABLE_JIT.0, NUMBA_DISABLE_JIT.1)
            .output()
            .map_err(|e| GraphOpsError::Tool {
                command: rendered.clone(),
                status: None,
                stderr: format!("failed to spawn: {e}. Is `{}` installed?", self.command),
            })?;
        let elapsed = start.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(GraphOpsError::Tool {
                command: rendered,
                status: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL_LIMIT),
            });
        }

        debug!(
            elapsed_ms = elapsed.as_millis(),
            stdout_len = stdout.len(),
            "tool invocation succeeded"
        );

        Ok(ToolOutput {
            stdout,
            stderr,
            elapsed,
        })
    }
}

/// Last `limit` bytes of `s`, aligned to a character boundary.
fn tail(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut start = s.len() - limit;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphops_shared::SelectionMethod;

    fn cli() -> GraphRagCli {
        GraphRagCli::new(&RunnerConfig::default(), "/data/msgragtest")
    }

    #[test]
    fn init_args_assembly() {
        assert_eq!(
            cli().init_args(),
            vec!["init", "--root", "/data/msgragtest"]
        );
    }

    #[test]
    fn prompt_tune_args_assembly() {
        let tuning = TuningConfig {
            domain: "US Legal Code".into(),
            selection_method: SelectionMethod::Auto,
            limit: 50,
            language: "English".into(),
            max_tokens: 4_096,
            chunk_size: 512,
            min_examples_required: 5,
            discover_entity_types: true,
            output: "prompts".into(),
        };

        let args = cli().prompt_tune_args(&tuning);
        assert_eq!(args[0], "prompt-tune");
        assert!(args.contains(&"--domain".to_string()));
        assert!(args.contains(&"US Legal Code".to_string()));
        assert!(args.contains(&"--selection-method".to_string()));
        assert!(args.contains(&"auto".to_string()));
        assert!(args.contains(&"--min-examples-required".to_string()));
        assert_eq!(args.last().unwrap(), "--discover-entity-types");
    }

    #[test]
    fn prompt_tune_disables_entity_discovery() {
        let tuning = TuningConfig {
            discover_entity_types: false,
            ..TuningConfig::default()
        };
        let args = cli().prompt_tune_args(&tuning);
        assert_eq!(args.last().unwrap(), "--no-discover-entity-types");
    }

    #[test]
    fn index_args_resume_flag() {
        assert!(!cli().index_args(false).contains(&"--resume".to_string()));
        assert!(cli().index_args(true).contains(&"--resume".to_string()));
    }

    #[test]
    fn query_args_assembly() {
        let args = cli().query_args(QueryMethod::Local, "What does the Coast Guard do?");
        assert_eq!(
            args,
            vec![
                "query",
                "--root",
                "/data/msgragtest",
                "--method",
                "local",
                "--query",
                "What does the Coast Guard do?",
            ]
        );
    }

    #[test]
    fn rendered_command_includes_prefix() {
        let rendered = cli().render(&cli().init_args());
        assert!(rendered.starts_with("python -m graphrag init"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_process_maps_to_tool_error() {
        let runner = RunnerConfig {
            command: "false".into(),
            args: vec![],
        };
        let cli = GraphRagCli::new(&runner, "/tmp/ws");
        let err = cli.init().expect_err("false exits non-zero");
        match err {
            GraphOpsError::Tool { status, .. } => assert_eq!(status, Some(1)),
            other => panic!("expected Tool error, got {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn successful_process_captures_stdout() {
        let runner = RunnerConfig {
            command: "echo".into(),
            args: vec![],
        };
        let cli = GraphRagCli::new(&runner, "/tmp/ws");
        let out = cli.init().expect("echo succeeds");
        assert!(out.stdout.contains("init --root /tmp/ws"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_executable_is_a_spawn_error() {
        let runner = RunnerConfig {
            command: "graphops-no-such-binary".into(),
            args: vec![],
        };
        let cli = GraphRagCli::new(&runner, "/tmp/ws");
        let err = cli.init().expect_err("spawn should fail");
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let s = "ααααα"; // 2 bytes per char
        let t = tail(s, 3);
        assert_eq!(t, "α");
        assert_eq!(tail("short", 100), "short");
    }
}
