//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use graphops_batcher::{SplitOptions, plan_split};
use graphops_core::{PhaseOutcome, PipelineConfig, PipelineResult, ProgressReporter, run_pipeline};
use graphops_ingest::IngestOptions;
use graphops_runner::{GraphRagCli, workspace};
use graphops_shared::{
    AppConfig, IndexState, QueryMethod, SelectionMethod, WorkspacePaths, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// GraphOps — drive an external knowledge-graph tool over a prepared corpus.
#[derive(Parser)]
#[command(
    name = "graphops",
    version,
    about = "Prepare document corpora and drive a knowledge-graph RAG tool (init, prompt-tune, index, query).",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Initialize the tool workspace (settings.yaml, .env).
    Init {
        /// Workspace directory (defaults to the configured workspace).
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Ingest HTML sources into the workspace input directory as text chunks.
    Ingest {
        /// Directory of .htm/.html source files.
        source: PathBuf,

        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Maximum characters per chunk file.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Character overlap between adjacent chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Re-ingest sources even when unchanged.
        #[arg(long)]
        force: bool,
    },

    /// Split the input directory into batch subdirectories by filename prefix.
    Split {
        /// Directory to split (defaults to the workspace input directory).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Maximum files per batch subdirectory.
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// File extension to consider (no leading dot).
        #[arg(long, default_value = "txt")]
        extension: String,

        /// Print the plan without moving any files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run auto prompt tuning to generate domain-adapted prompts.
    Tune {
        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Domain description (e.g., "US Legal Code").
        #[arg(long)]
        domain: Option<String>,

        /// Text-unit selection method: random, top, all, or auto.
        #[arg(long)]
        selection_method: Option<SelectionMethod>,

        /// Number of text units used for prompt generation.
        #[arg(long)]
        limit: Option<usize>,

        /// Prompt language.
        #[arg(long)]
        language: Option<String>,

        /// Token cap for generated prompts.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Chunk size for tuning text units.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Minimum examples required per generated prompt.
        #[arg(long)]
        min_examples_required: Option<usize>,

        /// Whether to discover entity types automatically.
        #[arg(long)]
        discover_entity_types: Option<bool>,

        /// Output directory for prompts, relative to the workspace.
        #[arg(long)]
        output: Option<String>,
    },

    /// Build the knowledge-graph index over the workspace input.
    Index {
        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Re-run indexing even when the output tables are complete.
        #[arg(long)]
        force: bool,
    },

    /// Run a query against the indexed workspace.
    Query {
        /// Query text.
        query: String,

        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Retrieval method: local, global, drift, or basic.
        #[arg(short, long)]
        method: Option<QueryMethod>,
    },

    /// Run the full pipeline: init, ingest, tune, index, and optional query.
    Run {
        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Directory of HTML sources to ingest first.
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Query to run after indexing.
        #[arg(short, long)]
        query: Option<String>,

        /// Retrieval method for the query.
        #[arg(short, long)]
        method: Option<QueryMethod>,

        /// Re-run tuning even when prompts are present.
        #[arg(long)]
        force_tune: bool,

        /// Re-run indexing even when the output is complete.
        #[arg(long)]
        force_index: bool,
    },

    /// Report workspace state: initialization, prompts, input, index tables.
    Status {
        /// Workspace directory.
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "graphops=info",
        1 => "graphops=debug",
        _ => "graphops=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { workspace } => cmd_init(workspace).await,
        Command::Ingest {
            source,
            workspace,
            chunk_size,
            chunk_overlap,
            force,
        } => cmd_ingest(&source, workspace, chunk_size, chunk_overlap, force).await,
        Command::Split {
            dir,
            workspace,
            batch_size,
            extension,
            dry_run,
        } => cmd_split(dir, workspace, batch_size, &extension, dry_run).await,
        Command::Tune {
            workspace,
            domain,
            selection_method,
            limit,
            language,
            max_tokens,
            chunk_size,
            min_examples_required,
            discover_entity_types,
            output,
        } => {
            let overrides = TuningOverrides {
                domain,
                selection_method,
                limit,
                language,
                max_tokens,
                chunk_size,
                min_examples_required,
                discover_entity_types,
                output,
            };
            cmd_tune(workspace, overrides).await
        }
        Command::Index { workspace, force } => cmd_index(workspace, force).await,
        Command::Query {
            query,
            workspace,
            method,
        } => cmd_query(&query, workspace, method).await,
        Command::Run {
            workspace,
            source,
            query,
            method,
            force_tune,
            force_index,
        } => cmd_run(workspace, source, query, method, force_tune, force_index).await,
        Command::Status { workspace, json } => cmd_status(workspace, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the workspace root: flag wins, then config, then default.
fn resolve_workspace(flag: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.defaults.workspace))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_init(workspace: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);

    if workspace::is_initialized(&ws) {
        println!("Workspace already initialized: {}", root.display());
        return Ok(());
    }

    info!(root = %root.display(), "initializing workspace");
    let cli = GraphRagCli::new(&config.runner, &root);
    cli.init()?;

    println!("Workspace initialized: {}", root.display());
    Ok(())
}

async fn cmd_ingest(
    source: &PathBuf,
    workspace: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    force: bool,
) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);

    let mut options = IngestOptions::from(&config.ingest);
    if let Some(size) = chunk_size {
        options.chunk_size = size;
    }
    if let Some(overlap) = chunk_overlap {
        options.chunk_overlap = overlap;
    }
    options.force = force;

    info!(source = %source.display(), input = %ws.input_dir().display(), "ingesting sources");
    let report = graphops_ingest::ingest_dir(source, &ws.input_dir(), &options)?;

    println!();
    println!("  Ingestion complete");
    println!("  Ingested: {} sources", report.sources_ingested);
    println!("  Skipped:  {} (unchanged)", report.sources_skipped);
    println!("  Failed:   {}", report.sources_failed);
    println!("  Chunks:   {} files written", report.chunks_written);
    println!();

    Ok(())
}

async fn cmd_split(
    dir: Option<PathBuf>,
    workspace: Option<PathBuf>,
    batch_size: Option<usize>,
    extension: &str,
    dry_run: bool,
) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let target = dir.unwrap_or_else(|| WorkspacePaths::new(&root).input_dir());

    let options = SplitOptions {
        batch_size: batch_size.unwrap_or(config.defaults.batch_size),
        extension: extension.to_string(),
    };

    let plan = plan_split(&target, &options)?;

    println!();
    println!(
        "  Split plan for {} ({} files, batch size {})",
        target.display(),
        plan.total_files(),
        options.batch_size
    );
    for group in &plan.groups {
        let total: usize = group.batches.iter().map(|b| b.files.len()).sum();
        println!("  - {}: {} files", group.prefix, total);
        for batch in &group.batches {
            println!("      {}/ ({} files)", batch.dir_name, batch.files.len());
        }
    }

    if dry_run {
        println!();
        println!("  Dry run: no files were moved.");
        println!();
        return Ok(());
    }

    let report = plan.execute()?;

    println!();
    println!(
        "  Moved {} files into {} directories.",
        report.files_moved,
        report.dirs.len()
    );
    println!();

    Ok(())
}

/// Tuning flag overrides applied on top of the config file.
struct TuningOverrides {
    domain: Option<String>,
    selection_method: Option<SelectionMethod>,
    limit: Option<usize>,
    language: Option<String>,
    max_tokens: Option<usize>,
    chunk_size: Option<usize>,
    min_examples_required: Option<usize>,
    discover_entity_types: Option<bool>,
    output: Option<String>,
}

async fn cmd_tune(workspace: Option<PathBuf>, overrides: TuningOverrides) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);

    if !workspace::is_initialized(&ws) {
        return Err(eyre!(
            "workspace '{}' is not initialized — run `graphops init` first",
            root.display()
        ));
    }

    let mut tuning = config.tuning.clone();
    if let Some(v) = overrides.domain {
        tuning.domain = v;
    }
    if let Some(v) = overrides.selection_method {
        tuning.selection_method = v;
    }
    if let Some(v) = overrides.limit {
        tuning.limit = v;
    }
    if let Some(v) = overrides.language {
        tuning.language = v;
    }
    if let Some(v) = overrides.max_tokens {
        tuning.max_tokens = v;
    }
    if let Some(v) = overrides.chunk_size {
        tuning.chunk_size = v;
    }
    if let Some(v) = overrides.min_examples_required {
        tuning.min_examples_required = v;
    }
    if let Some(v) = overrides.discover_entity_types {
        tuning.discover_entity_types = v;
    }
    if let Some(v) = overrides.output {
        tuning.output = v;
    }

    info!(domain = %tuning.domain, method = %tuning.selection_method, "running prompt tuning");

    let spinner = spinner("Tuning prompts");
    let cli = GraphRagCli::new(&config.runner, &root);
    let result = cli.prompt_tune(&tuning);
    spinner.finish_and_clear();
    let output = result?;

    println!();
    println!("  Prompt tuning complete");
    println!("  Prompts: {}", ws.prompts_dir(&tuning.output).display());
    println!("  Time:    {:.1}s", output.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_index(workspace: Option<PathBuf>, force: bool) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);

    if !workspace::is_initialized(&ws) {
        return Err(eyre!(
            "workspace '{}' is not initialized — run `graphops init` first",
            root.display()
        ));
    }

    let state = workspace::index_state(&ws);
    if state.is_complete() && !force {
        println!("Index output is already complete (use --force to re-run).");
        return Ok(());
    }

    let resume = matches!(state, IndexState::Incomplete { .. });
    if resume {
        info!("index output incomplete, resuming");
    }

    let spinner = spinner("Indexing");
    let cli = GraphRagCli::new(&config.runner, &root);
    let result = cli.index(resume);
    spinner.finish_and_clear();
    let output = result?;

    let after = workspace::index_state(&ws);
    println!();
    println!("  Indexing finished in {:.1}s", output.elapsed.as_secs_f64());
    match &after {
        IndexState::Complete => println!("  All output tables present."),
        IndexState::Incomplete { missing } => {
            println!("  Output still missing: {}", missing.join(", "));
        }
        IndexState::NotStarted => println!("  No output tables were produced."),
    }
    println!();

    Ok(())
}

async fn cmd_query(
    query: &str,
    workspace: Option<PathBuf>,
    method: Option<QueryMethod>,
) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);
    let method = method.unwrap_or(config.defaults.query_method);

    if !workspace::index_state(&ws).is_complete() {
        return Err(eyre!(
            "workspace '{}' has no complete index — run `graphops index` first",
            root.display()
        ));
    }

    info!(%method, "running query");

    let spinner = spinner("Querying");
    let cli = GraphRagCli::new(&config.runner, &root);
    let result = cli.query(method, query);
    spinner.finish_and_clear();
    let output = result?;

    println!();
    println!("{}", output.stdout.trim_end());
    println!();

    Ok(())
}

async fn cmd_run(
    workspace: Option<PathBuf>,
    source: Option<PathBuf>,
    query: Option<String>,
    method: Option<QueryMethod>,
    force_tune: bool,
    force_index: bool,
) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);

    let pipeline_config = PipelineConfig {
        workspace: root.clone(),
        source_dir: source,
        tuning: config.tuning.clone(),
        ingest: config.ingest.clone(),
        runner: config.runner.clone(),
        query,
        query_method: method.unwrap_or(config.defaults.query_method),
        force_tune,
        force_index,
    };

    info!(workspace = %root.display(), "starting full pipeline");

    let reporter = CliProgress::new();
    let result = run_pipeline(&pipeline_config, &reporter).await?;

    println!();
    println!("  Pipeline complete");
    println!("  Run:    {}", result.run_id);
    println!("  Init:   {}", outcome_label(result.init));
    if let Some(report) = &result.ingest {
        println!(
            "  Ingest: {} ingested, {} skipped, {} chunks",
            report.sources_ingested, report.sources_skipped, report.chunks_written
        );
    }
    println!("  Tune:   {}", outcome_label(result.tune));
    println!("  Index:  {}", outcome_label(result.index));
    match &result.index_state {
        IndexState::Complete => {}
        IndexState::Incomplete { missing } => {
            println!("  Missing tables: {}", missing.join(", "));
        }
        IndexState::NotStarted => println!("  No index output was produced."),
    }
    println!("  Time:   {:.1}s", result.elapsed.as_secs_f64());

    if let Some(answer) = &result.answer {
        println!();
        println!("{}", answer.trim_end());
    }
    println!();

    Ok(())
}

fn outcome_label(outcome: PhaseOutcome) -> &'static str {
    match outcome {
        PhaseOutcome::Ran => "ran",
        PhaseOutcome::Skipped => "skipped (already done)",
        PhaseOutcome::Failed => "failed (continued)",
    }
}

async fn cmd_status(workspace: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config()?;
    let root = resolve_workspace(workspace, &config);
    let ws = WorkspacePaths::new(&root);

    let status = workspace::inspect(&ws, &config.tuning.output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  Workspace:   {}", status.root);
    println!(
        "  Initialized: {}",
        if status.initialized { "yes" } else { "no" }
    );
    println!(
        "  Prompts:     {}",
        if status.prompts_ready {
            "ready"
        } else {
            "not tuned"
        }
    );
    println!("  Input files: {}", status.input_files);
    match &status.index {
        IndexState::Complete => println!("  Index:       complete"),
        IndexState::NotStarted => println!("  Index:       not started"),
        IndexState::Incomplete { missing } => {
            println!("  Index:       incomplete ({} tables missing)", missing.len());
            for table in missing {
                println!("               - {table}");
            }
        }
    }
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Starting"),
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Ingesting {label} ({index}/{total})"));
    }

    fn done(&self, _result: &PipelineResult) {
        self.spinner.finish_and_clear();
    }
}
