//! HTML corpus ingestion for GraphOps.
//!
//! Reads HTML source files (with legacy-encoding fallback), splits them
//! into heading-delimited sections, chunks each section to a configured
//! size, and writes numbered `.txt` chunk files into the workspace input
//! directory. A manifest of source content hashes lets re-runs skip
//! sources that have not changed.

pub mod sections;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use graphops_shared::{GraphOpsError, IngestConfig, Result};

pub use sections::{Section, chunk_sections, split_sections};

/// Manifest file name, written inside the input directory.
const MANIFEST_FILE_NAME: &str = ".graphops-ingest.json";

/// Source extensions considered for ingestion.
const SOURCE_EXTENSIONS: [&str; 2] = ["htm", "html"];

// ---------------------------------------------------------------------------
// Options & report
// ---------------------------------------------------------------------------

/// Runtime ingestion options.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Maximum characters per chunk file.
    pub chunk_size: usize,
    /// Character overlap between adjacent chunks.
    pub chunk_overlap: usize,
    /// Re-ingest sources even when their content hash is unchanged.
    pub force: bool,
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            force: false,
        }
    }
}

/// Outcome of an [`ingest_dir`] run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Sources converted to chunk files in this run.
    pub sources_ingested: usize,
    /// Sources skipped because their content hash was unchanged.
    pub sources_skipped: usize,
    /// Sources that failed to parse (logged and skipped).
    pub sources_failed: usize,
    /// Total chunk files written in this run.
    pub chunks_written: usize,
}

// ---------------------------------------------------------------------------
// Ingest manifest
// ---------------------------------------------------------------------------

/// Per-source record in the ingest manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    /// SHA-256 of the raw source bytes.
    pub content_hash: String,
    /// Number of chunk files written for this source.
    pub chunk_count: usize,
    /// When the source was last ingested.
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

/// The `.graphops-ingest.json` structure, keyed by source file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestManifest {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,
}

impl IngestManifest {
    /// Load the manifest from an input directory. Missing file means empty.
    pub fn load(input_dir: &Path) -> Result<Self> {
        let path = input_dir.join(MANIFEST_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| GraphOpsError::io(&path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| GraphOpsError::parse(format!("invalid ingest manifest: {e}")))
    }

    /// Write the manifest into the input directory.
    pub fn save(&self, input_dir: &Path) -> Result<()> {
        let path = input_dir.join(MANIFEST_FILE_NAME);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GraphOpsError::parse(format!("manifest serialization: {e}")))?;
        std::fs::write(&path, content).map_err(|e| GraphOpsError::io(&path, e))
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Read a source file as text: strict UTF-8 first, then windows-1252
/// (which also covers latin-1 / iso-8859-1 input).
pub fn read_with_fallback(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| GraphOpsError::io(path, e))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            let bytes = err.into_bytes();
            let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&bytes);
            if had_errors {
                return Err(GraphOpsError::Decode {
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "decoded with windows-1252 fallback");
            Ok(text.into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Ingest a single HTML file, writing `<stem>_chunk_NNN.txt` files into
/// `input_dir`. Returns the number of chunks written.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn ingest_file(source: &Path, input_dir: &Path, options: &IngestOptions) -> Result<usize> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| {
            GraphOpsError::validation(format!("'{}' has no file stem", source.display()))
        })?;

    let html = read_with_fallback(source)?;
    let sections = split_sections(&html);
    let chunks = chunk_sections(&sections, options.chunk_size, options.chunk_overlap)?;

    for (i, chunk) in chunks.iter().enumerate() {
        let path = input_dir.join(format!("{stem}_chunk_{i:03}.txt"));
        std::fs::write(&path, chunk).map_err(|e| GraphOpsError::io(&path, e))?;
    }

    debug!(chunks = chunks.len(), "source ingested");
    Ok(chunks.len())
}

/// Ingest every `.htm`/`.html` file in `source_dir` into `input_dir`.
///
/// Sources whose content hash matches the manifest are skipped unless
/// `options.force` is set. A source that fails to ingest is logged and
/// skipped; the run continues with the next file.
pub fn ingest_dir(source_dir: &Path, input_dir: &Path, options: &IngestOptions) -> Result<IngestReport> {
    ingest_dir_with_progress(source_dir, input_dir, options, &mut |_, _, _| {})
}

/// [`ingest_dir`] with a per-source callback: invoked with the source file
/// name, its 1-based position, and the total number of sources.
#[instrument(skip_all, fields(source = %source_dir.display(), input = %input_dir.display()))]
pub fn ingest_dir_with_progress(
    source_dir: &Path,
    input_dir: &Path,
    options: &IngestOptions,
    on_source: &mut dyn FnMut(&str, usize, usize),
) -> Result<IngestReport> {
    if !source_dir.is_dir() {
        return Err(GraphOpsError::validation(format!(
            "'{}' is not a directory",
            source_dir.display()
        )));
    }
    std::fs::create_dir_all(input_dir).map_err(|e| GraphOpsError::io(input_dir, e))?;

    let mut manifest = IngestManifest::load(input_dir)?;
    let mut report = IngestReport::default();

    let sources = source_files(source_dir)?;
    let total = sources.len();
    for (i, source) in sources.into_iter().enumerate() {
        let name = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        on_source(&name, i + 1, total);

        let bytes = match std::fs::read(&source) {
            Ok(b) => b,
            Err(e) => {
                warn!(source = %source.display(), error = %e, "failed to read source, skipping");
                report.sources_failed += 1;
                continue;
            }
        };
        let hash = content_hash(&bytes);

        let unchanged = manifest
            .sources
            .get(&name)
            .is_some_and(|entry| entry.content_hash == hash);
        if unchanged && !options.force {
            debug!(source = %name, "unchanged, skipping");
            report.sources_skipped += 1;
            continue;
        }

        let previous_chunks = manifest
            .sources
            .get(&name)
            .map(|entry| entry.chunk_count)
            .unwrap_or(0);

        match ingest_file(&source, input_dir, options) {
            Ok(chunk_count) => {
                // A shrunken source must not leave its old higher-numbered
                // chunk files behind to be indexed alongside the new ones.
                remove_stale_chunks(input_dir, &source, chunk_count, previous_chunks)?;
                manifest.sources.insert(
                    name,
                    SourceEntry {
                        content_hash: hash,
                        chunk_count,
                        ingested_at: chrono::Utc::now(),
                    },
                );
                report.sources_ingested += 1;
                report.chunks_written += chunk_count;
            }
            Err(e) => {
                warn!(source = %name, error = %e, "ingestion failed, continuing");
                report.sources_failed += 1;
            }
        }
    }

    manifest.save(input_dir)?;

    info!(
        ingested = report.sources_ingested,
        skipped = report.sources_skipped,
        failed = report.sources_failed,
        chunks = report.chunks_written,
        "ingestion complete"
    );

    Ok(report)
}

/// Delete chunk files numbered `from..to` left over from a previous run
/// of the same source.
fn remove_stale_chunks(input_dir: &Path, source: &Path, from: usize, to: usize) -> Result<()> {
    let Some(stem) = source.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return Ok(());
    };
    for i in from..to {
        let path = input_dir.join(format!("{stem}_chunk_{i:03}.txt"));
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(GraphOpsError::io(&path, e)),
        }
    }
    Ok(())
}

/// Enumerate HTML sources in a directory, sorted by name.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| GraphOpsError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| GraphOpsError::io(dir, e))?;
        let path = entry.path();
        let is_source = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)));
        if is_source {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
