//! Prefix batch splitter.
//!
//! Groups the files of a flat input directory by the portion of each
//! filename before its first underscore, then partitions every group into
//! subdirectories holding at most `batch_size` files. Planning is pure and
//! separate from execution so callers can inspect (or print) the plan
//! before any file is moved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use graphops_shared::{GraphOpsError, Result};

/// Options controlling a split run.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Maximum number of files per destination subdirectory.
    pub batch_size: usize,
    /// Only files with this extension are considered (no leading dot).
    pub extension: String,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            batch_size: 7_500,
            extension: "txt".into(),
        }
    }
}

/// One planned destination subdirectory and the files bound for it.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    /// Subdirectory name, created under the input directory.
    pub dir_name: String,
    /// Source files to move, in deterministic (sorted) order.
    pub files: Vec<PathBuf>,
}

/// All planned batches for one prefix group.
#[derive(Debug, Clone)]
pub struct GroupPlan {
    /// Grouping key shared by every file in the group.
    pub prefix: String,
    /// Destination batches, at most `batch_size` files each.
    pub batches: Vec<PlannedBatch>,
}

/// A complete, not-yet-executed split of an input directory.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Directory whose files will be reorganized in place.
    pub input_dir: PathBuf,
    /// Per-prefix plans, ordered by prefix.
    pub groups: Vec<GroupPlan>,
}

/// Summary of one created subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub dir_name: String,
    pub file_count: usize,
}

/// Outcome of executing a [`SplitPlan`].
#[derive(Debug, Clone)]
pub struct SplitReport {
    /// Created subdirectories with their final file counts.
    pub dirs: Vec<BatchSummary>,
    /// Total number of files moved.
    pub files_moved: usize,
}

/// Derive the grouping key for a filename: the portion before the first
/// underscore, or the file stem when the name has no underscore or the
/// prefix would be empty (a leading underscore).
pub fn group_key(file_name: &str) -> String {
    match file_name.split_once('_') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string()),
    }
}

/// Build a split plan for `input_dir` without touching the filesystem
/// beyond enumeration.
///
/// Files are sorted by name before chunking, so the plan is deterministic
/// for a given directory state.
#[instrument(skip_all, fields(dir = %input_dir.display(), batch_size = options.batch_size))]
pub fn plan_split(input_dir: &Path, options: &SplitOptions) -> Result<SplitPlan> {
    if options.batch_size == 0 {
        return Err(GraphOpsError::validation("batch size must be at least 1"));
    }
    if !input_dir.is_dir() {
        return Err(GraphOpsError::validation(format!(
            "'{}' is not a directory",
            input_dir.display()
        )));
    }

    // Group matching files by prefix. BTreeMap keeps prefix order stable.
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    let entries = std::fs::read_dir(input_dir).map_err(|e| GraphOpsError::io(input_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| GraphOpsError::io(input_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches_ext = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(options.extension.as_str()));
        if !matches_ext {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        groups.entry(group_key(&name)).or_default().push(path);
    }

    let mut plan_groups = Vec::with_capacity(groups.len());
    for (prefix, mut files) in groups {
        files.sort();
        let total = files.len();
        let batches = if total <= options.batch_size {
            vec![PlannedBatch {
                dir_name: prefix.clone(),
                files,
            }]
        } else {
            files
                .chunks(options.batch_size)
                .enumerate()
                .map(|(i, chunk)| PlannedBatch {
                    dir_name: format!("{prefix}_part{}", i + 1),
                    files: chunk.to_vec(),
                })
                .collect()
        };

        debug!(prefix, total, batches = batches.len(), "planned group");
        plan_groups.push(GroupPlan { prefix, batches });
    }

    Ok(SplitPlan {
        input_dir: input_dir.to_path_buf(),
        groups: plan_groups,
    })
}

impl SplitPlan {
    /// Total number of files covered by the plan.
    pub fn total_files(&self) -> usize {
        self.groups
            .iter()
            .map(|g| g.batches.iter().map(|b| b.files.len()).sum::<usize>())
            .sum()
    }

    /// Number of destination subdirectories the plan will create.
    pub fn dir_count(&self) -> usize {
        self.groups.iter().map(|g| g.batches.len()).sum()
    }

    /// Execute the plan: create destination subdirectories and move files
    /// into them.
    ///
    /// Each batch is checked for destination collisions before any of its
    /// files move. Moves are plain renames with no rollback: a failure
    /// mid-run leaves already-moved files in their new locations.
    #[instrument(skip(self), fields(dir = %self.input_dir.display(), files = self.total_files()))]
    pub fn execute(&self) -> Result<SplitReport> {
        let mut dirs = Vec::with_capacity(self.dir_count());
        let mut files_moved = 0;

        for group in &self.groups {
            for batch in &group.batches {
                let dest_dir = self.input_dir.join(&batch.dir_name);
                std::fs::create_dir_all(&dest_dir)
                    .map_err(|e| GraphOpsError::io(&dest_dir, e))?;

                // Fail before moving anything in this batch if a name is taken.
                for file in &batch.files {
                    let dest = dest_dir.join(file_name_of(file)?);
                    if dest.exists() {
                        return Err(GraphOpsError::validation(format!(
                            "destination '{}' already exists",
                            dest.display()
                        )));
                    }
                }

                for file in &batch.files {
                    let dest = dest_dir.join(file_name_of(file)?);
                    std::fs::rename(file, &dest).map_err(|e| GraphOpsError::io(file, e))?;
                    files_moved += 1;
                }

                info!(
                    dir = %batch.dir_name,
                    files = batch.files.len(),
                    "batch directory populated"
                );
                dirs.push(BatchSummary {
                    dir_name: batch.dir_name.clone(),
                    file_count: batch.files.len(),
                });
            }
        }

        Ok(SplitReport { dirs, files_moved })
    }
}

fn file_name_of(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        GraphOpsError::validation(format!("'{}' has no file name", path.display()))
    })
}
