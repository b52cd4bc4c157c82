//! Shared types, error model, and configuration for GraphOps.
//!
//! This crate is the foundation depended on by all other GraphOps crates.
//! It provides:
//! - [`GraphOpsError`] — the unified error type
//! - Domain types ([`RunId`], [`WorkspacePaths`], [`IndexState`], method enums)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, IngestConfig, RunnerConfig, TuningConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GraphOpsError, Result};
pub use types::{IndexState, QueryMethod, RunId, SelectionMethod, WorkspacePaths};
