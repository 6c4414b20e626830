//! Shared types, error model, and configuration for scubuild.
//!
//! This crate is the foundation depended on by all other scubuild crates.
//! It provides:
//! - [`ScuBuildError`], the unified error type
//! - Domain types ([`ModuleSpec`], [`ModuleTable`], [`IncludeEntry`], [`ScuFolders`],
//!   [`GenerationReport`])
//! - Configuration ([`AppConfig`], module table loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, load_module_table, write_module_table,
};
pub use error::{Result, ScuBuildError};
pub use types::{
    CURRENT_REPORT_VERSION, GenerationReport, IncludeEntry, ModuleOutcome, ModuleReport,
    ModuleSpec, ModuleTable, ScuFolders, UnitKind, UnitRecord,
};
