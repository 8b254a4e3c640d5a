//! Shared types, error model, configuration and progress reporting for
//! confluence-export.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`ExportError`], the unified error type
//! - Domain types ([`PageRecord`], [`DiscoveredNode`], [`FetchFailure`])
//! - Configuration ([`AppConfig`], [`ExportSettings`], config discovery and loading)
//! - The [`ProgressObserver`] seam used by the fetch engine and exporters

pub mod config;
pub mod error;
pub mod progress;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AdvancedSection, AppConfig, AuthSection, CONFIG_FILE_NAMES, DEFAULT_CONFIG_FILE,
    DEFAULT_OUTPUT_DIR, DEFAULT_WORKERS, ExportSection, ExportSettings, PagesSection,
    find_config_file, load_config, load_config_from, save_config,
};
pub use error::{ExportError, Result};
pub use progress::{ProgressEvent, ProgressObserver, SilentProgress};
pub use types::{DiscoveredNode, FetchFailure, PageRecord};
