//! Shared types, error model, and configuration for QueryHarvest.
//!
//! This crate is the foundation depended on by all other QueryHarvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`CatalogEntry`], [`QueryExample`], [`ExecutionResult`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, HttpConfig, OutputConfig, PipelineConfig, RequestFormat,
    SparqlConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use types::{
    CatalogEntry, DatasetContext, ExecutionResult, ExecutionStatus, QueryExample, RdfTerm, Row,
};
