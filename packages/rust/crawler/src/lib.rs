//! Catalog crawling: throttled HTTP access, catalog listing and detail extraction.
//!
//! This crate provides:
//! - [`http`]: Rate-limited, retrying HTTP client (the only network access point)
//! - [`catalog`]: Paginated catalog lister producing [`CatalogEntry`] values
//! - [`extract`]: Strategy-based detail extraction into [`QueryExample`]
//!
//! [`CatalogEntry`]: queryharvest_shared::CatalogEntry
//! [`QueryExample`]: queryharvest_shared::QueryExample

pub mod catalog;
pub mod extract;
pub mod http;

pub use catalog::{CatalogLister, CatalogPager, dedupe};
pub use extract::{
    DetailDocument, DetailExtractor, SPARQL_STRATEGIES, Strategy, TextOrigin, clean_sparql,
};
pub use http::{HttpClient, RetryPolicy, Throttle};
