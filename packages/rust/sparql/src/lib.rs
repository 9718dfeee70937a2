//! SPARQL execution for harvested examples.
//!
//! - [`QueryExecutor`]: the seam the pipeline executes through
//! - [`SparqlExecutor`]: HTTP implementation against a single endpoint
//! - [`results`]: decoding of endpoint responses into [`ExecutionResult`]
//!
//! [`ExecutionResult`]: queryharvest_shared::ExecutionResult

pub mod executor;
pub mod results;

pub use executor::{QueryExecutor, SparqlExecutor};
