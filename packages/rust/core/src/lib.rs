//! Pipeline orchestration for QueryHarvest.
//!
//! Ties catalog listing, detail extraction, query execution and the example
//! writer together into a single sequential run ([`pipeline::run_harvest`]).

pub mod pipeline;

pub use pipeline::{
    EntryFailure, EntryOutcome, HarvestSummary, ProgressReporter, SilentProgress, Stage,
    run_harvest,
};
