//! Filesystem output for harvested examples.
//!
//! - [`writer`]: one pretty-printed JSON document per example, written atomically.
//! - [`collect`]: post-run scan of an output directory into a compact collection.

pub mod collect;
pub mod writer;

pub use collect::{
    CollectKind, CollectOptions, CollectedItem, Collection, Compaction, collect, write_collection,
};
pub use writer::{ExampleWriter, sanitize_id};
