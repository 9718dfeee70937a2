//! Post-run collection of written examples into a single compact document.
//!
//! Two selections are supported: examples whose execution returned at least
//! one row, and examples whose execution returned an RDF graph (Turtle).
//! Selected examples are compacted (rows or text sample truncated) so the
//! collection stays small enough to ship as prompt context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use queryharvest_shared::{ExecutionResult, ExecutionStatus, HarvestError, QueryExample, Result};

use crate::writer::{ExampleWriter, write_atomic};

/// Which examples to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectKind {
    /// Succeeded with at least one result row.
    NonEmpty,
    /// Succeeded with a Turtle response body.
    Rdf,
}

impl CollectKind {
    /// Default compaction limit: rows for `NonEmpty`, characters for `Rdf`.
    pub fn default_limit(self) -> usize {
        match self {
            Self::NonEmpty => 25,
            Self::Rdf => 20_000,
        }
    }

    fn matches(self, execution: &ExecutionResult) -> bool {
        if execution.status != ExecutionStatus::Succeeded {
            return false;
        }
        match self {
            Self::NonEmpty => !execution.rows.is_empty(),
            Self::Rdf => {
                let turtle = execution
                    .content_type
                    .as_deref()
                    .is_some_and(|ct| ct.to_ascii_lowercase().contains("turtle"));
                turtle
                    && execution
                        .text_sample
                        .as_deref()
                        .is_some_and(|t| !t.trim().is_empty())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub kind: CollectKind,
    /// Overrides [`CollectKind::default_limit`].
    pub limit: Option<usize>,
}

/// What compaction did to one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compaction {
    /// Rows (non-empty) or text characters (rdf) before truncation.
    pub original_size: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedItem {
    #[serde(flatten)]
    pub example: QueryExample,
    pub compaction: Compaction,
}

/// The collection document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub generated_at: DateTime<Utc>,
    pub source_dir: String,
    pub kind: CollectKind,
    pub scanned_files: usize,
    pub matched: usize,
    pub limit: usize,
    /// Keyed by example id.
    pub items: BTreeMap<String, CollectedItem>,
}

/// Scan `dir` for `*.json` examples (sorted by name) and collect the matching ones.
/// Files that fail to parse are skipped.
#[instrument(skip_all, fields(dir = %dir.display(), kind = ?options.kind))]
pub fn collect(dir: &Path, options: CollectOptions) -> Result<Collection> {
    let limit = options.limit.unwrap_or(options.kind.default_limit());

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| HarvestError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut items = BTreeMap::new();
    for path in &paths {
        let example = match ExampleWriter::read(path) {
            Ok(example) => example,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let Some(execution) = &example.execution else {
            continue;
        };
        if !options.kind.matches(execution) {
            continue;
        }

        let item = compact(example, options.kind, limit);
        items.insert(item.example.id.clone(), item);
    }

    info!(scanned = paths.len(), matched = items.len(), limit, "collection built");

    Ok(Collection {
        generated_at: Utc::now(),
        source_dir: dir.display().to_string(),
        kind: options.kind,
        scanned_files: paths.len(),
        matched: items.len(),
        limit,
        items,
    })
}

fn compact(mut example: QueryExample, kind: CollectKind, limit: usize) -> CollectedItem {
    let mut compaction = Compaction {
        original_size: 0,
        truncated: false,
    };

    if let Some(execution) = example.execution.as_mut() {
        match kind {
            CollectKind::NonEmpty => {
                compaction.original_size = execution.rows.len();
                compaction.truncated = execution.rows.len() > limit;
                execution.rows.truncate(limit);
                execution.text_sample = None;
            }
            CollectKind::Rdf => {
                let text = execution.text_sample.take().unwrap_or_default();
                let text = text.trim();
                let kept: String = text.chars().take(limit).collect();
                compaction.original_size = text.chars().count();
                compaction.truncated = compaction.original_size > limit;
                execution.text_sample = Some(kept);
                execution.rows.clear();
            }
        }
    }

    CollectedItem {
        example,
        compaction,
    }
}

/// Write a collection as pretty JSON, creating parent directories.
pub fn write_collection(path: &Path, collection: &Collection) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(collection)
        .map_err(|e| HarvestError::Serialization(e.to_string()))?;
    json.push('\n');
    write_atomic(path, &json)?;
    info!(path = %path.display(), items = collection.matched, "wrote collection");
    Ok(())
}
