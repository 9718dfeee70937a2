//! One JSON file per example under the output directory.
//!
//! Files are named `<sanitized-id>.json` and written whole: the document goes
//! to a temporary sibling first and is renamed over the target, so readers
//! never observe a partial file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use queryharvest_shared::{HarvestError, QueryExample, Result};

/// Filesystem-safe file stem for an example id: ASCII alphanumerics, `-` and
/// `_` are kept, everything else becomes `_`.
pub fn sanitize_id(id: &str) -> String {
    let stem: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.is_empty() { "entry".to_string() } else { stem }
}

/// Write `contents` to `path` via a temp file + rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{name}.{}.tmp", Uuid::now_v7()));

    std::fs::write(&temp, contents).map_err(|e| HarvestError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        HarvestError::io(path, e)
    })
}

/// Writes examples into a single output directory.
#[derive(Debug)]
pub struct ExampleWriter {
    dir: PathBuf,
    /// File stem → id that produced it, for collision warnings within a run.
    written: HashMap<String, String>,
}

impl ExampleWriter {
    /// Create the output directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;
        info!(dir = %dir.display(), "output directory ready");
        Ok(Self {
            dir,
            written: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Target path for an example id.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(id)))
    }

    /// Serialize and write `example`, replacing any previous file of the same name.
    #[instrument(skip_all, fields(id = %example.id))]
    pub fn write(&mut self, example: &QueryExample) -> Result<PathBuf> {
        let stem = sanitize_id(&example.id);
        if let Some(previous) = self.written.get(&stem) {
            if previous != &example.id {
                warn!(%previous, file = %stem, "two ids map to the same file; later one wins");
            }
        }

        let mut json = serde_json::to_string_pretty(example)
            .map_err(|e| HarvestError::Serialization(format!("{}: {e}", example.id)))?;
        json.push('\n');

        let target = self.path_for(&example.id);
        write_atomic(&target, &json)?;
        self.written.insert(stem, example.id.clone());

        debug!(path = %target.display(), bytes = json.len(), "wrote example");
        Ok(target)
    }

    /// Load a previously written example.
    pub fn read(path: &Path) -> Result<QueryExample> {
        let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| HarvestError::Serialization(format!("{}: {e}", path.display())))
    }
}
