//! On-disk layout of a full extraction.

use crate::error::{SchemaError, SchemaResult};
use crate::indexer::write_index;
use crate::normalize::TablePattern;
use crate::object::{ObjectKind, SchemaObject};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Keep only objects whose name matches `pattern`.
pub fn filter_by_pattern(defs: Vec<SchemaObject>, pattern: &TablePattern) -> Vec<SchemaObject> {
    if pattern.is_any() {
        return defs;
    }
    defs.into_iter().filter(|d| pattern.matches(&d.name)).collect()
}

/// Non-zero object counts in kind order.
pub fn count_by_kind(defs: &[SchemaObject]) -> Vec<(ObjectKind, usize)> {
    ObjectKind::ALL
        .into_iter()
        .map(|kind| (kind, defs.iter().filter(|d| d.kind == kind).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

/// Whether `dir` exists and has at least one entry.
pub fn dir_has_entries(dir: &Path) -> SchemaResult<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(dir).map_err(|e| SchemaError::io(dir, e))?;
    Ok(entries.next().is_some())
}

/// Write each object under `out_dir`, then regenerate the index files.
///
/// With `separate`, objects go to per-kind subdirectories; otherwise all land
/// in `out_dir`. Returns the written file paths.
pub fn save_definitions(
    defs: &[SchemaObject],
    out_dir: &Path,
    separate: bool,
) -> SchemaResult<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| SchemaError::io(out_dir, e))?;

    if separate {
        let dirs: BTreeSet<&str> = ObjectKind::ALL.iter().map(|k| k.directory()).collect();
        for dir in dirs {
            let path = out_dir.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| SchemaError::io(&path, e))?;
        }
    }

    let mut written = Vec::with_capacity(defs.len());
    for def in defs {
        let path = out_dir.join(def.relative_path(separate));
        let mut content = def.ddl.clone();
        if !content.ends_with('\n') {
            content.push('\n');
        }
        std::fs::write(&path, content).map_err(|e| SchemaError::io(&path, e))?;
        written.push(path);
    }

    write_index(defs, out_dir, separate)?;
    tracing::debug!(count = written.len(), dir = %out_dir.display(), "definitions saved");
    Ok(written)
}
