//! Per-table reconciliation verdicts between local files and the remote catalog.

use crate::local::LocalSchemaFile;
use crate::normalize::{TablePattern, comparison_key};
use crate::object::SchemaObject;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What a sync run should do with one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// File exists locally only. Reported, left for the orphan sweep.
    LocalOnly,
    /// Table exists remotely only. Write a new local file.
    RemoteOnly,
    /// Same DDL modulo formatting. No action, no output.
    Identical,
    /// The local file was edited after the remote change. Generate a migration.
    LocalNewer,
    /// The remote changed after the file's provenance timestamp. Overwrite without asking.
    RemoteNewer,
    /// Content differs but neither side is strictly newer. Overwrite after confirmation.
    Ambiguous,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalOnly => "local only",
            Self::RemoteOnly => "remote only",
            Self::Identical => "identical",
            Self::LocalNewer => "local newer",
            Self::RemoteNewer => "remote newer",
            Self::Ambiguous => "ambiguous",
        };
        f.write_str(s)
    }
}

/// Decide one table. `None` when neither side has it.
///
/// The timestamp checks are deliberately asymmetric: the local side is
/// compared by file mtime first, then the remote side against the
/// provenance timestamp embedded in the file.
pub fn decide(local: Option<&LocalSchemaFile>, remote: Option<&SchemaObject>) -> Option<Verdict> {
    match (local, remote) {
        (None, None) => None,
        (Some(_), None) => Some(Verdict::LocalOnly),
        (None, Some(_)) => Some(Verdict::RemoteOnly),
        (Some(local), Some(remote)) => {
            if comparison_key(&local.raw_ddl) == comparison_key(&remote.ddl) {
                return Some(Verdict::Identical);
            }
            let is_local_file_newer = local.file_timestamp > remote.timestamp;
            let is_remote_newer = remote.timestamp > local.embedded_timestamp;
            Some(if is_local_file_newer {
                Verdict::LocalNewer
            } else if is_remote_newer {
                Verdict::RemoteNewer
            } else {
                Verdict::Ambiguous
            })
        }
    }
}

/// Sorted union of local and remote table names that match `pattern`.
pub fn table_names(
    local: &BTreeMap<String, LocalSchemaFile>,
    remote: &BTreeMap<String, SchemaObject>,
    pattern: &TablePattern,
) -> Vec<String> {
    local
        .keys()
        .chain(remote.keys())
        .filter(|name| pattern.matches(name))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Verdict for every table in `local ∪ remote` matching `pattern`.
pub fn reconcile(
    local: &BTreeMap<String, LocalSchemaFile>,
    remote: &BTreeMap<String, SchemaObject>,
    pattern: &TablePattern,
) -> BTreeMap<String, Verdict> {
    table_names(local, remote, pattern)
        .into_iter()
        .filter_map(|name| {
            let verdict = decide(local.get(&name), remote.get(&name))?;
            Some((name, verdict))
        })
        .collect()
}
