//! Schema file writes with provenance headers and backup-before-overwrite.
//!
//! Every overwrite moves the previous file into `<dir>/backup/` first. The move
//! and the following write are not atomic as a pair.

use crate::error::{SchemaError, SchemaResult};
use crate::local::list_sql_files;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Name of the backup subdirectory inside a schema directory.
pub const BACKUP_DIR: &str = "backup";

/// Third provenance header line.
pub const GENERATED_WARNING: &str =
    "-- ⚠️  This file is generated by supatool. Manual edits may be lost on the next sync.";

/// Answer to an overwrite prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    /// Yes, and stop asking for the rest of this run.
    All,
}

/// A question put to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub message: String,
    /// Lines printed before the question.
    pub details: Vec<String>,
    /// Whether `All` is an accepted answer.
    pub allow_all: bool,
}

/// Source of overwrite decisions.
///
/// Returning `Err(SchemaError::Cancelled)` aborts the whole run.
pub trait Confirmer {
    fn confirm(&mut self, prompt: &Prompt) -> SchemaResult<Confirmation>;
}

/// Confirmer that replays canned answers and records every prompt.
///
/// Answers `No` once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<Confirmation>,
    prompts: Vec<Prompt>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = Confirmation>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&mut self, prompt: &Prompt) -> SchemaResult<Confirmation> {
        self.prompts.push(prompt.clone());
        Ok(self.answers.pop_front().unwrap_or(Confirmation::No))
    }
}

/// Per-run confirmation state. Build one per sync run.
pub struct SyncSession<'c> {
    approve_all: bool,
    confirmer: &'c mut dyn Confirmer,
}

impl<'c> SyncSession<'c> {
    pub fn new(confirmer: &'c mut dyn Confirmer) -> Self {
        Self {
            approve_all: false,
            confirmer,
        }
    }

    pub fn approve_all(&self) -> bool {
        self.approve_all
    }

    /// Ask whether `file_name` may be overwritten. `force` and approve-all skip the prompt.
    pub fn confirm_overwrite(&mut self, file_name: &str, force: bool) -> SchemaResult<bool> {
        if force || self.approve_all {
            return Ok(true);
        }
        let prompt = Prompt {
            message: format!("Overwrite existing file {file_name}?"),
            details: Vec::new(),
            allow_all: true,
        };
        match self.confirmer.confirm(&prompt)? {
            Confirmation::Yes => Ok(true),
            Confirmation::All => {
                self.approve_all = true;
                tracing::info!("approving all remaining overwrites for this run");
                Ok(true)
            }
            Confirmation::No => Ok(false),
        }
    }

    fn confirm(&mut self, prompt: &Prompt) -> SchemaResult<Confirmation> {
        self.confirmer.confirm(prompt)
    }
}

/// One table file to be written by sync.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFile<'a> {
    pub table: &'a str,
    pub file_name: &'a str,
    pub ddl: &'a str,
    /// Remote "last updated", unix seconds.
    pub remote_timestamp: i64,
}

/// ISO 8601 with milliseconds and a `Z` suffix.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The full file body: four header lines, a blank line, then the DDL.
pub fn render_schema_file(file: &SchemaFile<'_>, synced_at: DateTime<Utc>) -> String {
    let remote = DateTime::from_timestamp(file.remote_timestamp, 0).unwrap_or_default();
    format!(
        "-- Remote last updated: {}\n-- Synced by supatool at: {}\n{}\n-- Table: {}\n\n{}",
        iso_millis(remote),
        iso_millis(synced_at),
        GENERATED_WARNING,
        file.table,
        file.ddl,
    )
}

/// Write `file` into `dir`, backing up any existing file first.
///
/// Returns `Ok(false)` when the operator declined the overwrite.
pub fn write_schema_file(
    session: &mut SyncSession<'_>,
    dir: &Path,
    file: &SchemaFile<'_>,
    force: bool,
) -> SchemaResult<bool> {
    std::fs::create_dir_all(dir).map_err(|e| SchemaError::io(dir, e))?;
    let path = dir.join(file.file_name);

    if path.exists() {
        if !session.confirm_overwrite(file.file_name, force)? {
            tracing::info!(table = file.table, "skipped");
            return Ok(false);
        }
        backup_existing_file(dir, &path, Utc::now())?;
    }

    let content = render_schema_file(file, Utc::now());
    std::fs::write(&path, content).map_err(|e| SchemaError::io(&path, e))?;
    tracing::info!(table = file.table, path = %path.display(), "schema file written");
    Ok(true)
}

fn backup_stamp(at: DateTime<Utc>) -> String {
    iso_millis(at).replace([':', '.'], "-")
}

/// Move `path` to `<dir>/backup/<timestamp>_<file name>`.
///
/// Returns `None` when `path` does not exist.
pub fn backup_existing_file(
    dir: &Path,
    path: &Path,
    at: DateTime<Utc>,
) -> SchemaResult<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup_dir = dir.join(BACKUP_DIR);
    std::fs::create_dir_all(&backup_dir).map_err(|e| SchemaError::io(&backup_dir, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SchemaError::Other(format!("not a file path: {}", path.display())))?;
    let stamp = backup_stamp(at);

    let mut target = backup_dir.join(format!("{stamp}_{file_name}"));
    let mut n = 1;
    while target.exists() {
        target = backup_dir.join(format!("{stamp}-{n}_{file_name}"));
        n += 1;
    }

    std::fs::rename(path, &target).map_err(|e| SchemaError::io(path, e))?;
    tracing::info!(from = %path.display(), to = %target.display(), "backed up existing file");
    Ok(Some(target))
}

/// `.sql` files in `dir` whose stem is not a remote table name.
pub fn find_orphans(dir: &Path, remote_names: &BTreeSet<String>) -> SchemaResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let orphans = list_sql_files(dir)?
        .into_iter()
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| !remote_names.contains(stem))
        })
        .collect();
    Ok(orphans)
}

/// Move every orphaned file into the backup directory.
///
/// Without `force`, one aggregate confirmation covers all of them.
pub fn backup_orphaned_files(
    session: &mut SyncSession<'_>,
    dir: &Path,
    remote_names: &BTreeSet<String>,
    force: bool,
) -> SchemaResult<Vec<PathBuf>> {
    let orphans = find_orphans(dir, remote_names)?;
    if orphans.is_empty() {
        return Ok(Vec::new());
    }

    if !force {
        let prompt = Prompt {
            message: "Move these files to the backup folder?".to_string(),
            details: std::iter::once(
                "The following files have no matching remote table:".to_string(),
            )
            .chain(orphans.iter().map(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                format!("  - {name}")
            }))
            .collect(),
            allow_all: false,
        };
        if session.confirm(&prompt)? == Confirmation::No {
            tracing::info!(count = orphans.len(), "orphaned files left in place");
            return Ok(Vec::new());
        }
    }

    let mut moved = Vec::with_capacity(orphans.len());
    for path in &orphans {
        if let Some(target) = backup_existing_file(dir, path, Utc::now())? {
            moved.push(target);
        }
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("supatool-writer-test-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn orders() -> SchemaFile<'static> {
        SchemaFile {
            table: "orders",
            file_name: "orders.sql",
            ddl: "CREATE TABLE orders (id uuid);",
            remote_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn header_lines_are_in_order() {
        let at = DateTime::from_timestamp(1_700_000_100, 0).expect("ts");
        let body = render_schema_file(&orders(), at);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "-- Remote last updated: 2023-11-14T22:13:20.000Z");
        assert_eq!(lines[1], "-- Synced by supatool at: 2023-11-14T22:15:00.000Z");
        assert_eq!(lines[2], GENERATED_WARNING);
        assert_eq!(lines[3], "-- Table: orders");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "CREATE TABLE orders (id uuid);");
    }

    #[test]
    fn new_file_is_written_without_prompt() {
        let dir = make_temp_dir();
        let mut confirmer = ScriptedConfirmer::default();
        let mut session = SyncSession::new(&mut confirmer);

        assert!(write_schema_file(&mut session, &dir, &orders(), false).expect("write"));
        let content = std::fs::read_to_string(dir.join("orders.sql")).expect("read");
        assert!(content.ends_with("CREATE TABLE orders (id uuid);"));
        assert!(confirmer.prompts().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn declined_overwrite_keeps_the_file() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("orders.sql"), "old").expect("write");
        let mut confirmer = ScriptedConfirmer::new([Confirmation::No]);
        let mut session = SyncSession::new(&mut confirmer);

        assert!(!write_schema_file(&mut session, &dir, &orders(), false).expect("write"));
        assert_eq!(std::fs::read_to_string(dir.join("orders.sql")).expect("read"), "old");
        assert!(!dir.join(BACKUP_DIR).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn approve_all_silences_later_prompts() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("a.sql"), "old a").expect("write");
        std::fs::write(dir.join("b.sql"), "old b").expect("write");
        let mut confirmer = ScriptedConfirmer::new([Confirmation::All]);
        {
            let mut session = SyncSession::new(&mut confirmer);
            for name in ["a", "b"] {
                let file_name = format!("{name}.sql");
                let file = SchemaFile {
                    table: name,
                    file_name: &file_name,
                    ddl: "CREATE TABLE x (id int);",
                    remote_timestamp: 0,
                };
                assert!(write_schema_file(&mut session, &dir, &file, false).expect("write"));
            }
            assert!(session.approve_all());
        }
        assert_eq!(confirmer.prompts().len(), 1);
        assert!(confirmer.prompts()[0].allow_all);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cancellation_propagates() {
        struct CtrlC;
        impl Confirmer for CtrlC {
            fn confirm(&mut self, _: &Prompt) -> SchemaResult<Confirmation> {
                Err(SchemaError::Cancelled)
            }
        }

        let dir = make_temp_dir();
        std::fs::write(dir.join("orders.sql"), "old").expect("write");
        let mut confirmer = CtrlC;
        let mut session = SyncSession::new(&mut confirmer);
        let err = write_schema_file(&mut session, &dir, &orders(), false).unwrap_err();
        assert!(matches!(err, SchemaError::Cancelled));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn backup_keeps_original_content_and_avoids_collisions() {
        let dir = make_temp_dir();
        let at = DateTime::from_timestamp(1_700_000_000, 0).expect("ts");

        std::fs::write(dir.join("t.sql"), "first").expect("write");
        let first = backup_existing_file(&dir, &dir.join("t.sql"), at)
            .expect("backup")
            .expect("moved");
        std::fs::write(dir.join("t.sql"), "second").expect("write");
        let second = backup_existing_file(&dir, &dir.join("t.sql"), at)
            .expect("backup")
            .expect("moved");

        assert_eq!(
            first.file_name().and_then(|n| n.to_str()),
            Some("2023-11-14T22-13-20-000Z_t.sql")
        );
        assert_eq!(
            second.file_name().and_then(|n| n.to_str()),
            Some("2023-11-14T22-13-20-000Z-1_t.sql")
        );
        assert_eq!(std::fs::read_to_string(&first).expect("read"), "first");
        assert_eq!(std::fs::read_to_string(&second).expect("read"), "second");
        assert!(!dir.join("t.sql").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn backups_sort_chronologically() {
        let early = backup_stamp(DateTime::from_timestamp(1_600_000_000, 0).expect("ts"));
        let late = backup_stamp(DateTime::from_timestamp(1_700_000_000, 0).expect("ts"));
        assert!(format!("{early}_t.sql") < format!("{late}_t.sql"));
    }

    #[test]
    fn orphans_are_exactly_the_unmatched_files() {
        let dir = make_temp_dir();
        for name in ["users", "legacy", "old_audit"] {
            std::fs::write(dir.join(format!("{name}.sql")), "x").expect("write");
        }
        std::fs::write(dir.join("readme.md"), "x").expect("write");
        let remote: BTreeSet<String> = ["users", "posts"].iter().map(|s| s.to_string()).collect();

        let orphans = find_orphans(&dir, &remote).expect("scan");
        assert_eq!(orphans, vec![dir.join("legacy.sql"), dir.join("old_audit.sql")]);

        let mut confirmer = ScriptedConfirmer::new([Confirmation::Yes]);
        let moved = {
            let mut session = SyncSession::new(&mut confirmer);
            backup_orphaned_files(&mut session, &dir, &remote, false).expect("sweep")
        };
        assert_eq!(moved.len(), 2);
        assert_eq!(confirmer.prompts().len(), 1);
        assert!(!confirmer.prompts()[0].allow_all);
        assert!(dir.join("users.sql").exists());
        assert!(!dir.join("legacy.sql").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn declined_orphan_sweep_moves_nothing() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("legacy.sql"), "x").expect("write");
        let mut confirmer = ScriptedConfirmer::new([Confirmation::No]);
        let mut session = SyncSession::new(&mut confirmer);

        let moved = backup_orphaned_files(&mut session, &dir, &BTreeSet::new(), false).expect("sweep");
        assert!(moved.is_empty());
        assert!(dir.join("legacy.sql").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
