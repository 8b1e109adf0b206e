use crate::error::{SchemaError, SchemaResult};
use crate::normalize::{ddl_body, normalize_ddl};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Marker of the provenance line written by the sync writer.
pub const REMOTE_UPDATED_MARKER: &str = "-- Remote last updated:";

/// One `<table>.sql` file from the local schema directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSchemaFile {
    /// File stem.
    pub table_name: String,
    /// File content without comment-only and blank lines.
    pub raw_ddl: String,
    /// `normalize_ddl(raw_ddl)`.
    pub normalized_ddl: String,
    /// Parsed from the provenance header, else the file mtime.
    pub embedded_timestamp: i64,
    /// Filesystem modification time (unix seconds).
    pub file_timestamp: i64,
    pub file_path: PathBuf,
}

impl LocalSchemaFile {
    /// Build an entry from file content and its mtime.
    pub fn from_content(
        table_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        content: &str,
        file_timestamp: i64,
    ) -> Self {
        let raw_ddl = ddl_body(content);
        let normalized_ddl = normalize_ddl(&raw_ddl);
        let embedded_timestamp = embedded_timestamp(content).unwrap_or(file_timestamp);
        Self {
            table_name: table_name.into(),
            raw_ddl,
            normalized_ddl,
            embedded_timestamp,
            file_timestamp,
            file_path: file_path.into(),
        }
    }
}

/// Read every `*.sql` file directly under `dir`.
///
/// A missing directory yields an empty map. Any unreadable file aborts the call.
pub fn read_local_schemas(dir: &Path) -> SchemaResult<BTreeMap<String, LocalSchemaFile>> {
    let mut out = BTreeMap::new();
    if !dir.exists() {
        return Ok(out);
    }

    for path in list_sql_files(dir)? {
        let Some(table_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = std::fs::read_to_string(&path).map_err(|e| SchemaError::io(&path, e))?;
        let file_timestamp = modified_seconds(&path)?;
        out.insert(
            table_name.to_string(),
            LocalSchemaFile::from_content(table_name, &path, &content, file_timestamp),
        );
    }

    Ok(out)
}

/// Sorted `*.sql` regular files directly under `dir`.
pub fn list_sql_files(dir: &Path) -> SchemaResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SchemaError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SchemaError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn modified_seconds(path: &Path) -> SchemaResult<i64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| SchemaError::io(path, e))?;
    let secs = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    Ok(secs)
}

/// Unix seconds from the first `-- Remote last updated: <date>` line, if parseable.
pub fn embedded_timestamp(content: &str) -> Option<i64> {
    let line = content
        .lines()
        .find_map(|l| l.trim().strip_prefix(REMOTE_UPDATED_MARKER))?;
    parse_timestamp(line.trim())
}

fn parse_timestamp(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("supatool-local-test-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = std::env::temp_dir().join("supatool-local-test-does-not-exist");
        let schemas = read_local_schemas(&dir).expect("read");
        assert!(schemas.is_empty());
    }

    #[test]
    fn header_timestamp_is_preferred_over_mtime() {
        let content = "-- Remote last updated: 2023-11-14T22:13:20.000Z\n-- Table: t\n\nCREATE TABLE t (id uuid);\n";
        let f = LocalSchemaFile::from_content("t", "t.sql", content, 42);
        assert_eq!(f.embedded_timestamp, 1_700_000_000);
        assert_eq!(f.file_timestamp, 42);
        assert_eq!(f.raw_ddl, "CREATE TABLE t (id uuid);");
    }

    #[test]
    fn unparseable_header_falls_back_to_mtime() {
        let content = "-- Remote last updated: yesterday-ish\nCREATE TABLE t (id uuid);\n";
        let f = LocalSchemaFile::from_content("t", "t.sql", content, 42);
        assert_eq!(f.embedded_timestamp, 42);
    }

    #[test]
    fn plain_date_formats_are_accepted() {
        assert_eq!(parse_timestamp("2020-01-01"), Some(1_577_836_800));
        assert_eq!(parse_timestamp("2020-01-01 00:00:10"), Some(1_577_836_810));
    }

    #[test]
    fn reads_only_sql_files_at_top_level() {
        let dir = make_temp_dir();
        std::fs::write(dir.join("users.sql"), "CREATE TABLE users (\n  id uuid\n);\n").expect("write");
        std::fs::write(dir.join("notes.txt"), "not sql").expect("write");
        std::fs::create_dir_all(dir.join("backup")).expect("mkdir");
        std::fs::write(dir.join("backup").join("old.sql"), "CREATE TABLE old (id int);").expect("write");

        let schemas = read_local_schemas(&dir).expect("read");
        assert_eq!(schemas.keys().collect::<Vec<_>>(), vec!["users"]);

        let users = &schemas["users"];
        assert_eq!(users.normalized_ddl, "CREATE TABLE users ( id uuid );");
        assert_eq!(users.embedded_timestamp, users.file_timestamp);
        assert_eq!(users.file_path, dir.join("users.sql"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
