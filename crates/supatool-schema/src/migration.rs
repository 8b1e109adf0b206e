//! Forward migrations for tables whose local file is newer than the remote.
//!
//! ALTER synthesis is best-effort: both snapshots are parsed with libpg_query
//! and only the column list of the first `CREATE TABLE` on each side is
//! compared. Both snapshots and a diff are
//! always persisted so the intent survives even when nothing is derived.

use crate::diff::format_sql;
use crate::error::{SchemaError, SchemaResult};
use crate::writer::iso_millis;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use similar::TextDiff;
use std::path::{Path, PathBuf};

const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// A column entry from a `CREATE TABLE` body.
///
/// `definition` is the column as deparsed by libpg_query, so formatting
/// differences between snapshots do not register as changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub definition: String,
}

/// Table name and columns of the first `CREATE TABLE` statement in `ddl`.
///
/// Table-level constraints are skipped. Returns `None` when `ddl` does not
/// parse or holds no `CREATE TABLE`.
pub fn parse_create_table(ddl: &str) -> Option<(String, Vec<ColumnDef>)> {
    let parsed = match pg_query::parse(ddl) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "snapshot is not parseable SQL");
            return None;
        }
    };
    let version = parsed.protobuf.version;

    let create = parsed
        .protobuf
        .stmts
        .iter()
        .filter_map(|raw| raw.stmt.as_ref())
        .find_map(|stmt| match stmt.node.as_ref() {
            Some(pg_query::NodeEnum::CreateStmt(create)) => Some(create),
            _ => None,
        })?;

    let table = create
        .relation
        .as_ref()
        .map(qualified_name)
        .unwrap_or_default();

    let columns = create
        .table_elts
        .iter()
        .filter_map(|elt| match elt.node.as_ref() {
            Some(pg_query::NodeEnum::ColumnDef(col)) => Some((col.colname.clone(), elt)),
            _ => None,
        })
        .map(|(name, elt)| {
            let definition = deparse_column(version, elt).unwrap_or_else(|| name.clone());
            ColumnDef { name, definition }
        })
        .collect();

    Some((table, columns))
}

/// Deparse a lone column through a placeholder `CREATE TABLE`.
fn deparse_column(version: i32, column: &pg_query::protobuf::Node) -> Option<String> {
    use pg_query::protobuf::{CreateStmt, Node, OnCommitAction, ParseResult, RangeVar, RawStmt};

    const PREFIX: &str = "CREATE TABLE t (";

    let create = CreateStmt {
        relation: Some(RangeVar {
            relname: "t".to_string(),
            inh: true,
            relpersistence: "p".to_string(),
            location: -1,
            ..Default::default()
        }),
        table_elts: vec![column.clone()],
        oncommit: OnCommitAction::OncommitNoop as i32,
        ..Default::default()
    };
    let protobuf = ParseResult {
        version,
        stmts: vec![RawStmt {
            stmt: Some(Box::new(Node {
                node: Some(pg_query::NodeEnum::CreateStmt(create.into())),
            })),
            stmt_location: 0,
            stmt_len: 0,
        }],
    };

    let sql = match pg_query::deparse(&protobuf) {
        Ok(sql) => sql,
        Err(e) => {
            tracing::warn!(error = %e, "failed to deparse column definition");
            return None;
        }
    };
    sql.trim_end_matches(';')
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::to_string)
}

fn qualified_name(rel: &pg_query::protobuf::RangeVar) -> String {
    if rel.schemaname.is_empty() {
        quote_ident(&rel.relname)
    } else {
        format!("{}.{}", quote_ident(&rel.schemaname), quote_ident(&rel.relname))
    }
}

fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Best-effort statements turning `from` into `to`.
///
/// Added columns become live `ADD COLUMN`. Dropped columns and changed
/// definitions are emitted commented out for review.
pub fn best_effort_statements(table: &str, from_ddl: &str, to_ddl: &str) -> Vec<String> {
    let (Some((from_name, from)), Some((to_name, to))) =
        (parse_create_table(from_ddl), parse_create_table(to_ddl))
    else {
        return Vec::new();
    };
    let target = [to_name, from_name]
        .into_iter()
        .find(|n| !n.is_empty())
        .unwrap_or_else(|| table.to_string());

    let mut out = Vec::new();
    for col in &to {
        match from.iter().find(|c| c.name == col.name) {
            None => out.push(format!("ALTER TABLE {target} ADD COLUMN {};", col.definition)),
            Some(prev) if prev.definition != col.definition => out.push(format!(
                "-- REVIEW: column {} changed from `{}` to `{}`",
                col.name, prev.definition, col.definition
            )),
            Some(_) => {}
        }
    }
    for col in &from {
        if !to.iter().any(|c| c.name == col.name) {
            out.push(format!(
                "-- ALTER TABLE {target} DROP COLUMN {};",
                quote_ident(&col.name)
            ));
        }
    }
    out
}

fn commented(text: &str) -> String {
    text.lines()
        .map(|l| if l.is_empty() { "--".to_string() } else { format!("-- {l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Migration file body for `table`, from the remote snapshot to the local one.
pub fn render_migration(table: &str, from_ddl: &str, to_ddl: &str, at: DateTime<Utc>) -> String {
    let statements = best_effort_statements(table, from_ddl, to_ddl);
    let from_pretty = format_sql(from_ddl);
    let to_pretty = format_sql(to_ddl);
    let diff = TextDiff::from_lines(&from_pretty, &to_pretty)
        .unified_diff()
        .context_radius(3)
        .header("remote", "local")
        .to_string();

    let mut out = String::new();
    out.push_str(&format!("-- Migration for table: {table}\n"));
    out.push_str(&format!("-- Generated by supatool at: {}\n", iso_millis(at)));
    out.push_str("--\n");
    out.push_str("-- BEST-EFFORT: the statements below were derived from column lists only.\n");
    out.push_str("-- Constraints, indexes, defaults on existing columns and types are not translated.\n");
    out.push_str("-- Review every statement before applying.\n\n");

    if statements.is_empty() {
        out.push_str("-- No column-level changes detected.\n");
    } else {
        for stmt in &statements {
            out.push_str(stmt);
            out.push('\n');
        }
    }

    out.push_str("\n-- Diff (remote -> local):\n");
    out.push_str(&commented(&diff));
    out.push_str("\n\n-- From (remote):\n");
    out.push_str(&commented(&from_pretty));
    out.push_str("\n\n-- To (local):\n");
    out.push_str(&commented(&to_pretty));
    out.push('\n');
    out
}

fn version_taken(dir: &Path, version: &str) -> SchemaResult<bool> {
    let prefix = format!("{version}_");
    let entries = std::fs::read_dir(dir).map_err(|e| SchemaError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SchemaError::io(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Write `<dir>/<YYYYMMDDHHMMSS>_update_<table>.sql`, bumping the version until free.
pub fn generate_migration_file_at(
    dir: &Path,
    table: &str,
    from_ddl: &str,
    to_ddl: &str,
    at: DateTime<Utc>,
) -> SchemaResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| SchemaError::io(dir, e))?;

    let mut version: NaiveDateTime = at.naive_utc();
    let mut stamp = version.format(VERSION_FORMAT).to_string();
    while version_taken(dir, &stamp)? {
        version += Duration::seconds(1);
        stamp = version.format(VERSION_FORMAT).to_string();
    }

    let path = dir.join(format!("{stamp}_update_{table}.sql"));
    let content = render_migration(table, from_ddl, to_ddl, at);
    std::fs::write(&path, content).map_err(|e| SchemaError::io(&path, e))?;
    tracing::info!(table, path = %path.display(), "migration file generated");
    Ok(path)
}

pub fn generate_migration_file(
    dir: &Path,
    table: &str,
    from_ddl: &str,
    to_ddl: &str,
) -> SchemaResult<PathBuf> {
    generate_migration_file_at(dir, table, from_ddl, to_ddl, Utc::now())
}
