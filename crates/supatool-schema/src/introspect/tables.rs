//! Table and view definitions rebuilt from the catalog.

use super::{RelationRef, comment_header, comment_statement};
use crate::client::{IntrospectClient, RowExt};
use crate::error::SchemaResult;
use crate::object::{FALLBACK_TIMESTAMP, ObjectKind, SchemaObject, qualified_object_name};
use futures_util::future::try_join3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub full_type: String,
    pub not_null: bool,
    pub default_expr: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub name: String,
    pub columns: String,
    pub foreign_schema: String,
    pub foreign_table: String,
    pub foreign_columns: String,
}

/// Everything needed to print one `CREATE TABLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableParts {
    pub schema: String,
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnRow>,
    pub primary_key: Vec<String>,
    /// `(constraint name, comma-separated columns)`.
    pub uniques: Vec<(String, String)>,
    pub foreign_keys: Vec<ForeignKeyRow>,
}

/// Render `parts` as commented, executable table DDL.
pub fn table_ddl(parts: &TableParts) -> String {
    let mut ddl = comment_header(parts.comment.as_deref(), &format!("Table: {}", parts.name));
    ddl.push_str(&format!("CREATE TABLE IF NOT EXISTS {} (\n", parts.name));

    let mut entries: Vec<String> = parts
        .columns
        .iter()
        .map(|col| {
            let mut def = format!("  {} {}", col.name, col.full_type);
            if col.not_null {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &col.default_expr {
                def.push_str(&format!(" DEFAULT {default}"));
            }
            def
        })
        .collect();

    if !parts.primary_key.is_empty() {
        entries.push(format!("  PRIMARY KEY ({})", parts.primary_key.join(", ")));
    }
    for (name, columns) in &parts.uniques {
        entries.push(format!("  CONSTRAINT {name} UNIQUE ({columns})"));
    }
    for fk in &parts.foreign_keys {
        entries.push(format!(
            "  CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} ({})",
            fk.name, fk.columns, fk.foreign_schema, fk.foreign_table, fk.foreign_columns
        ));
    }

    ddl.push_str(&entries.join(",\n"));
    ddl.push_str("\n);\n\n");
    ddl.push_str(&comment_statement(
        "TABLE",
        &format!("{}.{}", parts.schema, parts.name),
        parts.comment.as_deref(),
    ));

    let column_comments: Vec<_> = parts
        .columns
        .iter()
        .filter_map(|c| c.comment.as_deref().map(|text| (c.name.as_str(), text)))
        .collect();
    if !column_comments.is_empty() {
        ddl.push_str("\n-- Column comments\n");
        for (column, text) in column_comments {
            ddl.push_str(&format!(
                "COMMENT ON COLUMN {}.{}.{} IS '{}';\n",
                parts.schema,
                parts.name,
                column,
                escape_literal(text)
            ));
        }
    }
    ddl
}

/// Quote-escape text for a single-quoted SQL literal.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// `security_invoker` setting from view reloptions, if present.
pub fn security_invoker(reloptions: &[String]) -> Option<bool> {
    reloptions.iter().find_map(|opt| {
        let value = opt.strip_prefix("security_invoker=")?;
        match value {
            "on" | "true" => Some(true),
            "off" | "false" => Some(false),
            _ => None,
        }
    })
}

/// Render a view as `CREATE OR REPLACE VIEW`, honoring `security_invoker`.
pub fn view_ddl(
    schema: &str,
    name: &str,
    definition: &str,
    reloptions: &[String],
    comment: Option<&str>,
) -> String {
    let mut ddl = comment_header(comment, &format!("View: {name}"));
    ddl.push_str(&format!("CREATE OR REPLACE VIEW {name}"));
    match security_invoker(reloptions) {
        Some(true) => ddl.push_str(" WITH (security_invoker = on)"),
        Some(false) => ddl.push_str(" WITH (security_invoker = off)"),
        None => {}
    }
    ddl.push_str(" AS\n");
    ddl.push_str(definition.trim_end().trim_end_matches(';'));
    ddl.push_str(";\n\n");
    ddl.push_str(&comment_statement("VIEW", &format!("{schema}.{name}"), comment));
    ddl
}

/// Positive epoch seconds, else the fallback sentinel.
fn usable_timestamp(value: Option<i64>) -> i64 {
    value.filter(|ts| *ts > 0).unwrap_or(FALLBACK_TIMESTAMP)
}

const TABLE_TIMESTAMP_SQL: &str = r#"
SELECT
  EXTRACT(EPOCH FROM GREATEST(
    COALESCE(last_vacuum, 'epoch'::timestamptz),
    COALESCE(last_autovacuum, 'epoch'::timestamptz),
    COALESCE(last_analyze, 'epoch'::timestamptz),
    COALESCE(last_autoanalyze, 'epoch'::timestamptz)
  ))::bigint AS last_updated
FROM pg_catalog.pg_stat_user_tables
WHERE schemaname = $1 AND relname = $2
"#;

const VIEW_TIMESTAMP_SQL: &str = r#"
SELECT
  EXTRACT(EPOCH FROM GREATEST(
    COALESCE(pg_stat_get_last_vacuum_time(c.oid), 'epoch'::timestamptz),
    COALESCE(pg_stat_get_last_analyze_time(c.oid), 'epoch'::timestamptz)
  ))::bigint AS last_updated
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'v'
"#;

const COLUMNS_SQL: &str = r#"
SELECT
  a.attname::text AS column_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS full_type,
  a.attnotnull AS not_null,
  pg_get_expr(ad.adbin, ad.adrelid) AS default_expr,
  col_description(c.oid, a.attnum) AS column_comment
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
LEFT JOIN pg_catalog.pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
  con.conname::text AS constraint_name,
  con.contype::text AS constraint_type,
  (SELECT string_agg(a.attname::text, ', ' ORDER BY k.ord)
     FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
     JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
  ) AS columns,
  fn.nspname::text AS foreign_schema,
  fc.relname::text AS foreign_table,
  (SELECT string_agg(a.attname::text, ', ' ORDER BY k.ord)
     FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
     JOIN pg_catalog.pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum
  ) AS foreign_columns
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_class fc ON fc.oid = con.confrelid
LEFT JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace
WHERE n.nspname = $1
  AND c.relname = $2
  AND con.contype IN ('p', 'u', 'f')
ORDER BY con.contype, con.conname
"#;

const RELATION_COMMENT_SQL: &str = r#"
SELECT obj_description(c.oid, 'pg_class') AS comment
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2
"#;

const VIEW_SQL: &str = r#"
SELECT
  pg_get_viewdef(c.oid, true) AS definition,
  c.reloptions::text[] AS reloptions,
  obj_description(c.oid, 'pg_class') AS comment
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'v'
"#;

async fn relation_timestamp<C: IntrospectClient + ?Sized>(
    client: &C,
    sql: &str,
    schema: &str,
    name: &str,
) -> i64 {
    match client.query_opt(sql, &[&schema, &name]).await {
        Ok(Some(row)) => usable_timestamp(row.try_get_column::<Option<i64>>("last_updated").ok().flatten()),
        Ok(None) => FALLBACK_TIMESTAMP,
        Err(e) => {
            tracing::debug!(schema, name, error = %e, "no statistics timestamp");
            FALLBACK_TIMESTAMP
        }
    }
}

async fn relation_comment<C: IntrospectClient + ?Sized>(
    client: &C,
    schema: &str,
    name: &str,
) -> SchemaResult<Option<String>> {
    let row = client.query_opt(RELATION_COMMENT_SQL, &[&schema, &name]).await?;
    match row {
        Some(row) => row.try_get_column("comment"),
        None => Ok(None),
    }
}

/// Load the catalog facts of one table.
pub async fn load_table_parts<C: IntrospectClient + ?Sized>(
    client: &C,
    schema: &str,
    name: &str,
) -> SchemaResult<TableParts> {
    let (column_rows, constraint_rows, comment) = try_join3(
        client.query(COLUMNS_SQL, &[&schema, &name]),
        client.query(CONSTRAINTS_SQL, &[&schema, &name]),
        relation_comment(client, schema, name),
    )
    .await?;

    let mut parts = TableParts {
        schema: schema.to_string(),
        name: name.to_string(),
        comment,
        ..TableParts::default()
    };

    for row in column_rows {
        parts.columns.push(ColumnRow {
            name: row.try_get_column("column_name")?,
            full_type: row.try_get_column("full_type")?,
            not_null: row.try_get_column("not_null")?,
            default_expr: row.try_get_column("default_expr")?,
            comment: row.try_get_column("column_comment")?,
        });
    }

    for row in constraint_rows {
        let constraint_name: String = row.try_get_column("constraint_name")?;
        let constraint_type: String = row.try_get_column("constraint_type")?;
        let columns: Option<String> = row.try_get_column("columns")?;
        let columns = columns.unwrap_or_default();
        match constraint_type.as_str() {
            "p" => parts.primary_key = columns.split(", ").map(str::to_string).collect(),
            "u" => parts.uniques.push((constraint_name, columns)),
            "f" => parts.foreign_keys.push(ForeignKeyRow {
                name: constraint_name,
                columns,
                foreign_schema: row
                    .try_get_column::<Option<String>>("foreign_schema")?
                    .unwrap_or_default(),
                foreign_table: row
                    .try_get_column::<Option<String>>("foreign_table")?
                    .unwrap_or_default(),
                foreign_columns: row
                    .try_get_column::<Option<String>>("foreign_columns")?
                    .unwrap_or_default(),
            }),
            _ => {}
        }
    }

    Ok(parts)
}

/// Introspect one table into a `SchemaObject`.
pub async fn fetch_table<C: IntrospectClient + ?Sized>(
    client: &C,
    relation: &RelationRef,
) -> SchemaResult<SchemaObject> {
    let timestamp =
        relation_timestamp(client, TABLE_TIMESTAMP_SQL, &relation.schema, &relation.name).await;
    let parts = load_table_parts(client, &relation.schema, &relation.name).await?;
    Ok(SchemaObject {
        name: qualified_object_name(&relation.schema, &relation.name),
        kind: ObjectKind::Table,
        ddl: table_ddl(&parts),
        timestamp,
        comment: parts.comment,
        category: None,
    })
}

/// Introspect one view into a `SchemaObject`.
pub async fn fetch_view<C: IntrospectClient + ?Sized>(
    client: &C,
    relation: &RelationRef,
) -> SchemaResult<SchemaObject> {
    let (schema, name) = (relation.schema.as_str(), relation.name.as_str());
    let row = client.query_opt(VIEW_SQL, &[&schema, &name]).await?.ok_or_else(|| {
        crate::error::SchemaError::Other(format!("view {schema}.{name} disappeared"))
    })?;
    let definition: String = row.try_get_column("definition")?;
    let reloptions: Option<Vec<String>> = row.try_get_column("reloptions")?;
    let comment: Option<String> = row.try_get_column("comment")?;
    let timestamp = relation_timestamp(client, VIEW_TIMESTAMP_SQL, schema, name).await;

    Ok(SchemaObject {
        name: qualified_object_name(schema, name),
        kind: ObjectKind::View,
        ddl: view_ddl(
            schema,
            name,
            &definition,
            reloptions.as_deref().unwrap_or_default(),
            comment.as_deref(),
        ),
        timestamp,
        comment,
        category: None,
    })
}
