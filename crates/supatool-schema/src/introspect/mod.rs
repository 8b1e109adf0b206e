//! Remote schema introspection.
//!
//! Tables and views are loaded in bounded batches over one connection; the
//! other object kinds follow sequentially when a full extraction is requested.

pub mod objects;
pub mod tables;

use crate::batch::{BatchItem, ConcurrencyLimit, run_batched};
use crate::client::{IntrospectClient, RowExt};
use crate::error::SchemaResult;
use crate::object::{ObjectKind, SchemaObject, qualified_object_name};
use tables::escape_literal;
use std::collections::{BTreeMap, BTreeSet};

/// Which object kinds an extraction covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractScope {
    #[default]
    TablesAndViews,
    TablesOnly,
    ViewsOnly,
    /// Tables, views, RLS policies, functions, triggers, cron jobs and custom types.
    All,
}

impl ExtractScope {
    fn wants_tables(self) -> bool {
        !matches!(self, Self::ViewsOnly)
    }

    fn wants_views(self) -> bool {
        !matches!(self, Self::TablesOnly)
    }
}

/// A table or view awaiting introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    pub schema: String,
    pub name: String,
    pub kind: ObjectKind,
}

impl BatchItem for RelationRef {
    fn kind(&self) -> &str {
        self.kind.token()
    }

    fn label(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// `-- <comment>` when the object has one, else `-- <fallback>`.
pub(crate) fn comment_header(comment: Option<&str>, fallback: &str) -> String {
    match comment {
        Some(text) => format!("-- {}\n", text.replace(['\r', '\n'], " ")),
        None => format!("-- {fallback}\n"),
    }
}

/// `COMMENT ON` statement, or a commented stub inviting one.
pub(crate) fn comment_statement(kind: &str, target: &str, comment: Option<&str>) -> String {
    match comment {
        Some(text) => format!("COMMENT ON {kind} {target} IS '{}';\n\n", escape_literal(text)),
        None => format!("-- COMMENT ON {kind} {target} IS '_your_comment_here_';\n\n"),
    }
}

const TABLES_SQL: &str = r#"
SELECT schemaname::text AS schema_name, tablename::text AS relation_name
FROM pg_catalog.pg_tables
WHERE schemaname = ANY($1::text[])
ORDER BY schemaname, tablename
"#;

const VIEWS_SQL: &str = r#"
SELECT schemaname::text AS schema_name, viewname::text AS relation_name
FROM pg_catalog.pg_views
WHERE schemaname = ANY($1::text[])
ORDER BY schemaname, viewname
"#;

async fn list_relations<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
    kind: ObjectKind,
) -> SchemaResult<Vec<RelationRef>> {
    let sql = match kind {
        ObjectKind::View => VIEWS_SQL,
        _ => TABLES_SQL,
    };
    let rows = client.query(sql, &[&schemas]).await?;
    rows.iter()
        .map(|row| {
            Ok(RelationRef {
                schema: row.try_get_column("schema_name")?,
                name: row.try_get_column("relation_name")?,
                kind,
            })
        })
        .collect()
}

async fn fetch_relation<C: IntrospectClient + ?Sized>(
    client: &C,
    relation: &RelationRef,
) -> SchemaResult<SchemaObject> {
    match relation.kind {
        ObjectKind::View => tables::fetch_view(client, relation).await,
        _ => tables::fetch_table(client, relation).await,
    }
}

/// Extract every object in `scope` from `schemas`.
///
/// Listing queries and the function/trigger/type queries are fatal on error.
/// A single table or view failing only drops that object. RLS and cron
/// failures degrade to no objects.
pub async fn fetch_definitions<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
    scope: ExtractScope,
    limit: ConcurrencyLimit,
) -> SchemaResult<Vec<SchemaObject>> {
    let mut relations = Vec::new();
    if scope.wants_tables() {
        relations.extend(list_relations(client, schemas, ObjectKind::Table).await?);
    }
    if scope.wants_views() {
        relations.extend(list_relations(client, schemas, ObjectKind::View).await?);
    }
    tracing::debug!(
        count = relations.len(),
        limit = limit.get(),
        "introspecting tables and views"
    );

    let mut defs: Vec<SchemaObject> =
        run_batched(&relations, limit, |r| fetch_relation(client, r))
            .await
            .into_iter()
            .flatten()
            .collect();

    if scope == ExtractScope::All {
        defs.extend(objects::fetch_rls_policies(client, schemas).await);
        defs.extend(objects::fetch_functions(client, schemas).await?);
        defs.extend(objects::fetch_triggers(client, schemas).await?);
        defs.extend(objects::fetch_cron_jobs(client).await);
        defs.extend(objects::fetch_custom_types(client, schemas).await?);
    }

    Ok(defs)
}

/// Remote tables for a sync run.
#[derive(Debug, Default)]
pub struct RemoteTables {
    /// Keyed by object name.
    pub tables: BTreeMap<String, SchemaObject>,
    /// Tables that exist remotely but could not be introspected.
    pub unavailable: BTreeSet<String>,
}

impl RemoteTables {
    /// Every table name known to exist remotely, introspected or not.
    pub fn known_names(&self) -> BTreeSet<String> {
        self.tables
            .keys()
            .chain(self.unavailable.iter())
            .cloned()
            .collect()
    }
}

/// Introspect the tables of `schemas` for reconciliation.
pub async fn fetch_sync_tables<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
    limit: ConcurrencyLimit,
) -> SchemaResult<RemoteTables> {
    let relations = list_relations(client, schemas, ObjectKind::Table).await?;
    Ok(introspect_tables(client, &relations, limit).await)
}

/// Introspect `relations`; those that fail land in `unavailable`.
async fn introspect_tables<C: IntrospectClient + ?Sized>(
    client: &C,
    relations: &[RelationRef],
    limit: ConcurrencyLimit,
) -> RemoteTables {
    let results = run_batched(relations, limit, |r| tables::fetch_table(client, r)).await;

    let mut remote = RemoteTables::default();
    for (relation, result) in relations.iter().zip(results) {
        match result {
            Some(object) => {
                remote.tables.insert(object.name.clone(), object);
            }
            None => {
                remote
                    .unavailable
                    .insert(qualified_object_name(&relation.schema, &relation.name));
            }
        }
    }
    remote
}
