//! RLS policies, functions, triggers, cron jobs and custom types.
//!
//! These are read sequentially after the table/view batches and only in
//! full-extraction mode.

use super::{comment_header, comment_statement};
use crate::client::{IntrospectClient, RowExt};
use crate::error::SchemaResult;
use crate::introspect::tables::escape_literal;
use crate::object::{ObjectKind, SchemaObject, qualified_object_name};
use chrono::Utc;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRow {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub permissive: Option<String>,
    pub roles: Vec<String>,
    pub command: Option<String>,
    pub using: Option<String>,
    pub with_check: Option<String>,
}

/// One `ENABLE ROW LEVEL SECURITY` plus every policy of one table.
pub fn policy_set_ddl(schema: &str, table: &str, policies: &[PolicyRow]) -> String {
    let mut ddl = format!("-- RLS Policies for {schema}.{table}\n");
    ddl.push_str("-- Row Level Security policies to control data access at the row level\n\n");
    ddl.push_str(&format!("ALTER TABLE {schema}.{table} ENABLE ROW LEVEL SECURITY;\n\n"));

    for p in policies {
        ddl.push_str(&format!("CREATE POLICY {}\n", p.name));
        ddl.push_str(&format!("  ON {schema}.{table}\n"));
        ddl.push_str(&format!("  AS {}\n", p.permissive.as_deref().unwrap_or("PERMISSIVE")));
        ddl.push_str(&format!("  FOR {}\n", p.command.as_deref().unwrap_or("ALL")));
        let roles: Vec<&str> = p
            .roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        if !roles.is_empty() {
            ddl.push_str(&format!("  TO {}\n", roles.join(", ")));
        }
        if let Some(using) = &p.using {
            ddl.push_str(&format!("  USING ({using})\n"));
        }
        if let Some(check) = &p.with_check {
            ddl.push_str(&format!("  WITH CHECK ({check})\n"));
        }
        ddl.push_str(";\n\n");
    }
    ddl
}

/// Function DDL with a guaranteed trailing `;` and a `COMMENT ON FUNCTION` line or stub.
pub fn function_ddl(signature: &str, definition: &str, comment: Option<&str>) -> String {
    let mut ddl = comment_header(comment, &format!("Function: {signature}"));
    ddl.push_str(definition);
    if !definition.trim_end().ends_with(';') {
        ddl.push(';');
    }
    ddl.push_str("\n\n");
    ddl.push_str(&comment_statement("FUNCTION", signature, comment));
    ddl
}

pub fn trigger_ddl(schema: &str, table: &str, trigger: &str, definition: &str) -> String {
    format!(
        "-- Trigger: {trigger} on {schema}.{table}\n\
         -- Database trigger that automatically executes in response to certain events\n\n\
         {definition};"
    )
}

/// `jobname`, or `job_<jobid>` for unnamed jobs.
pub fn cron_job_name(job_id: i64, job_name: Option<&str>) -> String {
    match job_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("job_{job_id}"),
    }
}

pub fn cron_ddl(name: &str, schedule: &str, command: &str) -> String {
    format!(
        "-- Cron Job: {name}\n\
         -- Scheduled job that runs automatically at specified intervals\n\
         -- Schedule: {schedule}\n\
         -- Command: {command}\n\n\
         SELECT cron.schedule('{}', '{}', '{}');",
        escape_literal(name),
        escape_literal(schedule),
        escape_literal(command),
    )
}

/// Body of a custom type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBody {
    Enum(Vec<String>),
    /// `(attribute, type)` pairs.
    Composite(Vec<(String, String)>),
    Domain {
        base_type: String,
        not_null: bool,
        default_expr: Option<String>,
        check: Option<String>,
    },
}

/// `CREATE TYPE` / `CREATE DOMAIN` text, or `None` for an empty enum or composite.
pub fn type_statement(name: &str, body: &TypeBody) -> Option<String> {
    match body {
        TypeBody::Enum(labels) if labels.is_empty() => None,
        TypeBody::Enum(labels) => {
            let labels: Vec<String> = labels
                .iter()
                .map(|l| format!("'{}'", escape_literal(l)))
                .collect();
            Some(format!("CREATE TYPE {name} AS ENUM ({});", labels.join(", ")))
        }
        TypeBody::Composite(attrs) if attrs.is_empty() => None,
        TypeBody::Composite(attrs) => {
            let columns: Vec<String> = attrs.iter().map(|(a, t)| format!("  {a} {t}")).collect();
            Some(format!("CREATE TYPE {name} AS (\n{}\n);", columns.join(",\n")))
        }
        TypeBody::Domain {
            base_type,
            not_null,
            default_expr,
            check,
        } => {
            let mut ddl = format!("CREATE DOMAIN {name} AS {base_type}");
            if let Some(default) = default_expr {
                ddl.push_str(&format!(" DEFAULT {default}"));
            }
            if *not_null {
                ddl.push_str(" NOT NULL");
            }
            if let Some(check) = check {
                // pg_get_constraintdef already renders `CHECK (...)`.
                ddl.push(' ');
                ddl.push_str(check);
            }
            ddl.push(';');
            Some(ddl)
        }
    }
}

pub fn type_ddl(schema: &str, name: &str, body: &TypeBody, comment: Option<&str>) -> Option<String> {
    let statement = type_statement(name, body)?;
    let mut ddl = comment_header(comment, &format!("Type: {name}"));
    ddl.push_str(&statement);
    ddl.push_str("\n\n");
    ddl.push_str(&comment_statement("TYPE", &format!("{schema}.{name}"), comment));
    Some(ddl)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

const POLICIES_SQL: &str = r#"
SELECT
  schemaname::text AS schema_name,
  tablename::text AS table_name,
  policyname::text AS policy_name,
  permissive,
  roles::text[] AS roles,
  cmd,
  qual,
  with_check
FROM pg_catalog.pg_policies
WHERE schemaname = ANY($1::text[])
ORDER BY schemaname, tablename, policyname
"#;

/// One policy-set object per table. Any failure degrades to an empty list.
pub async fn fetch_rls_policies<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
) -> Vec<SchemaObject> {
    match load_rls_policies(client, schemas).await {
        Ok(objects) => objects,
        Err(e) => {
            tracing::warn!(error = %e, "skipping RLS policy extraction");
            Vec::new()
        }
    }
}

async fn load_rls_policies<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
) -> SchemaResult<Vec<SchemaObject>> {
    let rows = client.query(POLICIES_SQL, &[&schemas]).await?;
    let mut grouped: BTreeMap<(String, String), Vec<PolicyRow>> = BTreeMap::new();
    for row in rows {
        let policy = PolicyRow {
            schema: row.try_get_column("schema_name")?,
            table: row.try_get_column("table_name")?,
            name: row.try_get_column("policy_name")?,
            permissive: row.try_get_column("permissive")?,
            roles: row
                .try_get_column::<Option<Vec<String>>>("roles")?
                .unwrap_or_default(),
            command: row.try_get_column("cmd")?,
            using: row.try_get_column("qual")?,
            with_check: row.try_get_column("with_check")?,
        };
        grouped
            .entry((policy.schema.clone(), policy.table.clone()))
            .or_default()
            .push(policy);
    }

    let stamp = now();
    Ok(grouped
        .into_iter()
        .map(|((schema, table), policies)| SchemaObject {
            name: format!("{schema}_{table}_policies"),
            kind: ObjectKind::RlsPolicySet,
            ddl: policy_set_ddl(&schema, &table, &policies),
            timestamp: stamp,
            comment: None,
            category: Some(format!("{schema}.{table}")),
        })
        .collect())
}

const FUNCTIONS_SQL: &str = r#"
SELECT
  p.proname::text AS name,
  n.nspname::text AS schema_name,
  pg_get_functiondef(p.oid) AS definition,
  obj_description(p.oid, 'pg_proc') AS comment,
  pg_get_function_identity_arguments(p.oid) AS identity_args
FROM pg_catalog.pg_proc p
JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
WHERE n.nspname = ANY($1::text[])
  AND p.prokind IN ('f', 'p')
ORDER BY n.nspname, p.proname
"#;

pub async fn fetch_functions<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
) -> SchemaResult<Vec<SchemaObject>> {
    let rows = client.query(FUNCTIONS_SQL, &[&schemas]).await?;
    let stamp = now();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get_column("name")?;
        let schema: String = row.try_get_column("schema_name")?;
        let definition: String = row.try_get_column("definition")?;
        let comment: Option<String> = row.try_get_column("comment")?;
        let identity_args: Option<String> = row.try_get_column("identity_args")?;
        let signature = format!("{schema}.{name}({})", identity_args.unwrap_or_default());

        out.push(SchemaObject {
            name: qualified_object_name(&schema, &name),
            kind: ObjectKind::Function,
            ddl: function_ddl(&signature, &definition, comment.as_deref()),
            timestamp: stamp,
            comment,
            category: None,
        });
    }
    Ok(out)
}

const TRIGGERS_SQL: &str = r#"
SELECT
  t.tgname::text AS trigger_name,
  c.relname::text AS table_name,
  n.nspname::text AS schema_name,
  pg_get_triggerdef(t.oid) AS definition
FROM pg_catalog.pg_trigger t
JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = ANY($1::text[])
  AND NOT t.tgisinternal
ORDER BY n.nspname, c.relname, t.tgname
"#;

pub async fn fetch_triggers<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
) -> SchemaResult<Vec<SchemaObject>> {
    let rows = client.query(TRIGGERS_SQL, &[&schemas]).await?;
    let stamp = now();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let trigger: String = row.try_get_column("trigger_name")?;
        let table: String = row.try_get_column("table_name")?;
        let schema: String = row.try_get_column("schema_name")?;
        let definition: String = row.try_get_column("definition")?;
        out.push(SchemaObject {
            name: format!("{schema}_{table}_{trigger}"),
            kind: ObjectKind::Trigger,
            ddl: trigger_ddl(&schema, &table, &trigger, &definition),
            timestamp: stamp,
            comment: None,
            category: Some(format!("{schema}.{table}")),
        });
    }
    Ok(out)
}

const CRON_SQL: &str = r#"
SELECT jobid::bigint AS job_id, schedule, command, jobname
FROM cron.job
ORDER BY jobid
"#;

/// Jobs from `cron.job`. Missing pg_cron degrades to an empty list.
pub async fn fetch_cron_jobs<C: IntrospectClient + ?Sized>(client: &C) -> Vec<SchemaObject> {
    match load_cron_jobs(client).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::warn!(error = %e, "skipping cron job extraction");
            Vec::new()
        }
    }
}

async fn load_cron_jobs<C: IntrospectClient + ?Sized>(client: &C) -> SchemaResult<Vec<SchemaObject>> {
    let rows = client.query(CRON_SQL, &[]).await?;
    let stamp = now();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let job_id: i64 = row.try_get_column("job_id")?;
        let schedule: String = row.try_get_column("schedule")?;
        let command: String = row.try_get_column("command")?;
        let job_name: Option<String> = row.try_get_column("jobname")?;
        let name = cron_job_name(job_id, job_name.as_deref());
        out.push(SchemaObject {
            ddl: cron_ddl(&name, &schedule, &command),
            name,
            kind: ObjectKind::CronJob,
            timestamp: stamp,
            comment: None,
            category: None,
        });
    }
    Ok(out)
}

const TYPES_SQL: &str = r#"
SELECT
  t.oid::bigint AS type_oid,
  t.typname::text AS type_name,
  n.nspname::text AS schema_name,
  t.typtype::text AS type_kind,
  obj_description(t.oid, 'pg_type') AS comment
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = ANY($1::text[])
  AND t.typtype IN ('e', 'c', 'd')
  AND t.typisdefined
  AND NOT t.typarray = 0
  AND NOT EXISTS (
    SELECT 1 FROM pg_catalog.pg_class c
    WHERE c.relname = t.typname AND c.relnamespace = n.oid
  )
  AND NOT EXISTS (
    SELECT 1 FROM pg_catalog.pg_proc p
    WHERE p.proname = t.typname AND p.pronamespace = n.oid
  )
  AND t.typname NOT LIKE 'pg\_%'
  AND t.typname NOT LIKE '\_%'
  AND t.typname NOT LIKE '%\_old'
  AND t.typname NOT LIKE '%\_bak'
  AND t.typname NOT LIKE 'tmp\_%'
ORDER BY n.nspname, t.typname
"#;

const ENUM_LABELS_SQL: &str = r#"
SELECT enumlabel::text AS label
FROM pg_catalog.pg_enum
WHERE enumtypid = $1::bigint::oid
ORDER BY enumsortorder
"#;

const COMPOSITE_ATTRS_SQL: &str = r#"
SELECT
  a.attname::text AS attr_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS attr_type
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_type t ON t.typrelid = a.attrelid
WHERE t.oid = $1::bigint::oid
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum
"#;

const DOMAIN_SQL: &str = r#"
SELECT
  pg_catalog.format_type(t.typbasetype, t.typtypmod) AS base_type,
  t.typnotnull AS not_null,
  t.typdefault AS default_expr,
  (SELECT string_agg(pg_get_constraintdef(c.oid), ' ')
     FROM pg_catalog.pg_constraint c
    WHERE c.contypid = t.oid) AS check_expr
FROM pg_catalog.pg_type t
WHERE t.oid = $1::bigint::oid
"#;

async fn load_type_body<C: IntrospectClient + ?Sized>(
    client: &C,
    oid: i64,
    kind: &str,
) -> SchemaResult<Option<TypeBody>> {
    let body = match kind {
        "e" => {
            let rows = client.query(ENUM_LABELS_SQL, &[&oid]).await?;
            let labels = rows
                .iter()
                .map(|r| r.try_get_column::<String>("label"))
                .collect::<SchemaResult<Vec<_>>>()?;
            Some(TypeBody::Enum(labels))
        }
        "c" => {
            let rows = client.query(COMPOSITE_ATTRS_SQL, &[&oid]).await?;
            let attrs = rows
                .iter()
                .map(|r| {
                    Ok((
                        r.try_get_column::<String>("attr_name")?,
                        r.try_get_column::<String>("attr_type")?,
                    ))
                })
                .collect::<SchemaResult<Vec<_>>>()?;
            Some(TypeBody::Composite(attrs))
        }
        "d" => match client.query_opt(DOMAIN_SQL, &[&oid]).await? {
            Some(row) => Some(TypeBody::Domain {
                base_type: row.try_get_column("base_type")?,
                not_null: row.try_get_column("not_null")?,
                default_expr: row.try_get_column("default_expr")?,
                check: row.try_get_column("check_expr")?,
            }),
            None => None,
        },
        _ => None,
    };
    Ok(body)
}

pub async fn fetch_custom_types<C: IntrospectClient + ?Sized>(
    client: &C,
    schemas: &[String],
) -> SchemaResult<Vec<SchemaObject>> {
    let rows = client.query(TYPES_SQL, &[&schemas]).await?;
    let stamp = now();
    let mut out = Vec::new();
    for row in rows {
        let oid: i64 = row.try_get_column("type_oid")?;
        let name: String = row.try_get_column("type_name")?;
        let schema: String = row.try_get_column("schema_name")?;
        let kind: String = row.try_get_column("type_kind")?;
        let comment: Option<String> = row.try_get_column("comment")?;

        let Some(body) = load_type_body(client, oid, &kind).await? else {
            continue;
        };
        let Some(ddl) = type_ddl(&schema, &name, &body, comment.as_deref()) else {
            continue;
        };
        out.push(SchemaObject {
            name: format!("{schema}_{name}"),
            kind: ObjectKind::CustomType,
            ddl,
            timestamp: stamp,
            comment,
            category: None,
        });
    }
    Ok(out)
}
