//! Row-level security SQL from the model's `roles` and `security` sections.

use super::GeneratedFile;
use crate::model::{Model, PolicyDef, SecurityFunction};
use std::fmt::Write;
use std::path::Path;

const USER_ID_EXPR: &str = "current_setting('request.jwt.claim.sub', true)::uuid";
const DEFAULT_TEMPLATE: &str = "simple";

const ROLE_TABLES: &str = "\
CREATE TABLE IF NOT EXISTS m_roles (
  id uuid PRIMARY KEY,
  name text NOT NULL
);

CREATE TABLE IF NOT EXISTS user_roles (
  id uuid PRIMARY KEY,
  user_id uuid NOT NULL,
  role_id uuid NOT NULL
);
";

fn function_template(name: &str, template_type: &str) -> Option<String> {
    match template_type {
        "simple" => Some(format!(
            "CREATE OR REPLACE FUNCTION {name}() RETURNS text\n\
             LANGUAGE sql STABLE SECURITY DEFINER AS $$\n  \
             SELECT r.name FROM user_roles ur JOIN m_roles r ON ur.role_id = r.id\n  \
             WHERE ur.user_id = {USER_ID_EXPR} LIMIT 1;\n\
             $$;"
        )),
        _ => None,
    }
}

fn policy_template(roles: &[String], template_type: &str) -> Option<String> {
    let roles = roles
        .iter()
        .map(|r| format!("'{}'", r.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    match template_type {
        "simple" => Some(format!(
            "EXISTS (SELECT 1 FROM user_roles ur JOIN m_roles r ON ur.role_id = r.id \
             WHERE ur.user_id = {USER_ID_EXPR} AND r.name IN ({roles}))"
        )),
        _ => None,
    }
}

fn function_body(name: &str, f: &SecurityFunction, has_roles: bool) -> String {
    if let Some(sql) = &f.sql {
        return sql.clone();
    }
    if f.use_template.unwrap_or(true) {
        let template_type = f.template_type.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        if let Some(body) = function_template(name, template_type) {
            return body;
        }
        tracing::warn!(function = name, template_type, "unknown function template");
    }
    if has_roles {
        format!(
            "CREATE FUNCTION {name}() RETURNS text AS $$\nBEGIN\n  \
             RETURN (SELECT r.name FROM user_roles ur JOIN m_roles r ON ur.role_id = r.id \
             WHERE ur.user_id = {USER_ID_EXPR} LIMIT 1);\nEND;\n$$ LANGUAGE plpgsql;"
        )
    } else {
        format!(
            "CREATE FUNCTION {name}() RETURNS text AS $$\nBEGIN\n  \
             -- replace with the real role lookup\n  RETURN 'admin';\nEND;\n$$ LANGUAGE plpgsql;"
        )
    }
}

/// `USING` condition, or `None` when the model gives nothing to derive one from.
fn policy_condition(table: &str, action: &str, p: &PolicyDef) -> Option<String> {
    if let Some(using) = &p.using {
        return Some(using.clone());
    }
    if p.use_template.unwrap_or(true) && !p.role.is_empty() {
        let template_type = p.template_type.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let condition = policy_template(&p.role, template_type);
        if condition.is_none() {
            tracing::warn!(table, action, template_type, "unknown policy template");
        }
        return condition;
    }
    None
}

pub fn render_rls_sql(model: &Model) -> String {
    let mut out = String::from("-- Generated RLS / security policies\n\n");

    let has_roles = !model.roles.is_empty();
    if has_roles {
        out.push_str("-- Role master and user-role tables\n");
        out.push_str(ROLE_TABLES);
        out.push('\n');
        for role in &model.roles {
            let _ = writeln!(
                out,
                "INSERT INTO m_roles (id, name) VALUES (gen_random_uuid(), '{}') ON CONFLICT DO NOTHING;",
                role.replace('\'', "''")
            );
        }
        out.push('\n');
    }

    for (name, f) in &model.security.functions {
        let _ = writeln!(out, "-- {name}: current user's role");
        let _ = writeln!(out, "{}\n", function_body(name, f, has_roles));
    }

    for (table, actions) in &model.security.policies {
        for (action, policy) in actions {
            let _ = writeln!(out, "-- {table}: {action} policy");
            let _ = writeln!(out, "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY;");
            let _ = writeln!(out, "CREATE POLICY {table}_{action}_policy ON {table}");
            let _ = writeln!(out, "  FOR {}", action.to_uppercase());
            // INSERT policies only accept WITH CHECK.
            let clause = if action.eq_ignore_ascii_case("insert") {
                "WITH CHECK"
            } else {
                "USING"
            };
            match policy_condition(table, action, policy) {
                Some(condition) => {
                    let _ = writeln!(out, "  {clause} ({condition});\n");
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {clause} (true); -- no condition in the model, allows every row\n"
                    );
                }
            }
        }
    }

    out
}

pub fn generate_rls(model: &Model, path: &Path) -> GeneratedFile {
    GeneratedFile {
        path: path.to_path_buf(),
        content: render_rls_sql(model),
    }
}
