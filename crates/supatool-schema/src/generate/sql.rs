//! `CREATE TABLE` DDL from the model.

use crate::model::{FieldDef, Model, TableDef};
use std::fmt::Write;

const USER_PROFILE_REF: &str = "user_profiles.id";

/// Postgres type for a model field.
pub fn sql_type(ty: Option<&str>, column: &str) -> String {
    let Some(ty) = ty else {
        return "text".to_string();
    };
    if ty == "timestamp" || ty == "timestamptz" || column.ends_with("_at") {
        return "timestamptz".to_string();
    }
    if let Some(vector) = vector_type(ty) {
        return vector;
    }
    match ty {
        "int" | "integer" => "integer".to_string(),
        other => other.to_string(),
    }
}

/// `vector`, `vector(n)` and `extensions.vector(n)` all become `vector[(n)]`.
fn vector_type(ty: &str) -> Option<String> {
    let lower = ty.to_ascii_lowercase();
    let rest = lower.strip_prefix("extensions.").unwrap_or(&lower);
    let dims = rest.strip_prefix("vector")?;
    let valid = dims.is_empty()
        || dims
            .strip_prefix('(')
            .and_then(|d| d.strip_suffix(')'))
            .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()));
    valid.then(|| format!("vector{dims}"))
}

fn references_user_profile(name: &str, field: &FieldDef) -> bool {
    name == "user_id"
        || field
            .reference
            .as_deref()
            .is_some_and(|r| r.ends_with(USER_PROFILE_REF))
}

/// Column name after the user-id naming rule.
///
/// A column pointing at `user_profiles.id` becomes `user_id` when it is the
/// only user reference in the table, else `<reftable>_user_id`.
fn column_name(name: &str, field: &FieldDef, user_refs: usize) -> String {
    let points_at_profile = field
        .reference
        .as_deref()
        .is_some_and(|r| r.ends_with(USER_PROFILE_REF));
    if name == "user_id" || !points_at_profile {
        return name.to_string();
    }
    if user_refs == 1 {
        "user_id".to_string()
    } else {
        format!("{}_user_id", field.ref_table().unwrap_or("user_profiles"))
    }
}

fn render_table(out: &mut String, name: &str, table: &TableDef) {
    let user_refs = table
        .fields
        .iter()
        .filter(|(n, f)| references_user_profile(n, f))
        .count();

    let mut columns = Vec::with_capacity(table.fields.len());
    let mut constraints = Vec::new();
    for (field_name, field) in &table.fields {
        let column = column_name(field_name, field, user_refs);
        let mut def = format!("  {column} {}", sql_type(field.ty.as_deref(), &column));
        if field.primary {
            def.push_str(" PRIMARY KEY");
        }
        if field.unique {
            def.push_str(" UNIQUE");
        }
        if field.not_null {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = field.default_sql() {
            let _ = write!(def, " DEFAULT {default}");
        }
        columns.push(def);

        if let Some(ref_table) = field.ref_table() {
            constraints.push(format!("  FOREIGN KEY ({column}) REFERENCES {ref_table}(id)"));
        }
    }
    columns.extend(constraints);

    let _ = writeln!(out, "CREATE TABLE {name} (");
    out.push_str(&columns.join(",\n"));
    out.push_str("\n);\n\n");
}

/// Table DDL for every table in the model.
pub fn render_schema_sql(model: &Model) -> String {
    let mut out = String::from("-- Generated table and relation DDL\n\n");
    for (name, table) in model.tables() {
        if table.skip_create {
            let _ = writeln!(out, "-- [skip] {name} (not created: built-in table)");
            continue;
        }
        render_table(&mut out, name, table);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_are_mapped() {
        assert_eq!(sql_type(None, "name"), "text");
        assert_eq!(sql_type(Some("text"), "created_at"), "timestamptz");
        assert_eq!(sql_type(Some("timestamp"), "seen"), "timestamptz");
        assert_eq!(sql_type(Some("int"), "age"), "integer");
        assert_eq!(sql_type(Some("extensions.vector(1536)"), "embedding"), "vector(1536)");
        assert_eq!(sql_type(Some("vector"), "embedding"), "vector");
        assert_eq!(sql_type(Some("jsonb"), "meta"), "jsonb");
    }

    #[test]
    fn tables_render_with_constraints_and_skips() {
        let model = Model::from_yaml_str(
            r#"
models:
  - tables:
      auth_users:
        skipCreate: true
        fields:
          id: { type: uuid }
      posts:
        fields:
          id: { type: uuid, primary: true, default: gen_random_uuid() }
          slug: { type: text, unique: true, notNull: true }
          org_id: { type: uuid, ref: orgs.id }
"#,
        )
        .expect("model");

        let sql = render_schema_sql(&model);
        assert!(sql.contains("-- [skip] auth_users"));
        assert!(sql.contains(
            "CREATE TABLE posts (\n  id uuid PRIMARY KEY DEFAULT gen_random_uuid(),\n  slug text UNIQUE NOT NULL,\n  org_id uuid,\n  FOREIGN KEY (org_id) REFERENCES orgs(id)\n);\n"
        ));
    }

    #[test]
    fn user_profile_refs_are_renamed() {
        let single = Model::from_yaml_str(
            "models:\n  - tables:\n      posts:\n        fields:\n          author: { type: uuid, ref: user_profiles.id }\n",
        )
        .expect("model");
        let sql = render_schema_sql(&single);
        assert!(sql.contains("  user_id uuid"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES user_profiles(id)"));

        let double = Model::from_yaml_str(
            "models:\n  - tables:\n      tasks:\n        fields:\n          user_id: { type: uuid }\n          reviewer: { type: uuid, ref: user_profiles.id }\n",
        )
        .expect("model");
        let sql = render_schema_sql(&double);
        assert!(sql.contains("  user_id uuid,\n  user_profiles_user_id uuid"));
    }
}
