//! Markdown table definitions and relation listings.

use super::GeneratedFile;
use crate::model::Model;
use std::fmt::Write;
use std::path::Path;

pub const TABLE_DOC_FILE: &str = "table-doc.md";
pub const RELATIONS_FILE: &str = "relations.md";

fn cell(value: Option<&str>) -> String {
    value.unwrap_or_default().replace('|', "\\|")
}

fn mark(flag: bool) -> &'static str {
    if flag { "✓" } else { "" }
}

pub fn render_table_doc(model: &Model) -> String {
    let mut md = String::from("# Table Definitions\n\n");
    for (name, table) in model.tables() {
        let note = if table.skip_create { " (not created: built-in)" } else { "" };
        let _ = writeln!(md, "## {name}{note}");
        if let Some(description) = &table.description {
            let _ = writeln!(md, "{description}");
        }
        md.push_str("\n| Column | Type | Primary | Not Null | Default | Label |\n");
        md.push_str("|---|---|---|---|---|---|\n");
        for (column, field) in &table.fields {
            let _ = writeln!(
                md,
                "| {column} | {} | {} | {} | {} | {} |",
                cell(field.ty.as_deref()),
                mark(field.primary),
                mark(field.not_null),
                cell(field.default_sql().as_deref()),
                cell(field.label.as_deref()),
            );
        }
        md.push('\n');
    }
    md
}

pub fn render_relations(model: &Model) -> String {
    let mut md = String::from(
        "# Relations\n\n| Table | Relation | Target | Foreign Key |\n|---|---|---|---|\n",
    );
    for (name, table) in model.tables() {
        for relation in table.relations.values() {
            let _ = writeln!(
                md,
                "| {name} | {} | {} | {} |",
                cell(relation.kind.as_deref()),
                cell(relation.target.as_deref()),
                cell(relation.foreign_key.as_deref()),
            );
        }
    }
    md
}

pub fn generate_table_doc(model: &Model, path: &Path) -> GeneratedFile {
    GeneratedFile {
        path: path.to_path_buf(),
        content: render_table_doc(model),
    }
}

pub fn generate_relations(model: &Model, path: &Path) -> GeneratedFile {
    GeneratedFile {
        path: path.to_path_buf(),
        content: render_relations(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
models:
  - tables:
      users:
        description: People
        skipCreate: true
        fields:
          id: { type: uuid, primary: true, notNull: true, label: ID }
      posts:
        fields:
          author_id: { type: uuid, ref: users.id }
        relations:
          author: { type: belongsTo, target: users, foreignKey: author_id }
"#;

    #[test]
    fn table_doc_lists_columns() {
        let md = render_table_doc(&Model::from_yaml_str(SRC).expect("model"));
        assert!(md.contains("## users (not created: built-in)\nPeople\n"));
        assert!(md.contains("| id | uuid | ✓ | ✓ |  | ID |"));
        assert!(md.contains("| author_id | uuid |  |  |  |  |"));
    }

    #[test]
    fn relations_are_tabulated() {
        let md = render_relations(&Model::from_yaml_str(SRC).expect("model"));
        assert!(md.ends_with("| posts | belongsTo | users | author_id |\n"));
    }
}
