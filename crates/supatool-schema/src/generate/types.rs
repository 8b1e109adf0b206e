//! TypeScript type aliases for the model's tables.

use super::GeneratedFile;
use crate::model::Model;
use std::fmt::Write;
use std::path::Path;

/// TypeScript type for a model field type.
pub fn ts_type(ty: Option<&str>) -> &'static str {
    match ty {
        Some("uuid" | "text" | "timestamp") => "string",
        Some("int" | "integer") => "number",
        Some("boolean") => "boolean",
        _ => "any",
    }
}

pub fn render_types(model: &Model) -> String {
    let mut code = String::from("// Generated model types\n\n");
    for (name, table) in model.created_tables() {
        let _ = writeln!(code, "export type {name} = {{");
        for (column, field) in &table.fields {
            let _ = writeln!(code, "  {column}: {};", ts_type(field.ty.as_deref()));
        }
        code.push_str("}\n\n");
    }
    code
}

pub fn generate_types(model: &Model, path: &Path) -> GeneratedFile {
    GeneratedFile {
        path: path.to_path_buf(),
        content: render_types(model),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_alias_per_created_table() {
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
          id: { type: uuid }
          views: { type: integer }
          published: { type: boolean }
          meta: { type: jsonb }
"#,
        )
        .expect("model");

        assert_eq!(
            render_types(&model),
            "// Generated model types\n\nexport type posts = {\n  id: string;\n  views: number;\n  published: boolean;\n  meta: any;\n}\n\n"
        );
    }
}
