//! Printers from a [`Model`] to generated files.
//!
//! Every generator is pure: it returns the files and leaves writing to the caller.

pub mod crud;
pub mod docs;
pub mod rls;
pub mod sql;
pub mod types;

use crate::model::Model;
use std::path::{Path, PathBuf};

/// Default root for generated artifacts.
pub const DEFAULT_OUT_DIR: &str = "docs/generated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

/// One `gen` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenKind {
    Types,
    Crud,
    Docs,
    Sql,
    Rls,
    All,
}

impl GenKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "types" => Self::Types,
            "crud" => Self::Crud,
            "docs" => Self::Docs,
            "sql" => Self::Sql,
            "rls" => Self::Rls,
            "all" => Self::All,
            _ => return None,
        })
    }

    /// Output path used when `-o` is not given.
    pub fn default_output(self) -> PathBuf {
        let root = Path::new(DEFAULT_OUT_DIR);
        match self {
            Self::Types => root.join("types.ts"),
            Self::Crud => root.join("crud"),
            Self::Docs => root.join(docs::TABLE_DOC_FILE),
            Self::Sql => root.join("schema.sql"),
            Self::Rls => root.join("rls.sql"),
            Self::All => root.to_path_buf(),
        }
    }
}

/// Render `kind` from `model`. `out` is a file path, except for `crud` and
/// `all` where it is a directory.
pub fn generate(kind: GenKind, model: &Model, out: &Path) -> Vec<GeneratedFile> {
    match kind {
        GenKind::Types => vec![types::generate_types(model, out)],
        GenKind::Crud => crud::generate_crud(model, out),
        GenKind::Docs => {
            let relations = out.with_file_name(docs::RELATIONS_FILE);
            vec![
                docs::generate_table_doc(model, out),
                docs::generate_relations(model, &relations),
            ]
        }
        GenKind::Sql => vec![GeneratedFile {
            path: out.to_path_buf(),
            content: format!("{}\n{}", sql::render_schema_sql(model), rls::render_rls_sql(model)),
        }],
        GenKind::Rls => vec![rls::generate_rls(model, out)],
        GenKind::All => {
            let mut files = vec![types::generate_types(model, &out.join("types.ts"))];
            files.extend(crud::generate_crud(model, &out.join("crud")));
            files.push(docs::generate_table_doc(model, &out.join(docs::TABLE_DOC_FILE)));
            files.push(docs::generate_relations(model, &out.join(docs::RELATIONS_FILE)));
            files
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::from_yaml_str(
            "models:\n  - tables:\n      users:\n        fields:\n          id: { type: uuid, primary: true }\n",
        )
        .expect("model")
    }

    #[test]
    fn all_writes_types_crud_and_docs() {
        let files = generate(GenKind::All, &model(), Path::new("out"));
        let paths: Vec<String> = files.iter().map(|f| f.path.display().to_string()).collect();
        assert_eq!(
            paths,
            ["out/types.ts", "out/crud/users.ts", "out/table-doc.md", "out/relations.md"]
        );
    }

    #[test]
    fn sql_concatenates_schema_and_rls() {
        let files = generate(GenKind::Sql, &model(), Path::new("schema.sql"));
        assert_eq!(files.len(), 1);
        assert!(files[0].content.contains("CREATE TABLE users ("));
        assert!(files[0].content.contains("-- Generated RLS / security policies"));
    }

    #[test]
    fn docs_places_relations_next_to_the_table_doc() {
        let files = generate(GenKind::Docs, &model(), Path::new("docs/out/tables.md"));
        assert_eq!(files[1].path, Path::new("docs/out/relations.md"));
        assert_eq!(GenKind::parse("docs"), Some(GenKind::Docs));
        assert_eq!(GenKind::parse("nope"), None);
    }
}
