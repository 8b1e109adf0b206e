//! `index.md` and `llms.txt` catalogs of an extraction.
//!
//! Both are rebuilt from the full object list on every extraction.

use crate::error::{SchemaError, SchemaResult};
use crate::object::{ObjectKind, SchemaObject};
use std::fmt::Write as _;
use std::path::Path;

pub const INDEX_FILE: &str = "index.md";
pub const LLMS_FILE: &str = "llms.txt";

fn of_kind(defs: &[SchemaObject], kind: ObjectKind) -> Vec<&SchemaObject> {
    defs.iter().filter(|d| d.kind == kind).collect()
}

/// Markdown index grouped by kind, with links relative to the extraction root.
pub fn render_index_md(defs: &[SchemaObject], separate: bool) -> String {
    let mut out = String::from("# Database Schema Index\n\n## Summary\n\n");
    for kind in ObjectKind::ALL {
        let n = of_kind(defs, kind).len();
        if n > 0 {
            let _ = writeln!(out, "- {}: {} objects", kind.label(), n);
        }
    }
    out.push('\n');

    for kind in ObjectKind::ALL {
        let group = of_kind(defs, kind);
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {}\n", kind.label());
        for def in group {
            let comment = def
                .comment
                .as_deref()
                .map(|c| format!(" - {c}"))
                .unwrap_or_default();
            let _ = writeln!(out, "- [{}]({}){}", def.name, def.relative_path(separate), comment);
        }
        out.push('\n');
    }

    out.push_str("## Directory Structure\n\n```\nschemas/\n├── index.md\n├── llms.txt\n");
    if separate {
        let mut seen: Vec<&str> = Vec::new();
        for kind in ObjectKind::ALL {
            let dir = kind.directory();
            if !of_kind(defs, kind).is_empty() && !seen.contains(&dir) {
                seen.push(dir);
                let _ = writeln!(out, "└── {dir}/");
            }
        }
    }
    out.push_str("```\n");
    out
}

/// Flat `kind:name:path[:comment]` catalog for tooling.
pub fn render_llms_txt(defs: &[SchemaObject], separate: bool) -> String {
    let mut out = String::from("Database Schema - Complete Objects Catalog\n\nSUMMARY\n");
    for kind in ObjectKind::ALL {
        let n = of_kind(defs, kind).len();
        if n > 0 {
            let _ = writeln!(out, "{}: {}", kind.label(), n);
        }
    }
    out.push_str("\nOBJECTS\n");
    for def in defs {
        let _ = write!(out, "{}:{}:{}", def.kind.token(), def.name, def.relative_path(separate));
        if let Some(comment) = def.comment.as_deref() {
            let _ = write!(out, ":{}", comment.replace('\n', " "));
        }
        out.push('\n');
    }
    out
}

/// Write both catalogs into `out_dir`.
pub fn write_index(defs: &[SchemaObject], out_dir: &Path, separate: bool) -> SchemaResult<()> {
    let index = out_dir.join(INDEX_FILE);
    std::fs::write(&index, render_index_md(defs, separate)).map_err(|e| SchemaError::io(&index, e))?;
    let llms = out_dir.join(LLMS_FILE);
    std::fs::write(&llms, render_llms_txt(defs, separate)).map_err(|e| SchemaError::io(&llms, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FALLBACK_TIMESTAMP;

    fn def(kind: ObjectKind, name: &str, comment: Option<&str>) -> SchemaObject {
        SchemaObject {
            name: name.to_string(),
            kind,
            ddl: String::new(),
            timestamp: FALLBACK_TIMESTAMP,
            comment: comment.map(str::to_string),
            category: None,
        }
    }

    fn sample() -> Vec<SchemaObject> {
        vec![
            def(ObjectKind::Table, "users", Some("Registered users")),
            def(ObjectKind::Function, "get_role", None),
            def(ObjectKind::Trigger, "public_users_audit", None),
        ]
    }

    #[test]
    fn llms_lines_carry_kind_name_path_and_comment() {
        let txt = render_llms_txt(&sample(), true);
        assert!(txt.contains("SUMMARY\nTables: 1\nFunctions: 1\nTriggers: 1\n"));
        assert!(txt.contains("table:users:tables/users.sql:Registered users\n"));
        assert!(txt.contains("function:get_role:rpc/fn_get_role.sql\n"));
        assert!(txt.contains("trigger:public_users_audit:rpc/trg_public_users_audit.sql\n"));
    }

    #[test]
    fn index_groups_by_kind_and_lists_each_directory_once() {
        let md = render_index_md(&sample(), true);
        assert!(md.contains("- Tables: 1 objects\n"));
        assert!(md.contains("## Tables\n\n- [users](tables/users.sql) - Registered users\n"));
        assert!(md.contains("## Functions\n\n- [get_role](rpc/fn_get_role.sql)\n"));
        assert_eq!(md.matches("└── rpc/").count(), 1);
        assert!(!md.contains("## Views"));
    }

    #[test]
    fn flat_layout_has_no_folders() {
        let md = render_index_md(&sample(), false);
        assert!(md.contains("- [users](users.sql)"));
        assert!(!md.contains("└──"));
        let txt = render_llms_txt(&sample(), false);
        assert!(txt.contains("function:get_role:fn_get_role.sql\n"));
    }
}
