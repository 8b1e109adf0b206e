//! Human-readable line diffs of table DDL.
//!
//! Rendering is reporting only. Verdicts never depend on it.

use crate::reconcile::Verdict;
use colored::Colorize;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::sync::OnceLock;

/// Unchanged lines kept next to a change.
const CONTEXT_LINES: usize = 1;

struct SqlLayout {
    comma: Regex,
    open: Regex,
    close: Regex,
    create_table: Regex,
    primary_key: Regex,
    semicolon: Regex,
}

fn layout() -> &'static SqlLayout {
    static LAYOUT: OnceLock<SqlLayout> = OnceLock::new();
    LAYOUT.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("invalid built-in layout regex");
        SqlLayout {
            comma: re(r",\s*"),
            open: re(r"\(\s*"),
            close: re(r"\s*\)"),
            create_table: re(r"\bCREATE\s+TABLE\b"),
            primary_key: re(r"\bPRIMARY\s+KEY\b"),
            semicolon: re(r";\s*"),
        }
    })
}

/// Break normalized DDL into one clause per line for display.
pub fn format_sql(sql: &str) -> String {
    let l = layout();
    let s = l.comma.replace_all(sql, ",\n  ");
    let s = l.open.replace_all(&s, " (\n  ");
    let s = l.close.replace_all(&s, "\n)");
    let s = l.create_table.replace_all(&s, "\nCREATE TABLE");
    let s = l.primary_key.replace_all(&s, "\n  PRIMARY KEY");
    let s = l.semicolon.replace_all(&s, ";\n");
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which ellipsis wording a collapsed run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapse {
    /// Run after a change: `...(N more lines)...`
    More,
    /// Run before a change: `...(N lines)...`
    Leading,
    /// Run with no neighbouring change: `...(N unchanged lines)...`
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Added(String),
    Removed(String),
    Context(String),
    Collapsed(usize, Collapse),
}

impl DiffLine {
    /// The line without color codes.
    pub fn plain(&self) -> String {
        match self {
            Self::Added(l) => format!("+ {l}"),
            Self::Removed(l) => format!("- {l}"),
            Self::Context(l) => format!("  {l}"),
            Self::Collapsed(n, kind) => format!("  {}", collapse_text(*n, *kind)),
        }
    }
}

fn collapse_text(n: usize, kind: Collapse) -> String {
    match kind {
        Collapse::More => format!("...({n} more lines)..."),
        Collapse::Leading => format!("...({n} lines)..."),
        Collapse::Unchanged => format!("...({n} unchanged lines)..."),
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added(_) => write!(f, "{}", self.plain().green()),
            Self::Removed(_) => write!(f, "{}", self.plain().red()),
            Self::Context(_) => f.write_str(&self.plain()),
            Self::Collapsed(n, kind) => write!(f, "  {}", collapse_text(*n, *kind).cyan()),
        }
    }
}

struct Part {
    tag: ChangeTag,
    lines: Vec<String>,
}

fn parts(old: &str, new: &str) -> Vec<Part> {
    // Terminate both sides so a shared last line compares equal.
    let old = format!("{old}\n");
    let new = format!("{new}\n");
    let diff = TextDiff::from_lines(&old, &new);

    let mut parts: Vec<Part> = Vec::new();
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        match parts.last_mut() {
            Some(part) if part.tag == change.tag() => part.lines.push(line.to_string()),
            _ => parts.push(Part {
                tag: change.tag(),
                lines: vec![line.to_string()],
            }),
        }
    }
    parts
}

fn is_create_table(line: &str) -> bool {
    line.trim().to_uppercase().starts_with("CREATE TABLE")
}

/// Line diff from `old` to `new` with unchanged runs collapsed.
///
/// A `CREATE TABLE` line inside a collapsed run is still shown.
pub fn render_line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let parts = parts(old, new);
    let changed = |i: usize| parts.get(i).is_some_and(|p| p.tag != ChangeTag::Equal);
    let mut out = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        let lines = &part.lines;
        match part.tag {
            ChangeTag::Insert => out.extend(lines.iter().cloned().map(DiffLine::Added)),
            ChangeTag::Delete => out.extend(lines.iter().cloned().map(DiffLine::Removed)),
            ChangeTag::Equal => {
                let before = index > 0 && changed(index - 1);
                let after = changed(index + 1);
                let context = |l: &String| DiffLine::Context(l.clone());

                if before && after {
                    out.extend(lines.iter().map(context));
                } else if before {
                    let shown = CONTEXT_LINES.min(lines.len());
                    out.extend(lines[..shown].iter().map(context));
                    if lines.len() > CONTEXT_LINES {
                        out.push(DiffLine::Collapsed(lines.len() - CONTEXT_LINES, Collapse::More));
                    }
                } else if after {
                    let start = lines.len() - CONTEXT_LINES.min(lines.len());
                    match lines.iter().position(|l| is_create_table(l)) {
                        Some(create) if create < start => {
                            out.push(context(&lines[create]));
                            if create + 1 < start {
                                out.push(DiffLine::Collapsed(start - create - 1, Collapse::Leading));
                            }
                        }
                        _ if start > 0 => out.push(DiffLine::Collapsed(start, Collapse::Leading)),
                        _ => {}
                    }
                    out.extend(lines[start..].iter().map(context));
                } else if lines.len() <= CONTEXT_LINES * 2 {
                    out.extend(lines.iter().map(context));
                } else if let Some(create) = lines.iter().position(|l| is_create_table(l)) {
                    out.push(context(&lines[create]));
                    out.push(DiffLine::Collapsed(lines.len() - 1, Collapse::Unchanged));
                } else {
                    out.push(DiffLine::Collapsed(lines.len(), Collapse::Unchanged));
                }
            }
        }
    }

    out
}

/// Diff of normalized table DDL oriented by verdict.
///
/// `LocalNewer` shows remote → local (what a migration would apply).
/// Every other verdict shows local → remote (what the overwrite would apply).
pub fn table_diff(verdict: Verdict, local_normalized: &str, remote_normalized: &str) -> Vec<DiffLine> {
    let local = format_sql(local_normalized);
    let remote = format_sql(remote_normalized);
    match verdict {
        Verdict::LocalNewer => render_line_diff(&remote, &local),
        _ => render_line_diff(&local, &remote),
    }
}
