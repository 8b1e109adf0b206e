//! DDL normalization and table-name filtering.
//!
//! Normalization is only a comparison key. It is never written back to disk.

use crate::error::{SchemaError, SchemaResult};

/// Drop blank lines and `--` comment lines, keeping the remaining lines as-is.
pub fn ddl_body(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("--")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapse whitespace runs to one space, break after `;` + whitespace, trim.
///
/// `normalize_ddl(normalize_ddl(x)) == normalize_ddl(x)` for every input.
pub fn normalize_ddl(ddl: &str) -> String {
    ddl.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("; ", ";\n")
        .trim()
        .to_string()
}

/// Key under which two DDL texts are considered equivalent.
pub fn comparison_key(ddl: &str) -> String {
    normalize_ddl(&ddl_body(ddl))
}

/// Wildcard filter over table/object names. `*` matches any substring.
#[derive(Debug, Clone)]
pub struct TablePattern {
    raw: String,
    /// `None` for the match-everything pattern.
    pattern: Option<glob::Pattern>,
}

impl TablePattern {
    pub fn new(raw: &str) -> SchemaResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Ok(Self::any());
        }
        let pattern = glob::Pattern::new(raw)
            .map_err(|e| SchemaError::Other(format!("invalid table pattern {raw:?}: {e}")))?;
        Ok(Self {
            raw: raw.to_string(),
            pattern: Some(pattern),
        })
    }

    /// The pattern that matches every name.
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            pattern: None,
        }
    }

    pub fn is_any(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.pattern {
            None => true,
            Some(p) => p.matches(name),
        }
    }
}

impl Default for TablePattern {
    fn default() -> Self {
        Self::any()
    }
}
