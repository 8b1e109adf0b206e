use std::fmt;

/// `2020-01-01T00:00:00Z`. Used when the catalog has no usable "last modified" signal.
pub const FALLBACK_TIMESTAMP: i64 = 1_577_836_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Table,
    View,
    RlsPolicySet,
    Function,
    Trigger,
    CronJob,
    CustomType,
}

impl ObjectKind {
    /// Every kind, in index/report order.
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::RlsPolicySet,
        ObjectKind::Function,
        ObjectKind::Trigger,
        ObjectKind::CronJob,
        ObjectKind::CustomType,
    ];

    /// Short token used in `llms.txt` catalogs.
    pub fn token(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::RlsPolicySet => "rls",
            Self::Function => "function",
            Self::Trigger => "trigger",
            Self::CronJob => "cron",
            Self::CustomType => "type",
        }
    }

    /// Human heading used in `index.md` and extraction summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::Table => "Tables",
            Self::View => "Views",
            Self::RlsPolicySet => "RLS Policies",
            Self::Function => "Functions",
            Self::Trigger => "Triggers",
            Self::CronJob => "Cron Jobs",
            Self::CustomType => "Custom Types",
        }
    }

    /// Subdirectory under the extraction root. Triggers share `rpc/` with functions.
    pub fn directory(self) -> &'static str {
        match self {
            Self::Table => "tables",
            Self::View => "views",
            Self::RlsPolicySet => "rls",
            Self::Function | Self::Trigger => "rpc",
            Self::CronJob => "cron",
            Self::CustomType => "types",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A schema object definition read from the database.
///
/// Built fresh on every introspection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    /// Unique within `kind` (schema-qualified with `_` outside `public`).
    pub name: String,
    pub kind: ObjectKind,
    /// Full executable SQL, possibly with provenance comment lines.
    pub ddl: String,
    /// Best-effort unix seconds of the last change.
    pub timestamp: i64,
    /// Persisted database comment, if any.
    pub comment: Option<String>,
    /// Owning `schema.table` for policy sets and triggers.
    pub category: Option<String>,
}

impl SchemaObject {
    /// File name used by extraction: `fn_` / `trg_` prefixes keep functions and triggers apart.
    pub fn file_name(&self) -> String {
        match self.kind {
            ObjectKind::Function => format!("fn_{}.sql", self.name),
            ObjectKind::Trigger => format!("trg_{}.sql", self.name),
            _ => format!("{}.sql", self.name),
        }
    }

    /// Path relative to the extraction root.
    pub fn relative_path(&self, separate_directories: bool) -> String {
        if separate_directories {
            format!("{}/{}", self.kind.directory(), self.file_name())
        } else {
            self.file_name()
        }
    }
}

/// Object name for a relation: bare in `public`, `<schema>_<name>` elsewhere.
pub fn qualified_object_name(schema: &str, name: &str) -> String {
    if schema == "public" {
        name.to_string()
    } else {
        format!("{schema}_{name}")
    }
}
