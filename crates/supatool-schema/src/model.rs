//! Typed YAML data model consumed by the generators.
//!
//! Field and table order follows the document. Shape errors are reported at
//! load time as [`SchemaError::Model`].

use crate::error::{SchemaError, SchemaResult};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    pub models: Vec<ModelGroup>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub security: Security,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelGroup {
    #[serde(default)]
    pub tables: IndexMap<String, TableDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    #[serde(default)]
    pub description: Option<String>,
    /// Built-in tables (e.g. `auth.users`) that are modelled but never created.
    #[serde(default)]
    pub skip_create: bool,
    pub fields: IndexMap<String, FieldDef>,
    #[serde(default)]
    pub relations: IndexMap<String, RelationDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub label: Option<String>,
    /// `table.column` this field points at.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

impl FieldDef {
    /// The `DEFAULT` expression as SQL text.
    pub fn default_sql(&self) -> Option<String> {
        match self.default.as_ref()? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Table part of `ref`.
    pub fn ref_table(&self) -> Option<&str> {
        self.reference.as_deref()?.split_once('.').map(|(t, _)| t)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDef {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Security {
    #[serde(default)]
    pub functions: IndexMap<String, SecurityFunction>,
    /// Table name to action (`select`, `insert`, ...) to policy.
    #[serde(default)]
    pub policies: IndexMap<String, IndexMap<String, PolicyDef>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityFunction {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub use_template: Option<bool>,
    #[serde(default)]
    pub template_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyDef {
    #[serde(default)]
    pub using: Option<String>,
    #[serde(default)]
    pub role: Vec<String>,
    #[serde(default)]
    pub use_template: Option<bool>,
    #[serde(default)]
    pub template_type: Option<String>,
}

impl Model {
    /// Parse and validate a model document.
    pub fn from_yaml_str(source: &str) -> SchemaResult<Self> {
        let model: Model =
            serde_yaml::from_str(source).map_err(|e| SchemaError::Model(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> SchemaResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
        Self::from_yaml_str(&source)
            .map_err(|e| SchemaError::Model(format!("{}: {e}", path.display())))
    }

    /// Every table across all groups, in document order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableDef)> {
        self.models
            .iter()
            .flat_map(|g| g.tables.iter().map(|(name, t)| (name.as_str(), t)))
    }

    /// Tables that the SQL and code generators should emit.
    pub fn created_tables(&self) -> impl Iterator<Item = (&str, &TableDef)> {
        self.tables().filter(|(_, t)| !t.skip_create)
    }

    fn validate(&self) -> SchemaResult<()> {
        for (table, def) in self.tables() {
            for (field, f) in &def.fields {
                let Some(reference) = f.reference.as_deref() else {
                    continue;
                };
                let valid = reference
                    .split_once('.')
                    .is_some_and(|(t, c)| !t.is_empty() && !c.is_empty() && !c.contains('.'));
                if !valid {
                    return Err(SchemaError::Model(format!(
                        "{table}.{field}: ref `{reference}` must be `table.column`"
                    )));
                }
            }
        }
        Ok(())
    }
}
