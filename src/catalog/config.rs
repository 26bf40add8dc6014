use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Governance metadata kept alongside a schema snapshot: classification,
/// semantic column types and who last touched each object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<SchemaCatalog>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaCatalog {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableCatalog>,
    #[serde(default)]
    pub view_configs: Vec<ObjectConfig>,
    #[serde(default)]
    pub function_configs: Vec<ObjectConfig>,
    #[serde(default)]
    pub procedure_configs: Vec<ObjectConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableCatalog {
    pub name: String,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub columns: Vec<ColumnCatalog>,
    #[serde(default)]
    pub updater: String,
    #[serde(default)]
    pub update_time_micros: Option<u64>,
    #[serde(default)]
    pub source_branch: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnCatalog {
    pub name: String,
    #[serde(default)]
    pub semantic_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub classification: String,
}

/// Provenance for views, functions and procedures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(default)]
    pub updater: String,
    #[serde(default)]
    pub update_time_micros: Option<u64>,
    #[serde(default)]
    pub source_branch: String,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: SchemaCatalog) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaCatalog> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<&TableCatalog> {
        self.schema(schema).and_then(|s| s.table(table))
    }
}

impl SchemaCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: TableCatalog) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableCatalog> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn view(&self, name: &str) -> Option<&ObjectConfig> {
        self.view_configs.iter().find(|v| v.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&ObjectConfig> {
        self.function_configs.iter().find(|f| f.name == name)
    }

    pub fn procedure(&self, name: &str) -> Option<&ObjectConfig> {
        self.procedure_configs.iter().find(|p| p.name == name)
    }
}

impl TableCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_column(mut self, column: ColumnCatalog) -> Self {
        self.columns.push(column);
        self
    }

    pub fn updated_by(
        mut self,
        updater: impl Into<String>,
        update_time_micros: u64,
        source_branch: impl Into<String>,
    ) -> Self {
        self.updater = updater.into();
        self.update_time_micros = Some(update_time_micros);
        self.source_branch = source_branch.into();
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnCatalog> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl ColumnCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn semantic_type(mut self, semantic_type: impl Into<String>) -> Self {
        self.semantic_type = semantic_type.into();
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// A catalog carrying nothing beyond the column name.
    pub fn is_empty(&self) -> bool {
        self.semantic_type.is_empty() && self.labels.is_empty() && self.classification.is_empty()
    }
}

impl ObjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
