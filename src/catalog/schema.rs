use crate::catalog::types::DefaultValue;
use serde::{Deserialize, Serialize};

/// One database snapshot: a forest of schemas. Engines without a schema
/// concept keep a single schema named `""`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<SchemaMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaMetadata {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
    #[serde(default)]
    pub views: Vec<ViewMetadata>,
    #[serde(default)]
    pub functions: Vec<FunctionMetadata>,
    #[serde(default)]
    pub procedures: Vec<ProcedureMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    /// Declaration order is significant.
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub indexes: Vec<IndexMetadata>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyMetadata>,
    /// Declaration order is significant.
    #[serde(default)]
    pub partitions: Vec<PartitionMetadata>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub user_comment: String,
    /// Display only; never part of a merge decision.
    #[serde(default)]
    pub engine: String,
    /// Display only; never part of a merge decision.
    #[serde(default)]
    pub collation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: DefaultValue,
    #[serde(default)]
    pub on_update: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub user_comment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMetadata {
    pub name: String,
    #[serde(default)]
    pub expressions: Vec<String>,
    #[serde(rename = "type", default)]
    pub index_type: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyMetadata {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub referenced_schema: String,
    #[serde(default)]
    pub referenced_table: String,
    #[serde(default)]
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: String,
    #[serde(default)]
    pub on_update: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub name: String,
    #[serde(rename = "type", default)]
    pub partition_type: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub subpartitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewMetadata {
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcedureMetadata {
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

/// Anything addressed by name inside its parent collection.
pub trait Named {
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    &self.name
                }
            }
        )*
    };
}

impl_named!(
    SchemaMetadata,
    TableMetadata,
    ColumnMetadata,
    IndexMetadata,
    ForeignKeyMetadata,
    PartitionMetadata,
    ViewMetadata,
    FunctionMetadata,
    ProcedureMetadata,
);

/// Linear lookup by name, matching the collection's own order.
pub fn find_by_name<'a, T: Named>(items: &'a [T], name: &str) -> Option<&'a T> {
    items.iter().find(|item| item.name() == name)
}

pub fn position_by_name<T: Named>(items: &[T], name: &str) -> Option<usize> {
    items.iter().position(|item| item.name() == name)
}

impl DatabaseSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schemas: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: SchemaMetadata) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaMetadata> {
        find_by_name(&self.schemas, name)
    }

    /// Total number of named objects in the snapshot, used to bound merges.
    pub fn object_count(&self) -> usize {
        self.schemas
            .iter()
            .map(|schema| {
                1 + schema.views.len()
                    + schema.functions.len()
                    + schema.procedures.len()
                    + schema
                        .tables
                        .iter()
                        .map(TableMetadata::object_count)
                        .sum::<usize>()
            })
            .sum()
    }

    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }
}

impl SchemaMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_view(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.views.push(ViewMetadata {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.functions.push(FunctionMetadata {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn with_procedure(
        mut self,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        self.procedures.push(ProcedureMetadata {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        find_by_name(&self.tables, name)
    }
}

impl TableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a column with the given type and default nullability.
    pub fn column(mut self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.columns.push(ColumnMetadata::new(name, column_type));
        self
    }

    pub fn with_column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyMetadata) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn with_partition(mut self, partition: PartitionMetadata) -> Self {
        self.partitions.push(partition);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn column_named(&self, name: &str) -> Option<&ColumnMetadata> {
        find_by_name(&self.columns, name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn object_count(&self) -> usize {
        1 + self.columns.len()
            + self.indexes.len()
            + self.foreign_keys.len()
            + self
                .partitions
                .iter()
                .map(PartitionMetadata::object_count)
                .sum::<usize>()
    }
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            ..Self::default()
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, default_value: DefaultValue) -> Self {
        self.default_value = default_value;
        self
    }

    pub fn on_update(mut self, on_update: impl Into<String>) -> Self {
        self.on_update = on_update.into();
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>, expressions: &[&str]) -> Self {
        Self {
            name: name.into(),
            expressions: expressions.iter().map(|e| (*e).to_string()).collect(),
            index_type: "BTREE".to_string(),
            unique: false,
            primary: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        if primary {
            self.unique = true;
        }
        self
    }
}

impl ForeignKeyMetadata {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            referenced_schema: String::new(),
            referenced_table: referenced_table.into(),
            referenced_columns: referenced_columns.iter().map(|c| (*c).to_string()).collect(),
            on_delete: "NO ACTION".to_string(),
            on_update: "NO ACTION".to_string(),
        }
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = action.into();
        self
    }
}

impl PartitionMetadata {
    pub fn new(
        name: impl Into<String>,
        partition_type: impl Into<String>,
        expression: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_type: partition_type.into(),
            expression: expression.into(),
            value: value.into(),
            subpartitions: Vec::new(),
        }
    }

    pub fn with_subpartition(mut self, subpartition: PartitionMetadata) -> Self {
        self.subpartitions.push(subpartition);
        self
    }

    fn object_count(&self) -> usize {
        1 + self
            .subpartitions
            .iter()
            .map(PartitionMetadata::object_count)
            .sum::<usize>()
    }
}
