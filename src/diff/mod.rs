//! Structural diff between two schema snapshots.
//!
//! A [`DiffTree`] holds one node per object that differs between the two
//! sides, tagged with the action that turns the first snapshot into the
//! second. Unchanged objects are never materialized.

pub mod build;

pub use build::{
    diff_column_metadata, diff_foreign_key_metadata, diff_function_metadata,
    diff_index_metadata, diff_metadata, diff_partition_metadata, diff_procedure_metadata,
    diff_schema_metadata, diff_table_metadata, diff_view_metadata,
};

use crate::catalog::schema::{
    ColumnMetadata, ForeignKeyMetadata, FunctionMetadata, IndexMetadata, PartitionMetadata,
    ProcedureMetadata, TableMetadata, ViewMetadata,
};
use crate::error::ResourceType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffAction {
    Create,
    Update,
    Drop,
}

impl DiffAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffAction::Create => "CREATE",
            DiffAction::Update => "UPDATE",
            DiffAction::Drop => "DROP",
        }
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which object kinds a diff descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffScope {
    #[default]
    Full,
    /// Schemas, tables, columns and foreign keys only.
    TablesOnly,
}

impl DiffScope {
    pub fn includes_indexes(self) -> bool {
        self == DiffScope::Full
    }

    pub fn includes_partitions(self) -> bool {
        self == DiffScope::Full
    }

    pub fn includes_routines(self) -> bool {
        self == DiffScope::Full
    }
}

/// The before/after payload of one object. The variant fixes which sides
/// exist, so a CREATE never carries a base and a DROP never carries a head.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Create { head: T },
    Update { base: T, head: T },
    Drop { base: T },
}

impl<T> Change<T> {
    pub fn action(&self) -> DiffAction {
        match self {
            Change::Create { .. } => DiffAction::Create,
            Change::Update { .. } => DiffAction::Update,
            Change::Drop { .. } => DiffAction::Drop,
        }
    }

    pub fn base(&self) -> Option<&T> {
        match self {
            Change::Create { .. } => None,
            Change::Update { base, .. } | Change::Drop { base } => Some(base),
        }
    }

    pub fn head(&self) -> Option<&T> {
        match self {
            Change::Create { head } | Change::Update { head, .. } => Some(head),
            Change::Drop { .. } => None,
        }
    }
}

/// Diff node for a single named object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDiff<T> {
    pub name: String,
    pub change: Change<T>,
}

impl<T> ObjectDiff<T> {
    pub fn action(&self) -> DiffAction {
        self.change.action()
    }

    pub fn base(&self) -> Option<&T> {
        self.change.base()
    }

    pub fn head(&self) -> Option<&T> {
        self.change.head()
    }
}

pub type ColumnDiff = ObjectDiff<ColumnMetadata>;
pub type IndexDiff = ObjectDiff<IndexMetadata>;
pub type ForeignKeyDiff = ObjectDiff<ForeignKeyMetadata>;
pub type ViewDiff = ObjectDiff<ViewMetadata>;
pub type FunctionDiff = ObjectDiff<FunctionMetadata>;
pub type ProcedureDiff = ObjectDiff<ProcedureMetadata>;

/// Scalar attributes of a table, without its child collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAttributes {
    pub comment: String,
    pub user_comment: String,
    pub engine: String,
    pub collation: String,
}

impl From<&TableMetadata> for TableAttributes {
    fn from(table: &TableMetadata) -> Self {
        Self {
            comment: table.comment.clone(),
            user_comment: table.user_comment.clone(),
            engine: table.engine.clone(),
            collation: table.collation.clone(),
        }
    }
}

/// Scalar attributes of a partition, without its subpartitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionAttributes {
    pub partition_type: String,
    pub expression: String,
    pub value: String,
}

impl From<&PartitionMetadata> for PartitionAttributes {
    fn from(partition: &PartitionMetadata) -> Self {
        Self {
            partition_type: partition.partition_type.clone(),
            expression: partition.expression.clone(),
            value: partition.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDiff {
    pub object: ObjectDiff<PartitionAttributes>,
    /// Declaration order: base order first, then names only in head.
    pub subpartitions: IndexMap<String, PartitionDiff>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff {
    pub object: ObjectDiff<TableAttributes>,
    /// Declaration order: base order first, then names only in head.
    pub columns: IndexMap<String, ColumnDiff>,
    pub indexes: BTreeMap<String, IndexDiff>,
    pub foreign_keys: BTreeMap<String, ForeignKeyDiff>,
    /// Declaration order: base order first, then names only in head.
    pub partitions: IndexMap<String, PartitionDiff>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDiff {
    pub name: String,
    pub action: DiffAction,
    pub tables: BTreeMap<String, TableDiff>,
    pub views: BTreeMap<String, ViewDiff>,
    pub functions: BTreeMap<String, FunctionDiff>,
    pub procedures: BTreeMap<String, ProcedureDiff>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffTree {
    pub schemas: BTreeMap<String, SchemaDiff>,
}

impl PartitionDiff {
    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn action(&self) -> DiffAction {
        self.object.action()
    }
}

impl TableDiff {
    pub fn name(&self) -> &str {
        &self.object.name
    }

    pub fn action(&self) -> DiffAction {
        self.object.action()
    }

    pub fn has_child_changes(&self) -> bool {
        !(self.columns.is_empty()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
            && self.partitions.is_empty())
    }
}

impl SchemaDiff {
    pub(crate) fn empty(name: impl Into<String>, action: DiffAction) -> Self {
        Self {
            name: name.into(),
            action,
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
            functions: BTreeMap::new(),
            procedures: BTreeMap::new(),
        }
    }

    pub fn has_child_changes(&self) -> bool {
        !(self.tables.is_empty()
            && self.views.is_empty()
            && self.functions.is_empty()
            && self.procedures.is_empty())
    }
}

/// Borrowed view of any diff node.
#[derive(Debug, Clone, Copy)]
pub enum DiffNodeRef<'a> {
    Schema(&'a SchemaDiff),
    Table(&'a TableDiff),
    Column(&'a ColumnDiff),
    Index(&'a IndexDiff),
    ForeignKey(&'a ForeignKeyDiff),
    Partition(&'a PartitionDiff),
    View(&'a ViewDiff),
    Function(&'a FunctionDiff),
    Procedure(&'a ProcedureDiff),
}

impl<'a> DiffNodeRef<'a> {
    pub fn kind(&self) -> ResourceType {
        match self {
            DiffNodeRef::Schema(_) => ResourceType::Schema,
            DiffNodeRef::Table(_) => ResourceType::Table,
            DiffNodeRef::Column(_) => ResourceType::Column,
            DiffNodeRef::Index(_) => ResourceType::Index,
            DiffNodeRef::ForeignKey(_) => ResourceType::ForeignKey,
            DiffNodeRef::Partition(_) => ResourceType::Partition,
            DiffNodeRef::View(_) => ResourceType::View,
            DiffNodeRef::Function(_) => ResourceType::Function,
            DiffNodeRef::Procedure(_) => ResourceType::Procedure,
        }
    }

    pub fn action(&self) -> DiffAction {
        match self {
            DiffNodeRef::Schema(node) => node.action,
            DiffNodeRef::Table(node) => node.action(),
            DiffNodeRef::Column(node) => node.action(),
            DiffNodeRef::Index(node) => node.action(),
            DiffNodeRef::ForeignKey(node) => node.action(),
            DiffNodeRef::Partition(node) => node.action(),
            DiffNodeRef::View(node) => node.action(),
            DiffNodeRef::Function(node) => node.action(),
            DiffNodeRef::Procedure(node) => node.action(),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            DiffNodeRef::Schema(node) => &node.name,
            DiffNodeRef::Table(node) => node.name(),
            DiffNodeRef::Column(node) => &node.name,
            DiffNodeRef::Index(node) => &node.name,
            DiffNodeRef::ForeignKey(node) => &node.name,
            DiffNodeRef::Partition(node) => node.name(),
            DiffNodeRef::View(node) => &node.name,
            DiffNodeRef::Function(node) => &node.name,
            DiffNodeRef::Procedure(node) => &node.name,
        }
    }
}

/// One flattened diff node, addressed by its dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub path: String,
    pub kind: ResourceType,
    pub action: DiffAction,
}

impl DiffTree {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Visits every node depth-first, parents before children.
    pub fn walk<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(DiffNodeRef<'a>),
    {
        self.visit(&mut |_, node| f(node));
    }

    pub fn changes(&self) -> Vec<ChangeEntry> {
        let mut out = Vec::new();
        self.visit(&mut |path, node| {
            out.push(ChangeEntry {
                path: path
                    .iter()
                    .filter(|segment| !segment.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("."),
                kind: node.kind(),
                action: node.action(),
            });
        });
        out
    }

    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(|_| n += 1);
        n
    }

    fn visit<'a>(&'a self, f: &mut dyn FnMut(&[&'a str], DiffNodeRef<'a>)) {
        let mut path: Vec<&'a str> = Vec::new();
        for schema in self.schemas.values() {
            path.push(&schema.name);
            f(&path, DiffNodeRef::Schema(schema));
            for table in schema.tables.values() {
                path.push(table.name());
                f(&path, DiffNodeRef::Table(table));
                visit_leaves(&mut path, &table.columns, DiffNodeRef::Column, f);
                visit_leaves(&mut path, &table.indexes, DiffNodeRef::Index, f);
                visit_leaves(&mut path, &table.foreign_keys, DiffNodeRef::ForeignKey, f);
                for partition in table.partitions.values() {
                    visit_partition(&mut path, partition, f);
                }
                path.pop();
            }
            visit_leaves(&mut path, &schema.views, DiffNodeRef::View, f);
            visit_leaves(&mut path, &schema.functions, DiffNodeRef::Function, f);
            visit_leaves(&mut path, &schema.procedures, DiffNodeRef::Procedure, f);
            path.pop();
        }
    }
}

fn visit_leaves<'a, T: 'a, M>(
    path: &mut Vec<&'a str>,
    nodes: M,
    wrap: fn(&'a ObjectDiff<T>) -> DiffNodeRef<'a>,
    f: &mut dyn FnMut(&[&'a str], DiffNodeRef<'a>),
) where
    M: IntoIterator<Item = (&'a String, &'a ObjectDiff<T>)>,
{
    for (name, node) in nodes {
        path.push(name);
        f(path, wrap(node));
        path.pop();
    }
}

fn visit_partition<'a>(
    path: &mut Vec<&'a str>,
    partition: &'a PartitionDiff,
    f: &mut dyn FnMut(&[&'a str], DiffNodeRef<'a>),
) {
    path.push(partition.name());
    f(path, DiffNodeRef::Partition(partition));
    for sub in partition.subpartitions.values() {
        visit_partition(path, sub, f);
    }
    path.pop();
}
