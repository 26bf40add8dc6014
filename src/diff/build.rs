use crate::catalog::schema::{
    ColumnMetadata, DatabaseSchema, ForeignKeyMetadata, FunctionMetadata, IndexMetadata, Named,
    PartitionMetadata, ProcedureMetadata, SchemaMetadata, TableMetadata, ViewMetadata,
};
use crate::diff::{
    Change, ColumnDiff, DiffAction, DiffScope, DiffTree, ForeignKeyDiff, FunctionDiff, IndexDiff,
    ObjectDiff, PartitionAttributes, PartitionDiff, ProcedureDiff, SchemaDiff, TableAttributes,
    TableDiff, ViewDiff,
};
use crate::error::{MergeError, ResourceType, ResultExt};
use indexmap::IndexMap;
use tracing::debug;

type Pairs<'a, T> = IndexMap<&'a str, (Option<&'a T>, Option<&'a T>)>;

/// Matches children of both sides by exact name. Iteration order is base
/// declaration order, then names that only exist in head. A name repeated
/// within one side is rejected.
fn pair_by_name<'a, T: Named>(
    kind: ResourceType,
    base: &'a [T],
    head: &'a [T],
) -> Result<Pairs<'a, T>, MergeError> {
    let mut pairs: Pairs<'a, T> = IndexMap::with_capacity(base.len().max(head.len()));
    for item in base {
        let slot = &mut pairs.entry(item.name()).or_insert((None, None)).0;
        if slot.replace(item).is_some() {
            return Err(duplicate_name(kind, item.name(), "base"));
        }
    }
    for item in head {
        let slot = &mut pairs.entry(item.name()).or_insert((None, None)).1;
        if slot.replace(item).is_some() {
            return Err(duplicate_name(kind, item.name(), "head"));
        }
    }
    Ok(pairs)
}

fn duplicate_name(kind: ResourceType, name: &str, side: &str) -> MergeError {
    MergeError::Validation(format!("duplicate {kind} name {name:?} in {side}"))
}

fn children<'a, P, T: 'a>(side: Option<&'a P>, select: impl Fn(&'a P) -> &'a [T]) -> &'a [T] {
    side.map(select).unwrap_or(&[])
}

fn change_of<T: Clone>(
    kind: ResourceType,
    base: Option<&T>,
    head: Option<&T>,
) -> Result<Change<T>, MergeError> {
    match (base, head) {
        (None, Some(head)) => Ok(Change::Create { head: head.clone() }),
        (Some(base), None) => Ok(Change::Drop { base: base.clone() }),
        (Some(base), Some(head)) => Ok(Change::Update {
            base: base.clone(),
            head: head.clone(),
        }),
        (None, None) => Err(MergeError::Precondition(format!(
            "base and head {kind} metadata are both missing"
        ))),
    }
}

fn name_of<'a, T: Named>(base: Option<&'a T>, head: Option<&'a T>) -> String {
    base.or(head).map(|item| item.name().to_string()).unwrap_or_default()
}

fn diff_object<T: Named + Clone + PartialEq>(
    kind: ResourceType,
    base: Option<&T>,
    head: Option<&T>,
) -> Result<Option<ObjectDiff<T>>, MergeError> {
    let change = change_of(kind, base, head)?;
    if let Change::Update { base, head } = &change {
        if base == head {
            return Ok(None);
        }
    }
    Ok(Some(ObjectDiff {
        name: name_of(base, head),
        change,
    }))
}

pub fn diff_column_metadata(
    base: Option<&ColumnMetadata>,
    head: Option<&ColumnMetadata>,
) -> Result<Option<ColumnDiff>, MergeError> {
    diff_object(ResourceType::Column, base, head)
}

pub fn diff_index_metadata(
    base: Option<&IndexMetadata>,
    head: Option<&IndexMetadata>,
) -> Result<Option<IndexDiff>, MergeError> {
    diff_object(ResourceType::Index, base, head)
}

pub fn diff_foreign_key_metadata(
    base: Option<&ForeignKeyMetadata>,
    head: Option<&ForeignKeyMetadata>,
) -> Result<Option<ForeignKeyDiff>, MergeError> {
    diff_object(ResourceType::ForeignKey, base, head)
}

pub fn diff_view_metadata(
    base: Option<&ViewMetadata>,
    head: Option<&ViewMetadata>,
) -> Result<Option<ViewDiff>, MergeError> {
    diff_object(ResourceType::View, base, head)
}

pub fn diff_function_metadata(
    base: Option<&FunctionMetadata>,
    head: Option<&FunctionMetadata>,
) -> Result<Option<FunctionDiff>, MergeError> {
    diff_object(ResourceType::Function, base, head)
}

pub fn diff_procedure_metadata(
    base: Option<&ProcedureMetadata>,
    head: Option<&ProcedureMetadata>,
) -> Result<Option<ProcedureDiff>, MergeError> {
    diff_object(ResourceType::Procedure, base, head)
}

pub fn diff_partition_metadata(
    base: Option<&PartitionMetadata>,
    head: Option<&PartitionMetadata>,
) -> Result<Option<PartitionDiff>, MergeError> {
    let change = change_of(
        ResourceType::Partition,
        base.map(PartitionAttributes::from).as_ref(),
        head.map(PartitionAttributes::from).as_ref(),
    )?;
    let mut subpartitions = IndexMap::new();
    let pairs = pair_by_name(
        ResourceType::Partition,
        children(base, |p| p.subpartitions.as_slice()),
        children(head, |p| p.subpartitions.as_slice()),
    )?;
    for (name, (base_sub, head_sub)) in pairs {
        if let Some(node) = diff_partition_metadata(base_sub, head_sub)
            .with_context(|| format!("failed to diff subpartition {name:?}"))?
        {
            subpartitions.insert(name.to_string(), node);
        }
    }
    if let Change::Update { base, head } = &change {
        if base == head && subpartitions.is_empty() {
            return Ok(None);
        }
    }
    Ok(Some(PartitionDiff {
        object: ObjectDiff {
            name: name_of(base, head),
            change,
        },
        subpartitions,
    }))
}

/// Diffs two versions of a table, descending into every child kind.
pub fn diff_table_metadata(
    base: Option<&TableMetadata>,
    head: Option<&TableMetadata>,
) -> Result<Option<TableDiff>, MergeError> {
    diff_table_scoped(base, head, DiffScope::Full)
}

pub(crate) fn diff_table_scoped(
    base: Option<&TableMetadata>,
    head: Option<&TableMetadata>,
    scope: DiffScope,
) -> Result<Option<TableDiff>, MergeError> {
    let change = change_of(
        ResourceType::Table,
        base.map(TableAttributes::from).as_ref(),
        head.map(TableAttributes::from).as_ref(),
    )?;
    let mut table = TableDiff {
        object: ObjectDiff {
            name: name_of(base, head),
            change,
        },
        columns: IndexMap::new(),
        indexes: Default::default(),
        foreign_keys: Default::default(),
        partitions: IndexMap::new(),
    };

    for (name, (b, h)) in pair_by_name(
        ResourceType::Column,
        children(base, |t| t.columns.as_slice()),
        children(head, |t| t.columns.as_slice()),
    )? {
        if let Some(node) =
            diff_column_metadata(b, h).with_context(|| format!("failed to diff column {name:?}"))?
        {
            table.columns.insert(name.to_string(), node);
        }
    }
    for (name, (b, h)) in pair_by_name(
        ResourceType::ForeignKey,
        children(base, |t| t.foreign_keys.as_slice()),
        children(head, |t| t.foreign_keys.as_slice()),
    )? {
        if let Some(node) = diff_foreign_key_metadata(b, h)
            .with_context(|| format!("failed to diff foreign key {name:?}"))?
        {
            table.foreign_keys.insert(name.to_string(), node);
        }
    }
    if scope.includes_indexes() {
        for (name, (b, h)) in pair_by_name(
            ResourceType::Index,
            children(base, |t| t.indexes.as_slice()),
            children(head, |t| t.indexes.as_slice()),
        )? {
            if let Some(node) =
                diff_index_metadata(b, h).with_context(|| format!("failed to diff index {name:?}"))?
            {
                table.indexes.insert(name.to_string(), node);
            }
        }
    }
    if scope.includes_partitions() {
        for (name, (b, h)) in pair_by_name(
            ResourceType::Partition,
            children(base, |t| t.partitions.as_slice()),
            children(head, |t| t.partitions.as_slice()),
        )? {
            if let Some(node) = diff_partition_metadata(b, h)
                .with_context(|| format!("failed to diff partition {name:?}"))?
            {
                table.partitions.insert(name.to_string(), node);
            }
        }
    }

    if let Change::Update { base, head } = &table.object.change {
        let unchanged = base.comment == head.comment && base.user_comment == head.user_comment;
        if unchanged && !table.has_child_changes() {
            return Ok(None);
        }
    }
    Ok(Some(table))
}

pub fn diff_schema_metadata(
    base: Option<&SchemaMetadata>,
    head: Option<&SchemaMetadata>,
) -> Result<Option<SchemaDiff>, MergeError> {
    diff_schema_scoped(base, head, DiffScope::Full)
}

fn diff_schema_scoped(
    base: Option<&SchemaMetadata>,
    head: Option<&SchemaMetadata>,
    scope: DiffScope,
) -> Result<Option<SchemaDiff>, MergeError> {
    let action = match (base, head) {
        (None, Some(_)) => DiffAction::Create,
        (Some(_), None) => DiffAction::Drop,
        (Some(_), Some(_)) => DiffAction::Update,
        (None, None) => {
            return Err(MergeError::Precondition(
                "base and head schema metadata are both missing".into(),
            ));
        }
    };
    let mut schema = SchemaDiff::empty(name_of(base, head), action);

    for (name, (b, h)) in pair_by_name(
        ResourceType::Table,
        children(base, |s| s.tables.as_slice()),
        children(head, |s| s.tables.as_slice()),
    )? {
        if let Some(node) = diff_table_scoped(b, h, scope)
            .with_context(|| format!("failed to diff table {name:?}"))?
        {
            schema.tables.insert(name.to_string(), node);
        }
    }
    if scope.includes_routines() {
        for (name, (b, h)) in pair_by_name(
            ResourceType::View,
            children(base, |s| s.views.as_slice()),
            children(head, |s| s.views.as_slice()),
        )? {
            if let Some(node) =
                diff_view_metadata(b, h).with_context(|| format!("failed to diff view {name:?}"))?
            {
                schema.views.insert(name.to_string(), node);
            }
        }
        for (name, (b, h)) in pair_by_name(
            ResourceType::Function,
            children(base, |s| s.functions.as_slice()),
            children(head, |s| s.functions.as_slice()),
        )? {
            if let Some(node) = diff_function_metadata(b, h)
                .with_context(|| format!("failed to diff function {name:?}"))?
            {
                schema.functions.insert(name.to_string(), node);
            }
        }
        for (name, (b, h)) in pair_by_name(
            ResourceType::Procedure,
            children(base, |s| s.procedures.as_slice()),
            children(head, |s| s.procedures.as_slice()),
        )? {
            if let Some(node) = diff_procedure_metadata(b, h)
                .with_context(|| format!("failed to diff procedure {name:?}"))?
            {
                schema.procedures.insert(name.to_string(), node);
            }
        }
    }

    if action == DiffAction::Update && !schema.has_child_changes() {
        return Ok(None);
    }
    Ok(Some(schema))
}

/// Computes the minimal diff that turns `base` into `head`.
pub fn diff_metadata(
    base: &DatabaseSchema,
    head: &DatabaseSchema,
    scope: DiffScope,
) -> Result<DiffTree, MergeError> {
    let mut tree = DiffTree::default();
    for (name, (b, h)) in pair_by_name(ResourceType::Schema, &base.schemas, &head.schemas)? {
        if let Some(node) = diff_schema_scoped(b, h, scope)
            .with_context(|| format!("failed to diff schema {name:?}"))?
        {
            tree.schemas.insert(name.to_string(), node);
        }
    }
    debug!(
        database = %head.name,
        scope = ?scope,
        schemas = tree.schemas.len(),
        nodes = tree.count(),
        "diff: computed schema diff"
    );
    Ok(tree)
}
