//! Replays a (merged) diff onto a target snapshot.
//!
//! CREATE appends, DROP removes by name and UPDATE rewrites the matching
//! object in place, so children no diff touched keep the target's values.
//! Sorted collections are replayed in name order; columns, partitions and
//! subpartitions in the order the diff recorded them.

use crate::catalog::schema::{
    DatabaseSchema, Named, PartitionMetadata, SchemaMetadata, TableMetadata, position_by_name,
};
use crate::diff::{
    Change, DiffAction, DiffTree, ObjectDiff, PartitionAttributes, PartitionDiff, SchemaDiff,
    TableAttributes, TableDiff,
};
use crate::error::{MergeError, ResourceType, ResultExt};

fn locate<T: Named>(
    kind: ResourceType,
    target: &[T],
    name: &str,
) -> Result<usize, MergeError> {
    position_by_name(target, name).ok_or_else(|| MergeError::not_found(kind, name))
}

fn apply_object<T: Named + Clone>(
    kind: ResourceType,
    node: &ObjectDiff<T>,
    target: &mut Vec<T>,
) -> Result<(), MergeError> {
    match &node.change {
        Change::Create { head } => target.push(head.clone()),
        Change::Drop { .. } => {
            let idx = locate(kind, target, &node.name)?;
            target.remove(idx);
        }
        Change::Update { head, .. } => {
            let idx = locate(kind, target, &node.name)?;
            target[idx] = head.clone();
        }
    }
    Ok(())
}

fn overlay_table_attributes(table: &mut TableMetadata, attrs: &TableAttributes) {
    table.comment = attrs.comment.clone();
    table.user_comment = attrs.user_comment.clone();
    table.engine = attrs.engine.clone();
    table.collation = attrs.collation.clone();
}

fn overlay_partition_attributes(partition: &mut PartitionMetadata, attrs: &PartitionAttributes) {
    partition.partition_type = attrs.partition_type.clone();
    partition.expression = attrs.expression.clone();
    partition.value = attrs.value.clone();
}

fn apply_partition(
    node: &PartitionDiff,
    target: &mut Vec<PartitionMetadata>,
) -> Result<(), MergeError> {
    match &node.object.change {
        Change::Create { head } => {
            let mut partition = PartitionMetadata {
                name: node.name().to_string(),
                ..PartitionMetadata::default()
            };
            overlay_partition_attributes(&mut partition, head);
            apply_partition_children(node, &mut partition)?;
            target.push(partition);
        }
        Change::Drop { .. } => {
            let idx = locate(ResourceType::Partition, target, node.name())?;
            target.remove(idx);
        }
        Change::Update { head, .. } => {
            let idx = locate(ResourceType::Partition, target, node.name())?;
            let partition = &mut target[idx];
            overlay_partition_attributes(partition, head);
            apply_partition_children(node, partition)?;
        }
    }
    Ok(())
}

fn apply_partition_children(
    node: &PartitionDiff,
    partition: &mut PartitionMetadata,
) -> Result<(), MergeError> {
    for sub in node.subpartitions.values() {
        apply_partition(sub, &mut partition.subpartitions)
            .with_context(|| format!("failed to apply diff to subpartition {:?}", sub.name()))?;
    }
    Ok(())
}

fn apply_table_children(node: &TableDiff, table: &mut TableMetadata) -> Result<(), MergeError> {
    for column in node.columns.values() {
        apply_object(ResourceType::Column, column, &mut table.columns)?;
    }
    for foreign_key in node.foreign_keys.values() {
        apply_object(ResourceType::ForeignKey, foreign_key, &mut table.foreign_keys)?;
    }
    for index in node.indexes.values() {
        apply_object(ResourceType::Index, index, &mut table.indexes)?;
    }
    for partition in node.partitions.values() {
        apply_partition(partition, &mut table.partitions)
            .with_context(|| format!("failed to apply diff to partition {:?}", partition.name()))?;
    }
    Ok(())
}

fn apply_table(node: &TableDiff, target: &mut Vec<TableMetadata>) -> Result<(), MergeError> {
    match &node.object.change {
        Change::Create { head } => {
            let mut table = TableMetadata::new(node.name());
            overlay_table_attributes(&mut table, head);
            apply_table_children(node, &mut table)?;
            target.push(table);
        }
        Change::Drop { .. } => {
            let idx = locate(ResourceType::Table, target, node.name())?;
            target.remove(idx);
        }
        Change::Update { head, .. } => {
            let idx = locate(ResourceType::Table, target, node.name())?;
            let table = &mut target[idx];
            overlay_table_attributes(table, head);
            apply_table_children(node, table)?;
        }
    }
    Ok(())
}

fn apply_schema_children(node: &SchemaDiff, schema: &mut SchemaMetadata) -> Result<(), MergeError> {
    for table in node.tables.values() {
        apply_table(table, &mut schema.tables)
            .with_context(|| format!("failed to apply diff to table {:?}", table.name()))?;
    }
    for view in node.views.values() {
        apply_object(ResourceType::View, view, &mut schema.views)?;
    }
    for function in node.functions.values() {
        apply_object(ResourceType::Function, function, &mut schema.functions)?;
    }
    for procedure in node.procedures.values() {
        apply_object(ResourceType::Procedure, procedure, &mut schema.procedures)?;
    }
    Ok(())
}

fn apply_schema(node: &SchemaDiff, target: &mut Vec<SchemaMetadata>) -> Result<(), MergeError> {
    match node.action {
        DiffAction::Create => {
            let mut schema = SchemaMetadata::new(node.name.clone());
            apply_schema_children(node, &mut schema)?;
            target.push(schema);
        }
        DiffAction::Drop => {
            let idx = locate(ResourceType::Schema, target, &node.name)?;
            target.remove(idx);
        }
        DiffAction::Update => {
            let idx = locate(ResourceType::Schema, target, &node.name)?;
            apply_schema_children(node, &mut target[idx])?;
        }
    }
    Ok(())
}

impl DiffTree {
    /// Applies every node to `target`. On error `target` is left partially
    /// updated; callers apply onto a private clone.
    pub fn apply_to(&self, target: &mut DatabaseSchema) -> Result<(), MergeError> {
        for schema in self.schemas.values() {
            apply_schema(schema, &mut target.schemas)
                .with_context(|| format!("failed to apply diff to schema {:?}", schema.name))?;
        }
        Ok(())
    }
}
