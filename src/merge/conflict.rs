//! Cross-checks two diffs taken from the same ancestor and folds the second
//! into the first.
//!
//! Nodes present on only one side never conflict. Nodes present on both
//! sides must agree on the action; two CREATEs must produce equivalent
//! objects and two UPDATEs are reconciled field by field: a field changed by
//! one side only takes that side's value, a field changed by both sides must
//! end up equivalent. The first disagreement aborts the merge.

use crate::catalog::schema::{
    ColumnMetadata, ForeignKeyMetadata, FunctionMetadata, IndexMetadata, ProcedureMetadata,
    ViewMetadata,
};
use crate::catalog::types::{DefaultValue, Engine};
use crate::diff::{
    Change, DiffAction, DiffTree, ObjectDiff, PartitionAttributes, PartitionDiff, SchemaDiff,
    TableAttributes, TableDiff,
};
use crate::error::{MergeError, ResourceType};
use crate::merge::equivalence::{
    column_type_equal, default_value_equal, on_update_equal, partition_expression_equal,
    routine_definition_equal, view_definition_equal,
};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// A human-readable description of the first incompatible edit found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Conflict {
    message: String,
}

impl Conflict {
    pub fn field(
        kind: ResourceType,
        field: &str,
        ours: impl std::fmt::Display,
        theirs: impl std::fmt::Display,
    ) -> Self {
        Self {
            message: format!("conflict {kind} {field}, one is {ours}, the other is {theirs}"),
        }
    }

    pub fn action(kind: ResourceType, ours: DiffAction, theirs: DiffAction) -> Self {
        Self::field(kind, "action", ours, theirs)
    }

    fn mismatched_pair(kind: ResourceType, ours: &str, theirs: &str) -> Self {
        Self {
            message: format!("non-expected {kind} node pair, one is {ours}, the other is {theirs}"),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Conflict> for MergeError {
    fn from(conflict: Conflict) -> Self {
        MergeError::Conflict(conflict.message)
    }
}

/// Rendering of a field value inside a conflict message.
pub trait FieldValue: Clone {
    fn render(&self) -> String;
}

impl FieldValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl FieldValue for bool {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl FieldValue for Vec<String> {
    fn render(&self) -> String {
        format!("[{}]", self.join(" "))
    }
}

impl FieldValue for DefaultValue {
    fn render(&self) -> String {
        self.to_string()
    }
}

/// The four versions of one object seen by an UPDATE/UPDATE merge.
pub struct Sides<'a, T> {
    pub ours_base: &'a T,
    pub ours_head: &'a mut T,
    pub theirs_base: &'a T,
    pub theirs_head: &'a T,
}

/// Three-way rule for a single attribute. When only the other side changed
/// the value it is copied into `ours_head`.
pub fn reconcile_field<V: FieldValue>(
    kind: ResourceType,
    field: &str,
    ours_base: &V,
    ours_head: &mut V,
    theirs_base: &V,
    theirs_head: &V,
    eq: impl Fn(&V, &V) -> bool,
) -> Result<(), Conflict> {
    if eq(theirs_base, theirs_head) {
        return Ok(());
    }
    if eq(ours_base, ours_head) {
        *ours_head = theirs_head.clone();
        return Ok(());
    }
    if eq(ours_head, theirs_head) {
        return Ok(());
    }
    Err(Conflict::field(
        kind,
        field,
        ours_head.render(),
        theirs_head.render(),
    ))
}

fn require_equal<V: FieldValue>(
    kind: ResourceType,
    field: &str,
    ours: &V,
    theirs: &V,
    eq: impl Fn(&V, &V) -> bool,
) -> Result<(), Conflict> {
    if eq(ours, theirs) {
        Ok(())
    } else {
        Err(Conflict::field(kind, field, ours.render(), theirs.render()))
    }
}

macro_rules! reconcile {
    ($sides:expr, $kind:expr, $label:literal, $field:ident, $eq:expr) => {
        reconcile_field(
            $kind,
            $label,
            &$sides.ours_base.$field,
            &mut $sides.ours_head.$field,
            &$sides.theirs_base.$field,
            &$sides.theirs_head.$field,
            $eq,
        )?
    };
}

macro_rules! require {
    ($ours:expr, $theirs:expr, $kind:expr, $label:literal, $field:ident, $eq:expr) => {
        require_equal($kind, $label, &$ours.$field, &$theirs.$field, $eq)?
    };
}

fn exact<V: PartialEq>(a: &V, b: &V) -> bool {
    a == b
}

/// Per-kind merge rules for a leaf payload.
pub trait MergeableObject: Clone {
    const KIND: ResourceType;

    /// Both sides created an object with the same name.
    fn check_created(&self, theirs: &Self, engine: Engine) -> Result<(), Conflict>;

    /// Both sides updated the same object.
    fn reconcile(sides: Sides<'_, Self>, engine: Engine) -> Result<(), Conflict>;
}

impl MergeableObject for ColumnMetadata {
    const KIND: ResourceType = ResourceType::Column;

    fn check_created(&self, theirs: &Self, engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        require!(self, theirs, kind, "type", column_type, |a: &String, b: &String| {
            column_type_equal(a, b, engine)
        });
        require!(self, theirs, kind, "default value", default_value, default_value_equal);
        require!(self, theirs, kind, "on update", on_update, |a: &String, b: &String| {
            on_update_equal(a, b)
        });
        require!(self, theirs, kind, "nullable", nullable, exact);
        require!(self, theirs, kind, "comment", comment, exact);
        require!(self, theirs, kind, "user comment", user_comment, exact);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        reconcile!(sides, kind, "type", column_type, |a: &String, b: &String| {
            column_type_equal(a, b, engine)
        });
        reconcile!(sides, kind, "default value", default_value, default_value_equal);
        reconcile!(sides, kind, "on update", on_update, |a: &String, b: &String| {
            on_update_equal(a, b)
        });
        reconcile!(sides, kind, "nullable", nullable, exact);
        reconcile!(sides, kind, "comment", comment, exact);
        reconcile!(sides, kind, "user comment", user_comment, exact);
        Ok(())
    }
}

impl MergeableObject for IndexMetadata {
    const KIND: ResourceType = ResourceType::Index;

    fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        require!(self, theirs, kind, "expressions", expressions, exact);
        require!(self, theirs, kind, "type", index_type, exact);
        require!(self, theirs, kind, "unique", unique, exact);
        require!(self, theirs, kind, "primary", primary, exact);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        reconcile!(sides, kind, "expressions", expressions, exact);
        reconcile!(sides, kind, "type", index_type, exact);
        reconcile!(sides, kind, "unique", unique, exact);
        reconcile!(sides, kind, "primary", primary, exact);
        Ok(())
    }
}

impl MergeableObject for ForeignKeyMetadata {
    const KIND: ResourceType = ResourceType::ForeignKey;

    fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        require!(self, theirs, kind, "referenced schema", referenced_schema, exact);
        require!(self, theirs, kind, "referenced table", referenced_table, exact);
        require!(self, theirs, kind, "on delete", on_delete, exact);
        require!(self, theirs, kind, "on update", on_update, exact);
        require!(self, theirs, kind, "columns", columns, exact);
        require!(self, theirs, kind, "referenced columns", referenced_columns, exact);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        reconcile!(sides, kind, "referenced schema", referenced_schema, exact);
        reconcile!(sides, kind, "referenced table", referenced_table, exact);
        reconcile!(sides, kind, "on delete", on_delete, exact);
        reconcile!(sides, kind, "on update", on_update, exact);
        reconcile!(sides, kind, "columns", columns, exact);
        reconcile!(sides, kind, "referenced columns", referenced_columns, exact);
        Ok(())
    }
}

impl MergeableObject for ViewMetadata {
    const KIND: ResourceType = ResourceType::View;

    fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
        let eq = |a: &String, b: &String| view_definition_equal(a, b);
        require!(self, theirs, Self::KIND, "definition", definition, eq);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
        let eq = |a: &String, b: &String| view_definition_equal(a, b);
        reconcile!(sides, Self::KIND, "definition", definition, eq);
        Ok(())
    }
}

macro_rules! impl_routine {
    ($ty:ty, $kind:expr) => {
        impl MergeableObject for $ty {
            const KIND: ResourceType = $kind;

            fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
                let eq = |a: &String, b: &String| routine_definition_equal(a, b);
                require!(self, theirs, Self::KIND, "definition", definition, eq);
                Ok(())
            }

            fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
                let eq = |a: &String, b: &String| routine_definition_equal(a, b);
                reconcile!(sides, Self::KIND, "definition", definition, eq);
                Ok(())
            }
        }
    };
}

impl_routine!(FunctionMetadata, ResourceType::Function);
impl_routine!(ProcedureMetadata, ResourceType::Procedure);

/// Takes the other side's value when only the other side changed it and
/// keeps ours otherwise. Used for display-only attributes.
fn adopt_field<V: Clone + PartialEq>(
    ours_base: &V,
    ours_head: &mut V,
    theirs_base: &V,
    theirs_head: &V,
) {
    if ours_base == ours_head && theirs_base != theirs_head {
        *ours_head = theirs_head.clone();
    }
}

/// Engine and collation are display-only and never conflict.
impl MergeableObject for TableAttributes {
    const KIND: ResourceType = ResourceType::Table;

    fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
        require!(self, theirs, Self::KIND, "comment", comment, exact);
        require!(self, theirs, Self::KIND, "user comment", user_comment, exact);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
        reconcile!(sides, Self::KIND, "comment", comment, exact);
        reconcile!(sides, Self::KIND, "user comment", user_comment, exact);
        adopt_field(
            &sides.ours_base.engine,
            &mut sides.ours_head.engine,
            &sides.theirs_base.engine,
            &sides.theirs_head.engine,
        );
        adopt_field(
            &sides.ours_base.collation,
            &mut sides.ours_head.collation,
            &sides.theirs_base.collation,
            &sides.theirs_head.collation,
        );
        Ok(())
    }
}

impl MergeableObject for PartitionAttributes {
    const KIND: ResourceType = ResourceType::Partition;

    fn check_created(&self, theirs: &Self, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        require!(self, theirs, kind, "type", partition_type, exact);
        require!(self, theirs, kind, "expression", expression, |a: &String, b: &String| {
            partition_expression_equal(a, b)
        });
        require!(self, theirs, kind, "value", value, exact);
        Ok(())
    }

    fn reconcile(sides: Sides<'_, Self>, _engine: Engine) -> Result<(), Conflict> {
        let kind = Self::KIND;
        reconcile!(sides, kind, "type", partition_type, exact);
        reconcile!(sides, kind, "expression", expression, |a: &String, b: &String| {
            partition_expression_equal(a, b)
        });
        reconcile!(sides, kind, "value", value, exact);
        Ok(())
    }
}

impl<T: MergeableObject> ObjectDiff<T> {
    pub fn try_merge(&mut self, theirs: &ObjectDiff<T>, engine: Engine) -> Result<(), Conflict> {
        if self.name != theirs.name {
            return Err(Conflict::mismatched_pair(T::KIND, &self.name, &theirs.name));
        }
        match (&mut self.change, &theirs.change) {
            (Change::Drop { .. }, Change::Drop { .. }) => Ok(()),
            (Change::Create { head }, Change::Create { head: theirs_head }) => {
                head.check_created(theirs_head, engine)
            }
            (
                Change::Update { base, head },
                Change::Update {
                    base: theirs_base,
                    head: theirs_head,
                },
            ) => T::reconcile(
                Sides {
                    ours_base: &*base,
                    ours_head: head,
                    theirs_base,
                    theirs_head,
                },
                engine,
            ),
            (ours, theirs) => Err(Conflict::action(T::KIND, ours.action(), theirs.action())),
        }
    }
}

/// Merges matched children in `ours` order, then appends the children only
/// `theirs` has, in `theirs` order.
fn merge_ordered<V>(
    ours: &mut IndexMap<String, V>,
    mut theirs: IndexMap<String, V>,
    mut merge: impl FnMut(&mut V, V) -> Result<(), Conflict>,
) -> Result<(), Conflict> {
    for (name, node) in ours.iter_mut() {
        if let Some(other) = theirs.shift_remove(name) {
            merge(node, other)?;
        }
    }
    ours.extend(theirs);
    Ok(())
}

fn merge_sorted<V>(
    ours: &mut BTreeMap<String, V>,
    mut theirs: BTreeMap<String, V>,
    mut merge: impl FnMut(&mut V, V) -> Result<(), Conflict>,
) -> Result<(), Conflict> {
    for (name, node) in ours.iter_mut() {
        if let Some(other) = theirs.remove(name) {
            merge(node, other)?;
        }
    }
    ours.extend(theirs);
    Ok(())
}

impl PartitionDiff {
    pub fn try_merge(&mut self, theirs: PartitionDiff, engine: Engine) -> Result<(), Conflict> {
        self.object.try_merge(&theirs.object, engine)?;
        if self.action() == DiffAction::Drop {
            return Ok(());
        }
        merge_ordered(&mut self.subpartitions, theirs.subpartitions, |ours, other| {
            ours.try_merge(other, engine)
        })
    }
}

impl TableDiff {
    pub fn try_merge(&mut self, theirs: TableDiff, engine: Engine) -> Result<(), Conflict> {
        self.object.try_merge(&theirs.object, engine)?;
        if self.action() == DiffAction::Drop {
            return Ok(());
        }
        merge_ordered(&mut self.columns, theirs.columns, |ours, other| {
            ours.try_merge(&other, engine)
        })?;
        merge_sorted(&mut self.foreign_keys, theirs.foreign_keys, |ours, other| {
            ours.try_merge(&other, engine)
        })?;
        merge_sorted(&mut self.indexes, theirs.indexes, |ours, other| {
            ours.try_merge(&other, engine)
        })?;
        merge_ordered(&mut self.partitions, theirs.partitions, |ours, other| {
            ours.try_merge(other, engine)
        })
    }
}

impl SchemaDiff {
    pub fn try_merge(&mut self, theirs: SchemaDiff, engine: Engine) -> Result<(), Conflict> {
        if self.name != theirs.name {
            return Err(Conflict::mismatched_pair(
                ResourceType::Schema,
                &self.name,
                &theirs.name,
            ));
        }
        if self.action != theirs.action {
            return Err(Conflict::action(ResourceType::Schema, self.action, theirs.action));
        }
        if self.action == DiffAction::Drop {
            return Ok(());
        }
        merge_sorted(&mut self.tables, theirs.tables, |ours, other| {
            ours.try_merge(other, engine)
        })?;
        merge_sorted(&mut self.views, theirs.views, |ours, other| {
            ours.try_merge(&other, engine)
        })?;
        merge_sorted(&mut self.functions, theirs.functions, |ours, other| {
            ours.try_merge(&other, engine)
        })?;
        merge_sorted(&mut self.procedures, theirs.procedures, |ours, other| {
            ours.try_merge(&other, engine)
        })
    }
}

impl DiffTree {
    /// Folds `theirs` into `self`, failing on the first conflicting edit.
    /// On error `self` may be partially merged and should be discarded.
    pub fn try_merge(&mut self, theirs: DiffTree, engine: Engine) -> Result<(), Conflict> {
        merge_sorted(&mut self.schemas, theirs.schemas, |ours, other| {
            ours.try_merge(other, engine)
        })
    }
}

/// What is left of a node after rebasing it onto an edit the target
/// already carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rebased {
    /// The node still changes the target.
    Pending,
    /// The target already carries the node's effect.
    Settled,
}

impl<T: MergeableObject + PartialEq> ObjectDiff<T> {
    fn rebase(&mut self, theirs: &ObjectDiff<T>, engine: Engine) -> Result<Rebased, Conflict> {
        self.try_merge(theirs, engine)?;
        if self.action() == DiffAction::Update && self.head() != theirs.head() {
            Ok(Rebased::Pending)
        } else {
            Ok(Rebased::Settled)
        }
    }

    /// Both sides created the object: from the target's point of view what
    /// remains is an update of the object it already created.
    fn settle_created(&mut self, theirs: &ObjectDiff<T>) {
        let existing = match (&self.change, &theirs.change) {
            (Change::Create { head }, Change::Create { head: existing }) => {
                Some((existing.clone(), head.clone()))
            }
            _ => None,
        };
        if let Some((base, head)) = existing {
            self.change = Change::Update { base, head };
        }
    }
}

/// Rebases matched children and removes the settled ones. Children only
/// `theirs` has are already part of the target and are left out.
fn rebase_ordered<V>(
    ours: &mut IndexMap<String, V>,
    mut theirs: IndexMap<String, V>,
    mut rebase: impl FnMut(&mut V, V) -> Result<Rebased, Conflict>,
) -> Result<(), Conflict> {
    let mut settled = Vec::new();
    for (name, node) in ours.iter_mut() {
        if let Some(other) = theirs.shift_remove(name) {
            if rebase(node, other)? == Rebased::Settled {
                settled.push(name.clone());
            }
        }
    }
    for name in settled {
        ours.shift_remove(&name);
    }
    Ok(())
}

fn rebase_sorted<V>(
    ours: &mut BTreeMap<String, V>,
    mut theirs: BTreeMap<String, V>,
    mut rebase: impl FnMut(&mut V, V) -> Result<Rebased, Conflict>,
) -> Result<(), Conflict> {
    let mut settled = Vec::new();
    for (name, node) in ours.iter_mut() {
        if let Some(other) = theirs.remove(name) {
            if rebase(node, other)? == Rebased::Settled {
                settled.push(name.clone());
            }
        }
    }
    for name in settled {
        ours.remove(&name);
    }
    Ok(())
}

impl PartitionDiff {
    fn rebase(&mut self, theirs: PartitionDiff, engine: Engine) -> Result<Rebased, Conflict> {
        self.object.try_merge(&theirs.object, engine)?;
        match self.action() {
            DiffAction::Drop => return Ok(Rebased::Settled),
            DiffAction::Create => self.object.settle_created(&theirs.object),
            DiffAction::Update => {}
        }
        let carried = self.object.head() == theirs.object.head();
        rebase_ordered(&mut self.subpartitions, theirs.subpartitions, |ours, other| {
            ours.rebase(other, engine)
        })?;
        if carried && self.subpartitions.is_empty() {
            return Ok(Rebased::Settled);
        }
        Ok(Rebased::Pending)
    }
}

impl TableDiff {
    fn rebase(&mut self, theirs: TableDiff, engine: Engine) -> Result<Rebased, Conflict> {
        self.object.try_merge(&theirs.object, engine)?;
        match self.action() {
            DiffAction::Drop => return Ok(Rebased::Settled),
            DiffAction::Create => self.object.settle_created(&theirs.object),
            DiffAction::Update => {}
        }
        let carried = self.object.head() == theirs.object.head();
        rebase_ordered(&mut self.columns, theirs.columns, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        rebase_sorted(&mut self.foreign_keys, theirs.foreign_keys, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        rebase_sorted(&mut self.indexes, theirs.indexes, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        rebase_ordered(&mut self.partitions, theirs.partitions, |ours, other| {
            ours.rebase(other, engine)
        })?;
        if carried && !self.has_child_changes() {
            return Ok(Rebased::Settled);
        }
        Ok(Rebased::Pending)
    }
}

impl SchemaDiff {
    fn rebase(&mut self, theirs: SchemaDiff, engine: Engine) -> Result<Rebased, Conflict> {
        if self.action != theirs.action {
            return Err(Conflict::action(ResourceType::Schema, self.action, theirs.action));
        }
        match self.action {
            DiffAction::Drop => return Ok(Rebased::Settled),
            DiffAction::Create => self.action = DiffAction::Update,
            DiffAction::Update => {}
        }
        rebase_sorted(&mut self.tables, theirs.tables, |ours, other| {
            ours.rebase(other, engine)
        })?;
        rebase_sorted(&mut self.views, theirs.views, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        rebase_sorted(&mut self.functions, theirs.functions, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        rebase_sorted(&mut self.procedures, theirs.procedures, |ours, other| {
            ours.rebase(&other, engine)
        })?;
        if self.has_child_changes() {
            Ok(Rebased::Pending)
        } else {
            Ok(Rebased::Settled)
        }
    }
}

impl DiffTree {
    /// Reconciles `self` with `theirs`, a diff from the same ancestor whose
    /// edits the replay target already carries. Conflicts follow the same
    /// rules as [`DiffTree::try_merge`]. Afterwards `self` holds only what
    /// the target still lacks: edits both sides made are removed, and
    /// updates on objects both sides touched carry the fields only `theirs`
    /// changed.
    pub fn rebase(&mut self, theirs: DiffTree, engine: Engine) -> Result<(), Conflict> {
        rebase_sorted(&mut self.schemas, theirs.schemas, |ours, other| {
            ours.rebase(other, engine)
        })
    }
}
