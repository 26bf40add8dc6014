//! Three-way merge of schema snapshots.
//!
//! Both branches are diffed against their common ancestor, the two diffs are
//! cross-checked and folded together, and the result is replayed onto a
//! clone of the ancestor. Provenance recorded in the branches'
//! configurations travels along with the schema changes.

pub mod apply;
pub mod conflict;
pub mod equivalence;
pub mod provenance;

use crate::catalog::config::DatabaseConfig;
use crate::catalog::schema::DatabaseSchema;
use crate::catalog::types::Engine;
use crate::config::MergeConfig;
use crate::diff::{DiffScope, diff_metadata};
use crate::error::{MergeError, ResultExt};
use provenance::{
    ConfigSides, align_database_config, apply_update_info, derive_update_info,
    merge_update_info,
};
use tracing::{debug, info, warn};

/// Result of a successful three-way merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDatabase {
    pub schema: DatabaseSchema,
    pub config: DatabaseConfig,
}

fn check_size(
    label: &str,
    schema: &DatabaseSchema,
    config: &MergeConfig,
) -> Result<(), MergeError> {
    let objects = schema.object_count();
    if objects > config.max_schema_objects {
        return Err(MergeError::Validation(format!(
            "{label} snapshot has {objects} objects, limit is {}",
            config.max_schema_objects
        )));
    }
    Ok(())
}

/// Merges `head` into `base` using `ancestor` as the common starting point.
///
/// A missing ancestor is treated as an empty database, so every object on
/// either branch is a creation. Inputs are never modified. The first
/// incompatible edit aborts the merge with [`MergeError::Conflict`].
pub fn try_merge(
    ancestor: Option<&DatabaseSchema>,
    head: &DatabaseSchema,
    base: &DatabaseSchema,
    ancestor_config: &DatabaseConfig,
    head_config: &DatabaseConfig,
    base_config: &DatabaseConfig,
    config: &MergeConfig,
) -> Result<MergedDatabase, MergeError> {
    config.validate()?;
    if let Some(ancestor) = ancestor {
        check_size("ancestor", ancestor, config)?;
    }
    check_size("head", head, config)?;
    check_size("base", base, config)?;

    let ancestor = match ancestor {
        Some(ancestor) => ancestor.clone(),
        None => DatabaseSchema::new(base.name.clone()),
    };
    let head_diff = diff_metadata(&ancestor, head, config.diff_scope)
        .context("failed to diff between ancestor and head")?;
    let base_diff = diff_metadata(&ancestor, base, config.diff_scope)
        .context("failed to diff between ancestor and base")?;

    let head_info = derive_update_info(&head_diff, head_config);
    let base_info = derive_update_info(&base_diff, base_config);

    let mut merged = base_diff;
    if let Err(conflict) = merged.try_merge(head_diff, config.engine) {
        warn!(
            database = %base.name,
            conflict = %conflict,
            "merge: aborted on conflicting edits"
        );
        return Err(conflict.into());
    }
    let info = merge_update_info(base_info, head_info)
        .context("failed to merge update info diff")?;

    let changes = merged.count();
    let mut schema = ancestor;
    merged
        .apply_to(&mut schema)
        .context("failed to apply diff to target")?;

    let mut merged_config = apply_update_info(&info, ancestor_config);
    if config.align_column_catalogs {
        let sides = ConfigSides {
            base: base_config,
            head: head_config,
            ancestor: ancestor_config,
        };
        merged_config = align_database_config(&schema, merged_config, sides);
    }

    info!(
        database = %schema.name,
        changes,
        schemas = schema.schemas.len(),
        tables = schema.table_count(),
        "merge: merged schema"
    );
    Ok(MergedDatabase {
        schema,
        config: merged_config,
    })
}

/// Replays the edits between `base` and `head` onto `target`, another
/// descendant of `base`. Only tables, columns and foreign keys take part.
/// Objects both branches updated keep the fields only `target` changed;
/// edits that collide with the ones `target` already made are rejected with
/// [`MergeError::Conflict`].
pub fn try_merge_into(
    base: &DatabaseSchema,
    head: &DatabaseSchema,
    target: &DatabaseSchema,
) -> Result<DatabaseSchema, MergeError> {
    let head_diff = diff_metadata(base, head, DiffScope::TablesOnly)
        .context("failed to diff between base and head")?;
    let target_diff = diff_metadata(base, target, DiffScope::TablesOnly)
        .context("failed to diff between base and target")?;

    let mut replay = head_diff;
    if let Err(conflict) = replay.rebase(target_diff, Engine::Unspecified) {
        warn!(
            database = %target.name,
            conflict = %conflict,
            "merge: target already diverged"
        );
        return Err(conflict.into());
    }

    let mut out = target.clone();
    replay
        .apply_to(&mut out)
        .context("failed to apply diff to target")?;
    debug!(
        database = %out.name,
        changes = replay.count(),
        "merge: replayed head onto target"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{try_merge, try_merge_into};
    use crate::catalog::config::DatabaseConfig;
    use crate::catalog::schema::{ColumnMetadata, DatabaseSchema, SchemaMetadata, TableMetadata};
    use crate::config::MergeConfig;
    use crate::error::MergeErrorCode;

    fn db(table: TableMetadata) -> DatabaseSchema {
        DatabaseSchema::new("db").with_schema(SchemaMetadata::new("").with_table(table))
    }

    #[test]
    fn missing_ancestor_merges_disjoint_creations() {
        let head = DatabaseSchema::new("db").with_schema(
            SchemaMetadata::new("").with_table(TableMetadata::new("a").column("id", "int")),
        );
        let base = DatabaseSchema::new("db").with_schema(
            SchemaMetadata::new("").with_table(TableMetadata::new("b").column("id", "int")),
        );
        let empty = DatabaseConfig::default();
        let config = MergeConfig::default();
        let merged =
            try_merge(None, &head, &base, &empty, &empty, &empty, &config).expect("merge");
        let schema = merged.schema.schema("").expect("schema");
        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let catalog = merged.config.schema("").expect("catalog");
        assert_eq!(catalog.tables.len(), 2);
    }

    #[test]
    fn oversized_snapshot_is_rejected() {
        let snapshot = db(TableMetadata::new("t").column("a", "int").column("b", "int"));
        let config = MergeConfig {
            max_schema_objects: 2,
            ..MergeConfig::default()
        };
        let empty = DatabaseConfig::default();
        let err = try_merge(
            Some(&snapshot),
            &snapshot,
            &snapshot,
            &empty,
            &empty,
            &empty,
            &config,
        )
        .unwrap_err();
        assert_eq!(err.code(), MergeErrorCode::Validation);
    }

    #[test]
    fn merge_into_replays_head_onto_target() {
        let base = db(TableMetadata::new("t").column("a", "int"));
        let head = db(TableMetadata::new("t").column("a", "int").column("b", "int"));
        let target = db(TableMetadata::new("t").column("a", "int").column("c", "int"));
        let out = try_merge_into(&base, &head, &target).expect("merge");
        let table = out.schema("").and_then(|s| s.table("t")).expect("table");
        assert_eq!(table.column_names(), vec!["a", "c", "b"]);
    }

    #[test]
    fn merge_into_keeps_target_fields_on_shared_column() {
        let base = db(TableMetadata::new("t").column("a", "int"));
        let head = db(TableMetadata::new("t")
            .with_column(ColumnMetadata::new("a", "int").comment("x")));
        let target = db(TableMetadata::new("t")
            .with_column(ColumnMetadata::new("a", "int").not_null()));
        let out = try_merge_into(&base, &head, &target).expect("merge");
        let column = out
            .schema("")
            .and_then(|s| s.table("t"))
            .and_then(|t| t.column_named("a"))
            .expect("column");
        assert!(!column.nullable);
        assert_eq!(column.comment, "x");
    }

    #[test]
    fn merge_into_skips_edits_target_already_has() {
        let base = db(TableMetadata::new("t").column("a", "int").column("gone", "int"));
        let head = db(TableMetadata::new("t").column("a", "int").column("b", "INTEGER"));
        let target = db(TableMetadata::new("t").column("a", "int").column("b", "INTEGER"));
        let out = try_merge_into(&base, &head, &target).expect("merge");
        let table = out.schema("").and_then(|s| s.table("t")).expect("table");
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(out, target);
    }

    #[test]
    fn merge_into_extends_a_table_both_sides_created() {
        let base = DatabaseSchema::new("db").with_schema(SchemaMetadata::new(""));
        let head = db(TableMetadata::new("n").column("id", "int").column("x", "int"));
        let target = db(TableMetadata::new("n").column("id", "int"));
        let out = try_merge_into(&base, &head, &target).expect("merge");
        let schema = out.schema("").expect("schema");
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].column_names(), vec!["id", "x"]);
    }

    #[test]
    fn merge_into_rejects_diverged_column() {
        let base = db(TableMetadata::new("t").column("a", "int"));
        let head = db(TableMetadata::new("t").column("a", "bigint"));
        let target = db(TableMetadata::new("t").column("a", "text"));
        let err = try_merge_into(&base, &head, &target).unwrap_err();
        assert!(err.is_conflict());
    }
}
