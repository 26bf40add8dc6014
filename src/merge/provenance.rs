//! Merge of per-object provenance: who last changed a table, view or
//! routine, when, and on which branch.
//!
//! Each side's diff is projected into an [`UpdateInfoTree`] that mirrors the
//! diff's shape one level deep. The two trees are unioned (the second side
//! wins when both touched the same object with the same action) and stamped
//! onto the ancestor's configuration. [`align_database_config`] then brings
//! column catalogs back in line with the merged schema.

use crate::catalog::config::{
    ColumnCatalog, DatabaseConfig, ObjectConfig, SchemaCatalog, TableCatalog,
};
use crate::catalog::schema::{DatabaseSchema, SchemaMetadata, TableMetadata};
use crate::diff::{DiffAction, DiffTree, ObjectDiff};
use crate::error::{MergeError, ResourceType};
use crate::merge::conflict::Conflict;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    pub last_updated_time_micros: Option<u64>,
    pub last_updater: String,
    pub source_branch: String,
}

impl UpdateInfo {
    fn from_table(catalog: &TableCatalog) -> Self {
        Self {
            last_updated_time_micros: catalog.update_time_micros,
            last_updater: catalog.updater.clone(),
            source_branch: catalog.source_branch.clone(),
        }
    }

    fn from_object(config: &ObjectConfig) -> Self {
        Self {
            last_updated_time_micros: config.update_time_micros,
            last_updater: config.updater.clone(),
            source_branch: config.source_branch.clone(),
        }
    }
}

/// Provenance of one changed object. `update_info` is `None` for DROP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfoEntry {
    pub action: DiffAction,
    pub update_info: Option<UpdateInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdateInfo {
    pub name: String,
    pub action: DiffAction,
    pub tables: BTreeMap<String, UpdateInfoEntry>,
    pub views: BTreeMap<String, UpdateInfoEntry>,
    pub functions: BTreeMap<String, UpdateInfoEntry>,
    pub procedures: BTreeMap<String, UpdateInfoEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInfoTree {
    pub schemas: BTreeMap<String, SchemaUpdateInfo>,
}

impl UpdateInfoTree {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn entry_for<T, F>(node: &ObjectDiff<T>, lookup: F) -> UpdateInfoEntry
where
    F: FnOnce() -> Option<UpdateInfo>,
{
    let action = node.action();
    let update_info = match action {
        DiffAction::Drop => None,
        DiffAction::Create | DiffAction::Update => Some(lookup().unwrap_or_default()),
    };
    UpdateInfoEntry {
        action,
        update_info,
    }
}

fn routine_entries<T>(
    nodes: &BTreeMap<String, ObjectDiff<T>>,
    configs: Option<&[ObjectConfig]>,
) -> BTreeMap<String, UpdateInfoEntry> {
    nodes
        .iter()
        .map(|(name, node)| {
            let entry = entry_for(node, || {
                configs
                    .and_then(|configs| configs.iter().find(|c| &c.name == name))
                    .map(UpdateInfo::from_object)
            });
            (name.clone(), entry)
        })
        .collect()
}

/// Projects `diff` onto the provenance recorded in `config`, the
/// configuration of the side the diff leads to.
pub fn derive_update_info(diff: &DiffTree, config: &DatabaseConfig) -> UpdateInfoTree {
    let mut tree = UpdateInfoTree::default();
    for (schema_name, schema) in &diff.schemas {
        let catalog = config.schema(schema_name);
        let tables = schema
            .tables
            .iter()
            .map(|(name, table)| {
                let entry = entry_for(&table.object, || {
                    catalog.and_then(|c| c.table(name)).map(UpdateInfo::from_table)
                });
                (name.clone(), entry)
            })
            .collect();
        tree.schemas.insert(
            schema_name.clone(),
            SchemaUpdateInfo {
                name: schema_name.clone(),
                action: schema.action,
                tables,
                views: routine_entries(&schema.views, catalog.map(|c| c.view_configs.as_slice())),
                functions: routine_entries(
                    &schema.functions,
                    catalog.map(|c| c.function_configs.as_slice()),
                ),
                procedures: routine_entries(
                    &schema.procedures,
                    catalog.map(|c| c.procedure_configs.as_slice()),
                ),
            },
        );
    }
    tree
}

fn config_action_conflict(kind: ResourceType, ours: DiffAction, theirs: DiffAction) -> MergeError {
    Conflict::field(kind, "config action", ours, theirs).into()
}

fn merge_entries(
    kind: ResourceType,
    into: &mut BTreeMap<String, UpdateInfoEntry>,
    other: BTreeMap<String, UpdateInfoEntry>,
) -> Result<(), MergeError> {
    for (name, entry) in other {
        if let Some(existing) = into.get(&name) {
            if existing.action != entry.action {
                return Err(config_action_conflict(kind, existing.action, entry.action));
            }
        }
        into.insert(name, entry);
    }
    Ok(())
}

/// Unions two provenance trees. Objects touched by both sides must carry
/// the same action; the entry from `b` is kept.
pub fn merge_update_info(
    a: UpdateInfoTree,
    b: UpdateInfoTree,
) -> Result<UpdateInfoTree, MergeError> {
    let mut merged = a;
    for (name, theirs) in b.schemas {
        let Some(ours) = merged.schemas.get_mut(&name) else {
            merged.schemas.insert(name, theirs);
            continue;
        };
        if ours.action != theirs.action {
            return Err(config_action_conflict(
                ResourceType::Schema,
                ours.action,
                theirs.action,
            ));
        }
        merge_entries(ResourceType::Table, &mut ours.tables, theirs.tables)?;
        merge_entries(ResourceType::View, &mut ours.views, theirs.views)?;
        merge_entries(ResourceType::Function, &mut ours.functions, theirs.functions)?;
        merge_entries(ResourceType::Procedure, &mut ours.procedures, theirs.procedures)?;
    }
    Ok(merged)
}

fn stamp_objects(configs: &mut Vec<ObjectConfig>, entries: &BTreeMap<String, UpdateInfoEntry>) {
    for (name, entry) in entries {
        let position = configs.iter().position(|c| &c.name == name);
        let Some(info) = &entry.update_info else {
            if let Some(idx) = position {
                configs.remove(idx);
            }
            continue;
        };
        let idx = position.unwrap_or_else(|| {
            configs.push(ObjectConfig::new(name.clone()));
            configs.len() - 1
        });
        let config = &mut configs[idx];
        config.updater = info.last_updater.clone();
        config.update_time_micros = info.last_updated_time_micros;
        config.source_branch = info.source_branch.clone();
    }
}

fn stamp_tables(tables: &mut Vec<TableCatalog>, entries: &BTreeMap<String, UpdateInfoEntry>) {
    for (name, entry) in entries {
        let position = tables.iter().position(|t| &t.name == name);
        let Some(info) = &entry.update_info else {
            if let Some(idx) = position {
                tables.remove(idx);
            }
            continue;
        };
        let idx = position.unwrap_or_else(|| {
            tables.push(TableCatalog::new(name.clone()));
            tables.len() - 1
        });
        let table = &mut tables[idx];
        table.updater = info.last_updater.clone();
        table.update_time_micros = info.last_updated_time_micros;
        table.source_branch = info.source_branch.clone();
    }
}

/// Stamps merged provenance onto `config`. Entries no node mentions are
/// carried over unchanged.
pub fn apply_update_info(tree: &UpdateInfoTree, config: &DatabaseConfig) -> DatabaseConfig {
    let mut out = config.clone();
    for (name, node) in &tree.schemas {
        let position = out.schemas.iter().position(|s| &s.name == name);
        if node.action == DiffAction::Drop {
            if let Some(idx) = position {
                out.schemas.remove(idx);
            }
            continue;
        }
        let idx = position.unwrap_or_else(|| {
            out.schemas.push(SchemaCatalog::new(name.clone()));
            out.schemas.len() - 1
        });
        let catalog = &mut out.schemas[idx];
        stamp_tables(&mut catalog.tables, &node.tables);
        stamp_objects(&mut catalog.view_configs, &node.views);
        stamp_objects(&mut catalog.function_configs, &node.functions);
        stamp_objects(&mut catalog.procedure_configs, &node.procedures);
    }
    out
}

/// Configurations consulted, in order, when a merged column has no catalog.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSides<'a> {
    pub base: &'a DatabaseConfig,
    pub head: &'a DatabaseConfig,
    pub ancestor: &'a DatabaseConfig,
}

impl<'a> ConfigSides<'a> {
    fn column_catalog(&self, schema: &str, table: &str, column: &str) -> Option<&'a ColumnCatalog> {
        [self.base, self.head, self.ancestor]
            .into_iter()
            .filter_map(|config| config.table(schema, table))
            .filter_map(|catalog| catalog.column(column))
            .find(|catalog| !catalog.is_empty())
    }
}

fn align_table(
    schema: &SchemaMetadata,
    table: &TableMetadata,
    catalog: &mut TableCatalog,
    sides: &ConfigSides<'_>,
) {
    catalog.columns.retain(|c| table.column_named(&c.name).is_some());
    for column in &table.columns {
        if catalog.column(&column.name).is_some() {
            continue;
        }
        if let Some(found) = sides.column_catalog(&schema.name, &table.name, &column.name) {
            catalog.columns.push(found.clone());
        }
    }
    catalog.columns.sort_by(|a, b| a.name.cmp(&b.name));
}

fn align_schema(merged: &SchemaMetadata, catalog: &mut SchemaCatalog, sides: &ConfigSides<'_>) {
    catalog.tables.retain(|t| merged.table(&t.name).is_some());
    for table in &merged.tables {
        match catalog.tables.iter_mut().find(|t| t.name == table.name) {
            Some(table_catalog) => align_table(merged, table, table_catalog, sides),
            None => {
                let mut table_catalog = TableCatalog::new(table.name.clone());
                align_table(merged, table, &mut table_catalog, sides);
                if !table_catalog.columns.is_empty() {
                    catalog.tables.push(table_catalog);
                }
            }
        }
    }
    catalog.tables.sort_by(|a, b| a.name.cmp(&b.name));
    catalog.view_configs.sort_by(|a, b| a.name.cmp(&b.name));
    catalog.function_configs.sort_by(|a, b| a.name.cmp(&b.name));
    catalog.procedure_configs.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Prunes catalogs of schemas, tables and columns missing from `schema`,
/// fills in column catalogs the merge left behind, and sorts every level by
/// name. Catalogs are only created where a column catalog was recovered.
pub fn align_database_config(
    schema: &DatabaseSchema,
    config: DatabaseConfig,
    sides: ConfigSides<'_>,
) -> DatabaseConfig {
    let mut out = config;
    out.schemas.retain(|c| schema.schema(&c.name).is_some());
    for merged in &schema.schemas {
        match out.schemas.iter_mut().find(|c| c.name == merged.name) {
            Some(catalog) => align_schema(merged, catalog, &sides),
            None => {
                let mut catalog = SchemaCatalog::new(merged.name.clone());
                align_schema(merged, &mut catalog, &sides);
                if !catalog.tables.is_empty() {
                    out.schemas.push(catalog);
                }
            }
        }
    }
    out.schemas.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffScope, diff_metadata};

    fn db(schema: SchemaMetadata) -> DatabaseSchema {
        DatabaseSchema::new("db").with_schema(schema)
    }

    fn entry(action: DiffAction, updater: &str) -> UpdateInfoEntry {
        UpdateInfoEntry {
            action,
            update_info: Some(UpdateInfo {
                last_updated_time_micros: Some(1),
                last_updater: updater.to_string(),
                source_branch: "main".to_string(),
            }),
        }
    }

    fn tree_with_table(table: &str, entry: UpdateInfoEntry) -> UpdateInfoTree {
        let mut schema = SchemaUpdateInfo {
            name: "app".to_string(),
            action: DiffAction::Update,
            tables: BTreeMap::new(),
            views: BTreeMap::new(),
            functions: BTreeMap::new(),
            procedures: BTreeMap::new(),
        };
        schema.tables.insert(table.to_string(), entry);
        let mut tree = UpdateInfoTree::default();
        tree.schemas.insert("app".to_string(), schema);
        tree
    }

    #[test]
    fn derive_reads_side_config_and_skips_drops() {
        let ancestor = db(SchemaMetadata::new("app")
            .with_table(TableMetadata::new("old").column("id", "int"))
            .with_table(TableMetadata::new("users").column("id", "int")));
        let head = db(SchemaMetadata::new("app")
            .with_table(TableMetadata::new("users").column("id", "bigint"))
            .with_view("v", "select 1"));
        let diff = diff_metadata(&ancestor, &head, DiffScope::Full).expect("diff");
        let config = DatabaseConfig::new("db").with_schema(
            SchemaCatalog::new("app")
                .with_table(TableCatalog::new("users").updated_by("alice", 42, "feature")),
        );
        let tree = derive_update_info(&diff, &config);
        let schema = &tree.schemas["app"];
        assert_eq!(schema.tables["old"].action, DiffAction::Drop);
        assert_eq!(schema.tables["old"].update_info, None);
        let users = schema.tables["users"].update_info.as_ref().expect("info");
        assert_eq!(users.last_updater, "alice");
        assert_eq!(users.last_updated_time_micros, Some(42));
        assert_eq!(schema.views["v"].update_info, Some(UpdateInfo::default()));
    }

    #[test]
    fn merge_keeps_second_side_on_same_action() {
        let a = tree_with_table("users", entry(DiffAction::Update, "alice"));
        let b = tree_with_table("users", entry(DiffAction::Update, "bob"));
        let merged = merge_update_info(a, b).expect("merge");
        let info = merged.schemas["app"].tables["users"].update_info.as_ref().expect("info");
        assert_eq!(info.last_updater, "bob");
    }

    #[test]
    fn merge_rejects_action_mismatch() {
        let a = tree_with_table("users", entry(DiffAction::Update, "alice"));
        let b = tree_with_table("users", entry(DiffAction::Create, "bob"));
        let err = merge_update_info(a, b).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "merge conflict: conflict table config action, one is UPDATE, the other is CREATE"
        );
    }

    #[test]
    fn apply_stamps_drops_and_keeps_untouched() {
        let config = DatabaseConfig::new("db")
            .with_schema(
                SchemaCatalog::new("app")
                    .with_table(TableCatalog::new("gone"))
                    .with_table(TableCatalog::new("kept").updated_by("carol", 7, "main")),
            )
            .with_schema(SchemaCatalog::new("audit").with_table(TableCatalog::new("log")));
        let mut tree = tree_with_table("users", entry(DiffAction::Create, "bob"));
        if let Some(schema) = tree.schemas.get_mut("app") {
            schema.tables.insert(
                "gone".to_string(),
                UpdateInfoEntry {
                    action: DiffAction::Drop,
                    update_info: None,
                },
            );
        }
        let out = apply_update_info(&tree, &config);
        let app = out.schema("app").expect("app");
        assert!(app.table("gone").is_none());
        assert_eq!(app.table("kept").map(|t| t.updater.as_str()), Some("carol"));
        assert_eq!(app.table("users").map(|t| t.updater.as_str()), Some("bob"));
        assert!(out.table("audit", "log").is_some());
    }

    #[test]
    fn align_prunes_fills_and_sorts() {
        let merged = db(SchemaMetadata::new("app").with_table(
            TableMetadata::new("users").column("name", "text").column("email", "text"),
        ));
        let config = DatabaseConfig::new("db").with_schema(
            SchemaCatalog::new("app")
                .with_table(
                    TableCatalog::new("users")
                        .with_column(ColumnCatalog::new("name").semantic_type("person_name"))
                        .with_column(ColumnCatalog::new("dropped").semantic_type("x")),
                )
                .with_table(TableCatalog::new("stale")),
        );
        let empty = DatabaseConfig::default();
        let base = DatabaseConfig::new("db").with_schema(SchemaCatalog::new("app").with_table(
            TableCatalog::new("users").with_column(ColumnCatalog::new("email")),
        ));
        let head = DatabaseConfig::new("db").with_schema(SchemaCatalog::new("app").with_table(
            TableCatalog::new("users")
                .with_column(ColumnCatalog::new("email").label("pii", "true")),
        ));
        let sides = ConfigSides {
            base: &base,
            head: &head,
            ancestor: &empty,
        };
        let out = align_database_config(&merged, config, sides);
        let app = out.schema("app").expect("app");
        assert!(app.table("stale").is_none());
        let users = app.table("users").expect("users");
        let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["email", "name"]);
        assert_eq!(
            users.column("email").and_then(|c| c.labels.get("pii")).map(String::as_str),
            Some("true")
        );
    }
}
