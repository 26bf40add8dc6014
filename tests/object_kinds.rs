use schemamerge::catalog::config::DatabaseConfig;
use schemamerge::catalog::schema::{
    ColumnMetadata, DatabaseSchema, ForeignKeyMetadata, PartitionMetadata, SchemaMetadata,
    TableMetadata,
};
use schemamerge::catalog::types::DefaultValue;
use schemamerge::config::MergeConfig;
use schemamerge::error::MergeError;
use schemamerge::try_merge;

fn snapshot(schema: SchemaMetadata) -> DatabaseSchema {
    DatabaseSchema::new("db").with_schema(schema)
}

fn app(table: TableMetadata) -> DatabaseSchema {
    snapshot(SchemaMetadata::new("app").with_table(table))
}

fn merge(
    ancestor: &DatabaseSchema,
    head: &DatabaseSchema,
    base: &DatabaseSchema,
) -> Result<DatabaseSchema, MergeError> {
    let empty = DatabaseConfig::default();
    try_merge(
        Some(ancestor),
        head,
        base,
        &empty,
        &empty,
        &empty,
        &MergeConfig::mysql(),
    )
    .map(|merged| merged.schema)
}

fn merged_table<'a>(schema: &'a DatabaseSchema, name: &str) -> &'a TableMetadata {
    schema
        .schema("app")
        .and_then(|s| s.table(name))
        .expect("merged table")
}

fn members(fk: ForeignKeyMetadata) -> DatabaseSchema {
    app(TableMetadata::new("members")
        .column("id", "int")
        .column("team_id", "int")
        .with_foreign_key(fk))
}

fn team_fk() -> ForeignKeyMetadata {
    ForeignKeyMetadata::new("fk_team", &["team_id"], "teams", &["id"])
}

#[test]
fn foreign_key_fields_changed_on_one_side_are_adopted() {
    let ancestor = members(team_fk());
    let head = members(team_fk().on_delete("CASCADE"));
    let mut updated = team_fk();
    updated.on_update = "SET NULL".into();
    let base = members(updated);

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let fk = &merged_table(&merged, "members").foreign_keys[0];
    assert_eq!(fk.on_delete, "CASCADE");
    assert_eq!(fk.on_update, "SET NULL");
}

#[test]
fn foreign_key_diverging_on_delete_conflicts() {
    let ancestor = members(team_fk());
    let head = members(team_fk().on_delete("CASCADE"));
    let base = members(team_fk().on_delete("SET NULL"));

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict foreign key on delete, one is SET NULL, the other is CASCADE"
    );
}

#[test]
fn foreign_key_retargeted_differently_conflicts() {
    let ancestor = members(team_fk());
    let head = members(ForeignKeyMetadata::new("fk_team", &["team_id"], "squads", &["id"]));
    let base = members(ForeignKeyMetadata::new("fk_team", &["team_id"], "groups", &["id"]));

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert!(err.to_string().contains("conflict foreign key referenced table"));
}

fn routines(function: &str, procedure: &str) -> DatabaseSchema {
    snapshot(
        SchemaMetadata::new("app")
            .with_function("score", function)
            .with_procedure("rebuild", procedure),
    )
}

#[test]
fn routine_rewrite_is_adopted_over_a_formatting_change() {
    let ancestor = routines("RETURN 1", "CALL refresh()");
    let head = routines("RETURN 2", "CALL refresh_all()");
    let base = routines("return  1;", "call `refresh`();");

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let schema = merged.schema("app").expect("schema");
    assert_eq!(schema.functions[0].definition, "RETURN 2");
    assert_eq!(schema.procedures[0].definition, "CALL refresh_all()");
}

#[test]
fn diverging_function_definitions_conflict() {
    let ancestor = routines("RETURN 1", "CALL refresh()");
    let head = routines("RETURN 2", "CALL refresh()");
    let base = routines("RETURN 3", "CALL refresh()");

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict function definition, one is RETURN 3, the other is RETURN 2"
    );
}

#[test]
fn diverging_procedure_definitions_conflict() {
    let ancestor = routines("RETURN 1", "CALL refresh()");
    let head = routines("RETURN 1", "CALL refresh(1)");
    let base = routines("RETURN 1", "CALL refresh(2)");

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict procedure definition, one is CALL refresh(2), \
         the other is CALL refresh(1)"
    );
}

fn audited(updated_at: ColumnMetadata) -> DatabaseSchema {
    app(TableMetadata::new("events").column("id", "int").with_column(updated_at))
}

fn updated_at() -> ColumnMetadata {
    ColumnMetadata::new("updated_at", "timestamp").on_update("CURRENT_TIMESTAMP")
}

#[test]
fn on_update_change_is_adopted_next_to_a_comment_edit() {
    let ancestor = audited(updated_at());
    let head = audited(updated_at().on_update("CURRENT_TIMESTAMP(3)"));
    let base = audited(updated_at().comment("last write"));

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let column = merged_table(&merged, "events")
        .column_named("updated_at")
        .expect("column");
    assert_eq!(column.on_update, "CURRENT_TIMESTAMP(3)");
    assert_eq!(column.comment, "last write");
}

#[test]
fn on_update_precision_mismatch_conflicts() {
    let ancestor = audited(ColumnMetadata::new("updated_at", "timestamp"));
    let head = audited(updated_at().on_update("CURRENT_TIMESTAMP(3)"));
    let base = audited(updated_at().on_update("NOW(6)"));

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict column on update, one is NOW(6), \
         the other is CURRENT_TIMESTAMP(3)"
    );

    let head = audited(updated_at().on_update("now()"));
    let base = audited(updated_at());
    merge(&ancestor, &head, &base).expect("equivalent on update");
}

fn sharded(partition: PartitionMetadata) -> DatabaseSchema {
    app(TableMetadata::new("orders")
        .column("id", "int")
        .with_partition(partition))
}

fn p0(value: &str, sub_expression: &str) -> PartitionMetadata {
    PartitionMetadata::new("p0", "RANGE", "id", value)
        .with_subpartition(PartitionMetadata::new("s0", "HASH", sub_expression, ""))
}

#[test]
fn partition_and_subpartition_edits_from_both_sides_combine() {
    let ancestor = sharded(p0("100", "id"));
    let head = sharded(p0("200", "id"));
    let base = sharded(p0("100", "id + 1"));

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let partition = &merged_table(&merged, "orders").partitions[0];
    assert_eq!(partition.value, "200");
    assert_eq!(partition.subpartitions[0].expression, "id + 1");
}

#[test]
fn diverging_partition_values_conflict() {
    let ancestor = sharded(p0("100", "id"));
    let head = sharded(p0("200", "id"));
    let base = sharded(p0("300", "id"));

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict partition value, one is 300, the other is 200"
    );
}

#[test]
fn diverging_subpartition_expressions_conflict() {
    let ancestor = sharded(p0("100", "id"));
    let head = sharded(p0("100", "id * 2"));
    let base = sharded(p0("100", "id + 1"));

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict partition expression, one is id + 1, the other is id * 2"
    );
}

#[test]
fn dropping_a_schema_the_other_side_edited_conflicts() {
    let ancestor = DatabaseSchema::new("db")
        .with_schema(SchemaMetadata::new("app").with_table(TableMetadata::new("t")))
        .with_schema(SchemaMetadata::new("legacy").with_table(TableMetadata::new("old")));
    let head = DatabaseSchema::new("db")
        .with_schema(SchemaMetadata::new("app").with_table(TableMetadata::new("t")));
    let base = DatabaseSchema::new("db")
        .with_schema(SchemaMetadata::new("app").with_table(TableMetadata::new("t")))
        .with_schema(
            SchemaMetadata::new("legacy")
                .with_table(TableMetadata::new("old"))
                .with_table(TableMetadata::new("newer")),
        );

    let err = merge(&ancestor, &head, &base).unwrap_err();
    assert_eq!(
        err.to_string(),
        "merge conflict: conflict schema action, one is UPDATE, the other is DROP"
    );
}

#[test]
fn schema_dropped_on_one_side_is_dropped() {
    let ancestor = DatabaseSchema::new("db")
        .with_schema(SchemaMetadata::new("app").with_table(TableMetadata::new("t")))
        .with_schema(SchemaMetadata::new("legacy").with_table(TableMetadata::new("old")));
    let head = DatabaseSchema::new("db")
        .with_schema(SchemaMetadata::new("app").with_table(TableMetadata::new("t")));
    let base = DatabaseSchema::new("db")
        .with_schema(
            SchemaMetadata::new("app")
                .with_table(TableMetadata::new("t"))
                .with_table(TableMetadata::new("u")),
        )
        .with_schema(SchemaMetadata::new("legacy").with_table(TableMetadata::new("old")));

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let names: Vec<&str> = merged.schemas.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["app"]);
    assert!(merged.schema("app").and_then(|s| s.table("u")).is_some());
}

#[test]
fn literal_defaults_mentioning_now_are_compared_verbatim() {
    let status = |default: &str| {
        ColumnMetadata::new("status", "varchar(10)")
            .default_value(DefaultValue::expression(default))
    };
    let ancestor = app(TableMetadata::new("jobs").with_column(status("'known'")));
    let head = app(TableMetadata::new("jobs").with_column(status("'unknown'")));
    let base = app(TableMetadata::new("jobs").with_column(status("'known'").comment("state")));

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let column = merged_table(&merged, "jobs")
        .column_named("status")
        .expect("column");
    assert_eq!(column.default_value, DefaultValue::expression("'unknown'"));
    assert_eq!(column.comment, "state");
}

#[test]
fn table_engine_change_travels_with_other_table_edits() {
    let with_engine = |engine: &str, extra: &str| {
        let mut table = TableMetadata::new("t").column("a", "int").column(extra, "int");
        table.engine = engine.into();
        app(table)
    };
    let mut ancestor_table = TableMetadata::new("t").column("a", "int");
    ancestor_table.engine = "InnoDB".into();
    let ancestor = app(ancestor_table);
    let head = with_engine("MyISAM", "b");
    let base = with_engine("InnoDB", "c");

    let merged = merge(&ancestor, &head, &base).expect("merge");
    let table = merged_table(&merged, "t");
    assert_eq!(table.engine, "MyISAM");
    assert_eq!(table.column_names(), vec!["a", "c", "b"]);
}
