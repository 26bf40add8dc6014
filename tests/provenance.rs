use schemamerge::catalog::config::{ColumnCatalog, DatabaseConfig, SchemaCatalog, TableCatalog};
use schemamerge::catalog::schema::{DatabaseSchema, SchemaMetadata, TableMetadata};
use schemamerge::config::MergeConfig;
use schemamerge::try_merge;

fn audit() -> SchemaMetadata {
    SchemaMetadata::new("audit").with_table(TableMetadata::new("log").column("at", "datetime"))
}

fn users() -> TableMetadata {
    TableMetadata::new("users").column("id", "int").column("email", "text")
}

struct Fixture {
    ancestor: DatabaseSchema,
    head: DatabaseSchema,
    base: DatabaseSchema,
    ancestor_config: DatabaseConfig,
    head_config: DatabaseConfig,
    base_config: DatabaseConfig,
}

fn fixture() -> Fixture {
    let ancestor = DatabaseSchema::new("shop")
        .with_schema(
            SchemaMetadata::new("app")
                .with_table(users())
                .with_table(TableMetadata::new("orders").column("id", "int")),
        )
        .with_schema(audit());
    let head = DatabaseSchema::new("shop")
        .with_schema(
            SchemaMetadata::new("app")
                .with_table(users().column("phone", "varchar(32)"))
                .with_table(TableMetadata::new("orders").column("id", "int")),
        )
        .with_schema(audit());
    let base = DatabaseSchema::new("shop")
        .with_schema(
            SchemaMetadata::new("app")
                .with_table(users())
                .with_table(TableMetadata::new("invoices").column("id", "int")),
        )
        .with_schema(audit());

    let users_catalog = TableCatalog::new("users")
        .with_column(ColumnCatalog::new("id").semantic_type("identifier"))
        .with_column(ColumnCatalog::new("email").semantic_type("email").label("pii", "true"));
    let ancestor_config = DatabaseConfig::new("shop")
        .with_schema(
            SchemaCatalog::new("app")
                .with_table(users_catalog.clone())
                .with_table(TableCatalog::new("orders").updated_by("carol", 10, "main")),
        )
        .with_schema(
            SchemaCatalog::new("audit")
                .with_table(TableCatalog::new("log").updated_by("carol", 5, "main")),
        );
    let head_config = DatabaseConfig::new("shop").with_schema(
        SchemaCatalog::new("app").with_table(
            users_catalog
                .clone()
                .with_column(ColumnCatalog::new("phone").semantic_type("phone"))
                .updated_by("alice", 100, "feature-a"),
        ),
    );
    let base_config = DatabaseConfig::new("shop").with_schema(
        SchemaCatalog::new("app")
            .with_table(users_catalog)
            .with_table(TableCatalog::new("invoices").updated_by("bob", 200, "feature-b")),
    );
    Fixture {
        ancestor,
        head,
        base,
        ancestor_config,
        head_config,
        base_config,
    }
}

fn run(fixture: &Fixture, config: &MergeConfig) -> DatabaseConfig {
    try_merge(
        Some(&fixture.ancestor),
        &fixture.head,
        &fixture.base,
        &fixture.ancestor_config,
        &fixture.head_config,
        &fixture.base_config,
        config,
    )
    .expect("merge")
    .config
}

#[test]
fn provenance_follows_the_side_that_changed_each_table() {
    let merged = run(&fixture(), &MergeConfig::default());

    let app = merged.schema("app").expect("app");
    let tables: Vec<&str> = app.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, vec!["invoices", "users"]);

    let users = app.table("users").expect("users");
    assert_eq!(users.updater, "alice");
    assert_eq!(users.update_time_micros, Some(100));
    assert_eq!(users.source_branch, "feature-a");

    let invoices = app.table("invoices").expect("invoices");
    assert_eq!(invoices.updater, "bob");
    assert_eq!(invoices.update_time_micros, Some(200));

    let log = merged.table("audit", "log").expect("untouched schema kept");
    assert_eq!(log.updater, "carol");
}

#[test]
fn column_catalogs_are_aligned_with_the_merged_schema() {
    let merged = run(&fixture(), &MergeConfig::default());
    let users = merged.table("app", "users").expect("users");
    let columns: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["email", "id", "phone"]);
    assert_eq!(
        users.column("phone").map(|c| c.semantic_type.as_str()),
        Some("phone")
    );
    assert_eq!(
        users
            .column("email")
            .and_then(|c| c.labels.get("pii"))
            .map(String::as_str),
        Some("true")
    );
}

#[test]
fn alignment_can_be_disabled() {
    let config = MergeConfig {
        align_column_catalogs: false,
        ..MergeConfig::default()
    };
    let merged = run(&fixture(), &config);
    let users = merged.table("app", "users").expect("users");
    let columns: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "email"]);
    assert!(merged.table("app", "orders").is_none());
}
