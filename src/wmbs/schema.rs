//! The bookkeeping schema.

use crate::db::{Dialect, SchemaCreator, TableDef};

/// Subscription types seeded into `wmbs_sub_types`.
pub const SUBSCRIPTION_TYPES: [&str; 3] = ["Processing", "Merge", "Harvesting"];

/// Every table of the schema, in creation order.
pub const TABLES: [&str; 12] = [
    "wmbs_fileset",
    "wmbs_file_details",
    "wmbs_fileset_files",
    "wmbs_location",
    "wmbs_file_location",
    "wmbs_workflow",
    "wmbs_sub_types",
    "wmbs_subscription",
    "wmbs_subscription_location",
    "wmbs_sub_files_acquired",
    "wmbs_sub_files_failed",
    "wmbs_sub_files_complete",
];

fn references(column: &str, table: &str) -> String {
    format!("FOREIGN KEY ({column}) REFERENCES {table}(id) ON DELETE CASCADE")
}

/// Builds the complete bookkeeping schema for `dialect`.
///
/// Create keys carry a two-digit ordinal so referenced tables come first.
pub fn wmbs_schema(dialect: Dialect) -> SchemaCreator {
    let id = format!("id {}", dialect.serial_primary_key());
    let mut creator = SchemaCreator::new(dialect);

    creator.add_table(
        "01wmbs_fileset",
        TableDef::new("wmbs_fileset")
            .column(&id)
            .column("name VARCHAR(1250) NOT NULL")
            .column("open BOOLEAN NOT NULL DEFAULT FALSE")
            .column("last_update BIGINT NOT NULL DEFAULT 0")
            .constraint("wmbs_fileset_unique", "UNIQUE (name)"),
    );

    creator.add_table(
        "02wmbs_file_details",
        TableDef::new("wmbs_file_details")
            .column(&id)
            .column("lfn VARCHAR(1250) NOT NULL")
            .column("size BIGINT NOT NULL DEFAULT 0")
            .column("events BIGINT NOT NULL DEFAULT 0")
            .column("first_event BIGINT NOT NULL DEFAULT 0")
            .column("merged BOOLEAN NOT NULL DEFAULT FALSE")
            .constraint("wmbs_file_details_unique", "UNIQUE (lfn)"),
    );

    creator.add_table(
        "03wmbs_fileset_files",
        TableDef::new("wmbs_fileset_files")
            .column("file BIGINT NOT NULL")
            .column("fileset BIGINT NOT NULL")
            .column("insert_time BIGINT NOT NULL DEFAULT 0")
            .constraint("wmbs_fileset_files_unique", "UNIQUE (file, fileset)")
            .constraint("wmbs_fileset_files_file_fk", references("file", "wmbs_file_details"))
            .constraint("wmbs_fileset_files_fileset_fk", references("fileset", "wmbs_fileset")),
    );

    creator.add_table(
        "04wmbs_location",
        TableDef::new("wmbs_location")
            .column(&id)
            .column("se_name VARCHAR(255) NOT NULL")
            .column("job_slots BIGINT NOT NULL DEFAULT 0")
            .constraint("wmbs_location_unique", "UNIQUE (se_name)"),
    );

    creator.add_table(
        "05wmbs_file_location",
        TableDef::new("wmbs_file_location")
            .column("file BIGINT NOT NULL")
            .column("location BIGINT NOT NULL")
            .constraint("wmbs_file_location_unique", "UNIQUE (file, location)")
            .constraint("wmbs_file_location_file_fk", references("file", "wmbs_file_details"))
            .constraint("wmbs_file_location_location_fk", references("location", "wmbs_location")),
    );

    creator.add_table(
        "06wmbs_workflow",
        TableDef::new("wmbs_workflow")
            .column(&id)
            .column("spec VARCHAR(700) NOT NULL")
            .column("name VARCHAR(700) NOT NULL")
            .column("owner VARCHAR(300) NOT NULL")
            .constraint("wmbs_workflow_unique", "UNIQUE (spec, name, owner)"),
    );

    creator.add_table(
        "07wmbs_sub_types",
        TableDef::new("wmbs_sub_types")
            .column(&id)
            .column("name VARCHAR(255) NOT NULL")
            .constraint("wmbs_sub_types_unique", "UNIQUE (name)"),
    );

    creator.add_table(
        "08wmbs_subscription",
        TableDef::new("wmbs_subscription")
            .column(&id)
            .column("fileset BIGINT NOT NULL")
            .column("workflow BIGINT NOT NULL")
            .column("subtype BIGINT NOT NULL")
            .column("split_algo VARCHAR(255) NOT NULL DEFAULT 'FileBased'")
            .column("last_update BIGINT NOT NULL DEFAULT 0")
            .constraint("wmbs_subscription_fileset_fk", references("fileset", "wmbs_fileset"))
            .constraint("wmbs_subscription_workflow_fk", references("workflow", "wmbs_workflow"))
            .constraint("wmbs_subscription_subtype_fk", references("subtype", "wmbs_sub_types")),
    );

    creator.add_table(
        "09wmbs_subscription_location",
        TableDef::new("wmbs_subscription_location")
            .column("subscription BIGINT NOT NULL")
            .column("location BIGINT NOT NULL")
            .column("valid BOOLEAN NOT NULL DEFAULT TRUE")
            .constraint(
                "wmbs_subscription_location_unique",
                "UNIQUE (subscription, location)",
            )
            .constraint(
                "wmbs_subscription_location_sub_fk",
                references("subscription", "wmbs_subscription"),
            )
            .constraint(
                "wmbs_subscription_location_location_fk",
                references("location", "wmbs_location"),
            ),
    );

    for (ordinal, state) in [(10, "acquired"), (11, "failed"), (12, "complete")] {
        let table = format!("wmbs_sub_files_{state}");
        creator.add_table(
            format!("{ordinal}{table}"),
            TableDef::new(table.as_str())
                .column("subscription BIGINT NOT NULL")
                .column("file BIGINT NOT NULL")
                .constraint(format!("{table}_unique"), "UNIQUE (subscription, file)")
                .constraint(
                    format!("{table}_sub_fk"),
                    references("subscription", "wmbs_subscription"),
                )
                .constraint(format!("{table}_file_fk"), references("file", "wmbs_file_details")),
        );
    }

    creator
        .add_index(
            "wmbs_fileset_files_fileset",
            "idx_wmbs_fileset_files_fileset",
            "wmbs_fileset_files",
            &["fileset"],
            false,
        )
        .add_index(
            "wmbs_file_location_location",
            "idx_wmbs_file_location_location",
            "wmbs_file_location",
            &["location"],
            false,
        )
        .add_index(
            "wmbs_subscription_fileset",
            "idx_wmbs_subscription_fileset",
            "wmbs_subscription",
            &["fileset"],
            false,
        )
        .add_index(
            "wmbs_sub_files_acquired_file",
            "idx_wmbs_sub_files_acquired_file",
            "wmbs_sub_files_acquired",
            &["file"],
            false,
        );

    for (i, name) in SUBSCRIPTION_TYPES.iter().enumerate() {
        creator.add_insert(
            format!("wmbs_sub_types_{i}"),
            format!(
                "INSERT INTO wmbs_sub_types (name) VALUES ('{name}') ON CONFLICT (name) DO NOTHING"
            ),
        );
    }

    creator
}
