use crate::{error::MigrationError, execution::confirm::Confirm};
use connectors::{
    error::StoreError,
    store::TableCatalog,
    table::TableDescription,
};
use engine_core::schema::plan::clone_table_spec;
use model::job::KeySchema;
use std::time::Duration;
use tracing::{info, warn};

/// Resolves the target table's key schema, offering to create the table
/// from the source's definition when it does not exist.
///
/// The target is described at most twice: once up front and once after a
/// creation. A second miss is a schema error.
pub async fn resolve_target_schema(
    catalog: &dyn TableCatalog,
    confirm: &dyn Confirm,
    source_table: &str,
    target_table: &str,
    active_timeout: Duration,
) -> Result<KeySchema, MigrationError> {
    match catalog.describe_table(target_table).await {
        Ok(description) => return key_schema_of(&description),
        Err(StoreError::TableNotFound(_)) => {
            warn!(table = target_table, "Target table not found");
        }
        Err(e) => return Err(MigrationError::from_store("describe_table", e)),
    }

    let prompt = format!(
        "Target table '{target_table}' does not exist. Create it with the schema of '{source_table}'?"
    );
    if !confirm.confirm(&prompt) {
        return Err(MigrationError::schema(
            target_table,
            "table does not exist and creation was declined",
        ));
    }

    create_like(catalog, source_table, target_table, active_timeout).await?;

    match catalog.describe_table(target_table).await {
        Ok(description) => key_schema_of(&description),
        Err(StoreError::TableNotFound(_)) => Err(MigrationError::schema(
            target_table,
            "table still not found after creation",
        )),
        Err(e) => Err(MigrationError::from_store("describe_table", e)),
    }
}

/// Creates `target_table` with the key schema, billing mode, throughput and
/// secondary indexes of `source_table`, then waits for it to become active.
pub async fn create_like(
    catalog: &dyn TableCatalog,
    source_table: &str,
    target_table: &str,
    active_timeout: Duration,
) -> Result<TableDescription, MigrationError> {
    let source = catalog
        .describe_table(source_table)
        .await
        .map_err(|e| match e {
            StoreError::TableNotFound(_) => {
                MigrationError::schema(source_table, "source table not found")
            }
            e => MigrationError::from_store("describe_table", e),
        })?;

    let spec = clone_table_spec(&source, target_table);
    info!(
        table = target_table,
        billing_mode = ?spec.billing_mode,
        indexes = spec.indexes.len(),
        "Creating target table"
    );

    catalog
        .create_table(&spec)
        .await
        .map_err(|e| MigrationError::schema(target_table, format!("creation failed: {e}")))?;

    let description = catalog
        .wait_until_active(target_table, active_timeout)
        .await
        .map_err(|e| MigrationError::schema(target_table, e.to_string()))?;

    info!(table = target_table, "Target table is active");
    Ok(description)
}

fn key_schema_of(description: &TableDescription) -> Result<KeySchema, MigrationError> {
    let schema = description.key_schema();
    if schema.hash_key().is_none() {
        return Err(MigrationError::schema(
            &description.name,
            "table has no hash key",
        ));
    }
    Ok(schema)
}
