use super::{
    DynamoDbStore, classify_sdk_error,
    convert::{create_table_request, table_description},
};
use crate::{
    error::StoreError,
    store::TableCatalog,
    table::{CreateTableSpec, TableDescription},
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[async_trait]
impl TableCatalog for DynamoDbStore {
    async fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        let response = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify_sdk_error("DescribeTable", table, e))?;

        let description = response
            .table()
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        table_description(description)
    }

    async fn create_table(&self, spec: &CreateTableSpec) -> Result<(), StoreError> {
        let request = create_table_request(spec)?;

        self.client
            .create_table()
            .table_name(&spec.table_name)
            .set_key_schema(Some(request.key_schema))
            .set_attribute_definitions(Some(request.attribute_definitions))
            .billing_mode(request.billing_mode)
            .set_provisioned_throughput(request.throughput)
            .set_global_secondary_indexes(request.indexes)
            .send()
            .await
            .map_err(|e| classify_sdk_error("CreateTable", &spec.table_name, e))?;

        info!(table = %spec.table_name, indexes = spec.indexes.len(), "Table creation requested");
        Ok(())
    }

    async fn wait_until_active(
        &self,
        table: &str,
        timeout: Duration,
    ) -> Result<TableDescription, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.describe_table(table).await {
                Ok(description) if description.is_active() => return Ok(description),
                Ok(description) => {
                    debug!(table, status = ?description.status, "Waiting for table");
                }
                // Freshly created tables can briefly be invisible to describe.
                Err(StoreError::TableNotFound(_)) => {}
                Err(e) => return Err(e),
            }

            if Instant::now() + self.poll_interval > deadline {
                return Err(StoreError::NotActive {
                    table: table.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
