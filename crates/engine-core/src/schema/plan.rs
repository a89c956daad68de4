use connectors::table::{
    BillingMode, CreateTableSpec, SecondaryIndex, TableDescription, Throughput,
};
use std::collections::BTreeSet;

/// Smallest capacity a cloned index may carry.
const MIN_INDEX_CAPACITY: i64 = 1;

/// Builds the request that creates `target` with the source table's key
/// schema, billing mode, provisioned throughput and global secondary
/// indexes.
///
/// Attribute definitions are limited to attributes some key (primary or
/// index) references. Throughput is only carried in provisioned mode, and
/// index throughput never drops below one unit.
pub fn clone_table_spec(source: &TableDescription, target: &str) -> CreateTableSpec {
    let provisioned = source.billing_mode == BillingMode::Provisioned;

    let indexes: Vec<SecondaryIndex> = source
        .indexes
        .iter()
        .map(|index| SecondaryIndex {
            name: index.name.clone(),
            key_schema: index.key_schema.clone(),
            projection: index.projection.clone(),
            throughput: provisioned.then(|| {
                index
                    .throughput
                    .unwrap_or(Throughput::new(MIN_INDEX_CAPACITY, MIN_INDEX_CAPACITY))
                    .floored(MIN_INDEX_CAPACITY)
            }),
        })
        .collect();

    let key_attributes: BTreeSet<&str> = source
        .key_schema
        .iter()
        .chain(indexes.iter().flat_map(|i| i.key_schema.iter()))
        .map(|k| k.attribute.as_str())
        .collect();

    let attribute_definitions = source
        .attribute_definitions
        .iter()
        .filter(|d| key_attributes.contains(d.name.as_str()))
        .cloned()
        .collect();

    CreateTableSpec {
        table_name: target.to_string(),
        key_schema: source.key_schema.clone(),
        attribute_definitions,
        billing_mode: source.billing_mode,
        throughput: provisioned.then(|| source.throughput.unwrap_or_default()),
        indexes,
    }
}
