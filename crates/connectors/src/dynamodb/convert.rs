//! Conversions between the crate's wire types and the SDK's.

use crate::{
    error::StoreError,
    table::{
        AttributeDefinition, BillingMode, CreateTableSpec, KeyElement, Projection,
        ProjectionType, SecondaryIndex, TableDescription, TableStatus, Throughput,
    },
};
use aws_sdk_dynamodb::{
    error::BuildError,
    primitives::Blob,
    types::{self as sdk, AttributeValue as SdkValue},
};
use model::{
    core::{
        attribute::{AttributeValue, Item},
        data_type::ScalarAttributeType,
    },
    job::KeyRole,
    records::batch::WriteRequest,
};
use std::collections::HashMap;

pub type SdkItem = HashMap<String, SdkValue>;

fn build_error(err: BuildError) -> StoreError {
    StoreError::Validation(err.to_string())
}

pub fn to_sdk_value(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(v) => SdkValue::S(v.clone()),
        AttributeValue::N(v) => SdkValue::N(v.clone()),
        AttributeValue::B(v) => SdkValue::B(Blob::new(v.clone())),
        AttributeValue::Bool(v) => SdkValue::Bool(*v),
        AttributeValue::Null(v) => SdkValue::Null(*v),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
        AttributeValue::L(items) => SdkValue::L(items.iter().map(to_sdk_value).collect()),
        AttributeValue::Ss(items) => SdkValue::Ss(items.clone()),
        AttributeValue::Ns(items) => SdkValue::Ns(items.clone()),
        AttributeValue::Bs(items) => {
            SdkValue::Bs(items.iter().map(|b| Blob::new(b.clone())).collect())
        }
    }
}

pub fn from_sdk_value(value: &SdkValue) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        SdkValue::S(v) => AttributeValue::S(v.clone()),
        SdkValue::N(v) => AttributeValue::N(v.clone()),
        SdkValue::B(v) => AttributeValue::B(v.as_ref().to_vec()),
        SdkValue::Bool(v) => AttributeValue::Bool(*v),
        SdkValue::Null(v) => AttributeValue::Null(*v),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::L(items) => AttributeValue::L(
            items
                .iter()
                .map(from_sdk_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        SdkValue::Ss(items) => AttributeValue::Ss(items.clone()),
        SdkValue::Ns(items) => AttributeValue::Ns(items.clone()),
        SdkValue::Bs(items) => AttributeValue::Bs(items.iter().map(|b| b.as_ref().to_vec()).collect()),
        other => {
            return Err(StoreError::Validation(format!(
                "Unsupported attribute type: {other:?}"
            )));
        }
    })
}

pub fn to_sdk_item(item: &Item) -> SdkItem {
    item.iter()
        .map(|(k, v)| (k.clone(), to_sdk_value(v)))
        .collect()
}

pub fn from_sdk_item(item: &SdkItem) -> Result<Item, StoreError> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), from_sdk_value(v)?)))
        .collect()
}

pub fn to_sdk_request(request: &WriteRequest) -> Result<sdk::WriteRequest, StoreError> {
    Ok(match request {
        WriteRequest::Put { item } => {
            let put = sdk::PutRequest::builder()
                .set_item(Some(to_sdk_item(item)))
                .build()
                .map_err(build_error)?;
            sdk::WriteRequest::builder().put_request(put).build()
        }
        WriteRequest::Delete { key } => {
            let delete = sdk::DeleteRequest::builder()
                .set_key(Some(to_sdk_item(key)))
                .build()
                .map_err(build_error)?;
            sdk::WriteRequest::builder().delete_request(delete).build()
        }
    })
}

pub fn from_sdk_request(request: &sdk::WriteRequest) -> Result<WriteRequest, StoreError> {
    if let Some(put) = request.put_request() {
        return Ok(WriteRequest::put(from_sdk_item(put.item())?));
    }
    if let Some(delete) = request.delete_request() {
        return Ok(WriteRequest::delete(from_sdk_item(delete.key())?));
    }
    Err(StoreError::Validation(
        "Write request carries neither a put nor a delete".into(),
    ))
}

fn key_role(key_type: &sdk::KeyType) -> Result<KeyRole, StoreError> {
    match key_type {
        sdk::KeyType::Hash => Ok(KeyRole::Hash),
        sdk::KeyType::Range => Ok(KeyRole::Range),
        other => Err(StoreError::Validation(format!(
            "Unknown key type: {}",
            other.as_str()
        ))),
    }
}

fn sdk_key_type(role: KeyRole) -> sdk::KeyType {
    match role {
        KeyRole::Hash => sdk::KeyType::Hash,
        KeyRole::Range => sdk::KeyType::Range,
    }
}

fn key_elements(elements: &[sdk::KeySchemaElement]) -> Result<Vec<KeyElement>, StoreError> {
    elements
        .iter()
        .map(|e| Ok(KeyElement::new(e.attribute_name(), key_role(e.key_type())?)))
        .collect()
}

fn sdk_key_elements(elements: &[KeyElement]) -> Result<Vec<sdk::KeySchemaElement>, StoreError> {
    elements
        .iter()
        .map(|e| {
            sdk::KeySchemaElement::builder()
                .attribute_name(&e.attribute)
                .key_type(sdk_key_type(e.role))
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn throughput(desc: Option<&sdk::ProvisionedThroughputDescription>) -> Option<Throughput> {
    let desc = desc?;
    Some(Throughput::new(
        desc.read_capacity_units()?,
        desc.write_capacity_units()?,
    ))
}

fn sdk_throughput(throughput: &Throughput) -> Result<sdk::ProvisionedThroughput, StoreError> {
    sdk::ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(build_error)
}

fn projection(projection: Option<&sdk::Projection>) -> Projection {
    let Some(projection) = projection else {
        return Projection::default();
    };
    let projection_type = match projection.projection_type() {
        Some(sdk::ProjectionType::KeysOnly) => ProjectionType::KeysOnly,
        Some(sdk::ProjectionType::Include) => ProjectionType::Include,
        _ => ProjectionType::All,
    };
    Projection {
        projection_type,
        non_key_attributes: projection.non_key_attributes().to_vec(),
    }
}

fn sdk_projection(projection: &Projection) -> sdk::Projection {
    let projection_type = match projection.projection_type {
        ProjectionType::All => sdk::ProjectionType::All,
        ProjectionType::KeysOnly => sdk::ProjectionType::KeysOnly,
        ProjectionType::Include => sdk::ProjectionType::Include,
    };
    let non_key = (!projection.non_key_attributes.is_empty())
        .then(|| projection.non_key_attributes.clone());
    sdk::Projection::builder()
        .projection_type(projection_type)
        .set_non_key_attributes(non_key)
        .build()
}

fn scalar_type(t: &sdk::ScalarAttributeType) -> Result<ScalarAttributeType, StoreError> {
    t.as_str().parse().map_err(StoreError::Validation)
}

fn sdk_scalar_type(t: ScalarAttributeType) -> sdk::ScalarAttributeType {
    match t {
        ScalarAttributeType::S => sdk::ScalarAttributeType::S,
        ScalarAttributeType::N => sdk::ScalarAttributeType::N,
        ScalarAttributeType::B => sdk::ScalarAttributeType::B,
    }
}

pub fn table_description(table: &sdk::TableDescription) -> Result<TableDescription, StoreError> {
    let billing_mode = match table.billing_mode_summary().and_then(|s| s.billing_mode()) {
        Some(sdk::BillingMode::PayPerRequest) => BillingMode::PayPerRequest,
        _ => BillingMode::Provisioned,
    };

    let status = match table.table_status() {
        Some(sdk::TableStatus::Active) => TableStatus::Active,
        Some(sdk::TableStatus::Creating) => TableStatus::Creating,
        Some(sdk::TableStatus::Updating) => TableStatus::Updating,
        Some(sdk::TableStatus::Deleting) => TableStatus::Deleting,
        Some(other) => TableStatus::Other(other.as_str().to_string()),
        None => TableStatus::Other("UNKNOWN".to_string()),
    };

    let attribute_definitions = table
        .attribute_definitions()
        .iter()
        .map(|d| {
            Ok(AttributeDefinition::new(
                d.attribute_name(),
                scalar_type(d.attribute_type())?,
            ))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let indexes = table
        .global_secondary_indexes()
        .iter()
        .map(|gsi| {
            Ok(SecondaryIndex {
                name: gsi.index_name().unwrap_or_default().to_string(),
                key_schema: key_elements(gsi.key_schema())?,
                projection: projection(gsi.projection()),
                throughput: throughput(gsi.provisioned_throughput()),
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(TableDescription {
        name: table.table_name().unwrap_or_default().to_string(),
        key_schema: key_elements(table.key_schema())?,
        attribute_definitions,
        billing_mode,
        throughput: throughput(table.provisioned_throughput()),
        indexes,
        status,
        item_count: table.item_count(),
    })
}

/// SDK parts of a create-table request.
pub struct SdkCreateTable {
    pub key_schema: Vec<sdk::KeySchemaElement>,
    pub attribute_definitions: Vec<sdk::AttributeDefinition>,
    pub billing_mode: sdk::BillingMode,
    pub throughput: Option<sdk::ProvisionedThroughput>,
    pub indexes: Option<Vec<sdk::GlobalSecondaryIndex>>,
}

pub fn create_table_request(spec: &CreateTableSpec) -> Result<SdkCreateTable, StoreError> {
    let attribute_definitions = spec
        .attribute_definitions
        .iter()
        .map(|d| {
            sdk::AttributeDefinition::builder()
                .attribute_name(&d.name)
                .attribute_type(sdk_scalar_type(d.attribute_type))
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let indexes = spec
        .indexes
        .iter()
        .map(|index| {
            sdk::GlobalSecondaryIndex::builder()
                .index_name(&index.name)
                .set_key_schema(Some(sdk_key_elements(&index.key_schema)?))
                .projection(sdk_projection(&index.projection))
                .set_provisioned_throughput(index.throughput.as_ref().map(sdk_throughput).transpose()?)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SdkCreateTable {
        key_schema: sdk_key_elements(&spec.key_schema)?,
        attribute_definitions,
        billing_mode: match spec.billing_mode {
            BillingMode::Provisioned => sdk::BillingMode::Provisioned,
            BillingMode::PayPerRequest => sdk::BillingMode::PayPerRequest,
        },
        throughput: spec.throughput.as_ref().map(sdk_throughput).transpose()?,
        indexes: (!indexes.is_empty()).then_some(indexes),
    })
}
