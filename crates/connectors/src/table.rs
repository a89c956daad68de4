use model::{
    core::data_type::ScalarAttributeType,
    job::{KeyRole, KeySchema},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity applied when a provisioned table reports none.
pub const DEFAULT_CAPACITY_UNITS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    Provisioned,
    PayPerRequest,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Provisioned => "PROVISIONED",
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Throughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl Throughput {
    pub fn new(read_capacity_units: i64, write_capacity_units: i64) -> Self {
        Self {
            read_capacity_units,
            write_capacity_units,
        }
    }

    /// Raises both capacities to at least `min`.
    pub fn floored(self, min: i64) -> Self {
        Self {
            read_capacity_units: self.read_capacity_units.max(min),
            write_capacity_units: self.write_capacity_units.max(min),
        }
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_UNITS, DEFAULT_CAPACITY_UNITS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyElement {
    pub attribute: String,
    pub role: KeyRole,
}

impl KeyElement {
    pub fn new(attribute: impl Into<String>, role: KeyRole) -> Self {
        Self {
            attribute: attribute.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub attribute_type: ScalarAttributeType,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, attribute_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionType {
    All,
    KeysOnly,
    Include,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub projection_type: ProjectionType,
    #[serde(default)]
    pub non_key_attributes: Vec<String>,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            projection_type: ProjectionType::All,
            non_key_attributes: Vec::new(),
        }
    }
}

/// A global secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub name: String,
    pub key_schema: Vec<KeyElement>,
    pub projection: Projection,
    pub throughput: Option<Throughput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Other(String),
}

/// What the catalog reports about an existing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub key_schema: Vec<KeyElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: BillingMode,
    pub throughput: Option<Throughput>,
    pub indexes: Vec<SecondaryIndex>,
    pub status: TableStatus,
    pub item_count: Option<i64>,
}

impl TableDescription {
    /// Primary key as role to attribute name.
    pub fn key_schema(&self) -> KeySchema {
        self.key_schema
            .iter()
            .map(|k| (k.role, k.attribute.clone()))
            .collect()
    }

    pub fn is_active(&self) -> bool {
        self.status == TableStatus::Active
    }
}

/// Parameters for creating a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableSpec {
    pub table_name: String,
    pub key_schema: Vec<KeyElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub billing_mode: BillingMode,
    /// Only set for provisioned tables.
    pub throughput: Option<Throughput>,
    pub indexes: Vec<SecondaryIndex>,
}

impl CreateTableSpec {
    /// The description a freshly created table would report.
    pub fn describe(&self, status: TableStatus) -> TableDescription {
        TableDescription {
            name: self.table_name.clone(),
            key_schema: self.key_schema.clone(),
            attribute_definitions: self.attribute_definitions.clone(),
            billing_mode: self.billing_mode,
            throughput: self.throughput,
            indexes: self.indexes.clone(),
            status,
            item_count: Some(0),
        }
    }
}
