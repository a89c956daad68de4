pub mod core;
pub mod error;
pub mod job;
pub mod pagination;
pub mod records;
pub mod transform;

pub use crate::core::{
    attribute::{AttributeValue, Item},
    value::Value,
};
pub use records::record::Record;
