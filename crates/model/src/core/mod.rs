pub mod attribute;
pub mod data_type;
pub mod value;
