pub mod confirm;
pub mod executor;
pub mod jobs;
pub mod schema;
pub mod undo;
