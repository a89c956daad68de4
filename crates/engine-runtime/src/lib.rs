pub mod error;
pub mod execution;

pub use error::{ErrorKind, MigrationError};
pub use execution::{
    confirm::{Confirm, FixedAnswer},
    executor::{MigrationEngine, RunSummary},
    jobs::{JobEdit, JobService},
    undo::{UndoEngine, UndoOutcome},
};
