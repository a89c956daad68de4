pub mod consumer;
pub mod error;
pub mod retry;
pub mod state_manager;
pub mod transform;
