use connectors::error::StoreError;
use engine_core::retry::RetryDisposition;

pub fn classify_store_error(err: &StoreError) -> RetryDisposition {
    match err {
        StoreError::Throttled(_) | StoreError::Transient(_) => RetryDisposition::Retry,
        StoreError::Connectivity(_) => RetryDisposition::Stop,
        StoreError::TableNotFound(_) => RetryDisposition::Stop,
        StoreError::Validation(_) => RetryDisposition::Stop,
        StoreError::Service(_) => RetryDisposition::Stop,
        StoreError::NotActive { .. } => RetryDisposition::Stop,
        StoreError::Model(_) => RetryDisposition::Stop,
    }
}
