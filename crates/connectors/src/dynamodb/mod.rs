//! DynamoDB-backed [`DataStore`](crate::store::DataStore) and
//! [`TableCatalog`](crate::store::TableCatalog).

mod catalog;
pub mod convert;
mod store;

use crate::error::StoreError;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use aws_smithy_types::timeout::TimeoutConfig;
use std::time::Duration;

/// Client overrides on top of the ambient AWS configuration.
#[derive(Debug, Clone, Default)]
pub struct DynamoDbConfig {
    /// AWS region (uses the SDK default chain if not specified)
    pub region: Option<String>,
    /// Endpoint override, e.g. a local emulator
    pub endpoint: Option<String>,
    /// Per-operation timeout
    pub operation_timeout: Option<Duration>,
    /// Interval between status polls while waiting for a table
    pub poll_interval: Option<Duration>,
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    poll_interval: Duration,
}

impl std::fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl DynamoDbStore {
    /// Loads credentials and region from the environment, then applies
    /// `config` on top.
    pub async fn connect(config: DynamoDbConfig) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, config: DynamoDbConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }

        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout) = config.operation_timeout {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(timeout)
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Self {
            client: Client::from_conf(builder.build()),
            poll_interval: config.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Create from a pre-built client
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Maps an SDK failure onto the store error taxonomy.
pub(crate) fn classify_sdk_error<E, R>(operation: &str, table: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = format!("{operation} on '{table}' failed: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::ResponseError(_) => StoreError::Transient(message),
        SdkError::DispatchFailure(_) => StoreError::Connectivity(message),
        SdkError::ConstructionFailure(_) => StoreError::Validation(message),
        SdkError::ServiceError(service) => match service.err().code().unwrap_or_default() {
            "ResourceNotFoundException" => StoreError::TableNotFound(table.to_string()),
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded" => StoreError::Throttled(message),
            "InternalServerError" | "ServiceUnavailable" => StoreError::Transient(message),
            "UnrecognizedClientException"
            | "AccessDeniedException"
            | "InvalidSignatureException"
            | "ExpiredTokenException"
            | "MissingAuthenticationToken" => StoreError::Connectivity(message),
            "ValidationException" | "ResourceInUseException" => StoreError::Validation(message),
            _ => StoreError::Service(message),
        },
        _ => StoreError::Service(message),
    }
}
