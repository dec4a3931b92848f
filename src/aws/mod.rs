//! AWS client modules
//!
//! - context: shared SDK configuration from injected settings
//! - elasticache: cache security group client and the `CacheOperations` trait
//! - error: error classification by AWS error code
//! - types: typed snapshots parsed from SDK responses

pub mod context;
pub mod elasticache;
pub mod error;
pub mod types;

pub use context::AwsContext;
pub use elasticache::{AuthorizeOutcome, CacheOperations, ElastiCacheClient};
pub use error::{classify_aws_error, classify_sdk_error, AwsError};
pub use types::{GroupSnapshot, IngressEntry, IngressStatus, SnapshotError};

#[cfg(test)]
pub use elasticache::MockCacheOperations;
