//! AWS error classification and handling
//!
//! Provides typed errors for ElastiCache SDK operations using the error
//! metadata `.code()` instead of string matching on Debug format.

use aws_sdk_elasticache::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// AWS error categories for idempotency decisions
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Resource or authorization already exists (safe to ignore in
    /// create/authorize operations)
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded. Classified for logging only; this tool never
    /// retries remote mutations.
    #[error("Rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }
}

/// Known ElastiCache error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "CacheSecurityGroupNotFound",
    "CacheSecurityGroupNotFoundFault",
    "AuthorizationNotFound",
];

/// Known ElastiCache error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "AuthorizationAlreadyExists",
    "CacheSecurityGroupAlreadyExists",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an AWS error using the error code, passing the remote message
/// through verbatim.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify a typed SDK operation error.
///
/// Service errors carry an error code and message in their metadata.
/// Non-service failures (connection, credential resolution) have no code;
/// for those the full error chain is rendered so authentication problems
/// surface with their real cause instead of "service error".
pub fn classify_sdk_error<E, R>(err: &SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let meta = ProvideErrorMetadata::meta(err);
    match (meta.code(), meta.message()) {
        (None, None) => AwsError::Sdk {
            code: None,
            message: format!("{}", DisplayErrorContext(err)),
        },
        (code, message) => classify_aws_error(code, message),
    }
}
