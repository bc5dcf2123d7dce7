//! AWS error classification
//!
//! Provider failures are classified from the error code in the SDK's error
//! metadata, never from the Debug text, then converted to
//! [`CloudError::Driver`] at the driver seam.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use ecsflow_cloud::{CloudError, ResourceKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    /// The resource does not exist (an absent probe, or an idempotent delete)
    #[error("not found ({code}): {message}")]
    NotFound { code: String, message: String },

    #[error("already exists ({code}): {message}")]
    AlreadyExists { code: String, message: String },

    #[error("rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Something still references the resource (ENI on a security group, ...)
    #[error("resource still in use: {message}")]
    DependencyViolation { message: String },

    #[error("AWS error ({}): {message}", .code.as_deref().unwrap_or("no code"))]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Attribute the failure to a resource kind
    pub fn into_cloud(self, kind: ResourceKind, context: &str) -> CloudError {
        CloudError::driver(kind, format!("{context}: {self}"))
    }
}

/// Codes meaning "this resource does not exist", across the five services
const NOT_FOUND_CODES: &[&str] = &[
    // EC2
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "InvalidVpcID.NotFound",
    // ECS
    "ClusterNotFoundException",
    "ServiceNotFoundException",
    // IAM
    "NoSuchEntity",
    // CloudWatch Logs
    "ResourceNotFoundException",
    // ELBv2
    "LoadBalancerNotFound",
    "TargetGroupNotFound",
    "ListenerNotFound",
];

const ALREADY_EXISTS_CODES: &[&str] = &[
    "InvalidGroup.Duplicate",
    "InvalidPermission.Duplicate",
    "EntityAlreadyExists",
    "ResourceAlreadyExistsException",
    "DuplicateTargetGroupName",
    "DuplicateLoadBalancerName",
    "DuplicateListener",
];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

const DEPENDENCY_CODES: &[&str] = &[
    "DependencyViolation",
    "ResourceInUse",
    "ResourceInUseException",
    "DeleteConflict",
    "ClusterContainsServicesException",
    "ClusterContainsTasksException",
];

/// Classify an error from its code and message.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists {
            code: c.to_string(),
            message,
        },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled { message },
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation { message },
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify any SDK error.
///
/// Errors without service metadata (dispatch failures, timeouts, credential
/// problems) keep the full display chain as their message.
pub fn classify<E>(err: &E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match err.message() {
        Some(message) => classify_aws_error(err.code(), Some(message)),
        None => classify_aws_error(err.code(), Some(&DisplayErrorContext(err).to_string())),
    }
}

/// Conversions from SDK results into the driver seam's `Result`
pub(crate) trait SdkResultExt<T> {
    /// Any failure becomes a driver error on `kind`
    fn or_fail(self, kind: ResourceKind, context: &str) -> ecsflow_cloud::Result<T>;

    /// A "not found" failure becomes `None`; anything else a driver error
    fn or_absent(self, kind: ResourceKind, context: &str) -> ecsflow_cloud::Result<Option<T>>;
}

impl<T, E> SdkResultExt<T> for std::result::Result<T, E>
where
    E: ProvideErrorMetadata + std::error::Error,
{
    fn or_fail(self, kind: ResourceKind, context: &str) -> ecsflow_cloud::Result<T> {
        self.map_err(|e| classify(&e).into_cloud(kind, context))
    }

    fn or_absent(self, kind: ResourceKind, context: &str) -> ecsflow_cloud::Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let err = classify(&e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err.into_cloud(kind, context))
                }
            }
        }
    }
}
