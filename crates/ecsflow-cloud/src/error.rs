//! Convergence error types

use crate::resource::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building the resource graph or converging it
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Dependency cycle detected among: {}", join_kinds(.0))]
    Cycle(Vec<ResourceKind>),

    #[error("{kind} depends on {dependency}, which is not declared")]
    UnknownDependency {
        kind: ResourceKind,
        dependency: ResourceKind,
    },

    #[error("{0} is declared more than once")]
    DuplicateDescriptor(ResourceKind),

    #[error("No driver registered for {0}")]
    MissingDriver(ResourceKind),

    #[error("{kind} requires a handle for {dependency}, which has not been resolved")]
    MissingDependency {
        kind: ResourceKind,
        dependency: ResourceKind,
    },

    #[error("{kind} could not resolve dependency {dependency}: {cause}")]
    UnresolvedDependency {
        kind: ResourceKind,
        dependency: ResourceKind,
        cause: String,
    },

    #[error("Invalid parameters for {kind}: {message}")]
    InvalidParameters { kind: ResourceKind, message: String },

    #[error("{kind} failed: {cause}")]
    Driver { kind: ResourceKind, cause: String },

    #[error("{kind} '{identity}' did not become usable within {waited:?} ({attempts} checks)")]
    TimedOut {
        kind: ResourceKind,
        identity: String,
        waited: Duration,
        attempts: u32,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Shorthand for a provider-side failure on `kind`
    pub fn driver(kind: ResourceKind, cause: impl std::fmt::Display) -> Self {
        CloudError::Driver {
            kind,
            cause: cause.to_string(),
        }
    }

    /// Whether this error was detected before any provider call could be made
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CloudError::Cycle(_)
                | CloudError::UnknownDependency { .. }
                | CloudError::DuplicateDescriptor(_)
                | CloudError::MissingDriver(_)
                | CloudError::MissingDependency { .. }
                | CloudError::InvalidParameters { .. }
        )
    }

    /// The resource the error is attributed to, if any
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            CloudError::UnknownDependency { kind, .. }
            | CloudError::MissingDependency { kind, .. }
            | CloudError::UnresolvedDependency { kind, .. }
            | CloudError::InvalidParameters { kind, .. }
            | CloudError::Driver { kind, .. }
            | CloudError::TimedOut { kind, .. } => Some(*kind),
            CloudError::DuplicateDescriptor(kind) | CloudError::MissingDriver(kind) => Some(*kind),
            CloudError::Cycle(_) | CloudError::Json(_) => None,
        }
    }
}

fn join_kinds(kinds: &[ResourceKind]) -> String {
    kinds
        .iter()
        .map(ResourceKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CloudError>;
