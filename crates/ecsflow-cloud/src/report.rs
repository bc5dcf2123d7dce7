//! Run reports

use crate::resource::{Handle, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle attribute holding the load balancer's public DNS name
pub const ATTR_DNS_NAME: &str = "dns_name";
/// Handle attribute holding a resource ARN when the handle id is something else
pub const ATTR_ARN: &str = "arn";

/// Terminal outcome of one resource in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "cause", rename_all = "snake_case")]
pub enum Outcome {
    /// Probe found nothing; the resource was created
    Created,
    /// Probe found the resource; nothing was changed
    Reused,
    /// The resource was deleted
    Deleted,
    /// Teardown found nothing to delete
    AlreadyAbsent,
    /// The step failed with the given cause
    Failed(String),
    /// The run stopped before reaching this resource
    NotAttempted,
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Created => write!(f, "Created"),
            Outcome::Reused => write!(f, "Reused"),
            Outcome::Deleted => write!(f, "Deleted"),
            Outcome::AlreadyAbsent => write!(f, "AlreadyAbsent"),
            Outcome::Failed(cause) => write!(f, "Failed: {}", cause),
            Outcome::NotAttempted => write!(f, "NotAttempted"),
        }
    }
}

/// One line of a run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceReport {
    pub kind: ResourceKind,
    pub identity: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Handle of the resource, when one was observed
    pub handle: Option<Handle>,
}

/// Result of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningResult {
    /// Every declared resource, in creation order
    pub resources: Vec<ResourceReport>,

    /// Public address of the load balancer, on full success
    pub endpoint: Option<String>,

    /// The resource that stopped the run, if any
    pub failed: Option<ResourceKind>,

    /// Set when the run was cancelled before completing
    pub cancelled: bool,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ProvisioningResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
            && !self.cancelled
            && !self.resources.iter().any(|r| r.outcome.is_failed())
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    /// Handle of `kind`, if it was created or reused in this run
    pub fn handle(&self, kind: ResourceKind) -> Option<&Handle> {
        self.get(kind).and_then(|r| r.handle.as_ref())
    }

    /// ARN of `kind`: the `arn` attribute, or the handle id itself
    pub fn arn(&self, kind: ResourceKind) -> Option<&str> {
        self.handle(kind)
            .map(|h| h.attribute(ATTR_ARN).unwrap_or(h.id.as_str()))
    }

    pub fn execution_role_arn(&self) -> Option<&str> {
        self.arn(ResourceKind::ExecutionRole)
    }

    pub fn target_group_arn(&self) -> Option<&str> {
        self.arn(ResourceKind::TargetGroup)
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Created))
    }

    pub fn reused(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Reused))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.resources.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Result of a teardown run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestructionResult {
    /// Every declared resource, in deletion order
    pub resources: Vec<ResourceReport>,

    /// Set when the run was cancelled before completing
    pub cancelled: bool,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl DestructionResult {
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failures().is_empty()
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    /// Every resource whose deletion failed
    pub fn failures(&self) -> Vec<&ResourceReport> {
        self.resources
            .iter()
            .filter(|r| r.outcome.is_failed())
            .collect()
    }

    pub fn deleted(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.outcome == Outcome::Deleted)
            .count()
    }

    pub fn already_absent(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.outcome == Outcome::AlreadyAbsent)
            .count()
    }
}
