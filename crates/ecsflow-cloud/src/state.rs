//! Per-run resource state
//!
//! Nothing is persisted between invocations: the provider is the source of
//! truth and every run starts from `Unprobed`. The tracker only records how
//! far each resource got within the current run.

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of one resource within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Not looked at yet
    Unprobed,
    /// Probe found nothing
    Absent,
    /// Probe found the resource
    Present,
    /// Create issued, waiting for the result (and readiness, if required)
    Creating,
    /// Delete (or its quiescing step) issued
    Deleting,
    /// Terminal: converged
    Done,
    /// Terminal: the step failed
    Failed,
}

impl ResourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceState::Done | ResourceState::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition(&self, next: ResourceState) -> bool {
        use ResourceState::*;
        matches!(
            (self, next),
            (Unprobed, Absent)
                | (Unprobed, Present)
                | (Unprobed, Failed)
                | (Absent, Creating)
                | (Absent, Done)
                | (Present, Done)
                | (Present, Failed)
                | (Present, Deleting)
                | (Creating, Done)
                | (Creating, Failed)
                | (Deleting, Done)
                | (Deleting, Failed)
        )
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceState::Unprobed => write!(f, "unprobed"),
            ResourceState::Absent => write!(f, "absent"),
            ResourceState::Present => write!(f, "present"),
            ResourceState::Creating => write!(f, "creating"),
            ResourceState::Deleting => write!(f, "deleting"),
            ResourceState::Done => write!(f, "done"),
            ResourceState::Failed => write!(f, "failed"),
        }
    }
}

/// States of every resource touched in the current run
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<ResourceKind, ResourceState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ResourceKind) -> ResourceState {
        self.states
            .get(&kind)
            .copied()
            .unwrap_or(ResourceState::Unprobed)
    }

    /// Move `kind` to `next`; an edge outside the state machine is a bug
    pub fn advance(&mut self, kind: ResourceKind, next: ResourceState) {
        let current = self.get(kind);
        debug_assert!(
            current.can_transition(next),
            "invalid transition for {kind}: {current} -> {next}"
        );
        if !current.can_transition(next) {
            tracing::error!(%kind, from = %current, to = %next, "Invalid state transition");
        }
        tracing::trace!(%kind, from = %current, to = %next, "State transition");
        self.states.insert(kind, next);
    }
}
