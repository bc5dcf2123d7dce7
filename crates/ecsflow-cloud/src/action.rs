//! Planned actions (dry run)

use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};

/// What a run would do to one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Resource kind
    pub kind: ResourceKind,

    /// Idempotency key of the resource
    pub identity: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Handle of the existing resource, if the probe found one
    pub handle: Option<String>,

    /// Description of the action
    pub description: String,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing one action per descriptor, in flow order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to delete, {} unchanged",
            self.create, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: ResourceKind, action_type: ActionType) -> Action {
        Action {
            kind,
            identity: kind.to_string(),
            action_type,
            handle: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            action(ResourceKind::SecurityGroup, ActionType::NoOp),
            action(ResourceKind::Cluster, ActionType::Create),
            action(ResourceKind::LoadBalancer, ActionType::Create),
        ]);

        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "2 to create, 0 to delete, 1 unchanged"
        );
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![action(ResourceKind::Cluster, ActionType::NoOp)]);
        assert!(!plan.has_changes);
        assert!(!Plan::new(Vec::new()).has_changes);
    }
}
