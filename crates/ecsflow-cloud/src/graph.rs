//! Dependency graph over resource descriptors
//!
//! The graph is validated once when it is built. A cycle or a dependency on an
//! undeclared kind is rejected here, before any provider call is made.

use crate::error::{CloudError, Result};
use crate::resource::{ResourceDescriptor, ResourceKind};
use std::collections::HashSet;

/// Which way the graph is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Provision,
    Destroy,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Provision => write!(f, "provision"),
            Flow::Destroy => write!(f, "destroy"),
        }
    }
}

/// Validated, topologically ordered set of descriptors
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Descriptors in creation order
    ordered: Vec<ResourceDescriptor>,
}

impl DependencyGraph {
    /// Order `descriptors` so that every dependency precedes its dependents.
    ///
    /// Ties between independent descriptors keep declaration order, so the
    /// same declaration always yields the same sequence of provider calls.
    pub fn build(descriptors: Vec<ResourceDescriptor>) -> Result<Self> {
        let mut declared = HashSet::new();
        for d in &descriptors {
            if !declared.insert(d.kind) {
                return Err(CloudError::DuplicateDescriptor(d.kind));
            }
        }

        for d in &descriptors {
            if let Some(missing) = d.depends_on.iter().find(|dep| !declared.contains(dep)) {
                return Err(CloudError::UnknownDependency {
                    kind: d.kind,
                    dependency: *missing,
                });
            }
        }

        let mut pending = descriptors;
        let mut ordered = Vec::with_capacity(pending.len());
        let mut placed = HashSet::new();

        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|d| d.depends_on.iter().all(|dep| placed.contains(dep)));

            match next {
                Some(index) => {
                    let descriptor = pending.remove(index);
                    placed.insert(descriptor.kind);
                    ordered.push(descriptor);
                }
                None => {
                    return Err(CloudError::Cycle(pending.iter().map(|d| d.kind).collect()));
                }
            }
        }

        tracing::debug!(
            "Resource order: {}",
            ordered
                .iter()
                .map(|d| d.kind.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self { ordered })
    }

    /// Descriptors such that each one's dependencies come first
    pub fn creation_order(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.ordered.iter()
    }

    /// Exact reverse of [`creation_order`](Self::creation_order)
    pub fn deletion_order(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.ordered.iter().rev()
    }

    pub fn order(&self, flow: Flow) -> Vec<&ResourceDescriptor> {
        match flow {
            Flow::Provision => self.creation_order().collect(),
            Flow::Destroy => self.deletion_order().collect(),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ResourceDescriptor> {
        self.ordered.iter().find(|d| d.kind == kind)
    }

    /// Every kind `kind` depends on, directly or transitively
    pub fn dependency_closure(&self, kind: ResourceKind) -> HashSet<ResourceKind> {
        let mut closure = HashSet::new();
        let mut stack: Vec<ResourceKind> = self
            .get(kind)
            .map(|d| d.depends_on.clone())
            .unwrap_or_default();

        while let Some(next) = stack.pop() {
            if closure.insert(next) {
                if let Some(d) = self.get(next) {
                    stack.extend(d.depends_on.iter().copied());
                }
            }
        }
        closure
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResourceKind::*;

    fn d(kind: ResourceKind, deps: &[ResourceKind]) -> ResourceDescriptor {
        ResourceDescriptor::new(kind, kind.as_str()).depends_on(deps.iter().copied())
    }

    fn standard() -> Vec<ResourceDescriptor> {
        vec![
            d(Service, &[Cluster, ExecutionRole, LogSink, TargetGroup]),
            d(Listener, &[LoadBalancer, TargetGroup]),
            d(SecurityGroup, &[]),
            d(Cluster, &[]),
            d(ExecutionRole, &[]),
            d(LogSink, &[]),
            d(TargetGroup, &[]),
            d(LoadBalancer, &[SecurityGroup]),
        ]
    }

    fn kinds<'a>(it: impl Iterator<Item = &'a ResourceDescriptor>) -> Vec<ResourceKind> {
        it.map(|d| d.kind).collect()
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let graph = DependencyGraph::build(standard()).unwrap();
        let order = kinds(graph.creation_order());

        for descriptor in graph.creation_order() {
            let pos = order.iter().position(|k| *k == descriptor.kind).unwrap();
            for dep in &descriptor.depends_on {
                let dep_pos = order.iter().position(|k| k == dep).unwrap();
                assert!(dep_pos < pos, "{} must precede {}", dep, descriptor.kind);
            }
        }
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let graph = DependencyGraph::build(standard()).unwrap();
        assert_eq!(
            kinds(graph.creation_order()),
            vec![
                SecurityGroup,
                Cluster,
                ExecutionRole,
                LogSink,
                TargetGroup,
                Service,
                LoadBalancer,
                Listener
            ]
        );
    }

    #[test]
    fn test_deletion_is_exact_reverse() {
        let graph = DependencyGraph::build(standard()).unwrap();
        let mut forward = kinds(graph.creation_order());
        forward.reverse();
        assert_eq!(kinds(graph.deletion_order()), forward);
        assert_eq!(
            kinds(graph.order(Flow::Destroy).into_iter()),
            forward
        );
    }

    #[test]
    fn test_dependency_closure() {
        let graph = DependencyGraph::build(standard()).unwrap();

        let listener = graph.dependency_closure(Listener);
        assert_eq!(
            listener,
            HashSet::from([LoadBalancer, TargetGroup, SecurityGroup])
        );
        assert!(graph.dependency_closure(Cluster).is_empty());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = DependencyGraph::build(vec![
            d(Cluster, &[]),
            d(LoadBalancer, &[Listener]),
            d(Listener, &[LoadBalancer]),
        ])
        .unwrap_err();

        match err {
            CloudError::Cycle(members) => {
                assert_eq!(members, vec![LoadBalancer, Listener]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = DependencyGraph::build(vec![d(Cluster, &[Cluster])]).unwrap_err();
        assert!(matches!(err, CloudError::Cycle(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_undeclared_dependency_is_rejected() {
        let err = DependencyGraph::build(vec![d(Listener, &[LoadBalancer])]).unwrap_err();
        assert!(matches!(
            err,
            CloudError::UnknownDependency {
                kind: Listener,
                dependency: LoadBalancer
            }
        ));
    }

    #[test]
    fn test_duplicate_kind_is_rejected() {
        let err = DependencyGraph::build(vec![d(Cluster, &[]), d(Cluster, &[])]).unwrap_err();
        assert!(matches!(err, CloudError::DuplicateDescriptor(Cluster)));
    }
}
