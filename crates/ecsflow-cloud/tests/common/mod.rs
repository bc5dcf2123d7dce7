use async_trait::async_trait;
use ecsflow_cloud::{
    ATTR_DNS_NAME, CloudError, Dependencies, DependencyGraph, DriverRegistry, Handle, Probe,
    ResourceDescriptor, ResourceDriver, ResourceKind, Result,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const ENDPOINT: &str = "devops-alb-123456.us-east-1.elb.amazonaws.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Probe,
    Create,
    Delete,
    Quiesce,
    CheckUsable,
    CheckQuiesced,
    Complete,
}

impl Op {
    pub fn is_mutating(&self) -> bool {
        matches!(self, Op::Create | Op::Delete | Op::Quiesce | Op::Complete)
    }
}

/// In-memory provider shared by every fake driver
#[derive(Default)]
pub struct FakeCloud {
    pub live: HashMap<ResourceKind, Handle>,
    pub calls: Vec<(Op, ResourceKind)>,
    pub fail_probe: HashSet<ResourceKind>,
    pub fail_create: HashSet<ResourceKind>,
    pub fail_delete: HashSet<ResourceKind>,
    /// Readiness checks that must fail before the resource reports usable
    pub not_ready_for: HashMap<ResourceKind, u32>,
    pub never_ready: HashSet<ResourceKind>,
    pub never_drains: HashSet<ResourceKind>,
    /// Live resources whose create stopped halfway
    pub incomplete: HashSet<ResourceKind>,
}

#[derive(Clone, Default)]
pub struct Cloud(pub Arc<Mutex<FakeCloud>>);

impl Cloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeCloud) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<(Op, ResourceKind)> {
        self.with(|c| c.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|c| c.calls.clear());
    }

    pub fn mutating_calls(&self) -> Vec<(Op, ResourceKind)> {
        self.calls()
            .into_iter()
            .filter(|(op, _)| op.is_mutating())
            .collect()
    }

    /// Position of the first `op` on `kind` in the call log
    pub fn position(&self, op: Op, kind: ResourceKind) -> Option<usize> {
        self.calls().iter().position(|c| *c == (op, kind))
    }

    pub fn count(&self, op: Op, kind: ResourceKind) -> usize {
        self.calls().iter().filter(|c| **c == (op, kind)).count()
    }

    pub fn seed(&self, kind: ResourceKind) {
        self.with(|c| {
            c.live.insert(kind, handle_for(kind));
        });
    }

    pub fn is_live(&self, kind: ResourceKind) -> bool {
        self.with(|c| c.live.contains_key(&kind))
    }

    pub fn registry(&self) -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        for kind in ResourceKind::ALL {
            registry.register(Arc::new(FakeDriver {
                kind,
                cloud: self.clone(),
            }));
        }
        registry
    }
}

fn handle_for(kind: ResourceKind) -> Handle {
    let handle = Handle::new(format!("fake:{kind}"));
    if kind == ResourceKind::LoadBalancer {
        handle.with_attribute(ATTR_DNS_NAME, ENDPOINT)
    } else {
        handle
    }
}

pub struct FakeDriver {
    kind: ResourceKind,
    cloud: Cloud,
}

#[async_trait]
impl ResourceDriver for FakeDriver {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Probe> {
        self.cloud.with(|c| {
            c.calls.push((Op::Probe, self.kind));
            if c.fail_probe.contains(&self.kind) {
                return Err(CloudError::driver(self.kind, "Throttling"));
            }
            // a listener can only be found through its load balancer
            if self.kind == ResourceKind::Listener
                && descriptor.depends_on.contains(&ResourceKind::LoadBalancer)
                && deps.get(ResourceKind::LoadBalancer).is_none()
            {
                return Ok(Probe::Absent);
            }
            Ok(match c.live.get(&self.kind) {
                Some(handle) => Probe::Present(handle.clone()),
                None => Probe::Absent,
            })
        })
    }

    async fn create(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Handle> {
        for dep in &descriptor.depends_on {
            deps.require(self.kind, *dep)?;
        }
        self.cloud.with(|c| {
            c.calls.push((Op::Create, self.kind));
            if c.fail_create.contains(&self.kind) {
                return Err(CloudError::driver(self.kind, "LimitExceeded"));
            }
            assert!(
                !c.live.contains_key(&self.kind),
                "create called on an existing {}",
                self.kind
            );
            let handle = handle_for(self.kind);
            c.live.insert(self.kind, handle.clone());
            Ok(handle)
        })
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<()> {
        self.cloud.with(|c| {
            c.calls.push((Op::Delete, self.kind));
            if c.fail_delete.contains(&self.kind) {
                return Err(CloudError::driver(self.kind, "DependencyViolation"));
            }
            c.live.remove(&self.kind);
            Ok(())
        })
    }

    async fn complete(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        self.cloud.with(|c| {
            if c.incomplete.remove(&self.kind) {
                c.calls.push((Op::Complete, self.kind));
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    fn waits_after_create(&self) -> bool {
        self.kind == ResourceKind::ExecutionRole
    }

    async fn is_usable(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        self.cloud.with(|c| {
            c.calls.push((Op::CheckUsable, self.kind));
            if c.never_ready.contains(&self.kind) {
                return Ok(false);
            }
            match c.not_ready_for.get_mut(&self.kind) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Ok(false)
                }
                _ => Ok(true),
            }
        })
    }

    fn quiesces_before_delete(&self) -> bool {
        self.kind == ResourceKind::Service
    }

    async fn quiesce(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<()> {
        self.cloud.with(|c| c.calls.push((Op::Quiesce, self.kind)));
        Ok(())
    }

    async fn is_quiesced(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        self.cloud.with(|c| {
            c.calls.push((Op::CheckQuiesced, self.kind));
            Ok(!c.never_drains.contains(&self.kind))
        })
    }
}

/// The deployment from the service's documentation, declared in that order
pub fn descriptors() -> Vec<ResourceDescriptor> {
    use ResourceKind::*;
    vec![
        ResourceDescriptor::new(SecurityGroup, "devops-ecs-sg"),
        ResourceDescriptor::new(Cluster, "devops-cluster"),
        ResourceDescriptor::new(ExecutionRole, "ecsTaskExecutionRole"),
        ResourceDescriptor::new(LogSink, "/ecs/devops-task"),
        ResourceDescriptor::new(TargetGroup, "devops-targets"),
        ResourceDescriptor::new(LoadBalancer, "devops-alb").depends_on([SecurityGroup]),
        ResourceDescriptor::new(Listener, "http:80").depends_on([LoadBalancer, TargetGroup]),
        ResourceDescriptor::new(Service, "devops-service").depends_on([
            Cluster,
            ExecutionRole,
            LogSink,
            TargetGroup,
        ]),
    ]
}

pub fn graph() -> DependencyGraph {
    DependencyGraph::build(descriptors()).unwrap()
}
