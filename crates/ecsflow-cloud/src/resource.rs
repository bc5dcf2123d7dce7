//! Resource declarations: kinds, descriptors and handles

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A provisionable unit of the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    SecurityGroup,
    ExecutionRole,
    LogSink,
    Cluster,
    TargetGroup,
    LoadBalancer,
    Listener,
    Service,
}

impl ResourceKind {
    /// Every kind, in the order resources are conventionally declared
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::SecurityGroup,
        ResourceKind::Cluster,
        ResourceKind::ExecutionRole,
        ResourceKind::LogSink,
        ResourceKind::TargetGroup,
        ResourceKind::LoadBalancer,
        ResourceKind::Listener,
        ResourceKind::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::ExecutionRole => "execution-role",
            ResourceKind::LogSink => "log-sink",
            ResourceKind::Cluster => "cluster",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::Service => "service",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a live resource, returned by `probe` and `create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    /// Provider-specific identifier (ARN, group id, name)
    pub id: String,

    /// Extra facts dependents or the caller need (DNS name, VPC id, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Handle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Static declaration of one resource in the deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,

    /// Stable lookup key used to test existence; the idempotency key
    pub identity: String,

    /// Kinds that must exist before this one is created
    #[serde(default)]
    pub depends_on: Vec<ResourceKind>,

    /// Driver-specific parameters, never interpreted by the engine
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
            depends_on: Vec::new(),
            parameters: serde_json::Value::Null,
        }
    }

    pub fn depends_on(mut self, kinds: impl IntoIterator<Item = ResourceKind>) -> Self {
        for kind in kinds {
            if !self.depends_on.contains(&kind) {
                self.depends_on.push(kind);
            }
        }
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Deserialize the parameter bag into a driver's own parameter type
    pub fn parameters<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.parameters.clone()).map_err(|e| {
            CloudError::InvalidParameters {
                kind: self.kind,
                message: e.to_string(),
            }
        })
    }
}

/// Handles of the dependencies resolved so far in the current run
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    handles: HashMap<ResourceKind, Handle>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ResourceKind, handle: Handle) {
        self.handles.insert(kind, handle);
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Handle> {
        self.handles.get(&kind)
    }

    /// Look up a dependency that `owner` cannot be created without
    pub fn require(&self, owner: ResourceKind, kind: ResourceKind) -> Result<&Handle> {
        self.handles
            .get(&kind)
            .ok_or(CloudError::MissingDependency {
                kind: owner,
                dependency: kind,
            })
    }
}
