//! Resource driver trait definition

use crate::error::{CloudError, Result};
use crate::resource::{Dependencies, Handle, ResourceDescriptor, ResourceKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of an existence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Present(Handle),
    Absent,
}

impl Probe {
    pub fn handle(&self) -> Option<&Handle> {
        match self {
            Probe::Present(handle) => Some(handle),
            Probe::Absent => None,
        }
    }
}

/// Provider-side operations for one resource kind
///
/// The engine only calls `create` after `probe` returned [`Probe::Absent`] in
/// the same run, so drivers need not be idempotent on create. `delete` must
/// treat a resource that is already gone as success.
#[async_trait]
pub trait ResourceDriver: Send + Sync {
    /// The kind this driver manages
    fn kind(&self) -> ResourceKind;

    /// Check whether the resource identified by `descriptor.identity` exists.
    /// Never mutates.
    async fn probe(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Probe>;

    /// Create the resource and return its handle
    async fn create(&self, descriptor: &ResourceDescriptor, deps: &Dependencies)
    -> Result<Handle>;

    /// Delete the resource behind `handle`
    async fn delete(&self, descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()>;

    /// Finish configuring a resource that `probe` found, e.g. after a create
    /// that failed halfway in an earlier run.
    ///
    /// Called on every reuse during provisioning. Must only mutate when
    /// something is missing; returns whether it did.
    async fn complete(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        Ok(false)
    }

    /// Whether dependents may only use this resource after [`is_usable`](Self::is_usable)
    /// reports true
    fn waits_after_create(&self) -> bool {
        false
    }

    /// Readiness check polled by the waiter after `create`
    async fn is_usable(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        Ok(true)
    }

    /// Whether `delete` must be preceded by [`quiesce`](Self::quiesce) and a
    /// wait on [`is_quiesced`](Self::is_quiesced)
    fn quiesces_before_delete(&self) -> bool {
        false
    }

    /// Start winding the resource down (e.g. scale a service to zero)
    async fn quiesce(&self, _descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<()> {
        Ok(())
    }

    /// Condition polled by the waiter between `quiesce` and `delete`
    async fn is_quiesced(
        &self,
        _descriptor: &ResourceDescriptor,
        _handle: &Handle,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Drivers indexed by the kind they manage
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<ResourceKind, Arc<dyn ResourceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own kind, replacing any previous one
    pub fn register(&mut self, driver: Arc<dyn ResourceDriver>) {
        self.drivers.insert(driver.kind(), driver);
    }

    pub fn with(mut self, driver: impl ResourceDriver + 'static) -> Self {
        self.register(Arc::new(driver));
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Result<&Arc<dyn ResourceDriver>> {
        self.drivers
            .get(&kind)
            .ok_or(CloudError::MissingDriver(kind))
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.drivers.keys().copied()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.kinds().collect();
        kinds.sort();
        f.debug_struct("DriverRegistry").field("kinds", &kinds).finish()
    }
}
