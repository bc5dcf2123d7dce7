//! Convergence engine
//!
//! Walks the dependency graph one resource at a time and applies
//! probe-before-mutate semantics:
//!
//! - **provision**: reuse what exists, create what is missing, stop at the
//!   first failure (later resources may depend on the failed one).
//! - **destroy**: skip what is gone, delete what exists, keep going after a
//!   failure and report every outcome at the end.
//!
//! Cancellation is honoured only between resources, never in the middle of a
//! mutation.

use crate::action::{Action, ActionType, Plan};
use crate::driver::{DriverRegistry, Probe, ResourceDriver};
use crate::error::{CloudError, Result};
use crate::graph::{DependencyGraph, Flow};
use crate::report::{
    ATTR_DNS_NAME, DestructionResult, Outcome, ProvisioningResult, ResourceReport,
};
use crate::resource::{Dependencies, Handle, ResourceDescriptor, ResourceKind};
use crate::state::{ResourceState, StateTracker};
use crate::waiter::{WaitConfig, WaitOutcome, wait_until_quiesced, wait_until_usable};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Probes already answered in the current run, keyed by kind
type ProbeCache = HashMap<ResourceKind, Probe>;

#[derive(Debug)]
pub struct ConvergenceEngine {
    graph: DependencyGraph,
    drivers: DriverRegistry,
    /// Budget for readiness waits after create
    settle: WaitConfig,
    /// Budget for quiescing waits before delete
    drain: WaitConfig,
    cancel: CancellationToken,
}

impl ConvergenceEngine {
    /// Pair a validated graph with its drivers.
    ///
    /// Fails if any declared kind has no driver, so a run can never stop
    /// halfway for want of one.
    pub fn new(graph: DependencyGraph, drivers: DriverRegistry) -> Result<Self> {
        for descriptor in graph.creation_order() {
            drivers.get(descriptor.kind)?;
        }

        Ok(Self {
            graph,
            drivers,
            settle: WaitConfig::default(),
            drain: WaitConfig::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_settle_wait(mut self, config: WaitConfig) -> Self {
        self.settle = config;
        self
    }

    pub fn with_drain_wait(mut self, config: WaitConfig) -> Self {
        self.drain = config;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run before the next resource is started
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn driver(&self, kind: ResourceKind) -> Result<&Arc<dyn ResourceDriver>> {
        self.drivers.get(kind)
    }

    /// Create-or-reuse every resource in creation order.
    ///
    /// Stops at the first create failure or readiness timeout; resources after
    /// it are reported as [`Outcome::NotAttempted`].
    pub async fn provision(&self) -> ProvisioningResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut tracker = StateTracker::new();
        let mut deps = Dependencies::new();
        let mut resources = Vec::with_capacity(self.graph.len());
        let mut failed = None;
        let mut cancelled = false;

        info!(resources = self.graph.len(), "Provisioning started");

        for descriptor in self.graph.creation_order() {
            if failed.is_some() || cancelled {
                resources.push(not_attempted(descriptor));
                continue;
            }

            if self.cancel.is_cancelled() {
                warn!(kind = %descriptor.kind, "Provisioning cancelled");
                cancelled = true;
                resources.push(not_attempted(descriptor));
                continue;
            }

            match self.provision_one(descriptor, &deps, &mut tracker).await {
                Ok((outcome, handle)) => {
                    deps.insert(descriptor.kind, handle.clone());
                    resources.push(ResourceReport {
                        kind: descriptor.kind,
                        identity: descriptor.identity.clone(),
                        outcome,
                        handle: Some(handle),
                    });
                }
                Err(e) => {
                    error!(
                        kind = %descriptor.kind,
                        identity = %descriptor.identity,
                        error = %e,
                        "Provisioning halted"
                    );
                    tracker.advance(descriptor.kind, ResourceState::Failed);
                    failed = Some(descriptor.kind);
                    resources.push(ResourceReport {
                        kind: descriptor.kind,
                        identity: descriptor.identity.clone(),
                        outcome: Outcome::Failed(e.to_string()),
                        handle: None,
                    });
                }
            }
        }

        let endpoint = if failed.is_none() && !cancelled {
            deps.get(ResourceKind::LoadBalancer)
                .and_then(|h| h.attribute(ATTR_DNS_NAME))
                .map(str::to_string)
        } else {
            None
        };

        let result = ProvisioningResult {
            resources,
            endpoint,
            failed,
            cancelled,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            success = result.is_success(),
            created = result.created(),
            reused = result.reused(),
            duration_ms = result.duration_ms,
            "Provisioning finished"
        );
        result
    }

    async fn provision_one(
        &self,
        descriptor: &ResourceDescriptor,
        deps: &Dependencies,
        tracker: &mut StateTracker,
    ) -> Result<(Outcome, Handle)> {
        let kind = descriptor.kind;
        let driver = self.driver(kind)?;

        debug!(%kind, identity = %descriptor.identity, "Probing");
        match driver.probe(descriptor, deps).await? {
            Probe::Present(handle) => {
                tracker.advance(kind, ResourceState::Present);
                info!(%kind, identity = %descriptor.identity, handle = %handle, "Already exists, reusing");
                if driver.complete(descriptor, &handle).await? {
                    info!(%kind, identity = %descriptor.identity, "Completed partially configured resource");
                }
                tracker.advance(kind, ResourceState::Done);
                Ok((Outcome::Reused, handle))
            }
            Probe::Absent => {
                tracker.advance(kind, ResourceState::Absent);
                tracker.advance(kind, ResourceState::Creating);
                info!(%kind, identity = %descriptor.identity, "Creating");

                let handle = driver.create(descriptor, deps).await?;
                info!(%kind, identity = %descriptor.identity, handle = %handle, "Created");

                if driver.waits_after_create() {
                    debug!(%kind, "Waiting until usable");
                    let outcome =
                        wait_until_usable(driver.as_ref(), descriptor, &handle, &self.settle)
                            .await;
                    timed_out(descriptor, outcome)?;
                }

                tracker.advance(kind, ResourceState::Done);
                Ok((Outcome::Created, handle))
            }
        }
    }

    /// Delete-or-skip every resource in deletion order.
    ///
    /// A failure on one resource is recorded and the remaining resources are
    /// still attempted.
    pub async fn destroy(&self) -> DestructionResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut tracker = StateTracker::new();
        let mut cache = ProbeCache::new();
        let mut resources = Vec::with_capacity(self.graph.len());
        let mut cancelled = false;

        info!(resources = self.graph.len(), "Teardown started");

        for descriptor in self.graph.deletion_order() {
            if cancelled {
                resources.push(not_attempted(descriptor));
                continue;
            }

            if self.cancel.is_cancelled() {
                warn!(kind = %descriptor.kind, "Teardown cancelled");
                cancelled = true;
                resources.push(not_attempted(descriptor));
                continue;
            }

            let report = match self.destroy_one(descriptor, &mut cache, &mut tracker).await {
                Ok((outcome, handle)) => ResourceReport {
                    kind: descriptor.kind,
                    identity: descriptor.identity.clone(),
                    outcome,
                    handle,
                },
                Err(e) => {
                    warn!(
                        kind = %descriptor.kind,
                        identity = %descriptor.identity,
                        error = %e,
                        "Delete failed, continuing with remaining resources"
                    );
                    tracker.advance(descriptor.kind, ResourceState::Failed);
                    ResourceReport {
                        kind: descriptor.kind,
                        identity: descriptor.identity.clone(),
                        outcome: Outcome::Failed(e.to_string()),
                        handle: None,
                    }
                }
            };
            resources.push(report);
        }

        let result = DestructionResult {
            resources,
            cancelled,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            success = result.is_success(),
            deleted = result.deleted(),
            already_absent = result.already_absent(),
            failed = result.failures().len(),
            duration_ms = result.duration_ms,
            "Teardown finished"
        );
        result
    }

    async fn destroy_one(
        &self,
        descriptor: &ResourceDescriptor,
        cache: &mut ProbeCache,
        tracker: &mut StateTracker,
    ) -> Result<(Outcome, Option<Handle>)> {
        let kind = descriptor.kind;
        let driver = self.driver(kind)?;

        let probe = match cache.remove(&kind) {
            Some(probe) => probe,
            None => {
                let deps = self.discover_dependencies(descriptor, cache).await?;
                debug!(%kind, identity = %descriptor.identity, "Probing");
                driver.probe(descriptor, &deps).await?
            }
        };

        let handle = match probe {
            Probe::Absent => {
                tracker.advance(kind, ResourceState::Absent);
                info!(%kind, identity = %descriptor.identity, "Already absent");
                tracker.advance(kind, ResourceState::Done);
                return Ok((Outcome::AlreadyAbsent, None));
            }
            Probe::Present(handle) => handle,
        };

        tracker.advance(kind, ResourceState::Present);
        tracker.advance(kind, ResourceState::Deleting);

        if driver.quiesces_before_delete() {
            info!(%kind, identity = %descriptor.identity, "Quiescing before delete");
            driver.quiesce(descriptor, &handle).await?;
            let outcome =
                wait_until_quiesced(driver.as_ref(), descriptor, &handle, &self.drain).await;
            timed_out(descriptor, outcome)?;
        }

        info!(%kind, identity = %descriptor.identity, handle = %handle, "Deleting");
        driver.delete(descriptor, &handle).await?;
        info!(%kind, identity = %descriptor.identity, "Deleted");

        tracker.advance(kind, ResourceState::Done);
        Ok((Outcome::Deleted, Some(handle)))
    }

    /// Resolve the handles `descriptor` needs for its probe during teardown.
    ///
    /// Dependencies are deleted after their dependents, so they still exist
    /// (or never did) at this point. Their probes are read-only and cached so
    /// each resource is probed once per run. A dependency that cannot be
    /// probed is an error: without its handle the dependent would look absent.
    async fn discover_dependencies(
        &self,
        descriptor: &ResourceDescriptor,
        cache: &mut ProbeCache,
    ) -> Result<Dependencies> {
        let closure = self.graph.dependency_closure(descriptor.kind);
        // kind -> why it could not be probed
        let mut unresolved: HashMap<ResourceKind, String> = HashMap::new();

        for dependency in self
            .graph
            .creation_order()
            .filter(|d| closure.contains(&d.kind))
        {
            if cache.contains_key(&dependency.kind) {
                continue;
            }
            if let Some(blocked) = dependency
                .depends_on
                .iter()
                .find(|kind| unresolved.contains_key(*kind))
            {
                unresolved.insert(dependency.kind, format!("{blocked} could not be probed"));
                continue;
            }

            let driver = self.driver(dependency.kind)?;
            let deps = cached_dependencies(dependency, cache);
            debug!(kind = %dependency.kind, identity = %dependency.identity, "Probing dependency");
            match driver.probe(dependency, &deps).await {
                Ok(probe) => {
                    cache.insert(dependency.kind, probe);
                }
                Err(e) => {
                    // Left uncached: it is probed again when its own turn comes
                    warn!(
                        kind = %dependency.kind,
                        dependent = %descriptor.kind,
                        error = %e,
                        "Dependency probe failed"
                    );
                    unresolved.insert(dependency.kind, e.to_string());
                }
            }
        }

        if let Some((dependency, cause)) = descriptor
            .depends_on
            .iter()
            .find_map(|kind| unresolved.remove(kind).map(|cause| (*kind, cause)))
        {
            return Err(CloudError::UnresolvedDependency {
                kind: descriptor.kind,
                dependency,
                cause,
            });
        }

        Ok(cached_dependencies(descriptor, cache))
    }

    /// Dry run: probe every resource and report what `flow` would do.
    /// Performs no mutating call.
    pub async fn plan(&self, flow: Flow) -> Result<Plan> {
        let mut cache = ProbeCache::new();

        for descriptor in self.graph.creation_order() {
            let driver = self.driver(descriptor.kind)?;
            let deps = cached_dependencies(descriptor, &cache);
            let probe = driver.probe(descriptor, &deps).await?;
            cache.insert(descriptor.kind, probe);
        }

        let actions = self
            .graph
            .order(flow)
            .into_iter()
            .map(|descriptor| {
                let probe = cache.get(&descriptor.kind).cloned().unwrap_or(Probe::Absent);
                plan_action(flow, descriptor, probe)
            })
            .collect();

        Ok(Plan::new(actions))
    }
}

fn plan_action(flow: Flow, descriptor: &ResourceDescriptor, probe: Probe) -> Action {
    let kind = descriptor.kind;
    let identity = &descriptor.identity;
    let (action_type, description) = match (flow, &probe) {
        (Flow::Provision, Probe::Absent) => (ActionType::Create, format!("create {kind} '{identity}'")),
        (Flow::Provision, Probe::Present(_)) => {
            (ActionType::NoOp, format!("{kind} '{identity}' already exists"))
        }
        (Flow::Destroy, Probe::Present(_)) => (ActionType::Delete, format!("delete {kind} '{identity}'")),
        (Flow::Destroy, Probe::Absent) => {
            (ActionType::NoOp, format!("{kind} '{identity}' is already absent"))
        }
    };

    Action {
        kind,
        identity: identity.clone(),
        action_type,
        handle: probe.handle().map(|h| h.id.clone()),
        description,
    }
}

fn cached_dependencies(descriptor: &ResourceDescriptor, cache: &ProbeCache) -> Dependencies {
    let mut deps = Dependencies::new();
    for kind in &descriptor.depends_on {
        if let Some(Probe::Present(handle)) = cache.get(kind) {
            deps.insert(*kind, handle.clone());
        }
    }
    deps
}

fn timed_out(descriptor: &ResourceDescriptor, outcome: WaitOutcome) -> Result<()> {
    match outcome {
        WaitOutcome::Ready { .. } => Ok(()),
        WaitOutcome::TimedOut { attempts, waited } => Err(CloudError::TimedOut {
            kind: descriptor.kind,
            identity: descriptor.identity.clone(),
            waited,
            attempts,
        }),
    }
}

fn not_attempted(descriptor: &ResourceDescriptor) -> ResourceReport {
    ResourceReport {
        kind: descriptor.kind,
        identity: descriptor.identity.clone(),
        outcome: Outcome::NotAttempted,
        handle: None,
    }
}
