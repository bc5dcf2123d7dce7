//! ecsflow Cloud Convergence
//!
//! This crate provides the provider-independent core of ecsflow: a declared
//! set of interdependent cloud resources is brought to "exists" (provision) or
//! "gone" (destroy) idempotently and in dependency order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   ecsflow CLI                    │
//! │          (provision / destroy / plan)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 ecsflow-cloud                    │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │ Dependency   │─▶│   Convergence Engine     │ │
//! │  │ Graph        │  │ probe → create/delete    │ │
//! │  └──────────────┘  └────────────┬─────────────┘ │
//! │                    ┌────────────▼─────────────┐ │
//! │                    │  Waiter (backoff+deadline)│ │
//! │                    └──────────────────────────┘ │
//! │  trait ResourceDriver { probe, create, delete } │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ ecsflow-cloud │
//!           │     -aws      │
//!           └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ecsflow_cloud::{ConvergenceEngine, DependencyGraph};
//!
//! let graph = DependencyGraph::build(descriptors)?;
//! let engine = ConvergenceEngine::new(graph, drivers)?;
//!
//! let result = engine.provision().await;
//! if let Some(endpoint) = &result.endpoint {
//!     println!("http://{endpoint}");
//! }
//! ```

pub mod action;
pub mod driver;
pub mod engine;
pub mod error;
pub mod graph;
pub mod report;
pub mod resource;
pub mod state;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use driver::{DriverRegistry, Probe, ResourceDriver};
pub use engine::ConvergenceEngine;
pub use error::{CloudError, Result};
pub use graph::{DependencyGraph, Flow};
pub use report::{
    ATTR_ARN, ATTR_DNS_NAME, DestructionResult, Outcome, ProvisioningResult, ResourceReport,
};
pub use resource::{Dependencies, Handle, ResourceDescriptor, ResourceKind};
pub use state::{ResourceState, StateTracker};
pub use tokio_util::sync::CancellationToken;
pub use waiter::{WaitConfig, WaitOutcome, wait_until, wait_until_quiesced, wait_until_usable};
