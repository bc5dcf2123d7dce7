//! AWS resource drivers for ecsflow
//!
//! Implements [`ResourceDriver`](ecsflow_cloud::ResourceDriver) for each
//! resource of an ECS Fargate service behind an application load balancer:
//!
//! | kind | AWS resource |
//! |---|---|
//! | security-group | EC2 security group in the default VPC |
//! | cluster | ECS cluster |
//! | execution-role | IAM role assumed by ECS tasks |
//! | log-sink | CloudWatch Logs log group |
//! | target-group | ELBv2 target group (`ip` targets) |
//! | load-balancer | internet-facing application load balancer |
//! | listener | load balancer listener forwarding to the target group |
//! | service | ECS service on Fargate |
//!
//! # Requirements
//!
//! - AWS credentials resolvable by the default provider chain
//! - A default VPC in the target region
//! - The task definition named in the config, registered beforehand
//!
//! # Example
//!
//! ```ignore
//! use ecsflow_cloud_aws::{AwsContext, build_engine};
//!
//! let ctx = AwsContext::new(&config.region).await;
//! let engine = build_engine(&ctx, &config)?;
//! let result = engine.provision().await;
//! ```

pub mod context;
pub mod drivers;
pub mod error;
pub mod network;
pub mod stack;

pub use context::AwsContext;
pub use error::{AwsError, classify, classify_aws_error};
pub use network::{DefaultNetwork, Network};
pub use stack::{build_engine, driver_registry, listener_identity, standard_descriptors};
