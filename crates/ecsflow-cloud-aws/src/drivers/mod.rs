//! One [`ResourceDriver`](ecsflow_cloud::ResourceDriver) per resource kind

pub mod cluster;
pub mod execution_role;
pub mod listener;
pub mod load_balancer;
pub mod log_group;
pub mod security_group;
pub mod service;
pub mod target_group;

pub use cluster::{ClusterDriver, ClusterParams};
pub use execution_role::{ExecutionRoleDriver, ExecutionRoleParams};
pub use listener::{ListenerDriver, ListenerParams};
pub use load_balancer::{LoadBalancerDriver, LoadBalancerParams};
pub use log_group::{LogGroupDriver, LogGroupParams};
pub use security_group::{SecurityGroupDriver, SecurityGroupParams};
pub use service::{ServiceDriver, ServiceParams};
pub use target_group::{TargetGroupDriver, TargetGroupParams};

/// Handle attribute: VPC a security group or target group lives in
pub const ATTR_VPC_ID: &str = "vpc_id";
/// Handle attribute: cluster a service runs in
pub const ATTR_CLUSTER: &str = "cluster";
