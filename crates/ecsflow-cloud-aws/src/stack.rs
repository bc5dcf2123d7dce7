//! The standard deployment: eight resources declared from one config

use crate::context::AwsContext;
use crate::drivers::{
    ClusterDriver, ClusterParams, ExecutionRoleDriver, ExecutionRoleParams, ListenerDriver,
    ListenerParams, LoadBalancerDriver, LoadBalancerParams, LogGroupDriver, LogGroupParams,
    SecurityGroupDriver, SecurityGroupParams, ServiceDriver, ServiceParams, TargetGroupDriver,
    TargetGroupParams,
};
use crate::network::Network;
use ecsflow_cloud::{
    ConvergenceEngine, DependencyGraph, DriverRegistry, ResourceDescriptor, ResourceKind, Result,
};
use ecsflow_config::DeploymentConfig;
use std::sync::Arc;

/// Service principal ECS tasks assume their execution role through
pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Listener identity, e.g. `http:80`
pub fn listener_identity(protocol: &str, port: u16) -> String {
    format!("{}:{}", protocol.to_lowercase(), port)
}

/// Declare the deployment's resources with their dependencies and parameters.
pub fn standard_descriptors(config: &DeploymentConfig) -> Result<Vec<ResourceDescriptor>> {
    use ResourceKind::*;

    let security_group = SecurityGroupParams {
        description: format!("Security group for {}", config.service_name),
        ingress_ports: vec![config.container_port, config.listener_port],
        ingress_cidr: config.ingress_cidr.clone(),
    };
    let execution_role = ExecutionRoleParams {
        policy_arn: config.execution_role_policy_arn.clone(),
        trusted_service: ECS_TASKS_PRINCIPAL.to_string(),
    };
    let target_group = TargetGroupParams {
        port: config.container_port,
        protocol: "HTTP".to_string(),
        target_type: "ip".to_string(),
        health_check_path: config.health_check_path.clone(),
    };
    let load_balancer = LoadBalancerParams {
        scheme: "internet-facing".to_string(),
        ip_address_type: "ipv4".to_string(),
    };
    let listener = ListenerParams {
        port: config.listener_port,
        protocol: "HTTP".to_string(),
    };
    let service = ServiceParams {
        task_definition: config.task_definition.clone(),
        desired_count: config.desired_count,
        container_name: config.container_name.clone(),
        container_port: config.container_port,
        assign_public_ip: true,
    };

    Ok(vec![
        ResourceDescriptor::new(SecurityGroup, &config.security_group_name)
            .with_parameters(serde_json::to_value(security_group)?),
        ResourceDescriptor::new(Cluster, &config.cluster_name)
            .with_parameters(serde_json::to_value(ClusterParams::default())?),
        ResourceDescriptor::new(ExecutionRole, &config.execution_role_name)
            .with_parameters(serde_json::to_value(execution_role)?),
        ResourceDescriptor::new(LogSink, &config.log_group)
            .with_parameters(serde_json::to_value(LogGroupParams::default())?),
        ResourceDescriptor::new(TargetGroup, &config.target_group_name)
            .with_parameters(serde_json::to_value(target_group)?),
        ResourceDescriptor::new(LoadBalancer, &config.load_balancer_name)
            .depends_on([SecurityGroup])
            .with_parameters(serde_json::to_value(load_balancer)?),
        ResourceDescriptor::new(Listener, listener_identity(&listener.protocol, listener.port))
            .depends_on([LoadBalancer, TargetGroup])
            .with_parameters(serde_json::to_value(listener)?),
        // A target group can only be attached to a service once a listener
        // associates it with the load balancer
        ResourceDescriptor::new(Service, &config.service_name)
            .depends_on([
                Cluster,
                ExecutionRole,
                LogSink,
                SecurityGroup,
                TargetGroup,
                Listener,
            ])
            .with_parameters(serde_json::to_value(service)?),
    ])
}

/// One AWS driver per resource kind, sharing a single default-network lookup.
pub fn driver_registry(ctx: &AwsContext, config: &DeploymentConfig) -> DriverRegistry {
    let network = Arc::new(Network::new(ctx.ec2_client(), config.subnet_count));

    DriverRegistry::new()
        .with(SecurityGroupDriver::new(ctx.ec2_client(), network.clone()))
        .with(ClusterDriver::new(ctx.ecs_client()))
        .with(ExecutionRoleDriver::new(ctx.iam_client()))
        .with(LogGroupDriver::new(ctx.logs_client()))
        .with(TargetGroupDriver::new(ctx.elb_client(), network.clone()))
        .with(LoadBalancerDriver::new(ctx.elb_client(), network.clone()))
        .with(ListenerDriver::new(ctx.elb_client()))
        .with(ServiceDriver::new(ctx.ecs_client(), network))
}

/// Build a ready-to-run engine for the standard deployment.
pub fn build_engine(ctx: &AwsContext, config: &DeploymentConfig) -> Result<ConvergenceEngine> {
    let graph = DependencyGraph::build(standard_descriptors(config)?)?;

    Ok(ConvergenceEngine::new(graph, driver_registry(ctx, config))?
        .with_settle_wait(config.settle.clone())
        .with_drain_wait(config.drain.clone()))
}
