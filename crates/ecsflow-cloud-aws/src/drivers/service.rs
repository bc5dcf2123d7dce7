//! ECS service driver

use crate::error::SdkResultExt;
use crate::network::Network;
use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, LaunchType, LoadBalancer, NetworkConfiguration,
};
use ecsflow_cloud::{
    ATTR_ARN, CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::ATTR_CLUSTER;

const KIND: ResourceKind = ResourceKind::Service;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceParams {
    /// Task definition family (or family:revision) the service runs
    pub task_definition: String,
    pub desired_count: u32,
    /// Container receiving load balancer traffic
    pub container_name: String,
    pub container_port: u16,
    #[serde(default = "default_true")]
    pub assign_public_ip: bool,
}

fn default_true() -> bool {
    true
}

pub struct ServiceDriver {
    ecs: aws_sdk_ecs::Client,
    network: Arc<Network>,
}

impl ServiceDriver {
    pub fn new(ecs: aws_sdk_ecs::Client, network: Arc<Network>) -> Self {
        Self { ecs, network }
    }

    /// The service as ECS reports it, unless it is gone or being deleted
    async fn describe(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<aws_sdk_ecs::types::Service>> {
        let response = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await
            .or_absent(KIND, "describe services")?;

        Ok(response.and_then(|r| {
            r.services()
                .iter()
                .find(|s| s.status() == Some("ACTIVE"))
                .cloned()
        }))
    }
}

/// Cluster a service handle belongs to
fn cluster_of(handle: &Handle) -> Result<&str> {
    handle
        .attribute(ATTR_CLUSTER)
        .ok_or_else(|| CloudError::driver(KIND, format!("Handle {handle} has no cluster")))
}

#[async_trait]
impl ResourceDriver for ServiceDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    /// Services only exist inside a cluster, so no cluster means no service
    async fn probe(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Probe> {
        let Some(cluster) = deps.get(ResourceKind::Cluster) else {
            debug!("No cluster, service cannot exist");
            return Ok(Probe::Absent);
        };

        Ok(
            match self.describe(&cluster.id, &descriptor.identity).await? {
                Some(service) => {
                    let arn = service.service_arn().unwrap_or(descriptor.identity.as_str());
                    Probe::Present(
                        Handle::new(descriptor.identity.as_str())
                            .with_attribute(ATTR_ARN, arn)
                            .with_attribute(ATTR_CLUSTER, cluster.id.as_str()),
                    )
                }
                None => Probe::Absent,
            },
        )
    }

    async fn create(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Handle> {
        let params: ServiceParams = descriptor.parameters()?;
        let cluster = deps.require(KIND, ResourceKind::Cluster)?;
        let security_group = deps.require(KIND, ResourceKind::SecurityGroup)?;
        let target_group = deps.require(KIND, ResourceKind::TargetGroup)?;
        let network = self.network.default_network(KIND).await?;

        let assign_public_ip = if params.assign_public_ip {
            AssignPublicIp::Enabled
        } else {
            AssignPublicIp::Disabled
        };
        let vpc_configuration = AwsVpcConfiguration::builder()
            .set_subnets(Some(network.subnet_ids.clone()))
            .security_groups(&security_group.id)
            .assign_public_ip(assign_public_ip)
            .build()
            .map_err(|e| CloudError::driver(KIND, format!("Invalid network configuration: {e}")))?;

        let load_balancer = LoadBalancer::builder()
            .target_group_arn(
                target_group
                    .attribute(ATTR_ARN)
                    .unwrap_or(target_group.id.as_str()),
            )
            .container_name(&params.container_name)
            .container_port(i32::from(params.container_port))
            .build();

        let desired_count = i32::try_from(params.desired_count).map_err(|_| {
            CloudError::InvalidParameters {
                kind: KIND,
                message: format!("desired_count {} is out of range", params.desired_count),
            }
        })?;

        info!(
            service = %descriptor.identity,
            cluster = %cluster.id,
            task_definition = %params.task_definition,
            desired_count,
            "Creating ECS service"
        );

        let response = self
            .ecs
            .create_service()
            .cluster(&cluster.id)
            .service_name(&descriptor.identity)
            .task_definition(&params.task_definition)
            .desired_count(desired_count)
            .launch_type(LaunchType::Fargate)
            .network_configuration(
                NetworkConfiguration::builder()
                    .awsvpc_configuration(vpc_configuration)
                    .build(),
            )
            .load_balancers(load_balancer)
            .send()
            .await
            .or_fail(KIND, "create service")?;

        let arn = response
            .service()
            .and_then(|s| s.service_arn())
            .ok_or_else(|| CloudError::driver(KIND, "No service ARN in create response"))?;

        info!(service = %descriptor.identity, arn = %arn, "ECS service created");
        Ok(Handle::new(descriptor.identity.as_str())
            .with_attribute(ATTR_ARN, arn)
            .with_attribute(ATTR_CLUSTER, cluster.id.as_str()))
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        let cluster = cluster_of(handle)?;
        info!(service = %handle.id, cluster = %cluster, "Deleting ECS service");

        match self
            .ecs
            .delete_service()
            .cluster(cluster)
            .service(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete service")?
        {
            Some(_) => info!(service = %handle.id, "ECS service deleted"),
            None => debug!(service = %handle.id, "ECS service already deleted"),
        }
        Ok(())
    }

    // ECS refuses to delete a service that still has a desired count
    fn quiesces_before_delete(&self) -> bool {
        true
    }

    async fn quiesce(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        let cluster = cluster_of(handle)?;
        info!(service = %handle.id, "Scaling ECS service to zero");

        self.ecs
            .update_service()
            .cluster(cluster)
            .service(&handle.id)
            .desired_count(0)
            .send()
            .await
            .or_absent(KIND, "scale service to zero")?;
        Ok(())
    }

    async fn is_quiesced(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<bool> {
        let cluster = cluster_of(handle)?;

        Ok(match self.describe(cluster, &handle.id).await? {
            Some(service) => {
                debug!(
                    service = %handle.id,
                    running = service.running_count(),
                    "Waiting for service tasks to stop"
                );
                service.running_count() == 0
            }
            None => true,
        })
    }
}
