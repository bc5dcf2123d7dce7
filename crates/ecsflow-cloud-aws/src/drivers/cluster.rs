//! ECS cluster driver

use crate::error::SdkResultExt;
use async_trait::async_trait;
use ecsflow_cloud::{
    ATTR_ARN, CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const KIND: ResourceKind = ResourceKind::Cluster;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Enable CloudWatch Container Insights
    #[serde(default)]
    pub container_insights: bool,
}

pub struct ClusterDriver {
    ecs: aws_sdk_ecs::Client,
}

impl ClusterDriver {
    pub fn new(ecs: aws_sdk_ecs::Client) -> Self {
        Self { ecs }
    }
}

#[async_trait]
impl ResourceDriver for ClusterDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let response = self
            .ecs
            .describe_clusters()
            .clusters(&descriptor.identity)
            .send()
            .await
            .or_fail(KIND, "describe clusters")?;

        // Deleted clusters stay describable as INACTIVE for a while
        let active = response
            .clusters()
            .iter()
            .find(|c| c.status() == Some("ACTIVE"));

        Ok(match active {
            Some(cluster) => {
                let arn = cluster.cluster_arn().unwrap_or(descriptor.identity.as_str());
                Probe::Present(Handle::new(descriptor.identity.as_str()).with_attribute(ATTR_ARN, arn))
            }
            None => Probe::Absent,
        })
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &Dependencies,
    ) -> Result<Handle> {
        let params: ClusterParams = descriptor.parameters()?;
        let name = descriptor.identity.as_str();

        info!(cluster = %name, "Creating ECS cluster");

        let mut request = self.ecs.create_cluster().cluster_name(name);
        if params.container_insights {
            request = request.settings(
                aws_sdk_ecs::types::ClusterSetting::builder()
                    .name(aws_sdk_ecs::types::ClusterSettingName::ContainerInsights)
                    .value("enabled")
                    .build(),
            );
        }
        let response = request.send().await.or_fail(KIND, "create cluster")?;

        let arn = response
            .cluster()
            .and_then(|c| c.cluster_arn())
            .ok_or_else(|| CloudError::driver(KIND, "No cluster ARN in create response"))?;

        info!(cluster = %name, arn = %arn, "ECS cluster created");
        Ok(Handle::new(name).with_attribute(ATTR_ARN, arn))
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(cluster = %handle.id, "Deleting ECS cluster");

        match self
            .ecs
            .delete_cluster()
            .cluster(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete cluster")?
        {
            Some(_) => info!(cluster = %handle.id, "ECS cluster deleted"),
            None => debug!(cluster = %handle.id, "ECS cluster already deleted"),
        }
        Ok(())
    }
}
