//! Load balancer target group driver

use crate::error::SdkResultExt;
use crate::network::Network;
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{ProtocolEnum, TargetTypeEnum};
use ecsflow_cloud::{
    ATTR_ARN, CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::ATTR_VPC_ID;

const KIND: ResourceKind = ResourceKind::TargetGroup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupParams {
    /// Port traffic is forwarded to on each target
    pub port: u16,
    /// `HTTP` or `HTTPS`
    pub protocol: String,
    /// `ip` for awsvpc tasks
    pub target_type: String,
    pub health_check_path: String,
}

pub struct TargetGroupDriver {
    elb: aws_sdk_elasticloadbalancingv2::Client,
    network: Arc<Network>,
}

impl TargetGroupDriver {
    pub fn new(elb: aws_sdk_elasticloadbalancingv2::Client, network: Arc<Network>) -> Self {
        Self { elb, network }
    }
}

fn target_group_handle(arn: &str) -> Handle {
    Handle::new(arn).with_attribute(ATTR_ARN, arn)
}

#[async_trait]
impl ResourceDriver for TargetGroupDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let response = self
            .elb
            .describe_target_groups()
            .names(&descriptor.identity)
            .send()
            .await
            .or_absent(KIND, "describe target groups")?;

        let arn = response.as_ref().and_then(|r| {
            r.target_groups()
                .iter()
                .find_map(|tg| tg.target_group_arn())
        });

        Ok(match arn {
            Some(arn) => Probe::Present(target_group_handle(arn)),
            None => Probe::Absent,
        })
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &Dependencies,
    ) -> Result<Handle> {
        let params: TargetGroupParams = descriptor.parameters()?;
        let network = self.network.default_network(KIND).await?;
        let protocol = ProtocolEnum::from(params.protocol.as_str());

        info!(name = %descriptor.identity, port = params.port, "Creating target group");

        let response = self
            .elb
            .create_target_group()
            .name(&descriptor.identity)
            .protocol(protocol.clone())
            .port(i32::from(params.port))
            .vpc_id(&network.vpc_id)
            .target_type(TargetTypeEnum::from(params.target_type.as_str()))
            .health_check_path(&params.health_check_path)
            .health_check_protocol(protocol)
            .health_check_port(params.port.to_string())
            .send()
            .await
            .or_fail(KIND, "create target group")?;

        let arn = response
            .target_groups()
            .iter()
            .find_map(|tg| tg.target_group_arn())
            .ok_or_else(|| CloudError::driver(KIND, "No target group ARN in create response"))?;

        info!(arn = %arn, "Target group created");
        Ok(target_group_handle(arn).with_attribute(ATTR_VPC_ID, network.vpc_id.as_str()))
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(arn = %handle.id, "Deleting target group");

        match self
            .elb
            .delete_target_group()
            .target_group_arn(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete target group")?
        {
            Some(_) => info!(arn = %handle.id, "Target group deleted"),
            None => debug!(arn = %handle.id, "Target group already deleted"),
        }
        Ok(())
    }
}
