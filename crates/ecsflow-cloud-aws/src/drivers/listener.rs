//! Load balancer listener driver

use crate::error::SdkResultExt;
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{Action, ActionTypeEnum, ProtocolEnum};
use ecsflow_cloud::{
    ATTR_ARN, CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const KIND: ResourceKind = ResourceKind::Listener;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerParams {
    pub port: u16,
    pub protocol: String,
}

pub struct ListenerDriver {
    elb: aws_sdk_elasticloadbalancingv2::Client,
}

impl ListenerDriver {
    pub fn new(elb: aws_sdk_elasticloadbalancingv2::Client) -> Self {
        Self { elb }
    }
}

/// ARN of the target group a listener forwards to
fn target_group_arn(deps: &Dependencies) -> Result<&str> {
    let target_group = deps.require(KIND, ResourceKind::TargetGroup)?;
    Ok(target_group
        .attribute(ATTR_ARN)
        .unwrap_or(target_group.id.as_str()))
}

#[async_trait]
impl ResourceDriver for ListenerDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    /// Listeners only exist on a load balancer, so no load balancer means no listener
    async fn probe(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Probe> {
        let Some(load_balancer) = deps.get(ResourceKind::LoadBalancer) else {
            debug!("No load balancer, listener cannot exist");
            return Ok(Probe::Absent);
        };
        let params: ListenerParams = descriptor.parameters()?;

        let response = self
            .elb
            .describe_listeners()
            .load_balancer_arn(&load_balancer.id)
            .send()
            .await
            .or_absent(KIND, "describe listeners")?;

        let found = response.as_ref().and_then(|r| {
            r.listeners()
                .iter()
                .filter(|l| l.port() == Some(i32::from(params.port)))
                .find_map(|l| l.listener_arn())
        });

        Ok(match found {
            Some(arn) => Probe::Present(Handle::new(arn).with_attribute(ATTR_ARN, arn)),
            None => Probe::Absent,
        })
    }

    async fn create(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Handle> {
        let params: ListenerParams = descriptor.parameters()?;
        let load_balancer = deps.require(KIND, ResourceKind::LoadBalancer)?;
        let target_group = target_group_arn(deps)?;

        info!(
            load_balancer = %load_balancer.id,
            port = params.port,
            target_group = %target_group,
            "Creating listener"
        );

        let forward = Action::builder()
            .r#type(ActionTypeEnum::Forward)
            .target_group_arn(target_group)
            .build()
            .map_err(|e| CloudError::driver(KIND, format!("Invalid listener action: {e}")))?;

        let response = self
            .elb
            .create_listener()
            .load_balancer_arn(&load_balancer.id)
            .protocol(ProtocolEnum::from(params.protocol.as_str()))
            .port(i32::from(params.port))
            .default_actions(forward)
            .send()
            .await
            .or_fail(KIND, "create listener")?;

        let arn = response
            .listeners()
            .iter()
            .find_map(|l| l.listener_arn())
            .ok_or_else(|| CloudError::driver(KIND, "No listener ARN in create response"))?;

        info!(arn = %arn, "Listener created");
        Ok(Handle::new(arn).with_attribute(ATTR_ARN, arn))
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(arn = %handle.id, "Deleting listener");

        match self
            .elb
            .delete_listener()
            .listener_arn(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete listener")?
        {
            Some(_) => info!(arn = %handle.id, "Listener deleted"),
            None => debug!(arn = %handle.id, "Listener already deleted"),
        }
        Ok(())
    }
}
