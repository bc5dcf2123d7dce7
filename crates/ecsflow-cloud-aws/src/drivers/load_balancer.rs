//! Application load balancer driver

use crate::error::SdkResultExt;
use crate::network::Network;
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{
    IpAddressType, LoadBalancer, LoadBalancerSchemeEnum, LoadBalancerStateEnum,
    LoadBalancerTypeEnum,
};
use ecsflow_cloud::{
    ATTR_ARN, ATTR_DNS_NAME, CloudError, Dependencies, Handle, Probe, ResourceDescriptor,
    ResourceDriver, ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const KIND: ResourceKind = ResourceKind::LoadBalancer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerParams {
    /// `internet-facing` or `internal`
    pub scheme: String,
    /// `ipv4` or `dualstack`
    pub ip_address_type: String,
}

pub struct LoadBalancerDriver {
    elb: aws_sdk_elasticloadbalancingv2::Client,
    network: Arc<Network>,
}

impl LoadBalancerDriver {
    pub fn new(elb: aws_sdk_elasticloadbalancingv2::Client, network: Arc<Network>) -> Self {
        Self { elb, network }
    }
}

/// Handle carrying the ARN and the public DNS name
fn load_balancer_handle(lb: &LoadBalancer) -> Option<Handle> {
    let arn = lb.load_balancer_arn()?;
    let mut handle = Handle::new(arn).with_attribute(ATTR_ARN, arn);
    if let Some(dns_name) = lb.dns_name() {
        handle = handle.with_attribute(ATTR_DNS_NAME, dns_name);
    }
    Some(handle)
}

#[async_trait]
impl ResourceDriver for LoadBalancerDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let response = self
            .elb
            .describe_load_balancers()
            .names(&descriptor.identity)
            .send()
            .await
            .or_absent(KIND, "describe load balancers")?;

        let found = response
            .as_ref()
            .and_then(|r| r.load_balancers().iter().find_map(load_balancer_handle));

        Ok(match found {
            Some(handle) => Probe::Present(handle),
            None => Probe::Absent,
        })
    }

    async fn create(&self, descriptor: &ResourceDescriptor, deps: &Dependencies) -> Result<Handle> {
        let params: LoadBalancerParams = descriptor.parameters()?;
        let security_group = deps.require(KIND, ResourceKind::SecurityGroup)?;
        let network = self.network.default_network(KIND).await?;

        info!(
            name = %descriptor.identity,
            subnets = ?network.subnet_ids,
            "Creating application load balancer"
        );

        let response = self
            .elb
            .create_load_balancer()
            .name(&descriptor.identity)
            .set_subnets(Some(network.subnet_ids.clone()))
            .security_groups(&security_group.id)
            .scheme(LoadBalancerSchemeEnum::from(params.scheme.as_str()))
            .r#type(LoadBalancerTypeEnum::Application)
            .ip_address_type(IpAddressType::from(params.ip_address_type.as_str()))
            .send()
            .await
            .or_fail(KIND, "create load balancer")?;

        let handle = response
            .load_balancers()
            .iter()
            .find_map(load_balancer_handle)
            .ok_or_else(|| CloudError::driver(KIND, "No load balancer in create response"))?;

        info!(arn = %handle.id, dns_name = ?handle.attribute(ATTR_DNS_NAME), "Load balancer created");
        Ok(handle)
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(arn = %handle.id, "Deleting load balancer");

        match self
            .elb
            .delete_load_balancer()
            .load_balancer_arn(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete load balancer")?
        {
            Some(_) => info!(arn = %handle.id, "Load balancer deleted"),
            None => debug!(arn = %handle.id, "Load balancer already deleted"),
        }
        Ok(())
    }

    // A new load balancer stays `provisioning` for a few minutes
    fn waits_after_create(&self) -> bool {
        true
    }

    async fn is_usable(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<bool> {
        let response = self
            .elb
            .describe_load_balancers()
            .load_balancer_arns(&handle.id)
            .send()
            .await
            .or_fail(KIND, "describe load balancer state")?;

        let state = response
            .load_balancers()
            .first()
            .and_then(|lb| lb.state())
            .and_then(|s| s.code())
            .cloned();

        debug!(arn = %handle.id, state = ?state, "Load balancer state");
        match state {
            Some(LoadBalancerStateEnum::Active) => Ok(true),
            Some(LoadBalancerStateEnum::Failed) => Err(CloudError::driver(
                KIND,
                "Load balancer entered the failed state",
            )),
            _ => Ok(false),
        }
    }
}
