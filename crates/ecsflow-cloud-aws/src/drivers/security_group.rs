//! Security group driver

use crate::error::SdkResultExt;
use crate::network::Network;
use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, IpPermission, IpRange};
use ecsflow_cloud::{
    CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver, ResourceKind,
    Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ATTR_VPC_ID;

const KIND: ResourceKind = ResourceKind::SecurityGroup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupParams {
    pub description: String,
    /// TCP ports opened to `ingress_cidr`
    pub ingress_ports: Vec<u16>,
    pub ingress_cidr: String,
}

pub struct SecurityGroupDriver {
    ec2: aws_sdk_ec2::Client,
    network: Arc<Network>,
}

impl SecurityGroupDriver {
    pub fn new(ec2: aws_sdk_ec2::Client, network: Arc<Network>) -> Self {
        Self { ec2, network }
    }

    async fn authorize_ingress(&self, group_id: &str, ports: &[u16], cidr: &str) -> Result<()> {
        let mut request = self.ec2.authorize_security_group_ingress().group_id(group_id);
        for port in ports {
            request = request.ip_permissions(
                IpPermission::builder()
                    .ip_protocol("tcp")
                    .from_port(i32::from(*port))
                    .to_port(i32::from(*port))
                    .ip_ranges(IpRange::builder().cidr_ip(cidr).build())
                    .build(),
            );
        }
        request
            .send()
            .await
            .or_fail(KIND, "authorize security group ingress")?;
        Ok(())
    }
}

/// Whether `permission` already lets `cidr` reach TCP `port`
fn covers(permission: &IpPermission, port: u16, cidr: &str) -> bool {
    let port = i32::from(port);
    let in_range = match permission.ip_protocol() {
        Some("-1") => true,
        Some("tcp") | Some("6") => {
            permission.from_port().is_some_and(|from| from <= port)
                && permission.to_port().is_some_and(|to| port <= to)
        }
        _ => false,
    };
    in_range && permission.ip_ranges().iter().any(|r| r.cidr_ip() == Some(cidr))
}

/// Ports from `params` that no existing rule opens
fn missing_ingress_ports(params: &SecurityGroupParams, existing: &[IpPermission]) -> Vec<u16> {
    params
        .ingress_ports
        .iter()
        .copied()
        .filter(|port| !existing.iter().any(|p| covers(p, *port, &params.ingress_cidr)))
        .collect()
}

#[async_trait]
impl ResourceDriver for SecurityGroupDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let response = self
            .ec2
            .describe_security_groups()
            .filters(
                Filter::builder()
                    .name("group-name")
                    .values(&descriptor.identity)
                    .build(),
            )
            .send()
            .await
            .or_absent(KIND, "describe security groups")?;

        let found = response.as_ref().and_then(|r| {
            r.security_groups().iter().find_map(|sg| {
                let id = sg.group_id()?;
                let mut handle = Handle::new(id);
                if let Some(vpc_id) = sg.vpc_id() {
                    handle = handle.with_attribute(ATTR_VPC_ID, vpc_id);
                }
                Some(handle)
            })
        });

        Ok(match found {
            Some(handle) => Probe::Present(handle),
            None => Probe::Absent,
        })
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &Dependencies,
    ) -> Result<Handle> {
        let params: SecurityGroupParams = descriptor.parameters()?;
        let network = self.network.default_network(KIND).await?;

        info!(name = %descriptor.identity, vpc_id = %network.vpc_id, "Creating security group");

        let response = self
            .ec2
            .create_security_group()
            .group_name(&descriptor.identity)
            .description(&params.description)
            .vpc_id(&network.vpc_id)
            .send()
            .await
            .or_fail(KIND, "create security group")?;

        let group_id = response
            .group_id()
            .ok_or_else(|| CloudError::driver(KIND, "No security group ID in response"))?
            .to_string();

        // a failure here leaves the group behind; `complete` adds the rules on the next run
        self.authorize_ingress(&group_id, &params.ingress_ports, &params.ingress_cidr)
            .await?;

        info!(sg_id = %group_id, ports = ?params.ingress_ports, "Security group created");

        Ok(Handle::new(group_id).with_attribute(ATTR_VPC_ID, network.vpc_id.as_str()))
    }

    async fn complete(&self, descriptor: &ResourceDescriptor, handle: &Handle) -> Result<bool> {
        let params: SecurityGroupParams = descriptor.parameters()?;

        let response = self
            .ec2
            .describe_security_groups()
            .group_ids(&handle.id)
            .send()
            .await
            .or_fail(KIND, "describe security groups")?;
        let existing = response
            .security_groups()
            .first()
            .map(|sg| sg.ip_permissions())
            .unwrap_or_default();

        let missing = missing_ingress_ports(&params, existing);
        if missing.is_empty() {
            return Ok(false);
        }

        warn!(sg_id = %handle.id, ports = ?missing, "Security group is missing ingress rules, adding them");
        self.authorize_ingress(&handle.id, &missing, &params.ingress_cidr)
            .await?;
        Ok(true)
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(sg_id = %handle.id, "Deleting security group");

        let deleted = self
            .ec2
            .delete_security_group()
            .group_id(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete security group")?;

        match deleted {
            Some(_) => info!(sg_id = %handle.id, "Security group deleted"),
            None => debug!(sg_id = %handle.id, "Security group already deleted"),
        }
        Ok(())
    }

    // Load balancer network interfaces are released some time after the
    // load balancer itself is gone
    fn quiesces_before_delete(&self) -> bool {
        true
    }

    async fn is_quiesced(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<bool> {
        let response = self
            .ec2
            .describe_network_interfaces()
            .filters(Filter::builder().name("group-id").values(&handle.id).build())
            .send()
            .await
            .or_fail(KIND, "describe network interfaces")?;

        let attached = response.network_interfaces().len();
        debug!(sg_id = %handle.id, attached, "Network interfaces referencing security group");
        Ok(attached == 0)
    }
}
