//! Task execution role driver

use crate::error::SdkResultExt;
use async_trait::async_trait;
use aws_sdk_iam::types::AttachedPolicy;
use ecsflow_cloud::{
    ATTR_ARN, CloudError, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const KIND: ResourceKind = ResourceKind::ExecutionRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRoleParams {
    /// Managed policy attached after creation
    pub policy_arn: String,
    /// Service principal allowed to assume the role
    pub trusted_service: String,
}

/// Trust policy letting `service` assume the role
fn assume_role_policy(service: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": service },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

pub struct ExecutionRoleDriver {
    iam: aws_sdk_iam::Client,
}

impl ExecutionRoleDriver {
    pub fn new(iam: aws_sdk_iam::Client) -> Self {
        Self { iam }
    }

    async fn policy_attached(&self, role_name: &str, policy_arn: &str) -> Result<bool> {
        let response = self
            .iam
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .or_absent(KIND, "list attached role policies")?;

        Ok(response.is_some_and(|r| has_policy(r.attached_policies(), policy_arn)))
    }

    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .or_fail(KIND, "attach role policy")?;
        Ok(())
    }
}

fn has_policy(attached: &[AttachedPolicy], policy_arn: &str) -> bool {
    attached.iter().any(|p| p.policy_arn() == Some(policy_arn))
}

#[async_trait]
impl ResourceDriver for ExecutionRoleDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let response = self
            .iam
            .get_role()
            .role_name(&descriptor.identity)
            .send()
            .await
            .or_absent(KIND, "get role")?;

        Ok(match response.as_ref().and_then(|r| r.role()) {
            Some(role) => Probe::Present(Handle::new(role.arn()).with_attribute(ATTR_ARN, role.arn())),
            None => Probe::Absent,
        })
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &Dependencies,
    ) -> Result<Handle> {
        let params: ExecutionRoleParams = descriptor.parameters()?;
        let role_name = descriptor.identity.as_str();

        info!(role_name = %role_name, "Creating IAM role");

        let response = self
            .iam
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(assume_role_policy(&params.trusted_service))
            .send()
            .await
            .or_fail(KIND, "create role")?;

        let arn = response
            .role()
            .map(|r| r.arn().to_string())
            .ok_or_else(|| CloudError::driver(KIND, "No role in create response"))?;

        // a failure here leaves the role behind; `complete` attaches the policy on the next run
        self.attach_policy(role_name, &params.policy_arn).await?;

        info!(role_name = %role_name, policy_arn = %params.policy_arn, "IAM role created");

        Ok(Handle::new(arn.as_str()).with_attribute(ATTR_ARN, arn))
    }

    async fn complete(&self, descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        let params: ExecutionRoleParams = descriptor.parameters()?;
        let role_name = descriptor.identity.as_str();

        if self.policy_attached(role_name, &params.policy_arn).await? {
            return Ok(false);
        }

        warn!(role_name = %role_name, policy_arn = %params.policy_arn, "IAM role is missing its policy, attaching it");
        self.attach_policy(role_name, &params.policy_arn).await?;
        Ok(true)
    }

    async fn delete(&self, descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<()> {
        let params: ExecutionRoleParams = descriptor.parameters()?;
        let role_name = descriptor.identity.as_str();

        info!(role_name = %role_name, "Deleting IAM role");

        // A role with attached policies cannot be deleted; if detaching fails
        // the delete below reports the real error
        if let Err(e) = self
            .iam
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(&params.policy_arn)
            .send()
            .await
        {
            warn!(
                role_name = %role_name,
                error = %crate::error::classify(&e),
                "Failed to detach role policy"
            );
        }

        match self
            .iam
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .or_absent(KIND, "delete role")?
        {
            Some(_) => info!(role_name = %role_name, "IAM role deleted"),
            None => debug!(role_name = %role_name, "IAM role already deleted"),
        }
        Ok(())
    }

    // IAM is eventually consistent: ECS rejects a role it cannot see yet
    fn waits_after_create(&self) -> bool {
        true
    }

    async fn is_usable(&self, descriptor: &ResourceDescriptor, _handle: &Handle) -> Result<bool> {
        let params: ExecutionRoleParams = descriptor.parameters()?;
        let role_name = descriptor.identity.as_str();

        let visible = self
            .iam
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .or_absent(KIND, "get role")?
            .is_some();

        Ok(visible && self.policy_attached(role_name, &params.policy_arn).await?)
    }
}
