//! CloudWatch log group driver (the deployment's log sink)

use crate::error::SdkResultExt;
use async_trait::async_trait;
use ecsflow_cloud::{
    ATTR_ARN, Dependencies, Handle, Probe, ResourceDescriptor, ResourceDriver, ResourceKind,
    Result,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const KIND: ResourceKind = ResourceKind::LogSink;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogGroupParams {
    /// Days to keep log events; `None` keeps them forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<i32>,
}

pub struct LogGroupDriver {
    logs: aws_sdk_cloudwatchlogs::Client,
}

impl LogGroupDriver {
    pub fn new(logs: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { logs }
    }
}

#[async_trait]
impl ResourceDriver for LogGroupDriver {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    async fn probe(&self, descriptor: &ResourceDescriptor, _deps: &Dependencies) -> Result<Probe> {
        let name = descriptor.identity.as_str();

        // The prefix lookup also returns longer names; only an exact match counts
        let response = self
            .logs
            .describe_log_groups()
            .log_group_name_prefix(name)
            .send()
            .await
            .or_fail(KIND, "describe log groups")?;

        let found = response
            .log_groups()
            .iter()
            .find(|lg| lg.log_group_name() == Some(name));

        Ok(match found {
            Some(group) => {
                let mut handle = Handle::new(name);
                if let Some(arn) = group.arn() {
                    handle = handle.with_attribute(ATTR_ARN, arn);
                }
                Probe::Present(handle)
            }
            None => Probe::Absent,
        })
    }

    async fn create(
        &self,
        descriptor: &ResourceDescriptor,
        _deps: &Dependencies,
    ) -> Result<Handle> {
        let params: LogGroupParams = descriptor.parameters()?;
        let name = descriptor.identity.as_str();

        info!(log_group = %name, "Creating log group");

        self.logs
            .create_log_group()
            .log_group_name(name)
            .send()
            .await
            .or_fail(KIND, "create log group")?;

        if let Some(days) = params.retention_days {
            self.logs
                .put_retention_policy()
                .log_group_name(name)
                .retention_in_days(days)
                .send()
                .await
                .or_fail(KIND, "put retention policy")?;
        }

        info!(log_group = %name, "Log group created");
        Ok(Handle::new(name))
    }

    async fn delete(&self, _descriptor: &ResourceDescriptor, handle: &Handle) -> Result<()> {
        info!(log_group = %handle.id, "Deleting log group");

        match self
            .logs
            .delete_log_group()
            .log_group_name(&handle.id)
            .send()
            .await
            .or_absent(KIND, "delete log group")?
        {
            Some(_) => info!(log_group = %handle.id, "Log group deleted"),
            None => debug!(log_group = %handle.id, "Log group already deleted"),
        }
        Ok(())
    }
}
