//! Default VPC discovery

use crate::error::SdkResultExt;
use aws_sdk_ec2::types::Filter;
use ecsflow_cloud::{CloudError, ResourceKind, Result};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// The default VPC and the subnets the deployment spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultNetwork {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
}

/// Lazily discovered default network, looked up at most once per run
pub struct Network {
    ec2: aws_sdk_ec2::Client,
    subnet_count: usize,
    discovered: OnceCell<DefaultNetwork>,
}

impl Network {
    pub fn new(ec2: aws_sdk_ec2::Client, subnet_count: usize) -> Self {
        Self {
            ec2,
            subnet_count,
            discovered: OnceCell::new(),
        }
    }

    /// Default VPC and subnets; failures are attributed to `kind`, the
    /// resource whose creation needed them
    pub async fn default_network(&self, kind: ResourceKind) -> Result<&DefaultNetwork> {
        self.discovered.get_or_try_init(|| self.discover(kind)).await
    }

    async fn discover(&self, kind: ResourceKind) -> Result<DefaultNetwork> {
        debug!("Discovering default VPC");

        let vpcs = self
            .ec2
            .describe_vpcs()
            .filters(Filter::builder().name("is-default").values("true").build())
            .send()
            .await
            .or_fail(kind, "describe default VPC")?;

        let vpc_id = vpcs
            .vpcs()
            .first()
            .and_then(|v| v.vpc_id())
            .ok_or_else(|| CloudError::driver(kind, "No default VPC found in this region"))?
            .to_string();

        let subnets = self
            .ec2
            .describe_subnets()
            .filters(Filter::builder().name("vpc-id").values(&vpc_id).build())
            .send()
            .await
            .or_fail(kind, "describe default VPC subnets")?;

        let candidates = subnets
            .subnets()
            .iter()
            .filter_map(|s| {
                Some((
                    s.availability_zone()?.to_string(),
                    s.subnet_id()?.to_string(),
                ))
            })
            .collect();
        let subnet_ids = select_subnets(candidates, self.subnet_count)
            .map_err(|message| CloudError::driver(kind, message))?;

        info!(vpc_id = %vpc_id, subnets = ?subnet_ids, "Using default VPC");
        Ok(DefaultNetwork { vpc_id, subnet_ids })
    }
}

/// Pick `count` subnets in distinct availability zones, in zone order.
fn select_subnets(
    mut candidates: Vec<(String, String)>,
    count: usize,
) -> std::result::Result<Vec<String>, String> {
    candidates.sort();
    candidates.dedup_by(|a, b| a.0 == b.0);

    if candidates.len() < count {
        return Err(format!(
            "Default VPC has subnets in {} availability zone(s), {} required",
            candidates.len(),
            count
        ));
    }

    Ok(candidates
        .into_iter()
        .take(count)
        .map(|(_, subnet_id)| subnet_id)
        .collect())
}
