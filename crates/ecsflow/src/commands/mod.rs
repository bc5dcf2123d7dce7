pub mod destroy;
pub mod plan;
pub mod provision;

use anyhow::Context;
use colored::Colorize;
use ecsflow_cloud::ConvergenceEngine;
use ecsflow_cloud_aws::AwsContext;
use ecsflow_config::DeploymentConfig;

/// AWSに接続し、標準スタックのエンジンを組み立てる
pub async fn connect(config: &DeploymentConfig) -> anyhow::Result<ConvergenceEngine> {
    let ctx = AwsContext::new(&config.region).await;
    tracing::debug!(region = ctx.region(), "AWS configuration loaded");
    let engine = ecsflow_cloud_aws::build_engine(&ctx, config)
        .context("Failed to declare the deployment's resources")?;
    Ok(engine)
}

/// Ctrl-C stops the run before the next resource
pub fn cancel_on_ctrl_c(engine: &ConvergenceEngine) {
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "⚠ Interrupted: finishing the current resource, then stopping".yellow()
            );
            token.cancel();
        }
    });
}
