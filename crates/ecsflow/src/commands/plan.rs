use crate::utils::{self, OutputFormat};
use anyhow::Context;
use ecsflow_cloud::Flow;
use ecsflow_config::DeploymentConfig;
use std::process::ExitCode;

pub async fn handle(
    config: &DeploymentConfig,
    destroy: bool,
    output: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let flow = if destroy {
        Flow::Destroy
    } else {
        Flow::Provision
    };

    let engine = super::connect(config).await?;
    let plan = engine
        .plan(flow)
        .await
        .with_context(|| format!("Failed to plan {flow}"))?;

    match output {
        OutputFormat::Text => utils::print_plan(&plan),
        OutputFormat::Json => utils::print_json(&plan)?,
    }

    Ok(ExitCode::SUCCESS)
}
