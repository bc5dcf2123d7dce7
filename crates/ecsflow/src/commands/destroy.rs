use crate::utils::{self, OutputFormat};
use colored::Colorize;
use ecsflow_config::DeploymentConfig;
use std::process::ExitCode;

pub async fn handle(
    config: &DeploymentConfig,
    yes: bool,
    output: OutputFormat,
) -> anyhow::Result<ExitCode> {
    // 確認（--yes なしでは何も削除しない）
    if !yes {
        println!(
            "{}",
            "⚠ destroy deletes the load balancer, service, cluster and every other resource"
                .red()
                .bold()
        );
        println!("  Run 'ecsflow plan --destroy' to preview, then re-run with --yes.");
        return Ok(ExitCode::SUCCESS);
    }

    if output == OutputFormat::Text {
        println!(
            "{}",
            format!("Tearing down service '{}'...", config.service_name)
                .yellow()
                .bold()
        );
        println!();
    }

    let engine = super::connect(config).await?;
    super::cancel_on_ctrl_c(&engine);

    let result = engine.destroy().await;

    match output {
        OutputFormat::Text => utils::print_destruction(&result),
        OutputFormat::Json => utils::print_json(&result)?,
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
