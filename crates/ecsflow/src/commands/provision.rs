use crate::utils::{self, OutputFormat};
use colored::Colorize;
use ecsflow_config::DeploymentConfig;
use std::process::ExitCode;

pub async fn handle(config: &DeploymentConfig, output: OutputFormat) -> anyhow::Result<ExitCode> {
    if output == OutputFormat::Text {
        println!(
            "{}",
            format!("Provisioning service '{}'...", config.service_name)
                .blue()
                .bold()
        );
        println!();
    }

    let engine = super::connect(config).await?;
    super::cancel_on_ctrl_c(&engine);

    let result = engine.provision().await;

    match output {
        OutputFormat::Text => utils::print_provisioning(&result),
        OutputFormat::Json => utils::print_json(&result)?,
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
