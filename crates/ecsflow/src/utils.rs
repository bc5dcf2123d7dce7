use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use ecsflow_cloud::{
    CloudError, DestructionResult, Outcome, Plan, ProvisioningResult, ResourceReport,
};
use ecsflow_config::{ConfigError, DeploymentConfig};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

const CRATES: [&str; 4] = ["ecsflow", "ecsflow_cloud", "ecsflow_cloud_aws", "ecsflow_config"];

fn directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// stderrにログを出力する。RUST_LOG > --verbose > info の順で決定
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(directives("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Whether the run failed before any provider call could be made
pub fn is_configuration_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<ConfigError>().is_some()
        || error
            .downcast_ref::<CloudError>()
            .is_some_and(CloudError::is_configuration)
}

/// 読み込んだ設定ファイル情報を表示
pub fn print_config_source(path: Option<&Path>, config: &DeploymentConfig) {
    match path {
        Some(path) => println!("📄 Config: {}", path.display().to_string().cyan()),
        None => println!("📄 Config: {}", "built-in defaults".dimmed()),
    }
    println!("🌐 Region: {}", config.region.cyan());
    println!();
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn outcome_label(outcome: &Outcome) -> ColoredString {
    match outcome {
        Outcome::Created => "created".green(),
        Outcome::Reused => "reused".cyan(),
        Outcome::Deleted => "deleted".red(),
        Outcome::AlreadyAbsent => "already absent".dimmed(),
        Outcome::Failed(_) => "FAILED".red().bold(),
        Outcome::NotAttempted => "not attempted".yellow(),
    }
}

fn print_resource(report: &ResourceReport) {
    print!(
        "  {:<16} {:<24} {}",
        report.kind.to_string().bold(),
        report.identity,
        outcome_label(&report.outcome)
    );
    if let Some(handle) = &report.handle {
        if handle.id != report.identity {
            print!("  {}", handle.id.dimmed());
        }
    }
    println!();
    if let Outcome::Failed(cause) = &report.outcome {
        println!("      {}", cause.red());
    }
}

pub fn print_provisioning(result: &ProvisioningResult) {
    println!("{}", "Resources:".bold());
    for report in &result.resources {
        print_resource(report);
    }
    println!();

    if result.cancelled {
        println!("{}", "⚠ Provisioning cancelled".yellow().bold());
    } else if let Some(kind) = result.failed {
        println!(
            "{}",
            format!("✗ Provisioning stopped at {}", kind).red().bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "✓ Provisioning complete ({} created, {} reused, {:.1}s)",
                result.created(),
                result.reused(),
                result.duration_ms as f64 / 1000.0
            )
            .green()
            .bold()
        );
    }

    if let Some(endpoint) = &result.endpoint {
        println!("  Endpoint:        {}", format!("http://{endpoint}").cyan());
    }
    if let Some(arn) = result.execution_role_arn() {
        println!("  Execution role:  {}", arn);
    }
    if let Some(arn) = result.target_group_arn() {
        println!("  Target group:    {}", arn);
    }
}

pub fn print_destruction(result: &DestructionResult) {
    println!("{}", "Resources:".bold());
    for report in &result.resources {
        print_resource(report);
    }
    println!();

    let failures = result.failures();
    if result.cancelled {
        println!("{}", "⚠ Teardown cancelled".yellow().bold());
    } else if !failures.is_empty() {
        println!(
            "{}",
            format!("✗ Teardown finished with {} failure(s):", failures.len())
                .red()
                .bold()
        );
        for report in failures {
            println!("  • {} '{}'", report.kind, report.identity);
        }
    } else {
        println!(
            "{}",
            format!(
                "✓ Teardown complete ({} deleted, {} already absent, {:.1}s)",
                result.deleted(),
                result.already_absent(),
                result.duration_ms as f64 / 1000.0
            )
            .green()
            .bold()
        );
    }
}

pub fn print_plan(plan: &Plan) {
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ecsflow_cloud::ActionType::Create => "+".green(),
            ecsflow_cloud::ActionType::Delete => "-".red(),
            ecsflow_cloud::ActionType::NoOp => "=".dimmed(),
        };
        println!("  {} {}", marker, action.description);
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}
