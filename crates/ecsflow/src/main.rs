mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use utils::OutputFormat;

#[derive(Parser)]
#[command(name = "ecsflow")]
#[command(
    about = "Provision and tear down an ECS service behind a load balancer, idempotently",
    long_about = None
)]
struct Cli {
    /// 設定ファイルのパス（省略時は自動検索）
    #[arg(short, long, global = true, env = "ECSFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// AWS region (overrides the config file)
    #[arg(short, long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every missing resource and reuse the rest
    Provision,
    /// Delete every resource that exists, in reverse dependency order
    Destroy {
        /// Confirm deletion (nothing is deleted without it)
        #[arg(short, long)]
        yes: bool,
    },
    /// Show what provision (or destroy) would do, without changing anything
    Plan {
        /// Plan a teardown instead of a provision
        #[arg(long)]
        destroy: bool,
    },
    /// バージョン情報を表示
    Version,
}

/// Exit code for configuration errors, matching clap's usage errors
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("ecsflow {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    // ログはstderrへ（stdoutはレポート用）
    utils::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if utils::is_configuration_error(&e) {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let (config, source) = ecsflow_config::load(cli.config.as_deref())?;
    let config = config.with_region(cli.region);
    config.validate()?;

    if cli.output == OutputFormat::Text {
        utils::print_config_source(source.as_deref(), &config);
    }

    match cli.command {
        Commands::Provision => commands::provision::handle(&config, cli.output).await,
        Commands::Destroy { yes } => commands::destroy::handle(&config, yes, cli.output).await,
        Commands::Plan { destroy } => commands::plan::handle(&config, destroy, cli.output).await,
        Commands::Version => unreachable!("Version is handled before config loading"),
    }
}
