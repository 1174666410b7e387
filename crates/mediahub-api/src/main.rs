//! mediahub - kiosk launch orchestrator.
//!
//! The main entry point for the `mediahub` binary.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;

use mediahub_api::cli::{run_cec, CheckReport, Cli, Commands};
use mediahub_api::config::Config;
use mediahub_api::server::Server;
use mediahub_core::observability::{init_logging, LogFormat};
use mediahub_core::process::TokioProcessHost;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.apply(Config::from_env().context("read MEDIAHUB_* environment")?);

    init_logging(if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    });

    match cli.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let server = Server::from_config(config).context("initialize server")?;
            server.serve().await.context("serve")?;
        }
        Commands::Check => {
            let report = CheckReport::collect(&TokioProcessHost, &config);
            println!("{}", report.render(cli.format)?);
            if !report.is_usable() {
                anyhow::bail!("no browser candidate is installed");
            }
        }
        Commands::Cec { action } => {
            let output = run_cec(action, &config, cli.format).await?;
            println!("{output}");
        }
    }
    Ok(())
}
