//! VPCForge CLI
//!
//! Command-line interface for submitting VPC provisioning jobs to the
//! orchestrator and following their progress.

mod commands;
mod config;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "vpcforge")]
#[command(about = "Multi-AZ VPC provisioning CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "VPCFORGE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Seconds between status polls when waiting on a job
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Seconds to wait for a job to finish before giving up
    #[arg(long, default_value_t = 1800)]
    wait_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        poll_interval: Duration::from_secs(cli.poll_interval.max(1)),
        wait_timeout: Duration::from_secs(cli.wait_timeout),
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_with_wait() {
        let cli = Cli::try_parse_from(["vpcforge", "create", "10.0.0.0/16", "--wait"]).unwrap();
        match cli.command {
            Commands::Create { cidr, wait } => {
                assert_eq!(cidr, "10.0.0.0/16");
                assert!(wait);
            }
            _ => panic!("expected create"),
        }
        assert_eq!(cli.poll_interval, 5);
    }

    #[test]
    fn test_parse_status_requires_id() {
        assert!(Cli::try_parse_from(["vpcforge", "status"]).is_err());
        assert!(Cli::try_parse_from(["vpcforge", "status", "not-checked-here"]).is_ok());
    }

    #[test]
    fn test_orchestrator_url_flag() {
        let cli = Cli::try_parse_from([
            "vpcforge",
            "--orchestrator-url",
            "http://orchestrator:9000",
            "wait",
            "00000000-0000-0000-0000-000000000000",
        ])
        .unwrap();
        assert_eq!(cli.orchestrator_url, "http://orchestrator:9000");
    }
}
