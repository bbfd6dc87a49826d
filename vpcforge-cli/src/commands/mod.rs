//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a CIDR block for provisioning
    Create {
        /// IPv4 block for the new VPC, e.g. 10.0.0.0/16
        cidr: String,

        /// Wait for the job to finish
        #[arg(short, long)]
        wait: bool,
    },
    /// Show the current state of a job
    Status {
        /// Job ID
        id: String,
    },
    /// Wait for a job to finish and show the outcome
    Wait {
        /// Job ID
        id: String,
    },
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Create { cidr, wait } => job::create(config, &cidr, wait).await,
        Commands::Status { id } => job::status(config, &id).await,
        Commands::Wait { id } => job::wait(config, &id).await,
    }
}
