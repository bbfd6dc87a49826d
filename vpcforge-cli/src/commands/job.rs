//! Job command handlers
//!
//! Submitting provisioning jobs and displaying their records.

use anyhow::{Context, Result, bail};
use colored::*;
use uuid::Uuid;
use vpcforge_client::OrchestratorClient;
use vpcforge_core::domain::job::{Job, JobStatus};
use vpcforge_core::domain::topology::TopologyResult;

use crate::config::Config;

/// Submit a job, optionally waiting for it to finish
pub async fn create(config: &Config, cidr: &str, wait: bool) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    let accepted = client
        .create_job(cidr)
        .await
        .context("Failed to submit job")?;

    println!("{}", "✓ Job accepted".green().bold());
    println!("  ID:     {}", accepted.job_id.to_string().cyan());
    println!("  Status: {}", colorize_status(&accepted.status));

    if !wait {
        println!();
        println!(
            "Follow it with: {}",
            format!("vpcforge wait {}", accepted.job_id).dimmed()
        );
        return Ok(());
    }

    println!();
    wait_and_report(&client, config, accepted.job_id).await
}

/// Display the current record of a job
pub async fn status(config: &Config, id: &str) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);
    let job_id = parse_job_id(id)?;

    let job = client.get_job(job_id).await.context("Failed to fetch job")?;
    print_job_details(&job);

    Ok(())
}

/// Wait for a job to finish and display the outcome
pub async fn wait(config: &Config, id: &str) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);
    let job_id = parse_job_id(id)?;

    wait_and_report(&client, config, job_id).await
}

async fn wait_and_report(client: &OrchestratorClient, config: &Config, job_id: Uuid) -> Result<()> {
    println!("{}", format!("Waiting for job {}...", job_id).dimmed());

    let job = client
        .wait_for_job(job_id, config.poll_interval, config.wait_timeout)
        .await?;

    print_job_details(&job);

    if job.status == JobStatus::Failed {
        bail!("job {} failed", job_id);
    }
    Ok(())
}

fn parse_job_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("'{}' is not a job ID", id))
}

// =============================================================================
// Output Formatting
// =============================================================================

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:       {}", job.job_id.to_string().cyan());
    println!("  Status:   {}", colorize_status(&job.status));
    println!("  Created:  {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:  {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(cidr) = job.request_payload.get("cidr").and_then(|c| c.as_str()) {
        println!("  CIDR:     {}", cidr);
    }

    if let Some(results) = &job.results {
        print_topology(results);
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("  {}", error.red());
    }
}

fn print_topology(result: &TopologyResult) {
    let plan = &result.address_plan;

    println!("\n{}", "Topology:".bold());
    println!("  VPC:              {} ({})", result.vpc_id.cyan(), plan.vpc_block);
    println!("  Internet Gateway: {}", result.internet_gateway_id);
    println!(
        "  NAT Gateway:      {} (EIP {})",
        result.nat_gateway_id, result.elastic_ip_allocation_id
    );
    println!("  Public RT:        {}", result.public_route_table_id);
    println!("  Private RT:       {}", result.private_route_table_id);

    println!("\n{}", "Subnets:".bold());
    let subnets = result
        .public_subnet_ids
        .iter()
        .zip(&result.private_subnet_ids)
        .zip(&plan.zones);
    for ((public, private), zone) in subnets {
        println!("  {}", zone.zone.cyan());
        println!("    public  {} {}", public, zone.public.to_string().dimmed());
        println!("    private {} {}", private, zone.private.to_string().dimmed());
    }
}

fn colorize_status(status: &JobStatus) -> ColoredString {
    match status {
        JobStatus::Pending => status.as_str().yellow(),
        JobStatus::Running => status.as_str().blue(),
        JobStatus::Complete => status.as_str().green(),
        JobStatus::Failed => status.as_str().red(),
    }
}
