//! Orchestrator configuration
//!
//! Everything the service reads from its environment at startup: listen
//! address, job store selection, resource tagging and readiness-wait tuning.

use std::time::Duration;

use tokio::sync::Semaphore;

use crate::provider::WaitPolicy;
use crate::workflow::WorkflowConfig;

/// Upper bound for readiness timeouts and the poll interval
pub const MAX_READINESS_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP front end binds to
    pub bind_addr: String,

    /// Postgres URL for the job store; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// Table holding job records
    pub jobs_table: String,

    /// Value of the `Project` tag and prefix of every `Name` tag
    pub project_name: String,

    /// Maximum number of workflow runs executing at once
    pub max_parallel_jobs: usize,

    /// How long to wait for a new VPC to become available
    pub vpc_ready_timeout: Duration,

    /// How long to wait for the NAT gateway to become available
    pub nat_gateway_ready_timeout: Duration,

    /// Delay between readiness polls
    pub readiness_poll_interval: Duration,

    /// Zones reported by the simulated provider
    pub simulated_zones: Vec<String>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - VPCFORGE_BIND_ADDR (default: 0.0.0.0:8080)
    /// - DATABASE_URL (default: unset, in-memory store)
    /// - JOBS_TABLE (default: topology_jobs)
    /// - PROJECT_NAME (default: vpcforge)
    /// - MAX_PARALLEL_JOBS (default: 4)
    /// - VPC_READY_TIMEOUT (seconds, default: 600)
    /// - NAT_GATEWAY_READY_TIMEOUT (seconds, default: 600)
    /// - READINESS_POLL_INTERVAL (seconds, default: 15)
    /// - SIMULATED_ZONES (comma separated, default: us-east-1a,us-east-1b,us-east-1c)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let bind_addr = std::env::var("VPCFORGE_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jobs_table = std::env::var("JOBS_TABLE").unwrap_or(defaults.jobs_table);

        let project_name = std::env::var("PROJECT_NAME").unwrap_or(defaults.project_name);

        let max_parallel_jobs = parse_env("MAX_PARALLEL_JOBS")?.unwrap_or(defaults.max_parallel_jobs);

        let vpc_ready_timeout = parse_env("VPC_READY_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.vpc_ready_timeout);

        let nat_gateway_ready_timeout = parse_env("NAT_GATEWAY_READY_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.nat_gateway_ready_timeout);

        let readiness_poll_interval = parse_env("READINESS_POLL_INTERVAL")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.readiness_poll_interval);

        let simulated_zones = std::env::var("SIMULATED_ZONES")
            .map(|zones| {
                zones
                    .split(',')
                    .map(str::trim)
                    .filter(|z| !z.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.simulated_zones);

        Ok(Self {
            bind_addr,
            database_url,
            jobs_table,
            project_name,
            max_parallel_jobs,
            vpc_ready_timeout,
            nat_gateway_ready_timeout,
            readiness_poll_interval,
            simulated_zones,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.jobs_table.is_empty()
            || !self
                .jobs_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "jobs_table '{}' must be a non-empty identifier of letters, digits and underscores",
                self.jobs_table
            );
        }

        if self.project_name.trim().is_empty() {
            anyhow::bail!("project_name cannot be empty");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.max_parallel_jobs > Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "max_parallel_jobs must be at most {}",
                Semaphore::MAX_PERMITS
            );
        }

        if self.readiness_poll_interval.is_zero() {
            anyhow::bail!("readiness_poll_interval must be greater than 0");
        }

        if self.vpc_ready_timeout < self.readiness_poll_interval
            || self.nat_gateway_ready_timeout < self.readiness_poll_interval
        {
            anyhow::bail!("readiness timeouts must be at least one poll interval");
        }

        if self.vpc_ready_timeout > MAX_READINESS_WAIT
            || self.nat_gateway_ready_timeout > MAX_READINESS_WAIT
        {
            anyhow::bail!(
                "readiness timeouts must be at most {}s",
                MAX_READINESS_WAIT.as_secs()
            );
        }

        Ok(())
    }

    /// Workflow settings derived from this configuration
    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            project_name: self.project_name.clone(),
            vpc_wait: WaitPolicy {
                timeout: self.vpc_ready_timeout,
                poll_interval: self.readiness_poll_interval,
            },
            nat_gateway_wait: WaitPolicy {
                timeout: self.nat_gateway_ready_timeout,
                poll_interval: self.readiness_poll_interval,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            jobs_table: "topology_jobs".to_string(),
            project_name: "vpcforge".to_string(),
            max_parallel_jobs: 4,
            vpc_ready_timeout: Duration::from_secs(600),
            nat_gateway_ready_timeout: Duration::from_secs(600),
            readiness_poll_interval: Duration::from_secs(15),
            simulated_zones: vec![
                "us-east-1a".to_string(),
                "us-east-1b".to_string(),
                "us-east-1c".to_string(),
            ],
        }
    }
}

fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.jobs_table, "topology_jobs");
        assert_eq!(config.max_parallel_jobs, 4);
        assert_eq!(config.readiness_poll_interval, Duration::from_secs(15));
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.jobs_table = "jobs; DROP TABLE jobs".to_string();
        assert!(config.validate().is_err());
        config.jobs_table = "topology_jobs".to_string();

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());
        config.max_parallel_jobs = 1;

        config.nat_gateway_ready_timeout = Duration::from_secs(1);
        assert!(config.validate().is_err());
        config.nat_gateway_ready_timeout = Duration::from_secs(600);

        config.project_name = "  ".to_string();
        assert!(config.validate().is_err());
        config.project_name = "demo".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_parallel_jobs_is_bounded_by_semaphore_permits() {
        let mut config = Config::default();

        config.max_parallel_jobs = usize::MAX;
        assert!(config.validate().is_err());

        config.max_parallel_jobs = Semaphore::MAX_PERMITS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_readiness_waits_are_capped() {
        let mut config = Config::default();

        config.readiness_poll_interval = Duration::from_secs(u64::MAX);
        config.vpc_ready_timeout = Duration::from_secs(u64::MAX);
        config.nat_gateway_ready_timeout = Duration::from_secs(u64::MAX);
        assert!(config.validate().is_err());

        config.readiness_poll_interval = MAX_READINESS_WAIT;
        config.vpc_ready_timeout = MAX_READINESS_WAIT;
        config.nat_gateway_ready_timeout = MAX_READINESS_WAIT;
        assert!(config.validate().is_ok());

        config.nat_gateway_ready_timeout = MAX_READINESS_WAIT + Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workflow_config_carries_wait_policies() {
        let config = Config {
            vpc_ready_timeout: Duration::from_secs(120),
            readiness_poll_interval: Duration::from_secs(5),
            ..Config::default()
        };

        let workflow = config.workflow();
        assert_eq!(workflow.project_name, "vpcforge");
        assert_eq!(workflow.vpc_wait.timeout, Duration::from_secs(120));
        assert_eq!(workflow.vpc_wait.poll_interval, Duration::from_secs(5));
        assert_eq!(workflow.nat_gateway_wait.timeout, Duration::from_secs(600));
    }
}
