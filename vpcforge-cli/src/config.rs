//! Configuration module
//!
//! Settings shared by every command.

use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,

    /// Delay between status polls when waiting on a job
    pub poll_interval: Duration,

    /// Give up waiting on a job after this long
    pub wait_timeout: Duration,
}
