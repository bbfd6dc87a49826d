//! Job-related API endpoints

use std::time::Duration;

use uuid::Uuid;
use vpcforge_core::domain::job::Job;
use vpcforge_core::dto::job::{CreateJob, JobAccepted};

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};

impl OrchestratorClient {
    /// Submit a CIDR block for provisioning
    ///
    /// Returns as soon as the orchestrator has accepted the job; the VPC is
    /// built in the background.
    ///
    /// # Example
    /// ```no_run
    /// # use vpcforge_client::OrchestratorClient;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// let accepted = client.create_job("10.0.0.0/16").await?;
    /// println!("job {} is {}", accepted.job_id, accepted.status);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_job(&self, cidr: &str) -> Result<JobAccepted> {
        let url = format!("{}/vpc", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateJob {
                cidr: cidr.to_string(),
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job> {
        let url = format!("{}/vpc/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it is `COMPLETE` or `FAILED`
    ///
    /// A `FAILED` job is returned as `Ok`; inspect its status and
    /// `error_message`.
    pub async fn wait_for_job(
        &self,
        job_id: Uuid,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Job> {
        let started = tokio::time::Instant::now();

        loop {
            let job = self.get_job(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }

            let waited = started.elapsed();
            if !next_poll_fits(waited, poll_interval, timeout) {
                return Err(ClientError::WaitTimedOut {
                    job_id,
                    status: job.status,
                    waited,
                });
            }

            tracing::debug!("Job {} is {}, polling again in {:?}", job_id, job.status, poll_interval);
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Whether another poll after `waited` still ends within `timeout`
fn next_poll_fits(waited: Duration, poll_interval: Duration, timeout: Duration) -> bool {
    waited
        .checked_add(poll_interval)
        .is_some_and(|next| next <= timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_poll_fits_within_timeout() {
        let poll = Duration::from_secs(5);
        let timeout = Duration::from_secs(30);

        assert!(next_poll_fits(Duration::ZERO, poll, timeout));
        assert!(next_poll_fits(Duration::from_secs(25), poll, timeout));
        assert!(!next_poll_fits(Duration::from_secs(26), poll, timeout));
    }

    #[test]
    fn test_huge_poll_interval_does_not_fit() {
        let huge = Duration::from_secs(u64::MAX);
        assert!(!next_poll_fits(Duration::from_secs(1), huge, huge));
        assert!(!next_poll_fits(Duration::from_secs(1), huge, Duration::from_secs(1800)));
    }
}
