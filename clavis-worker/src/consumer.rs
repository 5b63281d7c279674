/// Job consumer loop
///
/// Polls the durable queue, claims a batch, and dispatches each job by its
/// typed payload. Dispatch is an exhaustive match over [`JobPayload`];
/// adding a job kind without handling it here is a compile error, not a
/// silently dropped string.
///
/// Failures below the retry ceiling return the job to pending for another
/// claim; at the ceiling the job stays failed with its last error recorded.
///
/// # Example
///
/// ```no_run
/// use clavis_worker::consumer::JobConsumer;
/// use tokio_util::sync::CancellationToken;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let consumer = JobConsumer::new(pool);
/// let shutdown = CancellationToken::new();
/// consumer.run(shutdown).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use clavis_core::models::{Job, JobPayload};

use crate::bootstrap;

/// Default poll interval between empty claims
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default maximum jobs claimed per poll
const DEFAULT_BATCH_SIZE: i64 = 10;

/// Default claim ceiling before a job stays failed
const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Durable queue consumer
pub struct JobConsumer {
    pool: PgPool,
    poll_interval: Duration,
    batch_size: i64,
    max_attempts: i32,
}

impl JobConsumer {
    /// Creates a consumer with default polling policy
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the per-poll batch size
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Overrides the retry ceiling
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Runs the consumer until the token is cancelled
    ///
    /// Jobs already claimed when shutdown arrives finish before the loop
    /// exits; only new claims stop.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Job consumer started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Job consumer shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// Claims one batch and processes it to completion
    pub async fn poll_once(&self) -> anyhow::Result<()> {
        let jobs = Job::claim(&self.pool, self.batch_size).await?;

        for job in jobs {
            self.process(job).await;
        }

        Ok(())
    }

    async fn process(&self, job: Job) {
        let job_id = job.id;
        let payload = job.payload.0.clone();

        tracing::info!(job_id = %job_id, attempt = job.attempts, "Processing job");

        let result = match payload {
            JobPayload::InitializeOrg { org_id, created_by } => {
                bootstrap::initialize_org(&self.pool, org_id, created_by)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = Job::mark_succeeded(&self.pool, job_id).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark job succeeded");
                }
            }
            Err(error) => {
                tracing::error!(job_id = %job_id, error = %error, "Job failed");

                if let Err(e) = Job::mark_failed(&self.pool, job_id, &error).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark job failed");
                    return;
                }

                if job.attempts < self.max_attempts {
                    match Job::retry(&self.pool, job_id).await {
                        Ok(true) => {
                            tracing::info!(job_id = %job_id, attempt = job.attempts, "Job returned to queue")
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to requeue job")
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_builder_overrides() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/clavis_unreachable")
            .expect("lazy pool");

        let consumer = JobConsumer::new(pool)
            .with_poll_interval(Duration::from_millis(100))
            .with_batch_size(5)
            .with_max_attempts(1);

        assert_eq!(consumer.poll_interval, Duration::from_millis(100));
        assert_eq!(consumer.batch_size, 5);
        assert_eq!(consumer.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/clavis_unreachable")
            .expect("lazy pool");

        let consumer = JobConsumer::new(pool).with_poll_interval(Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // An already-cancelled token must return before the first poll.
        consumer.run(shutdown).await.unwrap();
    }

    // Claim/dispatch/retry behavior is covered by tests/consumer_tests.rs
    // against a real database.
}
