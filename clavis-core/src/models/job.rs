/// Durable job queue model
///
/// Background work is queued as rows in the `jobs` table with a typed JSONB
/// payload. Workers claim batches with `FOR UPDATE SKIP LOCKED`, so multiple
/// workers never double-claim a job, and a crashed worker's uncommitted claim
/// simply unlocks.
///
/// Enqueueing takes a connection, letting producers enqueue inside the same
/// transaction that creates the triggering row. Either both commit or
/// neither does; there is no window where an org exists without its
/// bootstrap job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Typed job payload
///
/// Serialized as internally tagged JSON, e.g.
/// `{"type": "initialize_org", "org_id": "...", "created_by": "..."}`.
/// Adding a job kind means adding a variant; dispatch is an exhaustive
/// match, not string comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// Bootstrap a newly created organization's role graph
    InitializeOrg {
        /// Organization to bootstrap
        org_id: Uuid,

        /// Creator, who receives the Owner role
        created_by: Uuid,
    },
}

/// Execution state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be claimed
    Pending,

    /// Claimed by a worker
    Running,

    /// Completed successfully
    Succeeded,

    /// Failed; `last_error` holds the reason
    Failed,
}

impl JobState {
    /// Gets state as string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

/// A queued job
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    /// Unique job ID
    pub id: Uuid,

    /// Typed payload
    pub payload: Json<JobPayload>,

    /// Current state as stored; see [`JobState`]
    pub state: String,

    /// Number of times a worker has claimed this job
    pub attempts: i32,

    /// Error message from the most recent failure
    pub last_error: Option<String>,

    /// When the job was enqueued
    pub created_at: DateTime<Utc>,

    /// When a worker first claimed the job
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,

    /// Last state change
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str =
    "id, payload, state, attempts, last_error, created_at, started_at, ended_at, updated_at";

impl Job {
    /// Enqueues a job
    ///
    /// Takes a connection so producers can enqueue inside their own
    /// transaction.
    pub async fn enqueue(conn: &mut PgConnection, payload: &JobPayload) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Job>(&format!(
            "INSERT INTO jobs (payload) VALUES ($1) RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(Json(payload))
        .fetch_one(conn)
        .await
    }

    /// Claims pending jobs for execution
    ///
    /// Atomically transitions up to `limit` jobs from pending to running,
    /// oldest first, and increments their attempt counters. `SKIP LOCKED`
    /// keeps concurrent workers from blocking on or double-claiming rows.
    pub async fn claim(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            WITH pending_jobs AS (
                SELECT id
                FROM jobs
                WHERE state = $1
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                state = $3,
                attempts = jobs.attempts + 1,
                started_at = COALESCE(jobs.started_at, NOW()),
                updated_at = NOW()
            FROM pending_jobs
            WHERE jobs.id = pending_jobs.id
            RETURNING {}
            "#,
            columns_qualified()
        ))
        .bind(JobState::Pending.as_str())
        .bind(limit)
        .bind(JobState::Running.as_str())
        .fetch_all(pool)
        .await?;

        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "Claimed jobs");
        }

        Ok(jobs)
    }

    /// Marks a running job as succeeded
    pub async fn mark_succeeded(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, ended_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND state = $3
            "#,
        )
        .bind(id)
        .bind(JobState::Succeeded.as_str())
        .bind(JobState::Running.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Marks a running job as failed with an error message
    pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = $3, last_error = $2, ended_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND state = $4
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(JobState::Failed.as_str())
        .bind(JobState::Running.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Returns a failed job to the pending state for another attempt
    pub async fn retry(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = $2, ended_at = NULL, updated_at = NOW()
            WHERE id = $1 AND state = $3
            "#,
        )
        .bind(id)
        .bind(JobState::Pending.as_str())
        .bind(JobState::Failed.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts jobs currently pending
    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE state = $1")
            .bind(JobState::Pending.as_str())
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

fn columns_qualified() -> String {
    JOB_COLUMNS
        .split(", ")
        .map(|c| format!("jobs.{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tagged_serialization() {
        let payload = JobPayload::InitializeOrg {
            org_id: Uuid::nil(),
            created_by: Uuid::nil(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "initialize_org");
        assert_eq!(json["org_id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = JobPayload::InitializeOrg {
            org_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        let parsed: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_unknown_payload_type_rejected() {
        let result: Result<JobPayload, _> =
            serde_json::from_str(r#"{"type": "launch_missiles"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(JobState::Pending.as_str(), "pending");
        assert_eq!(JobState::Running.as_str(), "running");
        assert_eq!(JobState::Succeeded.as_str(), "succeeded");
        assert_eq!(JobState::Failed.as_str(), "failed");
    }

    #[test]
    fn test_qualified_columns() {
        let qualified = columns_qualified();
        assert!(qualified.starts_with("jobs.id"));
        assert!(qualified.contains("jobs.payload"));
    }

    // Integration tests for queue behavior are in tests/model_tests.rs
}
