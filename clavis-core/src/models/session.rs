/// Session model and database operations
///
/// A session is the server-side anchor for one refresh token lineage. Only
/// the SHA-256 digest of the current refresh secret is stored; rotation is a
/// conditional update that both rotates the digest and detects replay of a
/// superseded secret in a single statement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A refresh session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    /// Unique session ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// SHA-256 digest (hex) of the current refresh secret
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,

    /// End of the refresh window; the session is unusable afterwards
    pub expires_at: DateTime<Utc>,

    /// Active organization context, if the user has switched into one
    pub org_id: Option<Uuid>,

    /// Credential version this session was minted under
    pub credential_version: i32,

    /// Whether the session has been explicitly revoked
    pub is_revoked: bool,

    /// Client IP recorded at login, if known
    pub ip_address: Option<String>,

    /// Client user agent recorded at login, if known
    pub user_agent: Option<String>,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Owning user
    pub user_id: Uuid,

    /// SHA-256 digest (hex) of the initial refresh secret
    pub refresh_token_hash: String,

    /// End of the refresh window
    pub expires_at: DateTime<Utc>,

    /// Active organization context, if any
    pub org_id: Option<Uuid>,

    /// Credential version at login time
    pub credential_version: i32,

    /// Client IP, if known
    pub ip_address: Option<String>,

    /// Client user agent, if known
    pub user_agent: Option<String>,
}

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, expires_at, org_id, \
     credential_version, is_revoked, ip_address, user_agent, created_at";

impl Session {
    /// Creates a new session
    pub async fn create(pool: &PgPool, data: NewSession) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Session>(&format!(
            r#"
            INSERT INTO sessions
                (user_id, refresh_token_hash, expires_at, org_id, credential_version,
                 ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(data.user_id)
        .bind(data.refresh_token_hash)
        .bind(data.expires_at)
        .bind(data.org_id)
        .bind(data.credential_version)
        .bind(data.ip_address)
        .bind(data.user_agent)
        .fetch_one(pool)
        .await
    }

    /// Finds a session by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// True while the session is neither revoked nor past its refresh window
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }

    /// Rotates the refresh digest if and only if the presented one is current
    ///
    /// The update matches on the old digest, so a replayed secret (already
    /// rotated away) matches zero rows. On replay the session is revoked
    /// outright, since someone other than the latest holder has the lineage.
    /// A supplied `org_id` re-scopes the session in the same statement;
    /// `None` keeps the existing scope.
    ///
    /// # Returns
    ///
    /// The updated session when rotation succeeded, `None` when the digest
    /// was stale, the session revoked, or the window already closed.
    pub async fn rotate_refresh_hash(
        pool: &PgPool,
        id: Uuid,
        presented_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        org_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Session>(&format!(
            r#"
            UPDATE sessions
            SET refresh_token_hash = $3, expires_at = $4, org_id = COALESCE($5, org_id)
            WHERE id = $1
              AND refresh_token_hash = $2
              AND NOT is_revoked
              AND expires_at > NOW()
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(presented_hash)
        .bind(new_hash)
        .bind(new_expires_at)
        .bind(org_id)
        .fetch_optional(pool)
        .await
    }

    /// Revokes a session
    ///
    /// Idempotent; revoking an already-revoked session is not an error.
    ///
    /// # Returns
    ///
    /// True if the session existed and was not yet revoked
    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_revoked = TRUE
            WHERE id = $1 AND NOT is_revoked
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every live session belonging to a user
    ///
    /// Used on password rotation and administrative suspension.
    ///
    /// # Returns
    ///
    /// Number of sessions revoked
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_revoked = TRUE
            WHERE user_id = $1 AND NOT is_revoked
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
