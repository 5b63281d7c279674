/// Credential model and database operations
///
/// Credentials are versioned. Every session records the version it was
/// minted under; rotating a password deactivates the old credential and
/// inserts a new one with a bumped version, which strands access tokens and
/// sessions bound to the old version without touching them individually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A stored credential for a user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    /// Unique credential ID
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub secret_hash: String,

    /// Credential kind; only `password` today
    pub kind: String,

    /// Monotonic version, bumped on every rotation
    pub version: i32,

    /// Whether this credential is currently usable
    pub is_active: bool,

    /// When the credential was created
    pub created_at: DateTime<Utc>,
}

const CREDENTIAL_COLUMNS: &str = "id, user_id, secret_hash, kind, version, is_active, created_at";

impl Credential {
    /// Finds the active password credential for a user
    ///
    /// A partial unique index guarantees at most one such row exists.
    pub async fn find_active_password(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Credential>(&format!(
            r#"
            SELECT {}
            FROM credentials
            WHERE user_id = $1 AND kind = 'password' AND is_active
            "#,
            CREDENTIAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Rotates a user's password credential
    ///
    /// Deactivates the current password credential and inserts the new hash
    /// with the next version, in one transaction.
    ///
    /// # Returns
    ///
    /// The new active credential
    pub async fn rotate_password(
        pool: &PgPool,
        user_id: Uuid,
        new_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let previous_version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE credentials
            SET is_active = FALSE
            WHERE user_id = $1 AND kind = 'password' AND is_active
            RETURNING version
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let credential = sqlx::query_as::<_, Credential>(&format!(
            r#"
            INSERT INTO credentials (user_id, secret_hash, kind, version)
            VALUES ($1, $2, 'password', $3)
            RETURNING {}
            "#,
            CREDENTIAL_COLUMNS
        ))
        .bind(user_id)
        .bind(new_hash)
        .bind(previous_version.unwrap_or(0) + 1)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_not_serialized() {
        let credential = Credential {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            secret_hash: "$argon2id$secret".to_string(),
            kind: "password".to_string(),
            version: 1,
            is_active: true,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&credential).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("secret_hash"));
    }

    // Integration tests for database operations are in tests/model_tests.rs
}
