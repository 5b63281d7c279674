/// User model and database operations
///
/// Users carry their own lockout state: a failed-attempt counter and an
/// optional `lock_until` timestamp. The counter only moves on genuinely wrong
/// passwords; lookups of unknown emails never touch it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     status user_status NOT NULL DEFAULT 'pending',
///     failed_attempts INTEGER NOT NULL DEFAULT 0,
///     lock_until TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use clavis_core::models::user::User;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// if let Some(user) = User::find_by_email(&pool, "user@example.com").await? {
///     println!("Found user: {}", user.id);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Lifecycle status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Registered but not yet activated
    Pending,

    /// Allowed to authenticate
    Active,

    /// Administratively disabled
    Suspended,
}

impl UserStatus {
    /// Gets status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address (case-insensitive via CITEXT)
    pub email: String,

    /// Account lifecycle status
    pub status: UserStatus,

    /// Consecutive failed login attempts since the last success
    pub failed_attempts: i32,

    /// End of the active lockout window, if any
    pub lock_until: Option<DateTime<Utc>>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, email, status, failed_attempts, lock_until, created_at, updated_at";

impl User {
    /// Creates a user together with their first password credential
    ///
    /// Runs in a single transaction so a user row never exists without a
    /// credential. The account starts in `pending` status.
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `email` - Email address (stored case-insensitively)
    /// * `password_hash` - Argon2id PHC string, never plaintext
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists or the database fails.
    pub async fn create_with_password(
        pool: &PgPool,
        email: &str,
        password_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email) VALUES ($1) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, secret_hash, kind, version)
            VALUES ($1, $2, 'password', 1)
            "#,
        )
        .bind(user.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address
    ///
    /// Lookup is case-insensitive via the CITEXT column type.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// True while the account is inside its lockout window
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lock_until, Some(until) if until > now)
    }

    /// Records a failed login attempt
    ///
    /// Increments the counter and, once it reaches `max_attempts`, opens a
    /// lockout window of `lock_window_minutes`. Both happen in one statement
    /// so concurrent failures cannot lose increments.
    ///
    /// # Returns
    ///
    /// The updated user row, so callers can see whether the lockout tripped
    pub async fn record_failed_attempt(
        pool: &PgPool,
        id: Uuid,
        max_attempts: i32,
        lock_window_minutes: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                failed_attempts = failed_attempts + 1,
                lock_until = CASE
                    WHEN failed_attempts + 1 >= $2
                    THEN NOW() + ($3 * INTERVAL '1 minute')
                    ELSE lock_until
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(max_attempts)
        .bind(lock_window_minutes)
        .fetch_one(pool)
        .await
    }

    /// Resets the failed-attempt counter and clears any lockout
    ///
    /// Called after a successful login.
    pub async fn clear_lockout(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_attempts = 0, lock_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Transitions a pending account to active
    ///
    /// # Returns
    ///
    /// True if the user existed and was pending, false otherwise
    pub async fn activate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = 'active', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_as_str() {
        assert_eq!(UserStatus::Pending.as_str(), "pending");
        assert_eq!(UserStatus::Active.as_str(), "active");
        assert_eq!(UserStatus::Suspended.as_str(), "suspended");
    }

    fn user_with_lock(lock_until: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            status: UserStatus::Active,
            failed_attempts: 0,
            lock_until,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_locked_inside_window() {
        let user = user_with_lock(Some(Utc::now() + Duration::minutes(5)));
        assert!(user.is_locked(Utc::now()));
    }

    #[test]
    fn test_is_locked_after_window_expires() {
        let user = user_with_lock(Some(Utc::now() - Duration::minutes(5)));
        assert!(!user.is_locked(Utc::now()));
    }

    #[test]
    fn test_is_locked_without_lock() {
        let user = user_with_lock(None);
        assert!(!user.is_locked(Utc::now()));
    }

    // Integration tests for database operations are in tests/model_tests.rs
}
