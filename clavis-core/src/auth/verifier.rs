/// Registration and credential verification
///
/// The verifier is the only component that sees plaintext passwords. Its
/// contract on failure is deliberately flat: unknown email, missing
/// credential, and wrong password all come back as
/// [`AuthError::InvalidCredentials`], with the Argon2 cost paid on every
/// path. The lockout counter moves on every failed attempt against an
/// existing account; unknown emails never touch it, so an attacker cannot
/// lock anyone out by spraying an address that has no account.
///
/// Lockout status is revealed only after a correct password: a locked
/// account probed with a wrong password still answers `InvalidCredentials`.

use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::auth::password;
use crate::config::SecuritySettings;
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, User, UserStatus};
use crate::validate::{self, ValidationFailure};

/// Input for registering a new account
#[derive(Debug, Validate)]
pub struct RegisterInput {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Plaintext password; checked for strength before hashing
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Registration and login-time credential checks
#[derive(Clone)]
pub struct CredentialVerifier {
    pool: PgPool,
    settings: SecuritySettings,
}

impl CredentialVerifier {
    /// Creates a verifier over the given pool and lockout policy
    pub fn new(pool: PgPool, settings: SecuritySettings) -> Self {
        Self { pool, settings }
    }

    /// Registers a new account
    ///
    /// Creates the user and their first password credential atomically. The
    /// account starts in `pending` status and cannot log in until activated.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Validation`] when the email or password fails the
    ///   declarative rules or the strength check
    /// - [`AuthError::Conflict`] when the email is already registered
    pub async fn register(&self, input: RegisterInput) -> AuthResult<User> {
        validate::check(&input)?;

        password::validate_password_strength(&input.password)
            .map_err(|msg| ValidationFailure::single("password", msg))?;

        let hash = password::hash_password(&input.password)?;
        let user = User::create_with_password(&self.pool, &input.email, &hash).await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(user)
    }

    /// Verifies an email/password pair
    ///
    /// # Returns
    ///
    /// The user and the credential that matched, for the caller to bind a
    /// session to
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for unknown email, missing
    ///   credential, wrong password, or a non-active account
    /// - [`AuthError::AccountLocked`] when the password was correct but the
    ///   lockout window is still open
    pub async fn verify(&self, email: &str, supplied_password: &str) -> AuthResult<(User, Credential)> {
        let user = User::find_by_email(&self.pool, email).await?;

        let credential = match &user {
            Some(user) => Credential::find_active_password(&self.pool, user.id).await?,
            None => None,
        };

        // Argon2 runs against the stored hash or the dummy; the absent-account
        // path costs the same as the present one.
        let matched = password::verify_or_dummy(
            supplied_password,
            credential.as_ref().map(|c| c.secret_hash.as_str()),
        )?;

        if !matched {
            // Any failed attempt against an existing account moves the
            // counter, including the credential-less case; only unknown
            // emails leave it untouched.
            if let Some(user) = &user {
                let updated = User::record_failed_attempt(
                    &self.pool,
                    user.id,
                    self.settings.max_failed_attempts,
                    self.settings.lock_window_minutes,
                )
                .await?;

                if updated.is_locked(Utc::now()) {
                    tracing::warn!(user_id = %user.id, "Account locked after repeated failures");
                }
            }

            return Err(AuthError::InvalidCredentials);
        }

        let (user, credential) = match (user, credential) {
            (Some(user), Some(credential)) => (user, credential),
            _ => return Err(AuthError::InvalidCredentials),
        };

        if user.is_locked(Utc::now()) {
            return Err(AuthError::AccountLocked);
        }

        if user.status != UserStatus::Active {
            tracing::info!(user_id = %user.id, status = user.status.as_str(), "Login rejected: account not active");
            return Err(AuthError::InvalidCredentials);
        }

        if user.failed_attempts > 0 || user.lock_until.is_some() {
            User::clear_lockout(&self.pool, user.id).await?;
        }

        Ok((user, credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        // Never actually connects; tests below must fail before any query.
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/clavis_unreachable")
            .expect("lazy pool")
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input_without_store_access() {
        let verifier = CredentialVerifier::new(lazy_pool(), SecuritySettings::default());

        let result = verifier
            .register(RegisterInput {
                email: "not-an-email".to_string(),
                password: "short".to_string(),
            })
            .await;

        match result {
            Err(AuthError::Validation(failure)) => {
                assert_eq!(failure.errors.len(), 2);
            }
            other => panic!("expected validation failure, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_without_store_access() {
        let verifier = CredentialVerifier::new(lazy_pool(), SecuritySettings::default());

        // Long enough for the declarative rule, but no uppercase/digit/special
        let result = verifier
            .register(RegisterInput {
                email: "user@example.com".to_string(),
                password: "alllowercase".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    // Lockout state machine and timing behavior are covered by
    // tests/auth_flow_tests.rs against a real database.
}
