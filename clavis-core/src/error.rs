/// Common error taxonomy for the Clavis core
///
/// Every authentication/authorization operation returns `Result<T, AuthError>`.
/// Callers branch on the variant, never on message content. Variants that
/// surface to end users carry no internal detail (hashes, SQL, stack traces);
/// infrastructure failures wrap their source so operators can see it in logs.
///
/// # Example
///
/// ```
/// use clavis_core::error::AuthError;
///
/// fn describe(err: &AuthError) -> &'static str {
///     match err {
///         AuthError::InvalidCredentials => "generic login failure",
///         AuthError::AccountLocked => "lockout window active",
///         _ => "something else",
///     }
/// }
/// ```
use uuid::Uuid;

use crate::auth::password::PasswordError;
use crate::auth::token::TokenError;
use crate::cache::CacheError;
use crate::validate::ValidationFailure;

/// Result alias used throughout the core
pub type AuthResult<T> = Result<T, AuthError>;

/// Unified error type for credential, session, and authorization operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Wrong email/password pair, unknown user, or missing active credential.
    ///
    /// Deliberately indistinguishable across those causes.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Account is inside its lockout window.
    ///
    /// Only returned after the supplied password actually matched; probing a
    /// locked account with a wrong password still yields `InvalidCredentials`.
    #[error("Account locked")]
    AccountLocked,

    /// Refresh payload is malformed, unknown, revoked, or already rotated
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Session's refresh window has passed
    #[error("Refresh token expired")]
    RefreshExpired,

    /// Access token failed signature, expiry, or revocation checks
    #[error("Unauthorized")]
    Unauthorized,

    /// User is not a member of the organization
    #[error("Not a member of organization {0}")]
    NotMember(Uuid),

    /// Unknown session, user, or organization
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation: duplicate email, slug, or bootstrap role
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Aggregated input validation failure
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Underlying store error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Cache layer error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Password hashing/verification error
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    /// Access token encode/decode error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AuthError::NotFound("resource"),
            sqlx::Error::Database(ref db_err) => {
                // Unique constraint violations surface as conflicts so callers
                // can treat duplicate emails/slugs/bootstrap roles uniformly.
                if let Some(constraint) = db_err.constraint() {
                    return AuthError::Conflict(format!("constraint violation: {}", constraint));
                }
                AuthError::Database(err)
            }
            _ => AuthError::Database(err),
        }
    }
}

impl AuthError {
    /// True for failures caused by the caller's input or state, which map to
    /// 4xx responses at an HTTP boundary. Infrastructure failures return false.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::AccountLocked
                | AuthError::InvalidRefreshToken
                | AuthError::RefreshExpired
                | AuthError::Unauthorized
                | AuthError::NotMember(_)
                | AuthError::NotFound(_)
                | AuthError::Conflict(_)
                | AuthError::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AuthError::AccountLocked.to_string(), "Account locked");
        assert_eq!(AuthError::NotFound("session").to_string(), "session not found");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = AuthError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AuthError::InvalidCredentials.is_client_error());
        assert!(AuthError::Conflict("dup".into()).is_client_error());
        assert!(!AuthError::Database(sqlx::Error::PoolClosed).is_client_error());
    }
}
