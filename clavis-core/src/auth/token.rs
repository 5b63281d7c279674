/// Access token and refresh token primitives
///
/// Access tokens are stateless HS256 JWTs carrying the session binding in
/// their claims; holders prove them by signature alone, with revocation
/// handled separately by the session liveness check.
///
/// Refresh tokens are stateful: the wire form is `<session_id>:<secret>`,
/// where the secret is 32 random bytes (hex) whose SHA-256 digest is the only
/// thing stored server-side. A database leak therefore exposes no usable
/// refresh material.
///
/// # Example
///
/// ```
/// use clavis_core::auth::token::{self, AccessClaims};
/// use clavis_core::config::JwtSettings;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let settings = JwtSettings {
///     secret: "your-secret-key-at-least-32-bytes!!".to_string(),
///     issuer: "clavis".to_string(),
///     audience: "api".to_string(),
///     access_ttl_minutes: 15,
/// };
///
/// let claims = AccessClaims::new(Uuid::new_v4(), Uuid::new_v4(), 1, None, &settings);
/// let jwt = token::sign_access_token(&claims, &settings)?;
/// let verified = token::verify_access_token(&jwt, &settings)?;
/// assert_eq!(verified.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::JwtSettings;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to sign token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, claim, or format check failed
    #[error("Token validation failed: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Refresh payload is not `<session_id>:<secret>`
    #[error("Malformed refresh payload")]
    MalformedRefresh,
}

/// Claims carried by every access token
///
/// # Standard Claims
///
/// - `sub`: Subject (user ID)
/// - `iss` / `aud`: Issuer and audience, both enforced on verification
/// - `iat`, `exp`, `nbf`: Issued-at, expiration, not-before timestamps
///
/// # Custom Claims
///
/// - `sid`: Session ID the token is bound to
/// - `ver`: Credential version at issue time; a password change bumps the
///   stored version and strands tokens minted under the old one
/// - `oid`: Active organization context, absent until the user switches in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Session ID
    pub sid: Uuid,

    /// Credential version at issue time
    pub ver: i32,

    /// Active organization, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<Uuid>,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl AccessClaims {
    /// Creates claims for a session with the configured lifetime
    ///
    /// # Arguments
    ///
    /// * `user_id` - Subject user
    /// * `session_id` - Session the token is bound to
    /// * `credential_version` - Version of the credential used to log in
    /// * `org_id` - Active organization context, if the session has one
    /// * `settings` - Issuer, audience, and lifetime policy
    pub fn new(
        user_id: Uuid,
        session_id: Uuid,
        credential_version: i32,
        org_id: Option<Uuid>,
        settings: &JwtSettings,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + Duration::minutes(settings.access_ttl_minutes);

        Self {
            sub: user_id,
            sid: session_id,
            ver: credential_version,
            oid: org_id,
            iss: settings.issuer.clone(),
            aud: settings.audience.clone(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs access token claims with HS256
///
/// # Errors
///
/// Returns `TokenError::CreateError` if encoding fails
pub fn sign_access_token(claims: &AccessClaims, settings: &JwtSettings) -> Result<String, TokenError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(settings.secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| TokenError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies an access token and extracts its claims
///
/// Enforces signature, expiry, not-before, issuer, and audience. Revocation
/// is not checked here; callers go through the session manager for that.
///
/// # Errors
///
/// Returns `TokenError::Expired` for expired tokens and
/// `TokenError::ValidationError` for every other rejection.
pub fn verify_access_token(token: &str, settings: &JwtSettings) -> Result<AccessClaims, TokenError> {
    let key = DecodingKey::from_secret(settings.secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_audience(&[&settings.audience]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<AccessClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Generates a fresh refresh secret
///
/// 32 bytes from the OS RNG, hex-encoded (64 characters).
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Computes the stored digest of a refresh secret
///
/// SHA-256, hex-encoded. Comparison against the stored column happens inside
/// the session lookup query, so only digests ever cross that boundary.
pub fn hash_refresh_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Formats the client-facing refresh payload
pub fn format_refresh_payload(session_id: Uuid, secret: &str) -> String {
    format!("{}:{}", session_id, secret)
}

/// Parses a client-supplied refresh payload into its parts
///
/// # Errors
///
/// Returns `TokenError::MalformedRefresh` when the payload is not
/// `<uuid>:<non-empty secret>`. Callers can reject these without a store
/// lookup.
pub fn parse_refresh_payload(payload: &str) -> Result<(Uuid, &str), TokenError> {
    let (id_part, secret) = payload.split_once(':').ok_or(TokenError::MalformedRefresh)?;

    if secret.is_empty() {
        return Err(TokenError::MalformedRefresh);
    }

    let session_id = Uuid::parse_str(id_part).map_err(|_| TokenError::MalformedRefresh)?;

    Ok((session_id, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-bytes!!".to_string(),
            issuer: "clavis".to_string(),
            audience: "api".to_string(),
            access_ttl_minutes: 15,
        }
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let settings = test_settings();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let claims = AccessClaims::new(user_id, session_id, 3, None, &settings);
        let token = sign_access_token(&claims, &settings).expect("Sign should succeed");

        let verified = verify_access_token(&token, &settings).expect("Verify should succeed");
        assert_eq!(verified.sub, user_id);
        assert_eq!(verified.sid, session_id);
        assert_eq!(verified.ver, 3);
        assert_eq!(verified.oid, None);
        assert_eq!(verified.iss, "clavis");
    }

    #[test]
    fn test_org_claim_survives_roundtrip() {
        let settings = test_settings();
        let org_id = Uuid::new_v4();

        let claims = AccessClaims::new(Uuid::new_v4(), Uuid::new_v4(), 1, Some(org_id), &settings);
        let token = sign_access_token(&claims, &settings).unwrap();

        let verified = verify_access_token(&token, &settings).unwrap();
        assert_eq!(verified.oid, Some(org_id));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let settings = test_settings();
        let claims = AccessClaims::new(Uuid::new_v4(), Uuid::new_v4(), 1, None, &settings);
        let token = sign_access_token(&claims, &settings).unwrap();

        let mut other = test_settings();
        other.secret = "a-completely-different-32-byte-secret".to_string();

        let result = verify_access_token(&token, &other);
        assert!(matches!(result, Err(TokenError::ValidationError(_))));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let settings = test_settings();
        let claims = AccessClaims::new(Uuid::new_v4(), Uuid::new_v4(), 1, None, &settings);
        let token = sign_access_token(&claims, &settings).unwrap();

        let mut other = test_settings();
        other.issuer = "someone-else".to_string();

        assert!(verify_access_token(&token, &other).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut settings = test_settings();
        settings.access_ttl_minutes = -5;

        let claims = AccessClaims::new(Uuid::new_v4(), Uuid::new_v4(), 1, None, &settings);
        assert!(claims.is_expired());

        let token = sign_access_token(&claims, &settings).unwrap();
        let result = verify_access_token(&token, &settings);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let settings = test_settings();
        assert!(verify_access_token("not.a.jwt", &settings).is_err());
        assert!(verify_access_token("", &settings).is_err());
    }

    #[test]
    fn test_refresh_secret_generation() {
        let a = generate_refresh_secret();
        let b = generate_refresh_secret();

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_refresh_secret_is_deterministic() {
        let secret = generate_refresh_secret();

        assert_eq!(hash_refresh_secret(&secret), hash_refresh_secret(&secret));
        assert_eq!(hash_refresh_secret(&secret).len(), 64);
        assert_ne!(hash_refresh_secret(&secret), secret);
    }

    #[test]
    fn test_refresh_payload_roundtrip() {
        let session_id = Uuid::new_v4();
        let secret = generate_refresh_secret();

        let payload = format_refresh_payload(session_id, &secret);
        let (parsed_id, parsed_secret) = parse_refresh_payload(&payload).unwrap();

        assert_eq!(parsed_id, session_id);
        assert_eq!(parsed_secret, secret);
    }

    #[test]
    fn test_malformed_refresh_payloads_rejected() {
        for payload in ["", "no-colon", "not-a-uuid:secret", "2d9e7e1a:secret"] {
            assert!(
                matches!(parse_refresh_payload(payload), Err(TokenError::MalformedRefresh)),
                "payload '{}' should be rejected",
                payload
            );
        }

        // Empty secret after a valid UUID is also malformed
        let payload = format!("{}:", Uuid::new_v4());
        assert!(parse_refresh_payload(&payload).is_err());
    }
}
