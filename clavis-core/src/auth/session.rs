/// Session lifecycle management
///
/// The session manager owns the four token-lifecycle operations:
///
/// - `create_session`: mint a session plus its first token pair
/// - `refresh`: rotate the refresh secret and mint a fresh access token
/// - `logout`: revoke the session and evict its liveness cache entry
/// - `authenticate`: prove an access token and the session behind it
///
/// Refresh rotation is strict one-time-use. Presenting a superseded secret
/// is treated as replay: the whole session is revoked, ending the lineage
/// for the legitimate holder too, since at that point two parties hold it.
///
/// `authenticate` consults a short-TTL "known not revoked" cache entry
/// before the session row. Logout evicts that entry, so explicit logout is
/// immediate; any other revocation propagates within the TTL.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::auth::token::{self, AccessClaims};
use crate::auth::password;
use crate::cache::{session_key, Cache};
use crate::config::{JwtSettings, SecuritySettings};
use crate::error::{AuthError, AuthResult};
use crate::models::{Credential, NewSession, Session, User};
use crate::validate::ValidationFailure;

/// Client metadata recorded on the session at login
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Client IP address, if known
    pub ip_address: Option<String>,

    /// Client user agent, if known
    pub user_agent: Option<String>,
}

/// Tokens handed to the client after login, refresh, or org switch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived HS256 access token
    pub access_token: String,

    /// Refresh payload in `<session_id>:<secret>` form
    pub refresh_token: String,

    /// Session the pair is bound to
    pub session_id: Uuid,

    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,
}

/// Session lifecycle service
#[derive(Clone)]
pub struct SessionManager {
    pool: PgPool,
    cache: Arc<dyn Cache>,
    jwt: JwtSettings,
    security: SecuritySettings,
}

impl SessionManager {
    /// Creates a session manager with its injected collaborators
    pub fn new(
        pool: PgPool,
        cache: Arc<dyn Cache>,
        jwt: JwtSettings,
        security: SecuritySettings,
    ) -> Self {
        Self {
            pool,
            cache,
            jwt,
            security,
        }
    }

    /// Creates a session for a verified user and mints its first token pair
    ///
    /// Call only with a (user, credential) pair returned by the verifier.
    /// The refresh secret leaves this function exactly once, inside the
    /// returned pair; only its digest is stored.
    pub async fn create_session(
        &self,
        user: &User,
        credential: &Credential,
        org_id: Option<Uuid>,
        client: ClientInfo,
    ) -> AuthResult<TokenPair> {
        let secret = token::generate_refresh_secret();
        let expires_at = Utc::now() + Duration::days(self.security.refresh_ttl_days);

        let session = Session::create(
            &self.pool,
            NewSession {
                user_id: user.id,
                refresh_token_hash: token::hash_refresh_secret(&secret),
                expires_at,
                org_id,
                credential_version: credential.version,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            },
        )
        .await?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "Session created");

        self.prime_liveness(session.id).await;
        self.issue_pair(&session, &secret)
    }

    /// Rotates a refresh token and mints a fresh access token
    ///
    /// Malformed payloads are rejected before any store access. A stale
    /// secret (correct session, superseded digest) revokes the session.
    /// A supplied `org_id` re-scopes the rotated session; `None` keeps the
    /// session's existing scope.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRefreshToken`] for malformed, unknown, revoked,
    ///   or replayed tokens
    /// - [`AuthError::RefreshExpired`] when the refresh window has closed
    pub async fn refresh(&self, payload: &str, org_id: Option<Uuid>) -> AuthResult<TokenPair> {
        let (session_id, secret) =
            token::parse_refresh_payload(payload).map_err(|_| AuthError::InvalidRefreshToken)?;
        let presented_hash = token::hash_refresh_secret(secret);

        let session = Session::find_by_id(&self.pool, session_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if session.is_revoked {
            return Err(AuthError::InvalidRefreshToken);
        }
        if session.expires_at <= Utc::now() {
            return Err(AuthError::RefreshExpired);
        }

        let new_secret = token::generate_refresh_secret();
        let new_expires = Utc::now() + Duration::days(self.security.refresh_ttl_days);

        let rotated = Session::rotate_refresh_hash(
            &self.pool,
            session_id,
            &presented_hash,
            &token::hash_refresh_secret(&new_secret),
            new_expires,
            org_id,
        )
        .await?;

        let session = match rotated {
            Some(session) => session,
            None => {
                // Digest mismatch on a live session: a superseded secret was
                // replayed. Kill the lineage.
                tracing::warn!(session_id = %session_id, "Refresh token replay detected, revoking session");
                Session::revoke(&self.pool, session_id).await?;
                self.evict_liveness(session_id).await;
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        tracing::debug!(session_id = %session.id, "Refresh token rotated");

        self.issue_pair(&session, &new_secret)
    }

    /// Revokes a session and evicts its liveness cache entry
    ///
    /// Logging out an already-revoked session succeeds (the second call has
    /// nothing left to do), but an unknown session id is an error. The cache
    /// eviction makes logout effective immediately rather than after the
    /// liveness TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] when no session with this id exists
    pub async fn logout(&self, session_id: Uuid) -> AuthResult<()> {
        Session::find_by_id(&self.pool, session_id)
            .await?
            .ok_or(AuthError::NotFound("session"))?;

        let revoked = Session::revoke(&self.pool, session_id).await?;
        self.evict_liveness(session_id).await;

        if revoked {
            tracing::info!(session_id = %session_id, "Session revoked");
        }

        Ok(())
    }

    /// Revokes every live session a user holds and evicts their cache entries
    pub async fn logout_all(&self, user_id: Uuid) -> AuthResult<u64> {
        // Collect IDs first so the cache entries can be evicted too.
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM sessions WHERE user_id = $1 AND NOT is_revoked",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AuthError::from)?;

        let count = Session::revoke_all_for_user(&self.pool, user_id).await?;
        for id in ids {
            self.evict_liveness(id).await;
        }

        tracing::info!(user_id = %user_id, count, "All sessions revoked");

        Ok(count)
    }

    /// Changes a user's password and revokes every live session
    ///
    /// Verifies the current password, checks the replacement's strength,
    /// rotates the credential to the next version, then revokes all of the
    /// user's sessions and evicts their liveness entries. Outstanding access
    /// tokens die immediately, not just at the version check on their next
    /// cache miss.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] when the current password is
    ///   wrong or the user has no active password credential
    /// - [`AuthError::Validation`] when the replacement fails the strength
    ///   rules
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<Credential> {
        let credential = Credential::find_active_password(&self.pool, user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify_password(current_password, &credential.secret_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        password::validate_password_strength(new_password)
            .map_err(|msg| ValidationFailure::single("password", msg))?;

        let hash = password::hash_password(new_password)?;
        let rotated = Credential::rotate_password(&self.pool, user_id, &hash).await?;
        self.logout_all(user_id).await?;

        tracing::info!(user_id = %user_id, version = rotated.version, "Password changed");

        Ok(rotated)
    }

    /// Authenticates an access token
    ///
    /// Proves the signature and standard claims, then the session behind the
    /// token: it must exist, be unrevoked, inside its window, and minted
    /// under the user's current credential version. A cache hit on the
    /// liveness key skips the session row entirely.
    ///
    /// # Errors
    ///
    /// Every rejection is [`AuthError::Unauthorized`]; callers learn nothing
    /// about which check failed.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AccessClaims> {
        let claims = token::verify_access_token(access_token, &self.jwt)
            .map_err(|_| AuthError::Unauthorized)?;

        let key = session_key(claims.sid);
        if let Ok(Some(_)) = self.cache.get(&key).await {
            return Ok(claims);
        }

        let session = Session::find_by_id(&self.pool, claims.sid)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !session.is_live(Utc::now()) || session.credential_version != claims.ver {
            return Err(AuthError::Unauthorized);
        }

        self.prime_liveness(session.id).await;

        Ok(claims)
    }

    /// Re-binds a live session to an organization context
    ///
    /// The old session is revoked and a replacement minted with the org in
    /// its claims; access tokens from before the switch die with the old
    /// session once its liveness entry lapses. Membership is the caller's
    /// responsibility to check.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRefreshToken`] when the session is
    /// unknown, revoked, or past its window; the refresh lineage presented
    /// for the switch no longer names a live login
    pub async fn rebind_to_org(
        &self,
        session_id: Uuid,
        org_id: Option<Uuid>,
        client: ClientInfo,
    ) -> AuthResult<TokenPair> {
        let session = Session::find_by_id(&self.pool, session_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        if !session.is_live(Utc::now()) {
            return Err(AuthError::InvalidRefreshToken);
        }

        Session::revoke(&self.pool, session_id).await?;
        self.evict_liveness(session_id).await;

        let secret = token::generate_refresh_secret();
        let expires_at = Utc::now() + Duration::days(self.security.refresh_ttl_days);

        let replacement = Session::create(
            &self.pool,
            NewSession {
                user_id: session.user_id,
                refresh_token_hash: token::hash_refresh_secret(&secret),
                expires_at,
                org_id,
                credential_version: session.credential_version,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            },
        )
        .await?;

        tracing::info!(
            old_session = %session_id,
            new_session = %replacement.id,
            org_id = ?org_id,
            "Session re-bound to organization"
        );

        self.prime_liveness(replacement.id).await;
        self.issue_pair(&replacement, &secret)
    }

    fn issue_pair(&self, session: &Session, secret: &str) -> AuthResult<TokenPair> {
        let claims = AccessClaims::new(
            session.user_id,
            session.id,
            session.credential_version,
            session.org_id,
            &self.jwt,
        );
        let access_token = token::sign_access_token(&claims, &self.jwt)?;

        Ok(TokenPair {
            access_token,
            refresh_token: token::format_refresh_payload(session.id, secret),
            session_id: session.id,
            expires_at: claims.exp,
        })
    }

    async fn prime_liveness(&self, session_id: Uuid) {
        let ttl = StdDuration::from_secs(self.security.session_cache_ttl_secs);
        if let Err(e) = self.cache.set_with_ttl(&session_key(session_id), "1", ttl).await {
            // Cache failures degrade to session-row reads, never to errors.
            tracing::warn!(session_id = %session_id, error = %e, "Failed to prime session cache");
        }
    }

    async fn evict_liveness(&self, session_id: Uuid) {
        if let Err(e) = self.cache.delete(&session_key(session_id)).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to evict session cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/clavis_unreachable")
            .expect("lazy pool")
    }

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-bytes!!".to_string(),
            issuer: "clavis".to_string(),
            audience: "api".to_string(),
            access_ttl_minutes: 15,
        }
    }

    fn manager(cache: Arc<dyn Cache>) -> SessionManager {
        SessionManager::new(lazy_pool(), cache, jwt_settings(), SecuritySettings::default())
    }

    #[tokio::test]
    async fn test_malformed_refresh_rejected_without_store_access() {
        // The pool points at nothing; reaching the database would error with
        // a connection failure, not InvalidRefreshToken.
        let manager = manager(Arc::new(MemoryCache::new()));

        for payload in ["", "garbage", "not-a-uuid:secret"] {
            let result = manager.refresh(payload, None).await;
            assert!(
                matches!(result, Err(AuthError::InvalidRefreshToken)),
                "payload '{}' should fail fast",
                payload
            );
        }
    }

    #[tokio::test]
    async fn test_garbage_access_token_rejected_without_store_access() {
        let manager = manager(Arc::new(MemoryCache::new()));

        let result = manager.authenticate("not.a.jwt").await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_cached_liveness_skips_session_row() {
        let cache = Arc::new(MemoryCache::new());
        let manager = manager(cache.clone());

        // Mint a real token, then prime the liveness key by hand. With the
        // cache hot, authenticate must succeed despite the unreachable pool.
        let session_id = Uuid::new_v4();
        let settings = jwt_settings();
        let claims = AccessClaims::new(Uuid::new_v4(), session_id, 1, None, &settings);
        let token = token::sign_access_token(&claims, &settings).unwrap();

        cache
            .set_with_ttl(&session_key(session_id), "1", StdDuration::from_secs(60))
            .await
            .unwrap();

        let verified = manager.authenticate(&token).await.unwrap();
        assert_eq!(verified.sid, session_id);
    }

    // Full lifecycle (create, refresh, replay, logout) is covered by
    // tests/auth_flow_tests.rs against a real database.
}
