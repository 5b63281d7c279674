/// Org-scoped permission checks
///
/// The gate answers "does user U hold permission P in org O" with a
/// cache-aside verdict store. Both allow and deny verdicts are cached under
/// the same TTL; caching only allows would turn every denial into a
/// store-of-record read and hand an attacker a cheap probe. Grants and
/// revocations therefore become visible within the verdict TTL, not
/// immediately.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{permission_key, Cache};
use crate::error::{AuthError, AuthResult};
use crate::models::Permission;

const ALLOW: &str = "1";
const DENY: &str = "0";

/// Permission decision service
#[derive(Clone)]
pub struct PermissionGate {
    pool: PgPool,
    cache: Arc<dyn Cache>,
    verdict_ttl: Duration,
}

impl PermissionGate {
    /// Creates a gate with the given verdict cache TTL
    pub fn new(pool: PgPool, cache: Arc<dyn Cache>, verdict_ttl: Duration) -> Self {
        Self {
            pool,
            cache,
            verdict_ttl,
        }
    }

    /// Decides whether the user holds the permission in the organization
    ///
    /// Consults the verdict cache first; on a miss, walks the role graph
    /// (membership required) and caches the outcome either way.
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        permission: &str,
    ) -> AuthResult<bool> {
        let key = permission_key(user_id, org_id, permission);

        if let Ok(Some(verdict)) = self.cache.get(&key).await {
            return Ok(verdict == ALLOW);
        }

        let allowed = Permission::user_has_permission(&self.pool, user_id, org_id, permission).await?;

        let verdict = if allowed { ALLOW } else { DENY };
        if let Err(e) = self.cache.set_with_ttl(&key, verdict, self.verdict_ttl).await {
            tracing::warn!(error = %e, "Failed to cache permission verdict");
        }

        tracing::debug!(
            user_id = %user_id,
            org_id = %org_id,
            permission,
            allowed,
            "Permission verdict computed"
        );

        Ok(allowed)
    }

    /// Like [`has_permission`](Self::has_permission), but denies with an error
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when the permission is not held
    pub async fn require(&self, user_id: Uuid, org_id: Uuid, permission: &str) -> AuthResult<()> {
        if self.has_permission(user_id, org_id, permission).await? {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
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

    fn gate(cache: Arc<dyn Cache>) -> PermissionGate {
        PermissionGate::new(lazy_pool(), cache, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_cached_allow_skips_role_graph() {
        let cache = Arc::new(MemoryCache::new());
        let gate = gate(cache.clone());

        let user = Uuid::new_v4();
        let org = Uuid::new_v4();

        // With the verdict cached, the unreachable pool is never touched.
        cache
            .set_with_ttl(&permission_key(user, org, "org.read"), ALLOW, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(gate.has_permission(user, org, "org.read").await.unwrap());
    }

    #[tokio::test]
    async fn test_cached_deny_skips_role_graph() {
        let cache = Arc::new(MemoryCache::new());
        let gate = gate(cache.clone());

        let user = Uuid::new_v4();
        let org = Uuid::new_v4();

        cache
            .set_with_ttl(&permission_key(user, org, "org.admin"), DENY, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!gate.has_permission(user, org, "org.admin").await.unwrap());
        assert!(matches!(
            gate.require(user, org, "org.admin").await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_verdicts_are_per_permission() {
        let cache = Arc::new(MemoryCache::new());
        let gate = gate(cache.clone());

        let user = Uuid::new_v4();
        let org = Uuid::new_v4();

        cache
            .set_with_ttl(&permission_key(user, org, "org.read"), ALLOW, Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set_with_ttl(&permission_key(user, org, "org.write"), DENY, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(gate.has_permission(user, org, "org.read").await.unwrap());
        assert!(!gate.has_permission(user, org, "org.write").await.unwrap());
    }

    // Cache-miss verdicts (and their write-back) are covered by
    // tests/authorize_tests.rs against a real database.
}
