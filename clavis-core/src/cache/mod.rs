/// Cache layer for Clavis
///
/// The cache holds derived, expendable copies of store-of-record state:
/// session liveness shortcuts, permission verdicts, and per-user org
/// listings. It is best-effort and never authoritative; every entry carries
/// a bounded TTL and may be cleared at any time with no correctness impact
/// beyond bounded staleness.
///
/// # Modules
///
/// - `redis`: Redis-backed implementation over a managed connection
/// - `memory`: In-memory implementation for tests
///
/// # Example
///
/// ```no_run
/// use clavis_core::cache::{Cache, RedisCache, RedisSettings};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let cache = RedisCache::connect(RedisSettings::from_env()?).await?;
/// cache.set_with_ttl("session:abc", "1", Duration::from_secs(60)).await?;
/// let hit = cache.get("session:abc").await?;
/// assert_eq!(hit.as_deref(), Some("1"));
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::{RedisCache, RedisSettings};

use std::time::Duration;
use uuid::Uuid;

/// Cache layer errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Connection error
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Command execution error
    #[error("Cache command error: {0}")]
    Command(String),

    /// Configuration error
    #[error("Cache configuration error: {0}")]
    Config(String),
}

/// Cache seam consumed by the session manager, permission gate, and org
/// service.
///
/// Implementations must treat `set_with_ttl` as an upper bound: entries may
/// be evicted earlier, never later.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value by key; `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a value under a key with a time-to-live
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes a key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Key of the "known not revoked" session liveness entry
pub fn session_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

/// Key of a cached permission verdict for a (user, org, permission) triple
pub fn permission_key(user_id: Uuid, org_id: Uuid, permission: &str) -> String {
    format!("perm:{}:{}:{}", user_id, org_id, permission)
}

/// Key of the cached organization listing for a user
pub fn user_orgs_key(user_id: Uuid) -> String {
    format!("user:{}:orgs", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        let user = Uuid::nil();
        let org = Uuid::nil();

        assert_eq!(
            session_key(user),
            "session:00000000-0000-0000-0000-000000000000"
        );
        assert!(permission_key(user, org, "org.read").ends_with(":org.read"));
        assert!(user_orgs_key(user).ends_with(":orgs"));
    }
}
