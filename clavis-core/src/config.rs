/// Configuration management
///
/// Loads configuration from environment variables into a type-safe struct.
/// Components receive the pieces they need by value; nothing reads the
/// environment after startup.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `REDIS_URL`: Redis connection URL (required)
/// - `JWT_SECRET`: Secret key for access token signing (required, >= 32 chars)
/// - `JWT_ISSUER`: Issuer claim (default: "clavis")
/// - `JWT_AUDIENCE`: Audience claim (default: "api")
/// - `ACCESS_TOKEN_TTL_MINUTES`: Access token lifetime (default: 15)
/// - `REFRESH_TOKEN_TTL_DAYS`: Session refresh window (default: 30)
/// - `MAX_FAILED_ATTEMPTS`: Lockout threshold (default: 5)
/// - `LOCK_WINDOW_MINUTES`: Lockout duration (default: 15)
/// - `SESSION_CACHE_TTL_SECONDS`: "known not revoked" cache TTL (default: 60)
/// - `PERMISSION_CACHE_TTL_SECONDS`: Permission verdict cache TTL (default: 300)
/// - `ORG_LIST_CACHE_TTL_SECONDS`: Per-user org listing cache TTL (default: 300)
///
/// # Example
///
/// ```no_run
/// use clavis_core::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("lockout threshold: {}", config.security.max_failed_attempts);
/// # Ok(())
/// # }
/// ```
use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Access token configuration
    pub jwt: JwtSettings,

    /// Lockout, rotation, and cache-TTL policy
    pub security: SecuritySettings,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,
}

/// Access token (JWT) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    /// Secret key for HS256 signing
    ///
    /// IMPORTANT: must be kept secret and at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Issuer claim stamped into and required from every token
    pub issuer: String,

    /// Audience claim stamped into and required from every token
    pub audience: String,

    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
}

/// Lockout, session, and cache policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Consecutive failed logins before the account locks
    pub max_failed_attempts: i32,

    /// How long a locked account stays locked, in minutes
    pub lock_window_minutes: i64,

    /// Refresh window: sessions expire this many days after creation
    pub refresh_ttl_days: i64,

    /// TTL of the "known not revoked" session cache entry, in seconds.
    ///
    /// A session revoked by anything other than `logout` (which evicts the
    /// key explicitly) stays acceptable for up to this long. Shorten it to
    /// tighten revocation propagation at the cost of more session-row reads.
    pub session_cache_ttl_secs: u64,

    /// TTL of cached permission verdicts, in seconds.
    ///
    /// Role/permission grants and revocations become visible only after this
    /// TTL elapses; outstanding entries are not invalidated.
    pub permission_cache_ttl_secs: u64,

    /// TTL of the per-user organization listing cache, in seconds
    pub org_list_cache_ttl_secs: u64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_window_minutes: 15,
            refresh_ttl_days: 30,
            session_cache_ttl_secs: 60,
            permission_cache_ttl_secs: 300,
            org_list_cache_ttl_secs: 300,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| anyhow::anyhow!("REDIS_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "clavis".to_string());
        let audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "api".to_string());

        let access_ttl_minutes = parse_or("ACCESS_TOKEN_TTL_MINUTES", 15)?;
        let refresh_ttl_days = parse_or("REFRESH_TOKEN_TTL_DAYS", 30)?;
        let max_failed_attempts = parse_or("MAX_FAILED_ATTEMPTS", 5)?;
        let lock_window_minutes = parse_or("LOCK_WINDOW_MINUTES", 15)?;
        let session_cache_ttl_secs = parse_or("SESSION_CACHE_TTL_SECONDS", 60)?;
        let permission_cache_ttl_secs = parse_or("PERMISSION_CACHE_TTL_SECONDS", 300)?;
        let org_list_cache_ttl_secs = parse_or("ORG_LIST_CACHE_TTL_SECONDS", 300)?;

        Ok(Self {
            database: DatabaseSettings {
                url: database_url,
                max_connections,
            },
            redis: RedisSettings { url: redis_url },
            jwt: JwtSettings {
                secret: jwt_secret,
                issuer,
                audience,
                access_ttl_minutes,
            },
            security: SecuritySettings {
                max_failed_attempts,
                lock_window_minutes,
                refresh_ttl_days,
                session_cache_ttl_secs,
                permission_cache_ttl_secs,
                org_list_cache_ttl_secs,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(raw) => Ok(raw.parse::<T>()?),
        Err(_) => Ok(default),
    }
}
