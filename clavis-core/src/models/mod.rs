/// Data models and database operations
///
/// Each model owns its table's queries. Operations take a `&PgPool` (or a
/// `&mut PgConnection` where they must join a caller's transaction) and
/// return `Result<_, sqlx::Error>`; the service layer maps those into
/// [`crate::error::AuthError`].
///
/// # Models
///
/// - `user`: Accounts, status, and the failed-attempt lockout counters
/// - `credential`: Versioned password credentials
/// - `session`: Refresh sessions and revocation
/// - `org`: Organizations and memberships
/// - `role`: Roles, permissions, and grants
/// - `job`: Durable background job queue

pub mod credential;
pub mod job;
pub mod org;
pub mod role;
pub mod session;
pub mod user;

pub use credential::Credential;
pub use job::{Job, JobPayload, JobState};
pub use org::{NewOrganization, Organization};
pub use role::{Permission, Role};
pub use session::{NewSession, Session};
pub use user::{User, UserStatus};
