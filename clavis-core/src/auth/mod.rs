/// Authentication and authorization services
///
/// # Modules
///
/// - `password`: Argon2id hashing with a constant-cost absent-account path
/// - `token`: HS256 access tokens and refresh token primitives
/// - `verifier`: Registration and credential verification with lockout
/// - `session`: Session lifecycle: login, refresh rotation, logout, liveness
/// - `authorize`: Org-scoped permission checks with a cache-aside verdict store
///
/// # Flow
///
/// Login goes through the [`verifier::CredentialVerifier`] first; only a
/// verified (user, credential) pair reaches
/// [`session::SessionManager::create_session`]. Request authentication goes
/// the other way: [`session::SessionManager::authenticate`] proves the access
/// token and session liveness, then
/// [`authorize::PermissionGate`] answers per-permission questions.

pub mod authorize;
pub mod password;
pub mod session;
pub mod token;
pub mod verifier;

pub use authorize::PermissionGate;
pub use session::{ClientInfo, SessionManager, TokenPair};
pub use verifier::CredentialVerifier;
