//! # Clavis Core
//!
//! Shared library for the Clavis identity platform: credential verification,
//! session/token lifecycle, organization-scoped RBAC, and the durable job
//! queue that seeds authorization state for new organizations.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `auth`: Credential verifier, session manager, permission gate
//! - `orgs`: Organization membership, listing, and org switch
//! - `cache`: Cache seam (Redis-backed, plus in-memory for tests)
//! - `db`: PostgreSQL connection pool
//! - `config`: Configuration management
//! - `error`: Common error taxonomy
//! - `validate`: Declarative input validation

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod orgs;
pub mod validate;

/// Current version of the Clavis core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
