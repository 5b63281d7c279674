/// Organization bootstrap
///
/// Builds a new organization's initial role graph: an `Owner` role holding
/// every platform-level permission, granted to the org's creator. Runs in
/// one transaction, so a partially bootstrapped org is impossible.
///
/// Redelivery safety comes from two layers. A pre-check on the Owner role
/// short-circuits the common case, and the UNIQUE (org_id, name) constraint
/// on roles catches the race where two deliveries pass the pre-check
/// together; the loser's constraint violation is treated as already done.

use sqlx::PgPool;
use uuid::Uuid;

use clavis_core::models::{Organization, Permission, Role};

/// Name of the role created for every new organization
pub const OWNER_ROLE: &str = "Owner";

/// Bootstrap error
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Organization no longer exists
    #[error("Organization not found: {0}")]
    OrgNotFound(Uuid),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a bootstrap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The role graph was built by this attempt
    Bootstrapped,

    /// A previous delivery already built it
    AlreadyBootstrapped,
}

/// Bootstraps an organization's role graph
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `org_id` - Organization to bootstrap
/// * `created_by` - Creator, who receives the Owner role
///
/// # Errors
///
/// Returns `BootstrapError::OrgNotFound` if the organization was deleted
/// between enqueue and execution.
pub async fn initialize_org(
    pool: &PgPool,
    org_id: Uuid,
    created_by: Uuid,
) -> Result<BootstrapOutcome, BootstrapError> {
    if Role::exists(pool, org_id, OWNER_ROLE).await? {
        tracing::info!(org_id = %org_id, "Organization already bootstrapped, skipping");
        return Ok(BootstrapOutcome::AlreadyBootstrapped);
    }

    Organization::find_by_id(pool, org_id)
        .await?
        .ok_or(BootstrapError::OrgNotFound(org_id))?;

    let permissions = Permission::platform(pool).await?;

    let mut tx = pool.begin().await?;

    let role = match Role::create(
        &mut *tx,
        org_id,
        OWNER_ROLE,
        Some("Full control over the organization"),
    )
    .await
    {
        Ok(role) => role,
        Err(sqlx::Error::Database(db_err)) if db_err.constraint().is_some() => {
            // Lost the race against a concurrent delivery.
            tracing::info!(org_id = %org_id, "Owner role created concurrently, skipping");
            return Ok(BootstrapOutcome::AlreadyBootstrapped);
        }
        Err(e) => return Err(e.into()),
    };

    for permission in &permissions {
        Role::grant_permission(&mut *tx, role.id, permission.id).await?;
    }

    Role::assign_to_user(&mut *tx, created_by, role.id, org_id).await?;

    tx.commit().await?;

    tracing::info!(
        org_id = %org_id,
        role_id = %role.id,
        permissions = permissions.len(),
        owner = %created_by,
        "Organization bootstrapped"
    );

    Ok(BootstrapOutcome::Bootstrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_role_name() {
        assert_eq!(OWNER_ROLE, "Owner");
    }

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        assert!(BootstrapError::OrgNotFound(id)
            .to_string()
            .contains("Organization not found"));
    }

    // Idempotency and the full bootstrap transaction are covered by
    // tests/bootstrap_tests.rs against a real database.
}
