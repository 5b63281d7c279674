/// Role and permission models
///
/// Roles are org-scoped; permissions are a global catalog. A user's effective
/// permissions in an org are the union of the permissions attached to the
/// roles granted to them there. The membership check in `user_has_permission`
/// means removing a member denies them even while stale role grants linger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// An org-scoped role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    /// Unique role ID
    pub id: Uuid,

    /// Role name, unique within its organization
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Owning organization
    pub org_id: Uuid,

    /// When the role was created
    pub created_at: DateTime<Utc>,
}

/// A permission in the global catalog
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    /// Unique permission ID
    pub id: Uuid,

    /// Globally unique permission name, e.g. `org.members.invite`
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Owning service for service-scoped permissions; NULL for
    /// platform-level permissions granted to org owners at bootstrap
    pub service_id: Option<Uuid>,

    /// When the permission was created
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Creates a role
    ///
    /// Takes a connection so bootstrap can run it inside a transaction.
    pub async fn create(
        conn: &mut PgConnection,
        org_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description, org_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, org_id, created_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(org_id)
        .fetch_one(conn)
        .await
    }

    /// Checks whether a role with this name already exists in the org
    ///
    /// The (org_id, name) pair is unique, which makes this the redelivery
    /// guard for the bootstrap job.
    pub async fn exists(pool: &PgPool, org_id: Uuid, name: &str) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM roles WHERE org_id = $1 AND name = $2)",
        )
        .bind(org_id)
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Attaches a permission to a role
    pub async fn grant_permission(
        conn: &mut PgConnection,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Grants a role to a user within an organization
    pub async fn assign_to_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        role_id: Uuid,
        org_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, org_id)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(org_id)
        .execute(conn)
        .await?;

        Ok(())
    }
}

impl Permission {
    /// Lists the platform-level permission catalog
    ///
    /// These are the service-unscoped permissions granted to the Owner role
    /// when an organization is bootstrapped.
    pub async fn platform(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name, description, service_id, created_at
            FROM permissions
            WHERE service_id IS NULL
            ORDER BY name ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Decides whether a user holds a named permission in an organization
    ///
    /// Requires current membership; revoked members are denied regardless of
    /// remaining role grants.
    pub async fn user_has_permission(
        pool: &PgPool,
        user_id: Uuid,
        org_id: Uuid,
        permission: &str,
    ) -> Result<bool, sqlx::Error> {
        let allowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_roles ur
                JOIN role_permissions rp ON rp.role_id = ur.role_id
                JOIN permissions p ON p.id = rp.permission_id
                JOIN org_members m ON m.org_id = ur.org_id AND m.user_id = ur.user_id
                WHERE ur.user_id = $1
                  AND ur.org_id = $2
                  AND p.name = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .bind(permission)
        .fetch_one(pool)
        .await?;

        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_scoping() {
        let platform = Permission {
            id: Uuid::new_v4(),
            name: "org.members.invite".to_string(),
            description: None,
            service_id: None,
            created_at: Utc::now(),
        };
        let scoped = Permission {
            service_id: Some(Uuid::new_v4()),
            ..platform.clone()
        };

        assert!(platform.service_id.is_none());
        assert!(scoped.service_id.is_some());
    }

    // Integration tests for database operations are in tests/model_tests.rs
}
