/// Organization model and database operations
///
/// Creating an organization also inserts the creator's membership row in the
/// same transaction, so an org is never visible without at least one member.
/// Role bootstrap happens asynchronously; see the job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// An organization (tenant)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    /// Unique organization ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// URL-safe unique identifier
    pub slug: String,

    /// User who created the organization
    pub created_by: Uuid,

    /// When the organization was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating an organization
#[derive(Debug, Clone)]
pub struct NewOrganization {
    /// Display name
    pub name: String,

    /// URL-safe unique identifier
    pub slug: String,

    /// Creating user, who becomes the first member
    pub created_by: Uuid,
}

const ORG_COLUMNS: &str = "id, name, slug, created_by, created_at";

impl Organization {
    /// Creates an organization with its creator as first member
    ///
    /// Both inserts run in one transaction started on the caller's
    /// connection, so the caller can extend it (e.g. to enqueue the
    /// bootstrap job atomically).
    pub async fn create(
        conn: &mut sqlx::PgConnection,
        data: NewOrganization,
    ) -> Result<Self, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            r#"
            INSERT INTO organizations (name, slug, created_by)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            ORG_COLUMNS
        ))
        .bind(&data.name)
        .bind(&data.slug)
        .bind(data.created_by)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query("INSERT INTO org_members (org_id, user_id) VALUES ($1, $2)")
            .bind(org.id)
            .bind(data.created_by)
            .execute(&mut *conn)
            .await?;

        Ok(org)
    }

    /// Finds an organization by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE id = $1",
            ORG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds an organization by slug
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE slug = $1",
            ORG_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    /// Lists every organization a user belongs to
    ///
    /// Ordered by membership creation, oldest first.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT o.id, o.name, o.slug, o.created_by, o.created_at
            FROM organizations o
            JOIN org_members m ON m.org_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Checks whether a user is a member of an organization
    pub async fn is_member(pool: &PgPool, org_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM org_members WHERE org_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization_struct() {
        let data = NewOrganization {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            created_by: Uuid::new_v4(),
        };

        assert_eq!(data.name, "Acme");
        assert_eq!(data.slug, "acme");
    }

    // Integration tests for database operations are in tests/model_tests.rs
}
