/// Project membership models and database operations
///
/// Two grant relations live here:
///
/// - `ProjectMembership`: a user's own join row into a project, independent
///   of any group ("direct membership").
/// - `GroupProjectMembership`: a group-level grant; every accepted member of
///   the group can reach the project ("group-derived membership").
///
/// # Schema
///
/// ```sql
/// CREATE TABLE project_memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, project_id)
/// );
///
/// CREATE TABLE group_project_memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     group_id UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (group_id, project_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Direct user-project membership
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectMembership {
    /// Unique membership row ID
    pub id: Uuid,

    /// Member user
    pub user_id: Uuid,

    /// Project the user has direct access to
    pub project_id: Uuid,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

/// Group-level project grant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupProjectMembership {
    /// Unique grant row ID
    pub id: Uuid,

    /// Granted group
    pub group_id: Uuid,

    /// Project the group is granted into
    pub project_id: Uuid,

    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

impl ProjectMembership {
    /// Adds a user directly to a project
    ///
    /// # Errors
    ///
    /// Returns an error if the membership already exists (unique constraint),
    /// user or project don't exist (foreign key), or the database connection
    /// fails.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, ProjectMembership>(
            r#"
            INSERT INTO project_memberships (user_id, project_id)
            VALUES ($1, $2)
            RETURNING id, user_id, project_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(membership)
    }

    /// Checks whether a user has a direct membership in a project
    ///
    /// Group-derived access does not count here; use the reconciliation
    /// engine for effective-access questions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn exists(
        pool: &PgPool,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM project_memberships
                WHERE user_id = $1 AND project_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Removes a user's direct membership in a project
    ///
    /// # Returns
    ///
    /// True if a row was deleted, false if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn remove(
        pool: &PgPool,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM project_memberships WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl GroupProjectMembership {
    /// Grants a group into a project
    ///
    /// # Errors
    ///
    /// Returns an error if the grant already exists (unique constraint),
    /// group or project don't exist (foreign key), or the database connection
    /// fails.
    pub async fn grant(
        pool: &PgPool,
        group_id: Uuid,
        project_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let grant = sqlx::query_as::<_, GroupProjectMembership>(
            r#"
            INSERT INTO group_project_memberships (group_id, project_id)
            VALUES ($1, $2)
            RETURNING id, group_id, project_id, created_at
            "#,
        )
        .bind(group_id)
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(grant)
    }

    /// Revokes a group's grant into a project
    ///
    /// # Returns
    ///
    /// True if a row was deleted, false if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn revoke(
        pool: &PgPool,
        group_id: Uuid,
        project_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM group_project_memberships WHERE group_id = $1 AND project_id = $2",
        )
        .bind(group_id)
        .bind(project_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the IDs of all groups granted into a project
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn list_group_ids_by_project(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let group_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT group_id FROM group_project_memberships WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(group_ids)
    }
}
