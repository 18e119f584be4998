/// User-group membership model and database operations
///
/// A row is created pending when a user is invited to a group, flips to
/// accepted when the invite is taken, and is deleted on removal from the
/// group or account deletion. At most one row exists per (user, group) pair.
///
/// Pending rows grant no access: the reconciliation engine only counts
/// non-pending memberships when computing group-derived project access (see
/// `reconcile::MembershipReconciler::find_group_members_not_in_project` —
/// though note that not every reconciliation operation filters pending rows;
/// each documents its own behavior).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_group_memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     group_id UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
///     is_pending BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, group_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User-group join row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserGroupMembership {
    /// Unique membership row ID
    pub id: Uuid,

    /// Member user
    pub user_id: Uuid,

    /// Group the user belongs to (or is invited to)
    pub group_id: Uuid,

    /// True until the user accepts the invite
    pub is_pending: bool,

    /// When the invite was created
    pub created_at: DateTime<Utc>,

    /// When the row was last updated (e.g., invite acceptance)
    pub updated_at: DateTime<Utc>,
}

impl UserGroupMembership {
    /// Invites a user to a group (creates a pending membership)
    ///
    /// # Errors
    ///
    /// Returns an error if a row already exists for the pair (unique
    /// constraint), user or group don't exist (foreign key), or the database
    /// connection fails.
    pub async fn invite(
        pool: &PgPool,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, UserGroupMembership>(
            r#"
            INSERT INTO user_group_memberships (user_id, group_id, is_pending)
            VALUES ($1, $2, TRUE)
            RETURNING id, user_id, group_id, is_pending, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_one(pool)
        .await?;

        Ok(membership)
    }

    /// Accepts a pending invite (clears `is_pending`)
    ///
    /// # Returns
    ///
    /// The updated membership if a row exists for the pair, None otherwise.
    /// Accepting an already-accepted membership is a no-op that still returns
    /// the row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn accept(
        pool: &PgPool,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, UserGroupMembership>(
            r#"
            UPDATE user_group_memberships
            SET is_pending = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND group_id = $2
            RETURNING id, user_id, group_id, is_pending, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Finds the membership row for a (user, group) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn find(
        pool: &PgPool,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, UserGroupMembership>(
            r#"
            SELECT id, user_id, group_id, is_pending, created_at, updated_at
            FROM user_group_memberships
            WHERE user_id = $1 AND group_id = $2
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Lists all membership rows of a group, pending included
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn list_by_group(pool: &PgPool, group_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, UserGroupMembership>(
            r#"
            SELECT id, user_id, group_id, is_pending, created_at, updated_at
            FROM user_group_memberships
            WHERE group_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Removes a user from a group (pending or accepted)
    ///
    /// # Returns
    ///
    /// True if a row was deleted, false if the pair had no row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn remove(
        pool: &PgPool,
        user_id: Uuid,
        group_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_group_memberships WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user_id)
        .bind(group_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
