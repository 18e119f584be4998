/// Membership reconciliation engine
///
/// Computes effective project access across the three membership relations
/// (user-project, user-group, group-project) with the exclusion rules needed
/// when memberships are added or removed: which candidate projects a user can
/// still reach without a given group, which group members a project grant
/// would newly cover, and which pending invites a bulk removal actually
/// cancelled.
///
/// The engine holds an explicit pool handle; there is no global connection
/// state. Every operation additionally accepts an optional caller-supplied
/// transaction. When one is passed, all statements of the operation run on
/// it; when absent, a connection is acquired from the pool and the statements
/// run without cross-statement atomicity.
///
/// Nested `NOT IN (SELECT …)` sub-selects are deliberately avoided: exclusion
/// sets are resolved into memory first, then applied, so each query stays a
/// flat join.
///
/// # Example
///
/// ```no_run
/// use vaultkeep_membership::reconcile::MembershipReconciler;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, group_id: Uuid, candidates: Vec<Uuid>) -> Result<(), Box<dyn std::error::Error>> {
/// let reconciler = MembershipReconciler::new(pool);
///
/// // Which of these projects can the user still reach if we ignore group_id?
/// let reachable = reconciler
///     .filter_projects_by_user_membership(None, user_id, Some(group_id), &candidates)
///     .await?;
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{MembershipError, MembershipResult};

const OP_FILTER_PROJECTS: &str = "filter_projects_by_user_membership";
const OP_FIND_MEMBER_IDS: &str = "find_user_ids_of_group_members_in_project";
const OP_FIND_MEMBERS_NOT_IN_PROJECT: &str = "find_group_members_not_in_project";
const OP_DELETE_PENDING: &str = "delete_pending_memberships_by_user_ids";

/// Identity fields of a member, plus their encryption public key if one is
/// provisioned
#[derive(Debug, Clone, Serialize)]
pub struct MemberUser {
    /// User ID
    pub id: Uuid,

    /// Login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Optional given name
    pub first_name: Option<String>,

    /// Optional family name
    pub last_name: Option<String>,

    /// Encryption public key; None for users without one provisioned
    pub public_key: Option<String>,
}

/// A group member that a project grant would newly cover
///
/// Carries the membership-row fields plus the member's identity. Ordering of
/// results is unspecified; callers must not assume a stable order.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMemberCandidate {
    /// ID of the user-group membership row
    pub membership_id: Uuid,

    /// Group the membership belongs to
    pub group_id: Uuid,

    /// When the membership was created
    pub created_at: DateTime<Utc>,

    /// When the membership was last updated
    pub updated_at: DateTime<Utc>,

    /// The member's identity
    pub user: MemberUser,
}

/// Group fields captured at deletion time
///
/// `created_at`/`updated_at` are synthesized as the deletion time, not the
/// group's real timestamps; callers must not treat them as authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct RemovedGroup {
    /// Group ID
    pub id: Uuid,

    /// Owning organization
    pub org_id: Uuid,

    /// Display name at deletion time
    pub name: String,

    /// Slug at deletion time
    pub slug: String,

    /// Default project role of the group
    pub role: String,

    /// Custom role reference
    pub role_id: Option<Uuid>,

    /// Synthesized: the deletion time
    pub created_at: DateTime<Utc>,

    /// Synthesized: the deletion time
    pub updated_at: DateTime<Utc>,
}

/// User fields captured at deletion time
#[derive(Debug, Clone, Serialize)]
pub struct RemovedUser {
    /// User ID
    pub id: Uuid,

    /// Login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Optional given name
    pub first_name: Option<String>,

    /// Optional family name
    pub last_name: Option<String>,
}

/// One pending invitation removed by `delete_pending_memberships_by_user_ids`
#[derive(Debug, Clone, Serialize)]
pub struct RemovedPendingMembership {
    /// ID of the deleted membership row
    pub membership_id: Uuid,

    /// The invited user, as of deletion time
    pub user: RemovedUser,

    /// The inviting group, as of deletion time
    pub group: RemovedGroup,
}

#[derive(sqlx::FromRow)]
struct GroupMemberRow {
    membership_id: Uuid,
    group_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    user_id: Uuid,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    public_key: Option<String>,
}

impl GroupMemberRow {
    fn into_candidate(self) -> GroupMemberCandidate {
        GroupMemberCandidate {
            membership_id: self.membership_id,
            group_id: self.group_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user: MemberUser {
                id: self.user_id,
                username: self.username,
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                public_key: self.public_key,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeletedPendingRow {
    membership_id: Uuid,
    user_id: Uuid,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    group_id: Uuid,
    org_id: Uuid,
    group_name: String,
    group_slug: String,
    group_role: String,
    group_role_id: Option<Uuid>,
}

impl DeletedPendingRow {
    fn into_removed(self, deleted_at: DateTime<Utc>) -> RemovedPendingMembership {
        RemovedPendingMembership {
            membership_id: self.membership_id,
            user: RemovedUser {
                id: self.user_id,
                username: self.username,
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
            },
            group: RemovedGroup {
                id: self.group_id,
                org_id: self.org_id,
                name: self.group_name,
                slug: self.group_slug,
                role: self.group_role,
                role_id: self.group_role_id,
                created_at: deleted_at,
                updated_at: deleted_at,
            },
        }
    }
}

/// Membership reconciliation engine over a shared PostgreSQL store
#[derive(Debug, Clone)]
pub struct MembershipReconciler {
    pool: PgPool,
}

impl MembershipReconciler {
    /// Creates a reconciler backed by the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the candidate projects the user can reach through some path
    /// other than `excluded_group_id`
    ///
    /// A project qualifies if the user has a direct membership, or belongs to
    /// any group granted into it other than the excluded one
    /// (`excluded_group_id = None` excludes nothing). Used to check whether
    /// removing a user from one group would strand them: projects still in
    /// the result have another path in.
    ///
    /// Pending group memberships are **not** filtered out here — any
    /// membership row counts as a path. `find_group_members_not_in_project`
    /// is the operation that applies pending/ghost filtering.
    ///
    /// An empty candidate list returns an empty set without touching the
    /// store. A project reachable both directly and via a group appears once.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` if any query fails.
    pub async fn filter_projects_by_user_membership(
        &self,
        tx: Option<&mut Transaction<'_, Postgres>>,
        user_id: Uuid,
        excluded_group_id: Option<Uuid>,
        candidate_project_ids: &[Uuid],
    ) -> MembershipResult<HashSet<Uuid>> {
        if candidate_project_ids.is_empty() {
            return Ok(HashSet::new());
        }

        match tx {
            Some(tx) => {
                self.filter_projects_on(&mut **tx, user_id, excluded_group_id, candidate_project_ids)
                    .await
            }
            None => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(MembershipError::storage(OP_FILTER_PROJECTS))?;
                self.filter_projects_on(&mut conn, user_id, excluded_group_id, candidate_project_ids)
                    .await
            }
        }
    }

    async fn filter_projects_on(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        excluded_group_id: Option<Uuid>,
        candidate_project_ids: &[Uuid],
    ) -> MembershipResult<HashSet<Uuid>> {
        debug!(
            %user_id,
            excluded_group_id = ?excluded_group_id,
            candidates = candidate_project_ids.len(),
            "Filtering candidate projects by user membership"
        );

        let direct: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT project_id
            FROM project_memberships
            WHERE user_id = $1 AND project_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(candidate_project_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_FILTER_PROJECTS))?;

        let via_groups: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT gpm.project_id
            FROM user_group_memberships ugm
            JOIN group_project_memberships gpm ON gpm.group_id = ugm.group_id
            WHERE ugm.user_id = $1
              AND gpm.project_id = ANY($2)
              AND ($3::uuid IS NULL OR ugm.group_id <> $3)
            "#,
        )
        .bind(user_id)
        .bind(candidate_project_ids)
        .bind(excluded_group_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_FILTER_PROJECTS))?;

        Ok(direct.into_iter().chain(via_groups).collect())
    }

    /// Resolves usernames to user IDs, restricted to users reachable into
    /// `project_id` via any group
    ///
    /// Join path: user_group_memberships → group_project_memberships
    /// (filtered to the project) → users (filtered to the usernames). Used to
    /// validate that named users are already in scope before an operation
    /// that requires it.
    ///
    /// No pending or ghost filtering is applied: a pending invitee whose
    /// group is granted into the project resolves like any other member.
    /// Callers needing accepted-members-only semantics must filter further.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` if the query fails.
    pub async fn find_user_ids_of_group_members_in_project(
        &self,
        tx: Option<&mut Transaction<'_, Postgres>>,
        usernames: &[String],
        project_id: Uuid,
    ) -> MembershipResult<Vec<Uuid>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        match tx {
            Some(tx) => {
                self.find_member_ids_on(&mut **tx, usernames, project_id)
                    .await
            }
            None => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(MembershipError::storage(OP_FIND_MEMBER_IDS))?;
                self.find_member_ids_on(&mut conn, usernames, project_id)
                    .await
            }
        }
    }

    async fn find_member_ids_on(
        &self,
        conn: &mut PgConnection,
        usernames: &[String],
        project_id: Uuid,
    ) -> MembershipResult<Vec<Uuid>> {
        debug!(
            %project_id,
            usernames = usernames.len(),
            "Resolving usernames to group members of project"
        );

        let user_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT u.id
            FROM user_group_memberships ugm
            JOIN group_project_memberships gpm
                ON gpm.group_id = ugm.group_id AND gpm.project_id = $1
            JOIN users u ON u.id = ugm.user_id
            WHERE u.username = ANY($2)
            "#,
        )
        .bind(project_id)
        .bind(usernames)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_FIND_MEMBER_IDS))?;

        Ok(user_ids)
    }

    /// Lists the accepted, non-ghost members of `group_id` that granting the
    /// group into `project_id` would newly cover
    ///
    /// A member is excluded if they already have a direct membership in the
    /// project, or are reachable into it via a different group already
    /// granted there — adding them again would create duplicate memberships.
    /// Pending invitees and ghost users never appear.
    ///
    /// Three phases: materialize the other groups granted into the project;
    /// select the group's accepted members without a direct membership (with
    /// the encryption key left-joined in); drop members belonging to any of
    /// the other groups.
    ///
    /// Result ordering is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` if any query fails.
    pub async fn find_group_members_not_in_project(
        &self,
        tx: Option<&mut Transaction<'_, Postgres>>,
        group_id: Uuid,
        project_id: Uuid,
    ) -> MembershipResult<Vec<GroupMemberCandidate>> {
        match tx {
            Some(tx) => {
                self.find_members_not_in_project_on(&mut **tx, group_id, project_id)
                    .await
            }
            None => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(MembershipError::storage(OP_FIND_MEMBERS_NOT_IN_PROJECT))?;
                self.find_members_not_in_project_on(&mut conn, group_id, project_id)
                    .await
            }
        }
    }

    async fn find_members_not_in_project_on(
        &self,
        conn: &mut PgConnection,
        group_id: Uuid,
        project_id: Uuid,
    ) -> MembershipResult<Vec<GroupMemberCandidate>> {
        debug!(%group_id, %project_id, "Finding group members not yet in project");

        // Phase 1: other groups already granted into the project
        let other_group_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT group_id
            FROM group_project_memberships
            WHERE project_id = $1 AND group_id <> $2
            "#,
        )
        .bind(project_id)
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_FIND_MEMBERS_NOT_IN_PROJECT))?;

        // Phase 2: accepted, non-ghost members with no direct membership
        let rows: Vec<GroupMemberRow> = sqlx::query_as(
            r#"
            SELECT ugm.id AS membership_id, ugm.group_id, ugm.created_at, ugm.updated_at,
                   u.id AS user_id, u.username, u.email, u.first_name, u.last_name,
                   uek.public_key
            FROM user_group_memberships ugm
            JOIN users u ON u.id = ugm.user_id AND u.is_ghost = FALSE
            LEFT JOIN user_encryption_keys uek ON uek.user_id = u.id
            LEFT JOIN project_memberships pm
                ON pm.user_id = ugm.user_id AND pm.project_id = $2
            WHERE ugm.group_id = $1
              AND ugm.is_pending = FALSE
              AND pm.id IS NULL
            "#,
        )
        .bind(group_id)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_FIND_MEMBERS_NOT_IN_PROJECT))?;

        // Phase 3: drop members already covered by one of the other groups
        let covered_user_ids: HashSet<Uuid> = if other_group_ids.is_empty() {
            HashSet::new()
        } else {
            sqlx::query_scalar::<_, Uuid>(
                r#"
                SELECT DISTINCT user_id
                FROM user_group_memberships
                WHERE group_id = ANY($1)
                "#,
            )
            .bind(other_group_ids.as_slice())
            .fetch_all(&mut *conn)
            .await
            .map_err(MembershipError::storage(OP_FIND_MEMBERS_NOT_IN_PROJECT))?
            .into_iter()
            .collect()
        };

        Ok(rows
            .into_iter()
            .filter(|row| !covered_user_ids.contains(&row.user_id))
            .map(GroupMemberRow::into_candidate)
            .collect())
    }

    /// Deletes all group memberships of the given users and reports the
    /// pending invitations among them
    ///
    /// **Contract note**: the delete is broader than the report. Every
    /// `user_group_memberships` row of the given users is removed — pending
    /// *and* accepted — but the returned pairs cover only the rows that were
    /// pending at deletion time. This asymmetry matches observed caller
    /// expectations (account deletion and invite revocation both want the
    /// invitations for notification purposes while tearing down everything);
    /// callers that need the accepted memberships reported must snapshot them
    /// separately before calling.
    ///
    /// Implemented as a single data-modifying CTE, so the snapshot and the
    /// delete are one atomic statement even without a caller-supplied
    /// transaction. Passing a transaction still composes the delete with
    /// surrounding work.
    ///
    /// The returned group's `created_at`/`updated_at` are synthesized as the
    /// deletion time, not the group's real timestamps.
    ///
    /// Not safe to blindly retry: a second call returns an empty report.
    ///
    /// # Errors
    ///
    /// Returns `StorageOperationFailed` if the statement fails.
    pub async fn delete_pending_memberships_by_user_ids(
        &self,
        tx: Option<&mut Transaction<'_, Postgres>>,
        user_ids: &[Uuid],
    ) -> MembershipResult<Vec<RemovedPendingMembership>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        match tx {
            Some(tx) => self.delete_pending_on(&mut **tx, user_ids).await,
            None => {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err(MembershipError::storage(OP_DELETE_PENDING))?;
                self.delete_pending_on(&mut conn, user_ids).await
            }
        }
    }

    async fn delete_pending_on(
        &self,
        conn: &mut PgConnection,
        user_ids: &[Uuid],
    ) -> MembershipResult<Vec<RemovedPendingMembership>> {
        debug!(users = user_ids.len(), "Deleting group memberships for users");

        let rows: Vec<DeletedPendingRow> = sqlx::query_as(
            r#"
            WITH deleted AS (
                DELETE FROM user_group_memberships
                WHERE user_id = ANY($1)
                RETURNING id, user_id, group_id, is_pending
            )
            SELECT d.id AS membership_id,
                   u.id AS user_id, u.username, u.email, u.first_name, u.last_name,
                   g.id AS group_id, g.org_id, g.name AS group_name,
                   g.slug AS group_slug, g.role AS group_role, g.role_id AS group_role_id
            FROM deleted d
            JOIN users u ON u.id = d.user_id
            JOIN groups g ON g.id = d.group_id
            WHERE d.is_pending = TRUE
            "#,
        )
        .bind(user_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(MembershipError::storage(OP_DELETE_PENDING))?;

        let deleted_at = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| row.into_removed(deleted_at))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_member_row(user_id: Uuid) -> GroupMemberRow {
        GroupMemberRow {
            membership_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user_id,
            username: "mira".to_string(),
            email: "mira@example.com".to_string(),
            first_name: Some("Mira".to_string()),
            last_name: None,
            public_key: None,
        }
    }

    #[test]
    fn test_member_row_maps_to_nested_candidate() {
        let user_id = Uuid::new_v4();
        let row = sample_member_row(user_id);
        let membership_id = row.membership_id;

        let candidate = row.into_candidate();
        assert_eq!(candidate.membership_id, membership_id);
        assert_eq!(candidate.user.id, user_id);
        assert_eq!(candidate.user.username, "mira");
        assert!(candidate.user.public_key.is_none());
    }

    #[test]
    fn test_removed_group_timestamps_are_deletion_time() {
        let row = DeletedPendingRow {
            membership_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: "odin".to_string(),
            email: "odin@example.com".to_string(),
            first_name: None,
            last_name: None,
            group_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            group_name: "platform".to_string(),
            group_slug: "platform".to_string(),
            group_role: "member".to_string(),
            group_role_id: None,
        };

        let deleted_at = Utc::now();
        let removed = row.into_removed(deleted_at);
        assert_eq!(removed.group.created_at, deleted_at);
        assert_eq!(removed.group.updated_at, deleted_at);
        assert_eq!(removed.group.slug, "platform");
    }
}
