/// Database models for the Vaultkeep membership layer
///
/// Each model owns the CRUD operations for its table, written as static
/// methods taking a connection pool, in the same shape throughout.
///
/// # Models
///
/// - `user`: User accounts and their optional encryption public keys
/// - `group`: Org-level groups with a default project role
/// - `group_membership`: User-group join rows (pending until accepted)
/// - `project`: Projects that memberships grant access to
/// - `project_membership`: Direct user-project and group-project grants
///
/// Cross-relation set algebra (effective access, redundancy exclusion) lives
/// in the `reconcile` module, not here.

pub mod group;
pub mod group_membership;
pub mod project;
pub mod project_membership;
pub mod user;

pub use group::Group;
pub use group_membership::UserGroupMembership;
pub use project::Project;
pub use project_membership::{GroupProjectMembership, ProjectMembership};
pub use user::User;
