/// Project model and database operations
///
/// Projects are the unit of access the membership relations grant into.
/// Secret storage inside a project lives elsewhere; this layer only tracks
/// who can reach the project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Project record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique project ID
    pub id: Uuid,

    /// Owning organization
    pub org_id: Uuid,

    /// Display name
    pub name: String,

    /// When the project was created
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Creates a new project
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn create(pool: &PgPool, org_id: Uuid, name: &str) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (org_id, name)
            VALUES ($1, $2)
            RETURNING id, org_id, name, created_at
            "#,
        )
        .bind(org_id)
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Finds a project by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, org_id, name, created_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }
}
