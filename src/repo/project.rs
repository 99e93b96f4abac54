use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::Project;
use anyhow::{Context, Result};

/// Project repository for database operations
///
/// Projects are the owners pipelines point at. Callers address them by
/// `resource_id`, a stable human-facing key such as `proj-a`; the numeric
/// `id` stays internal to the database.
///
/// # Example
///
/// ```
/// use pipestore::db::DbConnection;
/// use pipestore::repo::ProjectRepo;
///
/// let conn = DbConnection::connect_in_memory().unwrap();
/// let project = ProjectRepo::create(&conn, "proj-a", "Project A").unwrap();
/// assert_eq!(project.resource_id, "proj-a");
/// ```
pub struct ProjectRepo;

impl ProjectRepo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            resource_id: row.get(1)?,
            title: row.get(2)?,
            created_ts: row.get(3)?,
        })
    }

    /// Create a new project
    pub fn create(conn: &Connection, resource_id: &str, title: &str) -> Result<Project> {
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO project (resource_id, title, created_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![resource_id, title, now],
        )
        .with_context(|| format!("Failed to create project: {}", resource_id))?;

        Ok(Project {
            id: conn.last_insert_rowid(),
            resource_id: resource_id.to_string(),
            title: title.to_string(),
            created_ts: now,
        })
    }

    /// Get project by resource id
    pub fn get_by_resource_id(conn: &Connection, resource_id: &str) -> Result<Option<Project>> {
        let project = conn
            .query_row(
                "SELECT id, resource_id, title, created_ts FROM project WHERE resource_id = ?1",
                [resource_id],
                Self::from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// List all projects ordered by resource id
    pub fn list(conn: &Connection) -> Result<Vec<Project>> {
        let mut stmt = conn.prepare(
            "SELECT id, resource_id, title, created_ts FROM project ORDER BY resource_id",
        )?;
        let rows = stmt.query_map([], Self::from_row)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }
}
