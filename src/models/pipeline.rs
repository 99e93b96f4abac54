use serde::{Deserialize, Serialize};
use crate::models::Stage;

/// Pipeline model
///
/// `project_id` holds the owning project's resource id, not the numeric
/// foreign key stored in the `pipeline` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub project_id: String,
    pub name: String,
    pub creator_uid: i64,
    pub updater_uid: i64,
    pub created_ts: i64,
    pub updated_ts: i64,
    // Owned by the stage subsystem; never loaded by the pipeline store
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
}

/// Input for creating a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCreate {
    pub project_id: String,
    pub name: String,
}

impl PipelineCreate {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
        }
    }
}

/// Filter for listing pipelines
///
/// Every field is optional; absent fields add no predicate, so the default
/// filter matches all pipelines.
///
/// # Example
///
/// ```
/// use pipestore::models::PipelineFind;
///
/// let find = PipelineFind::default()
///     .with_project_id("proj-a")
///     .with_limit(10);
/// assert_eq!(find.project_id.as_deref(), Some("proj-a"));
/// assert_eq!(find.id, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineFind {
    pub id: Option<i64>,
    pub project_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PipelineFind {
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}
