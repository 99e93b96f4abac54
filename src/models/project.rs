use serde::{Deserialize, Serialize};

/// Project model
/// Pipelines reference a project by its `resource_id`; `id` is the internal key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub resource_id: String,
    pub title: String,
    pub created_ts: i64,
}
