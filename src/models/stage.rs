use serde::{Deserialize, Serialize};

/// Stage model
/// A deployment stage belonging to a pipeline. Stages are persisted by the
/// stage subsystem; the pipeline store only carries the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i64,
    pub pipeline_id: i64,
    pub environment_id: String,
    pub name: String,
}
