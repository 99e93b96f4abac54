//! Pipeline cache abstraction.
//!
//! The store is handed a cache at construction time and writes every record
//! it creates or reads into it. The cache is trusted on reads: there is no
//! TTL and no staleness check.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::Pipeline;

/// Key-value cache of pipelines by id.
///
/// Implementations must be safe to share between threads; the store calls
/// `add` from whichever thread ran the operation.
pub trait PipelineCache: Send + Sync {
    fn get(&self, id: i64) -> Option<Pipeline>;

    /// Insert or replace the entry for `id`
    fn add(&self, id: i64, pipeline: Pipeline);
}

impl<C: PipelineCache + ?Sized> PipelineCache for Arc<C> {
    fn get(&self, id: i64) -> Option<Pipeline> {
        (**self).get(id)
    }

    fn add(&self, id: i64, pipeline: Pipeline) {
        (**self).add(id, pipeline)
    }
}

/// Unbounded in-process cache guarded by a `RwLock`
#[derive(Debug, Default)]
pub struct InMemoryPipelineCache {
    entries: RwLock<HashMap<i64, Pipeline>>,
}

impl InMemoryPipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PipelineCache for InMemoryPipelineCache {
    fn get(&self, id: i64) -> Option<Pipeline> {
        self.entries
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .get(&id)
            .cloned()
    }

    fn add(&self, id: i64, pipeline: Pipeline) {
        self.entries
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .insert(id, pipeline);
    }
}
