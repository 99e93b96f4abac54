use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;
use crate::cache::PipelineCache;
use crate::context::OpContext;
use crate::db::{DbConfig, DbConnection};
use crate::error::StoreError;
use crate::models::{Pipeline, PipelineCreate, PipelineFind};
use crate::repo::query::build_list_query;

/// Inserts a pipeline, resolving the project resource id inside the statement.
/// The SELECT form yields no row (and inserts nothing) when the project does
/// not exist.
const INSERT_PIPELINE: &str = "
        INSERT INTO pipeline (
            project_id,
            creator_id,
            updater_id,
            name
        )
        SELECT project.id, ?2, ?3, ?4
        FROM project
        WHERE project.resource_id = ?1
        RETURNING id, created_ts
    ";

/// VM instructions between cancellation checks inside a statement
const PROGRESS_OPS: i32 = 1_000;

/// How often a caller waiting for the connection rechecks its context
const LOCK_POLL: Duration = Duration::from_millis(1);

/// Pipeline store: create and query pipelines with a write-through cache
///
/// The store owns a single SQLite connection behind a mutex; every operation
/// holds it for the duration of its own transaction. Share the store between
/// threads with `Arc`.
///
/// Each operation takes its own [`OpContext`]. Cancelling that context aborts
/// only that operation, whether it is still waiting for the connection or
/// already running a statement; the operation rolls back and returns
/// [`StoreError::Database`] with an interrupt error.
///
/// Every pipeline returned by [`create`](Self::create) or
/// [`list`](Self::list) is written into the cache, and
/// [`get_by_id`](Self::get_by_id) serves cache hits without touching the
/// database.
///
/// # Example
///
/// ```
/// use pipestore::cache::InMemoryPipelineCache;
/// use pipestore::context::OpContext;
/// use pipestore::db::DbConnection;
/// use pipestore::models::PipelineCreate;
/// use pipestore::repo::{PipelineStore, ProjectRepo};
///
/// let conn = DbConnection::connect_in_memory().unwrap();
/// ProjectRepo::create(&conn, "proj-a", "Project A").unwrap();
///
/// let store = PipelineStore::new(conn, InMemoryPipelineCache::new());
/// let ctx = OpContext::new();
/// let created = store
///     .create(&ctx, &PipelineCreate::new("proj-a", "deploy-v1"), 7)
///     .unwrap();
/// let fetched = store.get_by_id(&ctx, created.id).unwrap();
/// assert_eq!(fetched, Some(created));
/// ```
pub struct PipelineStore<C: PipelineCache> {
    conn: Mutex<Connection>,
    cache: C,
}

impl<C: PipelineCache> PipelineStore<C> {
    /// Wrap an open connection. The schema must already exist.
    pub fn new(conn: Connection, cache: C) -> Self {
        PipelineStore {
            conn: Mutex::new(conn),
            cache,
        }
    }

    /// Open (and migrate) the database described by `config`
    pub fn open(config: &DbConfig, cache: C) -> anyhow::Result<Self> {
        let conn = DbConnection::connect_with(config)?;
        Ok(Self::new(conn, cache))
    }

    /// Run `f` with the underlying connection locked, e.g. to manage projects.
    ///
    /// Calling back into this store's operations from inside `f` deadlocks:
    /// the connection lock is not reentrant.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        // transactions roll back on drop, so a poisoned lock is still usable
        let conn = self.conn.lock().unwrap_or_else(|err| err.into_inner());
        f(&conn)
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Wait for the connection until it is free or `ctx` is done
    fn lock(&self, ctx: &OpContext) -> Result<MutexGuard<'_, Connection>, StoreError> {
        loop {
            if ctx.is_done() {
                return Err(ctx.interrupted("cancelled while waiting for the connection").into());
            }
            match self.conn.try_lock() {
                Ok(conn) => return Ok(conn),
                Err(TryLockError::Poisoned(err)) => return Ok(err.into_inner()),
                Err(TryLockError::WouldBlock) => thread::sleep(LOCK_POLL),
            }
        }
    }

    /// Create a pipeline owned by `create.project_id`.
    ///
    /// Fails with [`StoreError::EmptyRow`] when no project has that resource
    /// id; nothing is written in that case.
    pub fn create(
        &self,
        ctx: &OpContext,
        create: &PipelineCreate,
        creator_id: i64,
    ) -> Result<Pipeline, StoreError> {
        let (id, created_ts) = {
            let conn = self.lock(ctx)?;
            let tx = conn.unchecked_transaction()?;
            let _progress = CancelOnProgress::install(&conn, ctx);

            let inserted = tx.query_row(
                INSERT_PIPELINE,
                params![create.project_id, creator_id, creator_id, create.name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            );
            let returned = match inserted {
                Ok(returned) => returned,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(StoreError::empty_row(INSERT_PIPELINE));
                }
                Err(err) => return Err(err.into()),
            };

            tx.commit()?;
            returned
        };

        let pipeline = Pipeline {
            id,
            project_id: create.project_id.clone(),
            name: create.name.clone(),
            creator_uid: creator_id,
            updater_uid: creator_id,
            created_ts,
            updated_ts: created_ts,
            stages: Vec::new(),
        };
        log::info!(
            "created pipeline {} '{}' in project {}",
            pipeline.id,
            pipeline.name,
            pipeline.project_id
        );

        self.cache.add(pipeline.id, pipeline.clone());
        Ok(pipeline)
    }

    /// List pipelines matching every filter present in `find`, highest id first.
    ///
    /// Returned pipelines are written into the cache, except ids that occur on
    /// more than one row.
    pub fn list(&self, ctx: &OpContext, find: &PipelineFind) -> Result<Vec<Pipeline>, StoreError> {
        let query = build_list_query(find);
        log::debug!("listing pipelines: {} {:?}", query.sql, query.params);

        let pipelines = {
            let conn = self.lock(ctx)?;
            let _read_only = QueryOnly::enable(&conn)?;
            let tx = conn.unchecked_transaction()?;
            let _progress = CancelOnProgress::install(&conn, ctx);

            let pipelines = {
                let mut stmt = tx.prepare(&query.sql)?;
                let rows = stmt.query_map(params_from_iter(query.params.iter()), pipeline_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            tx.commit()?;
            pipelines
        };

        let mut rows_per_id: HashMap<i64, usize> = HashMap::new();
        for pipeline in &pipelines {
            *rows_per_id.entry(pipeline.id).or_default() += 1;
        }
        for pipeline in &pipelines {
            if rows_per_id[&pipeline.id] == 1 {
                self.cache.add(pipeline.id, pipeline.clone());
            }
        }
        for (id, count) in rows_per_id.iter().filter(|(_, count)| **count > 1) {
            log::warn!("{} rows share pipeline id {}, not caching them", count, id);
        }

        Ok(pipelines)
    }

    /// Get a pipeline by id, consulting the cache first.
    ///
    /// Returns `Ok(None)` when no pipeline has this id, and
    /// [`StoreError::Conflict`] when more than one row does.
    pub fn get_by_id(&self, ctx: &OpContext, id: i64) -> Result<Option<Pipeline>, StoreError> {
        if let Some(pipeline) = self.cache.get(id) {
            return Ok(Some(pipeline));
        }

        let mut pipelines = self.list(ctx, &PipelineFind::default().with_id(id))?;
        match pipelines.len() {
            0 => Ok(None),
            1 => Ok(pipelines.pop()),
            count => Err(StoreError::Conflict { id, count }),
        }
    }
}

fn pipeline_from_row(row: &Row<'_>) -> rusqlite::Result<Pipeline> {
    let id: i64 = row.get(0)?;
    // NULL when the owning project row is gone
    let project_id: Option<String> = row.get(5)?;
    if project_id.is_none() {
        log::warn!("pipeline {} references a missing project", id);
    }

    Ok(Pipeline {
        id,
        creator_uid: row.get(1)?,
        created_ts: row.get(2)?,
        updater_uid: row.get(3)?,
        updated_ts: row.get(4)?,
        project_id: project_id.unwrap_or_default(),
        name: row.get(6)?,
        stages: Vec::new(),
    })
}

/// Puts the connection in `query_only` mode until dropped
struct QueryOnly<'a> {
    conn: &'a Connection,
}

impl<'a> QueryOnly<'a> {
    fn enable(conn: &'a Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "query_only", true)?;
        Ok(QueryOnly { conn })
    }
}

impl Drop for QueryOnly<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.conn.pragma_update(None, "query_only", false) {
            log::error!("failed to leave query_only mode: {}", err);
        }
    }
}

/// Interrupts running statements once the context is done; removed on drop
struct CancelOnProgress<'a> {
    conn: &'a Connection,
}

impl<'a> CancelOnProgress<'a> {
    fn install(conn: &'a Connection, ctx: &OpContext) -> Self {
        let ctx = ctx.clone();
        conn.progress_handler(PROGRESS_OPS, Some(move || ctx.is_done()));
        CancelOnProgress { conn }
    }
}

impl Drop for CancelOnProgress<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
