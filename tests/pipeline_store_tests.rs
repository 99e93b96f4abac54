// Pipeline store tests
// Exercise create / list / get_by_id against a real SQLite database

use pipestore::cache::{InMemoryPipelineCache, PipelineCache};
use pipestore::context::OpContext;
use pipestore::db::DbConnection;
use pipestore::models::{PipelineCreate, PipelineFind};
use pipestore::repo::{PipelineStore, ProjectRepo};
use pipestore::{ErrorCode, StoreError};
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

type Store = PipelineStore<Arc<InMemoryPipelineCache>>;

/// Store over a fresh in-memory database with the given projects
fn store_with_projects(resource_ids: &[&str]) -> (Store, Arc<InMemoryPipelineCache>) {
    let conn = DbConnection::connect_in_memory().unwrap();
    for resource_id in resource_ids {
        ProjectRepo::create(&conn, resource_id, &format!("Project {}", resource_id)).unwrap();
    }
    let cache = Arc::new(InMemoryPipelineCache::new());
    (PipelineStore::new(conn, Arc::clone(&cache)), cache)
}

fn ids(store: &Store, find: &PipelineFind) -> Vec<i64> {
    store.list(&OpContext::new(), find).unwrap().into_iter().map(|p| p.id).collect()
}

fn pipeline_count(store: &Store) -> i64 {
    store.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM pipeline", [], |row| row.get(0))
            .unwrap()
    })
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn test_create_scenario_then_get_from_cache() {
    let (store, cache) = store_with_projects(&["proj-a"]);

    let created = store
        .create(&OpContext::new(), &PipelineCreate::new("proj-a", "deploy-v1"), 7)
        .unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.project_id, "proj-a");
    assert_eq!(created.name, "deploy-v1");
    assert_eq!(created.creator_uid, 7);
    assert_eq!(created.updater_uid, 7);
    assert_eq!(created.updated_ts, created.created_ts);
    assert_eq!(cache.len(), 1);

    let fetched = store.get_by_id(&OpContext::new(), 1).unwrap();
    assert_eq!(fetched, Some(created));
}

#[test]
fn test_created_ids_are_distinct() {
    let (store, _cache) = store_with_projects(&["proj-a", "proj-b"]);

    let mut seen = HashSet::new();
    for i in 0..10 {
        let project = if i % 2 == 0 { "proj-a" } else { "proj-b" };
        let created = store
            .create(&OpContext::new(), &PipelineCreate::new(project, format!("p{}", i)), 1)
            .unwrap();
        assert!(seen.insert(created.id), "duplicate id {}", created.id);
    }
    assert_eq!(seen.len(), 10);
}

#[test]
fn test_concurrent_creates_get_distinct_ids() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..5)
                    .map(|n| {
                        store
                            .create(&OpContext::new(), &PipelineCreate::new("proj-a", format!("w{}-{}", worker, n)), worker)
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all_ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(all_ids.insert(id));
        }
    }
    assert_eq!(all_ids.len(), 40);
    assert_eq!(cache.len(), 40);
    assert_eq!(pipeline_count(&store), 40);
}

#[test]
fn test_create_missing_project_rolls_back() {
    let (store, cache) = store_with_projects(&["proj-a"]);

    let err = store
        .create(&OpContext::new(), &PipelineCreate::new("proj-ghost", "deploy"), 7)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::EmptyRow);
    match &err {
        StoreError::EmptyRow { query } => {
            assert!(query.contains("INSERT INTO pipeline"));
            assert!(query.contains("RETURNING id, created_ts"));
        }
        other => panic!("expected EmptyRow, got {:?}", other),
    }
    assert_eq!(pipeline_count(&store), 0);
    assert!(cache.is_empty());
    assert!(store.with_conn(|conn| conn.is_autocommit()));
}

#[test]
fn test_create_database_error_passes_through() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    store.with_conn(|conn| conn.execute_batch("DROP TABLE pipeline").unwrap());

    let err = store
        .create(&OpContext::new(), &PipelineCreate::new("proj-a", "deploy"), 7)
        .unwrap_err();

    assert!(matches!(err, StoreError::Database(_)), "got {:?}", err);
    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(cache.is_empty());
}

// ============================================================================
// List
// ============================================================================

#[test]
fn test_list_all_newest_first() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    for name in ["first", "second", "third"] {
        store.create(&OpContext::new(), &PipelineCreate::new("proj-a", name), 1).unwrap();
    }

    assert_eq!(ids(&store, &PipelineFind::default()), vec![3, 2, 1]);
}

#[test]
fn test_list_empty_table() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    assert!(store.list(&OpContext::new(), &PipelineFind::default()).unwrap().is_empty());
    assert!(cache.is_empty());
}

#[test]
fn test_list_pagination() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    for name in ["first", "second", "third"] {
        store.create(&OpContext::new(), &PipelineCreate::new("proj-a", name), 1).unwrap();
    }

    let page = PipelineFind::default().with_limit(1).with_offset(1);
    assert_eq!(ids(&store, &page), vec![2]);

    assert_eq!(ids(&store, &PipelineFind::default().with_limit(2)), vec![3, 2]);
    assert_eq!(ids(&store, &PipelineFind::default().with_offset(2)), vec![1]);
    assert!(ids(&store, &PipelineFind::default().with_offset(5)).is_empty());
}

#[test]
fn test_list_filters_are_conjunctive() {
    let (store, _cache) = store_with_projects(&["proj-a", "proj-b"]);
    store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "a1"), 1).unwrap(); // 1
    store.create(&OpContext::new(), &PipelineCreate::new("proj-b", "b1"), 1).unwrap(); // 2
    store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "a2"), 1).unwrap(); // 3

    assert_eq!(ids(&store, &PipelineFind::default().with_project_id("proj-a")), vec![3, 1]);
    assert_eq!(ids(&store, &PipelineFind::default().with_project_id("proj-b")), vec![2]);
    assert_eq!(ids(&store, &PipelineFind::default().with_id(2)), vec![2]);

    let both = PipelineFind::default().with_id(3).with_project_id("proj-a");
    assert_eq!(ids(&store, &both), vec![3]);

    let mismatched = PipelineFind::default().with_id(2).with_project_id("proj-a");
    assert!(ids(&store, &mismatched).is_empty());
}

#[test]
fn test_list_resolves_project_resource_id() {
    let (store, _cache) = store_with_projects(&["proj-a", "proj-b"]);
    store.create(&OpContext::new(), &PipelineCreate::new("proj-b", "b1"), 3).unwrap();

    let listed = store.list(&OpContext::new(), &PipelineFind::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].project_id, "proj-b");
    assert_eq!(listed[0].creator_uid, 3);
    assert_eq!(listed[0].updater_uid, 3);
}

#[test]
fn test_list_filter_value_is_not_sql() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "a1"), 1).unwrap();

    let find = PipelineFind::default().with_project_id("x' OR '1'='1");
    assert!(store.list(&OpContext::new(), &find).unwrap().is_empty());
}

#[test]
fn test_list_refreshes_cache() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    let created = store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "before"), 1).unwrap();

    // Change the row behind the store's back
    store.with_conn(|conn| {
        conn.execute("UPDATE pipeline SET name = 'after' WHERE id = ?1", [created.id])
            .unwrap()
    });
    assert_eq!(cache.get(created.id).unwrap().name, "before");

    let listed = store.list(&OpContext::new(), &PipelineFind::default()).unwrap();
    assert_eq!(listed[0].name, "after");
    assert_eq!(cache.get(created.id).unwrap().name, "after");
}

#[test]
fn test_list_failure_returns_error_and_keeps_cache() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    store.with_conn(|conn| conn.execute_batch("DROP TABLE project").unwrap());

    let err = store.list(&OpContext::new(), &PipelineFind::default()).unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
    assert!(cache.is_empty());
}

// ============================================================================
// Get by id
// ============================================================================

#[test]
fn test_get_by_id_not_found_is_none() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "a1"), 1).unwrap();

    assert_eq!(store.get_by_id(&OpContext::new(), 42).unwrap(), None);
}

#[test]
fn test_get_by_id_cache_miss_reads_database() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    store.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipeline (project_id, creator_id, updater_id, name) VALUES (1, 9, 9, 'direct')",
            [],
        )
        .unwrap()
    });

    let fetched = store.get_by_id(&OpContext::new(), 1).unwrap().unwrap();
    assert_eq!(fetched.name, "direct");
    assert_eq!(fetched.project_id, "proj-a");
    assert_eq!(store.cache().get(1), Some(fetched));
}

#[test]
fn test_cached_reads_survive_broken_database() {
    let (store, _cache) = store_with_projects(&["proj-a"]);
    let created = store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "created"), 1).unwrap();
    store.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipeline (project_id, creator_id, updater_id, name) VALUES (1, 2, 2, 'listed')",
            [],
        )
        .unwrap()
    });
    let listed = store.list(&OpContext::new(), &PipelineFind::default().with_id(2)).unwrap();

    store.with_conn(|conn| {
        conn.execute_batch("DROP TABLE pipeline; DROP TABLE project;")
            .unwrap()
    });
    assert!(store.list(&OpContext::new(), &PipelineFind::default()).is_err());

    assert_eq!(store.get_by_id(&OpContext::new(), created.id).unwrap(), Some(created));
    assert_eq!(store.get_by_id(&OpContext::new(), 2).unwrap().as_ref(), listed.first());
}

#[test]
fn test_get_by_id_duplicate_rows_is_conflict() {
    // A pipeline table without a primary key lets two rows share an id
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE project (id INTEGER PRIMARY KEY, resource_id TEXT NOT NULL);
         CREATE TABLE pipeline (
             id INTEGER,
             project_id INTEGER,
             creator_id INTEGER,
             updater_id INTEGER,
             created_ts INTEGER,
             updated_ts INTEGER,
             name TEXT
         );
         INSERT INTO project (id, resource_id) VALUES (1, 'proj-a');
         INSERT INTO pipeline VALUES (5, 1, 1, 1, 100, 100, 'one');
         INSERT INTO pipeline VALUES (5, 1, 2, 2, 200, 200, 'two');",
    )
    .unwrap();
    let store = PipelineStore::new(conn, InMemoryPipelineCache::new());

    let err = store.get_by_id(&OpContext::new(), 5).unwrap_err();
    match err {
        StoreError::Conflict { id, count } => {
            assert_eq!(id, 5);
            assert_eq!(count, 2);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(StoreError::Conflict { id: 5, count: 2 }.code(), ErrorCode::Conflict);

    // Neither duplicate was cached, so asking again still reports the conflict
    assert!(store.cache().is_empty());
    let again = store.get_by_id(&OpContext::new(), 5).unwrap_err();
    assert_eq!(again.code(), ErrorCode::Conflict);
}

#[test]
fn test_list_caches_unique_rows_next_to_duplicates() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE project (id INTEGER PRIMARY KEY, resource_id TEXT NOT NULL);
         CREATE TABLE pipeline (
             id INTEGER,
             project_id INTEGER,
             creator_id INTEGER,
             updater_id INTEGER,
             created_ts INTEGER,
             updated_ts INTEGER,
             name TEXT
         );
         INSERT INTO project (id, resource_id) VALUES (1, 'proj-a');
         INSERT INTO pipeline VALUES (5, 1, 1, 1, 100, 100, 'one');
         INSERT INTO pipeline VALUES (5, 1, 2, 2, 200, 200, 'two');
         INSERT INTO pipeline VALUES (6, 1, 3, 3, 300, 300, 'three');",
    )
    .unwrap();
    let store = PipelineStore::new(conn, InMemoryPipelineCache::new());

    let listed = store.list(&OpContext::new(), &PipelineFind::default()).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(store.cache().len(), 1);
    assert_eq!(store.cache().get(6).unwrap().name, "three");
    assert!(store.cache().get(5).is_none());
}

#[test]
fn test_on_disk_store_reopens_with_data() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut config = pipestore::db::DbConfig::with_home(temp_dir.path());
    config.data_location = temp_dir.path().join("pipelines.db");

    let created = {
        let store = PipelineStore::open(&config, InMemoryPipelineCache::new()).unwrap();
        store.with_conn(|conn| ProjectRepo::create(conn, "proj-a", "A").unwrap());
        store.create(&OpContext::new(), &PipelineCreate::new("proj-a", "persisted"), 4).unwrap()
    };

    let reopened = PipelineStore::open(&config, InMemoryPipelineCache::new()).unwrap();
    assert!(reopened.cache().is_empty());
    assert_eq!(reopened.get_by_id(&OpContext::new(), created.id).unwrap(), Some(created));
}

// ============================================================================
// Cancellation
// ============================================================================

/// Store whose pipeline table holds `rows` pipelines of one project
fn store_with_many_pipelines(rows: i64) -> (Store, Arc<InMemoryPipelineCache>) {
    let (store, cache) = store_with_projects(&["proj-a"]);
    store.with_conn(|conn| {
        conn.execute(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < ?1)
             INSERT INTO pipeline (project_id, creator_id, updater_id, name)
             SELECT 1, 1, 1, 'bulk-' || x FROM n",
            [rows],
        )
        .unwrap()
    });
    (store, cache)
}

fn assert_interrupted(err: &StoreError) {
    match err {
        StoreError::Database(err) => assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::OperationInterrupted),
            "got {:?}",
            err
        ),
        other => panic!("expected interrupted database error, got {:?}", other),
    }
    assert_eq!(err.code(), ErrorCode::Internal);
}

#[test]
fn test_cancel_running_list() {
    let (store, cache) = store_with_many_pipelines(1_000_000);
    let store = Arc::new(store);
    let ctx = OpContext::new();

    let listing = {
        let store = Arc::clone(&store);
        let ctx = ctx.clone();
        thread::spawn(move || store.list(&ctx, &PipelineFind::default()))
    };
    thread::sleep(Duration::from_millis(50));
    ctx.cancel();

    let err = listing.join().unwrap().unwrap_err();
    assert_interrupted(&err);
    assert!(cache.is_empty());

    let (autocommit, query_only) = store.with_conn(|conn| {
        let query_only: i64 = conn.query_row("PRAGMA query_only", [], |row| row.get(0)).unwrap();
        (conn.is_autocommit(), query_only)
    });
    assert!(autocommit);
    assert_eq!(query_only, 0);

    // Other operations are unaffected by the cancelled context
    let newest = store
        .list(&OpContext::new(), &PipelineFind::default().with_limit(1))
        .unwrap();
    assert_eq!(newest[0].id, 1_000_000);
    store
        .create(&OpContext::new(), &PipelineCreate::new("proj-a", "after-cancel"), 1)
        .unwrap();
}

#[test]
fn test_deadline_stops_running_list() {
    let (store, cache) = store_with_many_pipelines(1_000_000);

    let ctx = OpContext::with_timeout(Duration::from_millis(20));
    let err = store.list(&ctx, &PipelineFind::default()).unwrap_err();

    assert_interrupted(&err);
    assert!(cache.is_empty());
    assert!(store.with_conn(|conn| conn.is_autocommit()));
}

#[test]
fn test_deadline_applies_while_waiting_for_connection() {
    let (store, cache) = store_with_projects(&["proj-a"]);
    let store = Arc::new(store);

    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            store.with_conn(|_conn| {
                locked_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(300));
            })
        })
    };
    locked_rx.recv().unwrap();

    let ctx = OpContext::with_timeout(Duration::from_millis(50));
    let err = store
        .create(&ctx, &PipelineCreate::new("proj-a", "late"), 1)
        .unwrap_err();
    assert_interrupted(&err);

    holder.join().unwrap();
    assert!(cache.is_empty());
    assert_eq!(pipeline_count(&store), 0);
}
