//! Pipestore - data access for pipeline records
//!
//! This library provides:
//! - Database connection, configuration and migrations
//! - Data models for pipelines and the projects that own them
//! - A pipeline store with create, list and get-by-id operations backed by
//!   SQLite and a write-through cache
//! - Per-operation cancellation and deadlines
//! - The `pipestore` command-line front end
//!
//! # Example
//!
//! ```
//! use pipestore::cache::InMemoryPipelineCache;
//! use pipestore::context::OpContext;
//! use pipestore::db::DbConnection;
//! use pipestore::models::{PipelineCreate, PipelineFind};
//! use pipestore::repo::{PipelineStore, ProjectRepo};
//!
//! let conn = DbConnection::connect_in_memory().unwrap();
//! ProjectRepo::create(&conn, "proj-a", "Project A").unwrap();
//! let store = PipelineStore::new(conn, InMemoryPipelineCache::new());
//!
//! let ctx = OpContext::new();
//! store.create(&ctx, &PipelineCreate::new("proj-a", "build"), 1).unwrap();
//! store.create(&ctx, &PipelineCreate::new("proj-a", "deploy"), 1).unwrap();
//!
//! let newest = store.list(&ctx, &PipelineFind::default().with_limit(1)).unwrap();
//! assert_eq!(newest[0].name, "deploy");
//! ```

pub mod cache;
pub mod cli;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repo;

pub use error::{ErrorCode, StoreError};
