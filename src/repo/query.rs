//! SQL construction for pipeline lookups.
//!
//! Predicate text is fixed by this module; every filter value travels as a
//! bound positional parameter. Only `LIMIT`/`OFFSET` are written into the SQL
//! text, and those come from integer fields of [`PipelineFind`].

use rusqlite::types::Value;
use crate::models::PipelineFind;

const SELECT_PIPELINES: &str = "SELECT
            pipeline.id,
            pipeline.creator_id,
            pipeline.created_ts,
            pipeline.updater_id,
            pipeline.updated_ts,
            project.resource_id,
            pipeline.name
        FROM pipeline
        LEFT JOIN project ON pipeline.project_id = project.id";

/// A statement plus the values bound to its `?N` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Accumulates `AND`-joined equality predicates with numbered placeholders
#[derive(Debug)]
struct WhereClause {
    predicates: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    fn new() -> Self {
        // TRUE keeps the clause valid when no filter is present
        WhereClause {
            predicates: vec!["TRUE".to_string()],
            params: Vec::new(),
        }
    }

    fn eq(&mut self, column: &str, value: Value) {
        self.params.push(value);
        self.predicates
            .push(format!("{} = ?{}", column, self.params.len()));
    }

    fn render(&self) -> String {
        self.predicates.join(" AND ")
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Build the list statement for a filter, newest pipeline first
pub fn build_list_query(find: &PipelineFind) -> BoundQuery {
    let mut where_clause = WhereClause::new();
    if let Some(id) = find.id {
        where_clause.eq("pipeline.id", Value::Integer(id));
    }
    if let Some(project_id) = &find.project_id {
        where_clause.eq("project.resource_id", Value::Text(project_id.clone()));
    }

    let mut sql = format!(
        "{}\n        WHERE {}\n        ORDER BY pipeline.id DESC",
        SELECT_PIPELINES,
        where_clause.render()
    );
    match (find.limit, find.offset) {
        (Some(limit), Some(offset)) => {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", clamp(limit), clamp(offset)));
        }
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", clamp(limit))),
        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", clamp(offset))),
        (None, None) => {}
    }

    BoundQuery {
        sql,
        params: where_clause.params,
    }
}
