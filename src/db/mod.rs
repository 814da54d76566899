use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::DbError;

pub mod graph;
pub mod retry;
pub mod sql;

pub use graph::GraphClient;
pub use sql::SqlClient;

/// A relational query with positional (`?`) bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub text: &'static str,
    pub params: Vec<i64>,
}

/// A Cypher query with named (`$name`) bindings. `columns` lists the names
/// the query returns, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQuery {
    pub text: &'static str,
    pub params: Vec<(&'static str, i64)>,
    pub columns: &'static [&'static str],
}

/// Runs a relational query and returns every row as a JSON object.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch_rows(&self, query: &SqlQuery) -> Result<Vec<Value>, DbError>;
}

/// Runs a graph query and returns every record as a JSON object.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn fetch_rows(&self, query: &GraphQuery) -> Result<Vec<Value>, DbError>;
}
