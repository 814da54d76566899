use crate::compare::runner::RunReport;
use crate::config::AppConfig;
use crate::db::{GraphClient, GraphExecutor, SqlClient, SqlExecutor};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sql: Arc<dyn SqlExecutor>,
    pub graph: Arc<dyn GraphExecutor>,
    /// Last comparison shown on the page. Held for the whole run, so only
    /// one comparison is in flight at a time.
    pub last_run: Arc<Mutex<Option<RunReport>>>,
}

impl AppState {
    /// Opens both connections up front; exhausting the retries is fatal.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let sql = SqlClient::new(config.sql.clone(), config.retry);
        sql.pool().await.context("connect to relational store")?;

        let graph = GraphClient::new(config.graph.clone(), config.retry);
        graph.graph().await.context("connect to graph store")?;

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(sql),
            Arc::new(graph),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        sql: Arc<dyn SqlExecutor>,
        graph: Arc<dyn GraphExecutor>,
    ) -> Self {
        Self {
            config,
            sql,
            graph,
            last_run: Arc::new(Mutex::new(None)),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::db::{GraphQuery, SqlQuery};
        use crate::error::{DbError, Store};
        use async_trait::async_trait;
        use serde_json::{json, Value};

        struct EchoSql;
        #[async_trait]
        impl SqlExecutor for EchoSql {
            async fn fetch_rows(&self, q: &SqlQuery) -> Result<Vec<Value>, DbError> {
                Ok(vec![json!({ "params": q.params })])
            }
        }

        struct EchoGraph;
        #[async_trait]
        impl GraphExecutor for EchoGraph {
            async fn fetch_rows(&self, q: &GraphQuery) -> Result<Vec<Value>, DbError> {
                Ok(vec![json!({ "columns": q.columns })])
            }
        }

        let config = AppConfig::from_source(
            |key| {
                match key {
                    "SQL_USER" | "SQL_PWD" | "SQL_DB" | "NOSQL_PWD" => Some("test"),
                    _ => None,
                }
                .map(String::from)
            },
            &Store::ALL,
        )
        .expect("test config");

        Self::from_parts(Arc::new(config), Arc::new(EchoSql), Arc::new(EchoGraph))
    }
}
