use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::error::Store;

/// Relational store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Graph store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl GraphConfig {
    pub fn uri(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Fixed-delay policy used while establishing a connection.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sql: SqlConfig,
    pub graph: GraphConfig,
    pub retry: RetryPolicy,
    pub display_rows: usize,
}

impl AppConfig {
    pub fn from_env(stores: &[Store]) -> anyhow::Result<Self> {
        Self::from_source(|key| std::env::var(key).ok(), stores)
    }

    /// Builds the config from any key lookup, so callers are not tied to the
    /// process environment. Credentials are only required for `stores`; the
    /// others fall back to empty values and are never connected.
    pub fn from_source<F>(lookup: F, stores: &[Store]) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |store: Store, key: &str| match lookup(key) {
            Some(value) => Ok(value),
            None if stores.contains(&store) => anyhow::bail!("{key} is not set"),
            None => Ok(String::new()),
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let sql = SqlConfig {
            host: or_default("SQL_HOST", "127.0.0.1"),
            port: parse_or(&lookup, "SQL_PORT", 3306)?,
            user: required(Store::Sql, "SQL_USER")?,
            password: required(Store::Sql, "SQL_PWD")?,
            database: required(Store::Sql, "SQL_DB")?,
        };
        let graph = GraphConfig {
            host: or_default("NOSQL_HOST", "127.0.0.1"),
            port: parse_or(&lookup, "NOSQL_PORT", 7687)?,
            user: or_default("NOSQL_USER", "neo4j"),
            password: required(Store::Graph, "NOSQL_PWD")?,
            database: or_default("NOSQL_DB", "neo4j"),
        };
        let retry = RetryPolicy {
            attempts: parse_or(&lookup, "CONNECT_ATTEMPTS", 20)?,
            delay: Duration::from_secs(parse_or(&lookup, "CONNECT_DELAY_SECS", 5)?),
        };
        if retry.attempts == 0 {
            anyhow::bail!("CONNECT_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            sql,
            graph,
            retry,
            display_rows: parse_or(&lookup, "DISPLAY_ROWS", 200)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
