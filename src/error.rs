use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

/// The two stores being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Store {
    #[serde(rename = "SQL")]
    Sql,
    #[serde(rename = "NoSQL")]
    Graph,
}

impl Store {
    pub const ALL: [Store; 2] = [Store::Sql, Store::Graph];
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Store::Sql => f.write_str("SQL"),
            Store::Graph => f.write_str("NoSQL"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("could not connect to {store} after {attempts} attempts: {last_error}")]
    ConnectExhausted {
        store: Store,
        attempts: u32,
        last_error: String,
    },

    #[error("sql: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("graph: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("graph row column `{column}`: {message}")]
    GraphRow { column: String, message: String },

    #[error("unknown request type `{0}`")]
    UnknownRequest(String),

    #[error("{store} query expects {expected} parameters, got {actual}")]
    Arity {
        store: Store,
        expected: String,
        actual: String,
    },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

impl DbError {
    pub fn status(&self) -> StatusCode {
        match self {
            DbError::UnknownRequest(_) | DbError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for (StatusCode, String) {
    fn from(e: DbError) -> Self {
        (e.status(), e.to_string())
    }
}
