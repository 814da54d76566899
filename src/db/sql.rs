use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow},
    Column, MySqlPool, Row, TypeInfo, ValueRef,
};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::{retry::connect_with_retry, SqlExecutor, SqlQuery};
use crate::config::{RetryPolicy, SqlConfig};
use crate::error::{DbError, Store};
use crate::seed::model::{Follow, Product, Purchase, User};
use crate::seed::store::SeedStore;

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS User (
        id VARCHAR(255) PRIMARY KEY,
        email VARCHAR(255),
        hashed_password VARCHAR(255),
        full_name VARCHAR(255),
        role VARCHAR(255)
    ) COLLATE utf8mb4_unicode_ci
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Product (
        id VARCHAR(255) PRIMARY KEY,
        name VARCHAR(255),
        price REAL,
        description TEXT,
        image TEXT
    ) COLLATE utf8mb4_unicode_ci
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Purchase (
        id VARCHAR(255) PRIMARY KEY,
        user_id VARCHAR(255),
        product_id VARCHAR(255),
        quantity INTEGER,
        total_price REAL,
        FOREIGN KEY (user_id) REFERENCES User(id),
        FOREIGN KEY (product_id) REFERENCES Product(id)
    ) COLLATE utf8mb4_unicode_ci
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS Follows (
        follower_id VARCHAR(255),
        followee_id VARCHAR(255),
        PRIMARY KEY (follower_id, followee_id),
        FOREIGN KEY (follower_id) REFERENCES User(id),
        FOREIGN KEY (followee_id) REFERENCES User(id)
    ) COLLATE utf8mb4_unicode_ci
    "#,
];

/// Process-wide handle to the relational store. The single connection is
/// opened on first use and reused afterwards.
pub struct SqlClient {
    config: SqlConfig,
    retry: RetryPolicy,
    pool: OnceCell<MySqlPool>,
}

impl SqlClient {
    pub fn new(config: SqlConfig, retry: RetryPolicy) -> Self {
        Self {
            config,
            retry,
            pool: OnceCell::new(),
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(&self.config.database)
            .charset("utf8mb4")
            .collation("utf8mb4_unicode_ci")
    }

    /// Returns the shared pool, connecting with the retry policy if needed.
    pub async fn pool(&self) -> Result<&MySqlPool, DbError> {
        self.pool
            .get_or_try_init(|| async {
                let options = self.connect_options();
                connect_with_retry(Store::Sql, &self.retry, || {
                    MySqlPoolOptions::new()
                        .max_connections(1)
                        .acquire_timeout(Duration::from_secs(30))
                        .connect_with(options.clone())
                })
                .await
            })
            .await
    }
}

#[async_trait]
impl SqlExecutor for SqlClient {
    #[instrument(skip(self))]
    async fn fetch_rows(&self, query: &SqlQuery) -> Result<Vec<Value>, DbError> {
        let pool = self.pool().await?;
        let mut statement = sqlx::query(query.text);
        for param in &query.params {
            statement = statement.bind(*param);
        }
        let rows = statement.fetch_all(pool).await?;
        debug!(rows = rows.len(), "sql query done");
        rows.iter()
            .map(|row| row_to_json(row).map_err(DbError::from))
            .collect()
    }
}

/// Decodes a row of unknown shape by looking at each column's declared type.
fn row_to_json(row: &MySqlRow) -> Result<Value, sqlx::Error> {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let i = column.ordinal();
        if row.try_get_raw(i)?.is_null() {
            object.insert(column.name().to_string(), Value::Null);
            continue;
        }
        let type_name = column.type_info().name();
        let value = if type_name.ends_with("UNSIGNED") {
            Value::from(row.try_get::<u64, _>(i)?)
        } else {
            match type_name {
                "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                    Value::from(row.try_get::<i64, _>(i)?)
                }
                "FLOAT" => Value::from(f64::from(row.try_get::<f32, _>(i)?)),
                "DOUBLE" => Value::from(row.try_get::<f64, _>(i)?),
                "DECIMAL" => {
                    let text = row.try_get_unchecked::<String, _>(i)?;
                    text.parse::<f64>()
                        .map(Value::from)
                        .unwrap_or(Value::String(text))
                }
                _ => Value::String(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(object))
}

#[async_trait]
impl SeedStore for SqlClient {
    fn store(&self) -> Store {
        Store::Sql
    }

    async fn create_schema(&self) -> Result<(), DbError> {
        let pool = self.pool().await?;
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(pool).await?;
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO User (id, email, hashed_password, full_name, role)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO Product (id, name, price, description, image)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.image)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO Purchase (id, user_id, product_id, quantity, total_price)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.user_id)
        .bind(&purchase.product_id)
        .bind(purchase.quantity)
        .bind(purchase.total_price)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO Follows (follower_id, followee_id)
            VALUES (?, ?)
            "#,
        )
        .bind(&follow.follower_id)
        .bind(&follow.followee_id)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }
}
