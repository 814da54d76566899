use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::{retry::connect_with_retry, GraphExecutor, GraphQuery};
use crate::config::{GraphConfig, RetryPolicy};
use crate::error::{DbError, Store};
use crate::seed::model::{Follow, Product, Purchase, User};
use crate::seed::store::SeedStore;

const SCHEMA: [&str; 4] = [
    "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
    "CREATE CONSTRAINT product_id IF NOT EXISTS FOR (p:Product) REQUIRE p.id IS UNIQUE",
    "CREATE CONSTRAINT purchase_id IF NOT EXISTS FOR (pu:Purchase) REQUIRE pu.id IS UNIQUE",
    // Purchases point at users by property, the same lookup the relational
    // foreign key indexes.
    "CREATE INDEX purchase_user_id IF NOT EXISTS FOR (pu:Purchase) ON (pu.user_id)",
];

/// Process-wide handle to the graph store, opened on first use.
pub struct GraphClient {
    config: GraphConfig,
    retry: RetryPolicy,
    graph: OnceCell<Graph>,
}

impl GraphClient {
    pub fn new(config: GraphConfig, retry: RetryPolicy) -> Self {
        Self {
            config,
            retry,
            graph: OnceCell::new(),
        }
    }

    /// One connection attempt. The driver connects lazily, so a probe query
    /// is what proves the server is reachable.
    async fn open(&self) -> Result<Graph, neo4rs::Error> {
        let config = ConfigBuilder::default()
            .uri(self.config.uri())
            .user(self.config.user.as_str())
            .password(self.config.password.as_str())
            .db(self.config.database.as_str())
            .max_connections(1)
            .build()?;
        let graph = Graph::connect(config).await?;
        graph.run(query("RETURN 1")).await?;
        Ok(graph)
    }

    pub async fn graph(&self) -> Result<&Graph, DbError> {
        self.graph
            .get_or_try_init(|| connect_with_retry(Store::Graph, &self.retry, || self.open()))
            .await
    }
}

#[async_trait]
impl GraphExecutor for GraphClient {
    #[instrument(skip(self))]
    async fn fetch_rows(&self, q: &GraphQuery) -> Result<Vec<Value>, DbError> {
        let graph = self.graph().await?;
        let mut cypher = query(q.text);
        for (name, value) in &q.params {
            cypher = cypher.param(name, *value);
        }
        let mut stream = graph.execute(cypher).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            let mut object = Map::with_capacity(q.columns.len());
            for column in q.columns {
                let value: Value = row.get(column).map_err(|e| DbError::GraphRow {
                    column: column.to_string(),
                    message: e.to_string(),
                })?;
                object.insert(column.to_string(), value);
            }
            rows.push(Value::Object(object));
        }
        debug!(rows = rows.len(), "graph query done");
        Ok(rows)
    }
}

#[async_trait]
impl SeedStore for GraphClient {
    fn store(&self) -> Store {
        Store::Graph
    }

    async fn create_schema(&self) -> Result<(), DbError> {
        let graph = self.graph().await?;
        for statement in SCHEMA {
            graph.run(query(statement)).await?;
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), DbError> {
        let q = query(
            "CREATE (u:User {id: $id, email: $email, hashed_password: $hashed_password, \
             full_name: $full_name, role: $role})",
        )
        .param("id", user.id.as_str())
        .param("email", user.email.as_str())
        .param("hashed_password", user.hashed_password.as_str())
        .param("full_name", user.full_name.as_str())
        .param("role", user.role.as_str());
        self.graph().await?.run(q).await?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), DbError> {
        let q = query(
            "CREATE (p:Product {id: $id, name: $name, price: $price, \
             description: $description, image: $image})",
        )
        .param("id", product.id.as_str())
        .param("name", product.name.as_str())
        .param("price", product.price)
        .param("description", product.description.as_str())
        .param("image", product.image.as_str());
        self.graph().await?.run(q).await?;
        Ok(())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), DbError> {
        let q = query(
            "CREATE (pu:Purchase {id: $id, user_id: $user_id, product_id: $product_id, \
             quantity: $quantity, total_price: $total_price})",
        )
        .param("id", purchase.id.as_str())
        .param("user_id", purchase.user_id.as_str())
        .param("product_id", purchase.product_id.as_str())
        .param("quantity", i64::from(purchase.quantity))
        .param("total_price", purchase.total_price);
        self.graph().await?.run(q).await?;
        Ok(())
    }

    async fn insert_follow(&self, follow: &Follow) -> Result<(), DbError> {
        let q = query(
            "MATCH (follower:User {id: $follower_id}), (followee:User {id: $followee_id}) \
             CREATE (follower)-[:FOLLOWS]->(followee)",
        )
        .param("follower_id", follow.follower_id.as_str())
        .param("followee_id", follow.followee_id.as_str());
        self.graph().await?.run(q).await?;
        Ok(())
    }
}
