use async_trait::async_trait;

use crate::error::{DbError, Store};
use crate::seed::model::{Follow, Product, Purchase, User};

/// Write side of a store, one statement per call.
#[async_trait]
pub trait SeedStore: Send + Sync {
    fn store(&self) -> Store;
    /// Create-if-absent tables or constraints.
    async fn create_schema(&self) -> Result<(), DbError>;
    async fn insert_user(&self, user: &User) -> Result<(), DbError>;
    async fn insert_product(&self, product: &Product) -> Result<(), DbError>;
    async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), DbError>;
    async fn insert_follow(&self, follow: &Follow) -> Result<(), DbError>;
}
