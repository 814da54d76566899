use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{DbError, Store};
use crate::seed::model::Fixture;
use crate::seed::store::SeedStore;

/// Rows written to one store.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub store: Store,
    pub users: usize,
    pub products: usize,
    pub purchases: usize,
    pub follows: usize,
    pub elapsed: Duration,
}

struct Progress {
    store: Store,
    entity: &'static str,
    total: usize,
    step: usize,
    started: Instant,
}

impl Progress {
    fn start(store: Store, entity: &'static str, total: usize) -> Self {
        info!(%store, entity, total, "inserting");
        Self {
            store,
            entity,
            total,
            step: (total / 10).max(1),
            started: Instant::now(),
        }
    }

    fn tick(&self, done: usize) {
        if done % self.step == 0 && done < self.total {
            info!(store = %self.store, entity = self.entity, done, total = self.total, "progress");
        }
    }

    fn finish(self) {
        info!(
            store = %self.store,
            entity = self.entity,
            rows = self.total,
            seconds = self.started.elapsed().as_secs_f64(),
            "inserted"
        );
    }
}

/// Creates the schema, then inserts the fixture row by row. The first failed
/// statement aborts the run.
#[instrument(skip_all, fields(store = %store.store()))]
pub async fn seed_store(store: &dyn SeedStore, fixture: &Fixture) -> Result<SeedReport, DbError> {
    let started = Instant::now();
    let name = store.store();

    info!("creating schema");
    store.create_schema().await?;

    let progress = Progress::start(name, "users", fixture.users.len());
    for (i, user) in fixture.users.iter().enumerate() {
        store.insert_user(user).await?;
        progress.tick(i + 1);
    }
    progress.finish();

    let progress = Progress::start(name, "products", fixture.products.len());
    for (i, product) in fixture.products.iter().enumerate() {
        store.insert_product(product).await?;
        progress.tick(i + 1);
    }
    progress.finish();

    let progress = Progress::start(name, "purchases", fixture.purchases.len());
    for (i, purchase) in fixture.purchases.iter().enumerate() {
        store.insert_purchase(purchase).await?;
        progress.tick(i + 1);
    }
    progress.finish();

    let progress = Progress::start(name, "follows", fixture.follows.len());
    for (i, follow) in fixture.follows.iter().enumerate() {
        store.insert_follow(follow).await?;
        progress.tick(i + 1);
    }
    progress.finish();

    let elapsed = started.elapsed();
    info!(seconds = elapsed.as_secs_f64(), "store seeded");
    Ok(SeedReport {
        store: name,
        users: fixture.users.len(),
        products: fixture.products.len(),
        purchases: fixture.purchases.len(),
        follows: fixture.follows.len(),
        elapsed,
    })
}
