pub mod generate;
pub mod model;
mod password;
pub mod runner;
pub mod store;

use std::time::Instant;

use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use crate::cli::SeedArgs;
use crate::config::AppConfig;
use crate::db::{GraphClient, SqlClient};
use crate::error::Store;
use generate::generate_fixture;
use runner::{seed_store, SeedReport};
use store::SeedStore;

/// Generates one fixture and writes it to every selected store in turn.
pub async fn run(args: &SeedArgs, config: &AppConfig) -> anyhow::Result<Vec<SeedReport>> {
    let started = Instant::now();
    let seed_config = args.seed_config();
    info!(?seed_config, target = ?args.target, "seeding");

    let password_hash = password::hash_password(&args.password)?;
    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let fixture = generate_fixture(&seed_config, &password_hash, &mut rng)?;
    info!(
        users = fixture.users.len(),
        products = fixture.products.len(),
        purchases = fixture.purchases.len(),
        follows = fixture.follows.len(),
        "fixture generated"
    );

    let mut stores: Vec<Box<dyn SeedStore>> = Vec::new();
    if args.target.includes(Store::Sql) {
        stores.push(Box::new(SqlClient::new(config.sql.clone(), config.retry)));
    }
    if args.target.includes(Store::Graph) {
        stores.push(Box::new(GraphClient::new(config.graph.clone(), config.retry)));
    }

    let mut reports = Vec::with_capacity(stores.len());
    for store in &stores {
        let report = seed_store(store.as_ref(), &fixture)
            .await
            .with_context(|| format!("seeding {}", store.store()))?;
        reports.push(report);
    }

    info!(seconds = started.elapsed().as_secs_f64(), "total time");
    Ok(reports)
}
