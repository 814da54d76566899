use clap::Parser;

mod app;
mod cli;
mod compare;
mod config;
mod db;
mod error;
mod seed;
mod state;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::error::Store;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = if cli.verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "sqlvsnosql=debug,axum=info,tower_http=info".to_string())
    };
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Command::Serve(args) => {
            let config = AppConfig::from_env(&Store::ALL)?;
            tracing::info!("connecting to databases");
            let app_state = AppState::init(config).await?;
            app::serve(app::build_app(app_state), &args.host, args.port).await
        }
        Command::Seed(args) => {
            let config = AppConfig::from_env(&args.target.stores())?;
            for report in seed::run(&args, &config).await? {
                tracing::info!(
                    store = %report.store,
                    users = report.users,
                    products = report.products,
                    purchases = report.purchases,
                    follows = report.follows,
                    seconds = report.elapsed.as_secs_f64(),
                    "seeded"
                );
            }
            tracing::info!("Ok.");
            Ok(())
        }
    }
}
