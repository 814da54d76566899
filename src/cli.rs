use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::Store;
use crate::seed::generate::SeedConfig;

/// Seed a relational and a graph database, then race them from a web page.
#[derive(Parser, Debug)]
#[command(name = "sqlvsnosql", author, version, about, long_about = None)]
pub struct Cli {
    /// Force debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the comparison web UI
    Serve(ServeArgs),
    /// Fill both stores with the same generated dataset
    Seed(SeedArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "APP_HOST")]
    pub host: String,

    #[arg(short, long, default_value_t = 8080, env = "APP_PORT")]
    pub port: u16,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Both,
    Sql,
    Graph,
}

impl Target {
    pub fn includes(&self, store: Store) -> bool {
        matches!(
            (self, store),
            (Target::Both, _) | (Target::Sql, Store::Sql) | (Target::Graph, Store::Graph)
        )
    }

    pub fn stores(&self) -> Vec<Store> {
        Store::ALL.into_iter().filter(|s| self.includes(*s)).collect()
    }
}

#[derive(Args, Debug)]
pub struct SeedArgs {
    #[arg(long, default_value_t = 10_000)]
    pub users: usize,

    #[arg(long, default_value_t = 1_000)]
    pub products: usize,

    #[arg(long, default_value_t = 100_000)]
    pub purchases: usize,

    /// Random follow draws; self and duplicate pairs are skipped
    #[arg(long, default_value_t = 100_000)]
    pub follows: usize,

    #[arg(long, value_enum, default_value_t = Target::Both)]
    pub target: Target,

    /// Fixed RNG seed for a reproducible dataset
    #[arg(long)]
    pub rng_seed: Option<u64>,

    /// Plain-text password shared by every generated user
    #[arg(long, default_value = "password")]
    pub password: String,
}

impl SeedArgs {
    pub fn seed_config(&self) -> SeedConfig {
        SeedConfig {
            users: self.users,
            products: self.products,
            purchases: self.purchases,
            follow_attempts: self.follows,
        }
    }
}
