mod admin;
mod config;
mod db;
mod error;
mod evaluate;
mod export;
mod gate;
mod models;
mod run;
mod usage;
mod util;
mod workflow;


use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = config::Config::from_env()?;
    setup_logging(&config.log_filter);

    let mut db = db::Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    tracing::debug!(db = %config.db_path.display(), "Database ready");

    run::as_cli(&args, &config, &mut db)
}

fn setup_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
