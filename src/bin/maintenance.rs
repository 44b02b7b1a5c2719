use std::{env, sync::Arc, time::Duration};

use anyhow::{Context, Result};

use folio::{
    auth::jwt::JwtService, clock::SystemClock, config::AppConfig, db, init_tracing,
    state::AppState,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

const USAGE: &str = "Usage: maintenance <migrate|purge-expired>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some("purge-expired") => purge_expired().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn migrate() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool).context("failed to apply migrations")?;
    println!("Migrations applied.");
    Ok(())
}

async fn purge_expired() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        retention_days = config.recycle_retention_days,
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    db::run_migrations(&pool)?;
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(pool, config, jwt, Arc::new(SystemClock));
    let report = state
        .recycle
        .purge_expired()
        .context("failed to purge expired recycle items")?;

    if !state.settle(SETTLE_TIMEOUT).await {
        tracing::warn!(
            component = "maintenance",
            "timed out writing purge activity records"
        );
    }

    println!(
        "Purged {} expired recycle items ({} failed).",
        report.purged, report.failed
    );
    Ok(())
}
