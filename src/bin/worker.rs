use std::{sync::Arc, time::Duration};

use tokio::signal;

use folio::{
    auth::jwt::JwtService, clock::SystemClock, config::AppConfig, db, init_tracing,
    state::AppState, RecycleSweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let period = Duration::from_secs(config.purge_interval_seconds.max(1));
    tracing::info!(
        component = "worker",
        pool_size = 1,
        retention_days = config.recycle_retention_days,
        period_secs = period.as_secs(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    let jwt = JwtService::from_config(&config)?;

    let state = AppState::new(pool, config, jwt, Arc::new(SystemClock));
    let sweeper = RecycleSweeper::new(state.recycle.clone(), period);

    tokio::select! {
        _ = sweeper.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}
