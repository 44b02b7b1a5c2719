pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
pub mod utils;
pub mod workers;

pub use routes::create_router;
pub use services::{ActivityFeed, DocumentService, FolderService, RecycleBin};
pub use workers::RecycleSweeper;

/// Installs the process-wide `tracing` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
