use std::sync::Arc;
use std::time::Duration;

use crate::{
    auth::jwt::JwtService,
    clock::Clock,
    config::AppConfig,
    db::DbPool,
    error::AppResult,
    services::{
        ActivityFeed, DocumentService, FolderService, PooledConn, RecycleBin, ServiceContext,
        StoreSettings,
    },
    workers::TaskQueue,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub folders: FolderService,
    pub documents: DocumentService,
    pub recycle: RecycleBin,
    pub activities: ActivityFeed,
    side_effects: ServiceContext,
}

impl AppState {
    /// Wires the services together. Spawns the side-effect queues, so it must be
    /// called from inside a tokio runtime.
    pub fn new(pool: DbPool, config: AppConfig, jwt: JwtService, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.side_effect_queue_capacity;
        let side_effects = ServiceContext {
            pool: pool.clone(),
            clock,
            activity: TaskQueue::spawn(pool.clone(), capacity),
            views: TaskQueue::spawn(pool.clone(), capacity),
            settings: StoreSettings::from_config(&config),
        };

        Self {
            pool,
            config: Arc::new(config),
            jwt,
            folders: FolderService::new(side_effects.clone()),
            documents: DocumentService::new(side_effects.clone()),
            recycle: RecycleBin::new(side_effects.clone()),
            activities: ActivityFeed::new(side_effects.clone()),
            side_effects,
        }
    }

    /// Waits for the background side-effect queues to drain. Returns `false` on timeout.
    pub async fn settle(&self, timeout: Duration) -> bool {
        self.side_effects.settle(timeout).await
    }

    pub fn db(&self) -> AppResult<PooledConn> {
        Ok(self.pool.get()?)
    }
}
