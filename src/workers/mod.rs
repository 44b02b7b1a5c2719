use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use diesel::sqlite::SqliteConnection;
use diesel::QueryResult;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::db::DbPool;

pub mod activity;
pub mod sweeper;
pub mod views;

pub use activity::ActivityRecord;
pub use sweeper::RecycleSweeper;
pub use views::ViewIncrement;

/// A side effect that runs after the request that caused it has returned.
pub trait BackgroundTask: Send + 'static {
    fn kind(&self) -> &'static str;
    fn apply(self, conn: &mut SqliteConnection) -> QueryResult<()>;
}

/// Bounded, best-effort queue drained by a single background task.
///
/// Submitting never blocks: when the queue is full or its consumer is gone the
/// task is dropped with a warning.
pub struct TaskQueue<T> {
    sender: mpsc::Sender<T>,
    progress: Arc<Progress>,
}

/// Accepted tasks not yet applied, and a wakeup for when that reaches zero.
#[derive(Default)]
struct Progress {
    pending: AtomicUsize,
    idle: Notify,
}

impl Progress {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<T: BackgroundTask> TaskQueue<T> {
    /// Starts the consumer on the current tokio runtime.
    pub fn spawn(pool: DbPool, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let progress = Arc::new(Progress::default());
        tokio::spawn(drain(pool, receiver, progress.clone()));
        Self { sender, progress }
    }

    pub fn submit(&self, task: T) {
        self.progress.pending.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                self.progress.finish_one();
                warn!(task = task.kind(), "background queue full; dropping task");
            }
            Err(TrySendError::Closed(task)) => {
                self.progress.finish_one();
                warn!(task = task.kind(), "background queue closed; dropping task");
            }
        }
    }

    /// Waits until every accepted task has been applied. Returns `false` on timeout.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let idle = self.progress.idle.notified();
                if self.progress.pending.load(Ordering::Acquire) == 0 {
                    return;
                }
                idle.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

async fn drain<T: BackgroundTask>(
    pool: DbPool,
    mut receiver: mpsc::Receiver<T>,
    progress: Arc<Progress>,
) {
    while let Some(task) = receiver.recv().await {
        let kind = task.kind();
        let pool = pool.clone();
        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            task.apply(&mut conn)?;
            Ok(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => debug!(task = kind, "background task applied"),
            Ok(Err(err)) => warn!(task = kind, error = %err, "background task failed"),
            Err(err) => error!(task = kind, error = %err, "background task panicked"),
        }
        progress.finish_one();
    }
    debug!("background queue closed");
}
