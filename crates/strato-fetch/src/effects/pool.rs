use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Bounded pool of concurrent chunk workers.
///
/// Spawning never blocks the caller: tasks queue on the internal semaphore
/// and start as permits free up. The `JoinSet` passed by the caller owns
/// the task handles, so draining a transfer is just joining its set.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a chunk task; it runs once a worker slot is available.
    pub fn spawn<F>(&self, tasks: &mut JoinSet<()>, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        tasks.spawn(async move {
            // The semaphore is never closed while the pool lives.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }
}
