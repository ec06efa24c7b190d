//! Bounded pool of in-flight request tasks

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps concurrent request tasks and lets shutdown wait for them.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let capacity = u32::try_from(workers.max(1)).unwrap_or(u32::MAX);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    /// `None` once the pool is closed.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity as usize - self.semaphore.available_permits()
    }

    /// Stop handing out slots and wait until every running task has
    /// released its permit.
    pub async fn drain(&self) {
        if let Ok(all) = self.semaphore.acquire_many(self.capacity).await {
            all.forget();
        }
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_running_tasks() {
        let pool = WorkerPool::new(2);
        let finished = Arc::new(AtomicBool::new(false));

        let permit = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 1);

        let flag = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            drop(permit);
        });

        pool.drain().await;
        assert!(finished.load(Ordering::SeqCst));
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn test_drain_idle_pool_returns() {
        let pool = WorkerPool::new(3);
        pool.drain().await;
        assert!(pool.acquire().await.is_none());
    }
}
