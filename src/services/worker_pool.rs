//! Worker Pool
//!
//! N slots per process, each claiming and running one job at a time.
//! Exclusivity between slots and between processes comes only from the
//! store's atomic claim. The pool-local semaphore only stops the same pool
//! from being started twice.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::services::job_queue::JobQueue;
use crate::services::job_runner::JobRunner;
use crate::types::ImportJob;

#[derive(Clone)]
pub struct WorkerPool {
    queue: JobQueue,
    runner: Arc<JobRunner>,
    slots: usize,
    poll_interval: Duration,
    wake: Arc<Notify>,
    in_flight: Arc<Semaphore>,
}

/// Wakes idle slots of a running pool
#[derive(Clone)]
pub struct PoolHandle {
    wake: Arc<Notify>,
}

impl PoolHandle {
    /// Never blocks. A no-op when no slot is idle.
    pub fn kick(&self) {
        debug!("Worker pool kicked");
        self.wake.notify_waiters();
    }
}

impl WorkerPool {
    pub fn new(queue: JobQueue, runner: JobRunner, slots: usize, poll_interval: Duration) -> Self {
        Self {
            queue,
            runner: Arc::new(runner),
            slots: slots.max(1),
            poll_interval,
            wake: Arc::new(Notify::new()),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    /// Polling variant: idle slots sleep and retry until `cancel` fires.
    /// Slots finish their current job before stopping.
    pub async fn run(&self, cancel: CancellationToken) {
        let Ok(_running) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            warn!("Worker pool already running, ignoring start");
            return;
        };
        info!(
            "Worker pool started: {} slots, worker {}, poll every {:?}",
            self.slots,
            self.queue.worker_id(),
            self.poll_interval
        );

        let mut slots = JoinSet::new();
        for slot in 0..self.slots {
            let pool = self.clone();
            let cancel = cancel.clone();
            slots.spawn(async move { pool.poll_slot(slot, cancel).await });
        }
        while let Some(result) = slots.join_next().await {
            if let Err(e) = result {
                error!("Worker slot panicked: {}", e);
            }
        }

        info!("Worker pool stopped");
    }

    /// Bounded variant: each slot stops once no job is available.
    /// Returns the number of jobs run.
    pub async fn drain(&self) -> usize {
        let Ok(_running) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            warn!("Worker pool already running, ignoring drain");
            return 0;
        };

        let mut slots = JoinSet::new();
        for slot in 0..self.slots {
            let pool = self.clone();
            slots.spawn(async move { pool.drain_slot(slot).await });
        }

        let mut total = 0;
        while let Some(result) = slots.join_next().await {
            match result {
                Ok(count) => total += count,
                Err(e) => error!("Worker slot panicked: {}", e),
            }
        }

        info!("Worker pool drained: {} jobs run", total);
        total
    }

    async fn poll_slot(&self, slot: usize, cancel: CancellationToken) {
        debug!("Slot {} polling", slot);
        while !cancel.is_cancelled() {
            match self.queue.claim_next().await {
                Ok(Some(job)) => {
                    self.run_job(slot, job).await;
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!("Slot {} failed to claim: {}", slot, e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => debug!("Slot {} woken", slot),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        debug!("Slot {} stopped", slot);
    }

    /// A panicking job is marked failed and the slot keeps going
    async fn run_job(&self, slot: usize, job: ImportJob) {
        let job_id = job.id;
        let runner = Arc::clone(&self.runner);
        if let Err(e) = tokio::spawn(async move { runner.run(job).await }).await {
            error!("Slot {}: job {} panicked: {}", slot, job_id, e);
            if let Err(e) = self.queue.mark_failed(job_id, "Failed", "worker panicked").await {
                error!("Failed to record panic of job {}: {}", job_id, e);
            }
        }
    }

    async fn drain_slot(&self, slot: usize) -> usize {
        let mut count = 0;
        loop {
            match self.queue.claim_next().await {
                Ok(Some(job)) => {
                    self.run_job(slot, job).await;
                    count += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Slot {} failed to claim: {}", slot, e);
                    break;
                }
            }
        }
        debug!("Slot {} drained after {} jobs", slot, count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::{JobStore, MemoryJobStore};
    use crate::services::platform::{
        Location, MetafieldDefinition, MetafieldOwnerType, MockPlatform, PlatformError, ProductSetInput,
        ProductSetOutcome, Publication, TargetPlatform, UserError,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use crate::services::product_sync::SyncSettings;
    use crate::types::{JobStatus, NewImportJob, ResourceKey};
    use std::path::Path;
    use uuid::Uuid;

    const SHEET: &str = "Handle,Title,Option1 Name,Option1 Value\ntee,Tee,Title,Default Title\n";

    /// Panics on lookup of one handle, otherwise behaves like the dry-run mock
    struct PanicOnHandle {
        handle: &'static str,
        inner: MockPlatform,
    }

    #[async_trait]
    impl TargetPlatform for PanicOnHandle {
        async fn collection_ids_by_handle(&self) -> Result<HashMap<String, String>, PlatformError> {
            self.inner.collection_ids_by_handle().await
        }

        async fn publications(&self) -> Result<Vec<Publication>, PlatformError> {
            self.inner.publications().await
        }

        async fn locations(&self) -> Result<Vec<Location>, PlatformError> {
            self.inner.locations().await
        }

        async fn metafield_definitions(
            &self,
            owner: MetafieldOwnerType,
        ) -> Result<Vec<MetafieldDefinition>, PlatformError> {
            self.inner.metafield_definitions(owner).await
        }

        async fn create_metafield_definition(
            &self,
            owner: MetafieldOwnerType,
            definition: &MetafieldDefinition,
        ) -> Result<Vec<UserError>, PlatformError> {
            self.inner.create_metafield_definition(owner, definition).await
        }

        async fn product_id_by_handle(&self, handle: &str) -> Result<Option<String>, PlatformError> {
            if handle == self.handle {
                panic!("lookup of {} blew up", handle);
            }
            self.inner.product_id_by_handle(handle).await
        }

        async fn product_set(&self, input: &ProductSetInput) -> Result<ProductSetOutcome, PlatformError> {
            self.inner.product_set(input).await
        }

        async fn publish(&self, product_id: &str, publication_ids: &[String]) -> Result<Vec<UserError>, PlatformError> {
            self.inner.publish(product_id, publication_ids).await
        }

        fn name(&self) -> &'static str {
            "panic-on-handle"
        }
    }

    fn pool(store: &MemoryJobStore, dir: &Path, slots: usize, poll: Duration) -> WorkerPool {
        pool_with(store, dir, slots, poll, Arc::new(MockPlatform::dry_run()))
    }

    fn pool_with(
        store: &MemoryJobStore,
        dir: &Path,
        slots: usize,
        poll: Duration,
        platform: Arc<dyn TargetPlatform>,
    ) -> WorkerPool {
        let queue = JobQueue::new(Arc::new(store.clone()), "pool-test", Duration::from_secs(60));
        let settings = SyncSettings {
            product_delay: Duration::ZERO,
            metafield_definition_delay: Duration::ZERO,
        };
        let runner = JobRunner::new(
            queue.clone(),
            platform,
            settings,
            dir.join("reports"),
        );
        WorkerPool::new(queue, runner, slots, poll)
    }

    async fn enqueue(store: &MemoryJobStore, dir: &Path, name: &str) -> Uuid {
        enqueue_sheet(store, dir, name, SHEET).await
    }

    async fn enqueue_sheet(store: &MemoryJobStore, dir: &Path, name: &str, sheet: &str) -> Uuid {
        let path = dir.join(name);
        std::fs::write(&path, sheet).unwrap();
        store
            .create(NewImportJob::new(ResourceKey::Products, name, &path.display().to_string()))
            .await
            .unwrap()
            .id
    }

    async fn status(store: &MemoryJobStore, id: Uuid) -> JobStatus {
        store.get(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn drain_runs_every_queued_job_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(enqueue(&store, dir.path(), &format!("p{}.csv", i)).await);
        }

        let ran = pool(&store, dir.path(), 2, Duration::from_millis(10)).drain().await;

        assert_eq!(ran, 5);
        for id in ids {
            assert_eq!(status(&store, id).await, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn panicking_job_is_failed_and_the_slot_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let bad = enqueue_sheet(
            &store,
            dir.path(),
            "bad.csv",
            "Handle,Title,Option1 Name,Option1 Value\nboom,Boom,Title,Default Title\n",
        )
        .await;
        let good = enqueue(&store, dir.path(), "good.csv").await;
        let platform = PanicOnHandle {
            handle: "boom",
            inner: MockPlatform::dry_run(),
        };

        let ran = pool_with(&store, dir.path(), 1, Duration::from_millis(10), Arc::new(platform))
            .drain()
            .await;

        assert_eq!(ran, 2);
        let failed = store.get(bad).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error, "worker panicked");
        assert_eq!(failed.locked_by, None);
        assert_eq!(status(&store, good).await, JobStatus::Completed);
    }

    #[tokio::test]
    async fn drain_with_empty_queue_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        assert_eq!(pool(&store, dir.path(), 3, Duration::from_millis(10)).drain().await, 0);
    }

    #[tokio::test]
    async fn kick_wakes_an_idle_pool() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let pool = pool(&store, dir.path(), 1, Duration::from_secs(3600));
        let handle = pool.handle();
        let cancel = CancellationToken::new();

        let running = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let id = enqueue(&store, dir.path(), "late.csv").await;
        handle.kick();

        let mut done = false;
        for _ in 0..100 {
            if status(&store, id).await == JobStatus::Completed {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(done, "kicked pool did not pick up the job");

        cancel.cancel();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn second_start_of_a_running_pool_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();
        let pool = pool(&store, dir.path(), 1, Duration::from_secs(3600));
        let cancel = CancellationToken::new();

        let running = {
            let pool = pool.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let id = enqueue(&store, dir.path(), "p.csv").await;
        assert_eq!(pool.drain().await, 0);
        assert_eq!(status(&store, id).await, JobStatus::Queued);

        cancel.cancel();
        running.await.unwrap();
    }
}
