//! Job Record Store abstraction
//!
//! - `PgJobStore` → production, all transitions are single SQL statements
//! - `MemoryJobStore` → tests and one-shot local runs, every operation runs under one mutex
//!
//! Both implementations apply the same claim rule: oldest job first, either
//! queued with a missing or stale lock, or running with a stale lock.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db::queries::import_job as queries;
use crate::types::{ImportJob, JobProgress, JobStatus, MigrationSummary, NewImportJob, ResourceKey};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: NewImportJob) -> Result<ImportJob>;

    async fn get(&self, job_id: Uuid) -> Result<Option<ImportJob>>;

    /// Jobs for one resource, newest first
    async fn list_by_resource(&self, resource_key: ResourceKey) -> Result<Vec<ImportJob>>;

    /// Atomically claim the next job. `None` means no work is available.
    async fn claim_next(
        &self,
        worker_id: &str,
        lock_ttl: Duration,
        resource_key: Option<ResourceKey>,
    ) -> Result<Option<ImportJob>>;

    async fn renew_lock(&self, job_id: Uuid, worker_id: &str) -> Result<bool>;

    async fn update_message(&self, job_id: Uuid, worker_id: &str, message: &str) -> Result<()>;

    async fn update_progress(&self, job_id: Uuid, worker_id: &str, progress: JobProgress) -> Result<()>;

    async fn mark_completed(&self, job_id: Uuid, worker_id: &str, summary: &MigrationSummary) -> Result<bool>;

    async fn mark_failed(&self, job_id: Uuid, worker_id: &str, message: &str, error: &str) -> Result<bool>;

    fn name(&self) -> &'static str;
}

// ==========================================================================
// PostgreSQL
// ==========================================================================

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: NewImportJob) -> Result<ImportJob> {
        let job = queries::create_import_job(&self.pool, &job).await?;
        // Pools that miss the notification still find the job on their next poll
        if let Err(e) = queries::notify_import_job_queued(&self.pool, job.id).await {
            warn!("Failed to announce job {}: {}", job.id, e);
        }
        Ok(job)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ImportJob>> {
        queries::get_import_job(&self.pool, job_id).await
    }

    async fn list_by_resource(&self, resource_key: ResourceKey) -> Result<Vec<ImportJob>> {
        queries::list_import_jobs_by_resource(&self.pool, resource_key).await
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lock_ttl: Duration,
        resource_key: Option<ResourceKey>,
    ) -> Result<Option<ImportJob>> {
        queries::claim_next_import_job(&self.pool, worker_id, lock_ttl, resource_key).await
    }

    async fn renew_lock(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        queries::renew_import_job_lock(&self.pool, job_id, worker_id).await
    }

    async fn update_message(&self, job_id: Uuid, worker_id: &str, message: &str) -> Result<()> {
        queries::update_import_job_message(&self.pool, job_id, worker_id, message).await
    }

    async fn update_progress(&self, job_id: Uuid, worker_id: &str, progress: JobProgress) -> Result<()> {
        queries::update_import_job_progress(&self.pool, job_id, worker_id, &progress).await
    }

    async fn mark_completed(&self, job_id: Uuid, worker_id: &str, summary: &MigrationSummary) -> Result<bool> {
        queries::complete_import_job(&self.pool, job_id, worker_id, summary).await
    }

    async fn mark_failed(&self, job_id: Uuid, worker_id: &str, message: &str, error: &str) -> Result<bool> {
        queries::fail_import_job(&self.pool, job_id, worker_id, message, error).await
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

// ==========================================================================
// In-memory
// ==========================================================================

/// Process-local store. Jobs are kept in creation order.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<Vec<ImportJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, bypassing the queued defaults
    pub fn insert(&self, job: ImportJob) {
        self.jobs.lock().push(job);
    }

    fn with_owned_job<F>(&self, job_id: Uuid, worker_id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut ImportJob),
    {
        let mut jobs = self.jobs.lock();
        match jobs.iter_mut().find(|j| j.id == job_id && j.is_locked_by(worker_id)) {
            Some(job) => {
                apply(job);
                job.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

fn lock_is_stale(locked_at: Option<DateTime<Utc>>, now: DateTime<Utc>, lock_ttl: Duration) -> bool {
    match locked_at {
        None => false,
        // A lock stamped in the future is never stale
        Some(at) => (now - at).to_std().map(|age| age > lock_ttl).unwrap_or(false),
    }
}

fn is_claimable(job: &ImportJob, now: DateTime<Utc>, lock_ttl: Duration) -> bool {
    match job.status {
        JobStatus::Queued => job.locked_at.is_none() || lock_is_stale(job.locked_at, now, lock_ttl),
        JobStatus::Running => lock_is_stale(job.locked_at, now, lock_ttl),
        JobStatus::Completed | JobStatus::Failed => false,
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewImportJob) -> Result<ImportJob> {
        let job = ImportJob::queued(job, Utc::now());
        self.jobs.lock().push(job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<ImportJob>> {
        Ok(self.jobs.lock().iter().find(|j| j.id == job_id).cloned())
    }

    async fn list_by_resource(&self, resource_key: ResourceKey) -> Result<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .jobs
            .lock()
            .iter()
            .filter(|j| j.resource_key == resource_key)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lock_ttl: Duration,
        resource_key: Option<ResourceKey>,
    ) -> Result<Option<ImportJob>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock();

        let candidate = jobs
            .iter_mut()
            .filter(|j| resource_key.map_or(true, |key| j.resource_key == key))
            .filter(|j| is_claimable(j, now, lock_ttl))
            .min_by_key(|j| j.created_at);

        Ok(candidate.map(|job| {
            job.status = JobStatus::Running;
            job.locked_at = Some(now);
            job.locked_by = Some(worker_id.to_string());
            job.message = "Job claimed".to_string();
            job.error.clear();
            job.updated_at = now;
            job.clone()
        }))
    }

    async fn renew_lock(&self, job_id: Uuid, worker_id: &str) -> Result<bool> {
        Ok(self.with_owned_job(job_id, worker_id, |job| job.locked_at = Some(Utc::now())))
    }

    async fn update_message(&self, job_id: Uuid, worker_id: &str, message: &str) -> Result<()> {
        self.with_owned_job(job_id, worker_id, |job| job.message = message.to_string());
        Ok(())
    }

    async fn update_progress(&self, job_id: Uuid, worker_id: &str, progress: JobProgress) -> Result<()> {
        self.with_owned_job(job_id, worker_id, |job| job.progress = job.progress.max(progress));
        Ok(())
    }

    async fn mark_completed(&self, job_id: Uuid, worker_id: &str, summary: &MigrationSummary) -> Result<bool> {
        Ok(self.with_owned_job(job_id, worker_id, |job| {
            job.status = JobStatus::Completed;
            job.locked_at = None;
            job.locked_by = None;
            job.progress = JobProgress {
                total: summary.report_count,
                processed: summary.report_count,
                success: summary.success_count,
                failed: summary.failed_count,
            };
            job.report_path = Some(summary.report_path.clone());
            job.report_file_name = Some(summary.report_file_name());
            job.message = "Completed".to_string();
            job.error.clear();
        }))
    }

    async fn mark_failed(&self, job_id: Uuid, worker_id: &str, message: &str, error: &str) -> Result<bool> {
        Ok(self.with_owned_job(job_id, worker_id, |job| {
            job.status = JobStatus::Failed;
            job.locked_at = None;
            job.locked_by = None;
            job.message = message.to_string();
            job.error = error.to_string();
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60 * 60);

    fn queued(store: &MemoryJobStore, file: &str) -> ImportJob {
        let job = ImportJob::queued(
            NewImportJob::new(ResourceKey::Products, file, &format!("uploads/{}", file)),
            Utc::now(),
        );
        store.insert(job.clone());
        job
    }

    fn summary(path: &str) -> MigrationSummary {
        MigrationSummary {
            total_processed: 3,
            report_count: 3,
            success_count: 2,
            failed_count: 1,
            report_path: path.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn claim_is_exclusive_across_concurrent_callers() {
        let store = MemoryJobStore::new();
        queued(&store, "only.csv");

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_next(&format!("worker-{}", i), TTL, None).await.unwrap()
            }));
        }

        let claimed = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| r.as_ref().unwrap().is_some())
            .count();
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn claim_takes_oldest_first_and_sets_lock() {
        let store = MemoryJobStore::new();
        let older = ImportJob::queued(
            NewImportJob::new(ResourceKey::Products, "old.csv", "uploads/old.csv"),
            Utc::now() - chrono::Duration::minutes(5),
        );
        let newer = queued(&store, "new.csv");
        store.insert(older.clone());

        let job = store.claim_next("w1", TTL, None).await.unwrap().unwrap();
        assert_eq!(job.id, older.id);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.locked_by.as_deref(), Some("w1"));
        assert!(job.locked_at.is_some());
        assert_eq!(job.message, "Job claimed");

        let next = store.claim_next("w2", TTL, None).await.unwrap().unwrap();
        assert_eq!(next.id, newer.id);
        assert!(store.claim_next("w3", TTL, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_respects_resource_filter() {
        let store = MemoryJobStore::new();
        queued(&store, "products.csv");

        let none = store.claim_next("w1", TTL, Some(ResourceKey::Orders)).await.unwrap();
        assert!(none.is_none());
        let some = store.claim_next("w1", TTL, Some(ResourceKey::Products)).await.unwrap();
        assert!(some.is_some());
    }

    #[tokio::test]
    async fn stale_running_job_is_reclaimable_fresh_one_is_not() {
        let store = MemoryJobStore::new();
        let mut stale = ImportJob::queued(
            NewImportJob::new(ResourceKey::Products, "stale.csv", "uploads/stale.csv"),
            Utc::now(),
        );
        stale.status = JobStatus::Running;
        stale.locked_by = Some("dead-worker".into());
        stale.locked_at = Some(Utc::now() - chrono::Duration::minutes(61));
        stale.progress = JobProgress { total: 10, processed: 4, success: 4, failed: 0 };

        let mut fresh = stale.clone();
        fresh.id = Uuid::new_v4();
        fresh.locked_at = Some(Utc::now() - chrono::Duration::minutes(59));

        store.insert(fresh.clone());
        store.insert(stale.clone());

        let job = store.claim_next("w2", TTL, None).await.unwrap().unwrap();
        assert_eq!(job.id, stale.id);
        assert_eq!(job.locked_by.as_deref(), Some("w2"));
        // reclaim keeps the previous counters
        assert_eq!(job.progress.processed, 4);

        assert!(store.claim_next("w3", TTL, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_jobs_are_never_claimed() {
        let store = MemoryJobStore::new();
        for status in [JobStatus::Completed, JobStatus::Failed] {
            for locked_at in [None, Some(Utc::now() - chrono::Duration::days(2)), Some(Utc::now())] {
                let mut job = ImportJob::queued(
                    NewImportJob::new(ResourceKey::Products, "done.csv", "uploads/done.csv"),
                    Utc::now(),
                );
                job.status = status;
                job.locked_at = locked_at;
                store.insert(job);
            }
        }

        assert!(store.claim_next("w1", TTL, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_completed_clears_lock_and_copies_summary() {
        let store = MemoryJobStore::new();
        queued(&store, "a.csv");
        let job = store.claim_next("w1", TTL, None).await.unwrap().unwrap();

        let applied = store
            .mark_completed(job.id, "w1", &summary("reports/products_upload_report_x.xlsx"))
            .await
            .unwrap();
        assert!(applied);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.locked_at.is_none());
        assert!(stored.locked_by.is_none());
        assert_eq!(stored.progress, JobProgress { total: 3, processed: 3, success: 2, failed: 1 });
        assert_eq!(stored.report_file_name.as_deref(), Some("products_upload_report_x.xlsx"));
        assert_eq!(stored.message, "Completed");
    }

    #[tokio::test]
    async fn transitions_require_lock_ownership() {
        let store = MemoryJobStore::new();
        queued(&store, "a.csv");
        let job = store.claim_next("w1", TTL, None).await.unwrap().unwrap();

        assert!(!store.mark_failed(job.id, "intruder", "Failed", "boom").await.unwrap());
        assert!(!store.renew_lock(job.id, "intruder").await.unwrap());
        assert!(store.mark_failed(job.id, "w1", "Failed", "boom").await.unwrap());

        // terminal: no further transition applies
        assert!(!store.mark_completed(job.id, "w1", &summary("r.xlsx")).await.unwrap());
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error, "boom");
        assert!(stored.locked_by.is_none());
    }

    #[tokio::test]
    async fn progress_updates_never_decrease() {
        let store = MemoryJobStore::new();
        queued(&store, "a.csv");
        let job = store.claim_next("w1", TTL, None).await.unwrap().unwrap();

        let ahead = JobProgress { total: 5, processed: 3, success: 2, failed: 1 };
        store.update_progress(job.id, "w1", ahead).await.unwrap();
        store
            .update_progress(job.id, "w1", JobProgress { total: 5, processed: 1, success: 1, failed: 0 })
            .await
            .unwrap();

        assert_eq!(store.get(job.id).await.unwrap().unwrap().progress, ahead);
    }

    #[tokio::test]
    async fn list_by_resource_is_newest_first() {
        let store = MemoryJobStore::new();
        let first = ImportJob::queued(
            NewImportJob::new(ResourceKey::Products, "1.csv", "uploads/1.csv"),
            Utc::now() - chrono::Duration::minutes(1),
        );
        store.insert(first.clone());
        let second = queued(&store, "2.csv");

        let jobs = store.list_by_resource(ResourceKey::Products).await.unwrap();
        assert_eq!(jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert!(store.list_by_resource(ResourceKey::Customers).await.unwrap().is_empty());
    }

    // ==========================================================================
    // PostgreSQL (requires DATABASE_URL pointing at a scratch database)
    // ==========================================================================

    async fn pg_store() -> PgJobStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        PgJobStore::new(pool)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // requires PostgreSQL
    async fn pg_claim_is_exclusive_across_concurrent_callers() {
        let store = Arc::new(pg_store().await);
        let job = store
            .create(NewImportJob::new(ResourceKey::Customers, "pg.csv", "uploads/pg.csv"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .claim_next(&format!("pg-worker-{}", i), TTL, Some(ResourceKey::Customers))
                    .await
                    .unwrap()
            }));
        }

        let winners: Vec<ImportJob> = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(winners.iter().filter(|j| j.id == job.id).count(), 1);

        let owner = winners.iter().find(|j| j.id == job.id).unwrap().locked_by.clone().unwrap();
        assert!(store.mark_failed(job.id, &owner, "Failed", "test cleanup").await.unwrap());
    }

    #[tokio::test]
    #[ignore] // requires PostgreSQL
    async fn pg_create_announces_the_job() {
        let store = pg_store().await;
        let mut listener = sqlx::postgres::PgListener::connect_with(&store.pool).await.unwrap();
        listener.listen(queries::JOBS_QUEUED_CHANNEL).await.unwrap();

        let job = store
            .create(NewImportJob::new(ResourceKey::Customers, "note.csv", "uploads/note.csv"))
            .await
            .unwrap();

        let announced = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notification = listener.recv().await.unwrap();
                if notification.payload() == job.id.to_string() {
                    break;
                }
            }
        })
        .await;
        assert!(announced.is_ok(), "no notification for job {}", job.id);

        let claimed = store
            .claim_next("pg-listener-test", TTL, Some(ResourceKey::Customers))
            .await
            .unwrap()
            .unwrap();
        store.mark_failed(claimed.id, "pg-listener-test", "Failed", "test cleanup").await.unwrap();
    }
}
