//! Job Queue Coordinator
//!
//! Wraps a `JobStore` with this worker's identity, lock TTL and optional
//! resource filter. Every state transition goes through the store's atomic
//! operations; there is no process-local locking here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::job_store::JobStore;
use crate::types::{ImportJob, JobProgress, MigrationSummary, ResourceKey};

pub const DEFAULT_FAILED_MESSAGE: &str = "Failed";
pub const DEFAULT_FAILED_ERROR: &str = "Unknown error";

/// Shortest heartbeat interval, also used when the TTL is tiny
const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    worker_id: String,
    lock_ttl: Duration,
    resource_filter: Option<ResourceKey>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, worker_id: impl Into<String>, lock_ttl: Duration) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
            lock_ttl,
            resource_filter: None,
        }
    }

    /// Only claim jobs for this resource
    pub fn with_resource_filter(mut self, resource_key: Option<ResourceKey>) -> Self {
        self.resource_filter = resource_key;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Next job for this worker, or `None` when no work is available
    pub async fn claim_next(&self) -> Result<Option<ImportJob>> {
        let job = self
            .store
            .claim_next(&self.worker_id, self.lock_ttl, self.resource_filter)
            .await?;
        if let Some(job) = &job {
            info!(
                "Worker {} claimed job {} ({}, {})",
                self.worker_id, job.id, job.resource_key, job.original_file_name
            );
        }
        Ok(job)
    }

    pub async fn update_message(&self, job_id: Uuid, message: &str) -> Result<()> {
        self.store.update_message(job_id, &self.worker_id, message).await
    }

    pub async fn update_progress(&self, job_id: Uuid, progress: JobProgress) -> Result<()> {
        self.store.update_progress(job_id, &self.worker_id, progress).await
    }

    /// Returns false if this worker no longer owned the job
    pub async fn mark_completed(&self, job_id: Uuid, summary: &MigrationSummary) -> Result<bool> {
        let updated = self.store.mark_completed(job_id, &self.worker_id, summary).await?;
        if updated {
            info!(
                "Job {} completed: {} products, {} success, {} failed",
                job_id, summary.report_count, summary.success_count, summary.failed_count
            );
        } else {
            warn!("Job {} completed but worker {} no longer holds its lock", job_id, self.worker_id);
        }
        Ok(updated)
    }

    /// Terminal failure. Empty message or error fall back to the defaults.
    pub async fn mark_failed(&self, job_id: Uuid, message: &str, error: &str) -> Result<bool> {
        let message = if message.is_empty() { DEFAULT_FAILED_MESSAGE } else { message };
        let error = if error.is_empty() { DEFAULT_FAILED_ERROR } else { error };

        let updated = self.store.mark_failed(job_id, &self.worker_id, message, error).await?;
        if updated {
            warn!("Job {} failed: {} ({})", job_id, message, error);
        } else {
            warn!("Job {} failed but worker {} no longer holds its lock", job_id, self.worker_id);
        }
        Ok(updated)
    }

    /// Keep the job's lock fresh until the returned guard is dropped
    pub fn heartbeat(&self, job_id: Uuid) -> Heartbeat {
        let token = CancellationToken::new();
        let interval = (self.lock_ttl / 3).max(MIN_HEARTBEAT);
        let store = Arc::clone(&self.store);
        let worker_id = self.worker_id.clone();
        let stop = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                match store.renew_lock(job_id, &worker_id).await {
                    Ok(true) => debug!("Renewed lock on job {}", job_id),
                    Ok(false) => {
                        warn!("Worker {} lost the lock on job {}", worker_id, job_id);
                        break;
                    }
                    Err(e) => warn!("Failed to renew lock on job {}: {}", job_id, e),
                }
            }
        });

        Heartbeat { token }
    }
}

/// Stops lock renewal when dropped
pub struct Heartbeat {
    token: CancellationToken,
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
