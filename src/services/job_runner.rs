//! Runs one claimed job through its pipeline and records the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::job_queue::JobQueue;
use crate::services::platform::TargetPlatform;
use crate::services::product_sync::{ProductSyncEngine, ProgressSink, SyncError, SyncSettings};
use crate::services::report_builder::ReportError;
use crate::types::{ImportJob, JobProgress, MigrationSummary, ResourceKey};

/// Failures that end a job without a report
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Missing file: {0}")]
    MissingFile(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported resourceKey: {0}")]
    UnsupportedResource(ResourceKey),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl JobError {
    /// Short status text stored in the job's `message`
    pub fn message(&self) -> &'static str {
        match self {
            JobError::MissingFile(_) => "Uploaded file not found",
            JobError::Io { .. } => "Uploaded file could not be read",
            JobError::UnsupportedResource(_) => "Unsupported resourceKey",
            JobError::Sync(_) => "Failed to parse file",
            JobError::Report(_) => "Failed to write report",
        }
    }
}

/// Persists pipeline progress on the job record
struct JobProgressSink<'a> {
    queue: &'a JobQueue,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for JobProgressSink<'_> {
    async fn message(&self, message: &str) {
        if let Err(e) = self.queue.update_message(self.job_id, message).await {
            warn!("Failed to update message on job {}: {}", self.job_id, e);
        }
    }

    async fn progress(&self, progress: JobProgress) {
        if let Err(e) = self.queue.update_progress(self.job_id, progress).await {
            warn!("Failed to update progress on job {}: {}", self.job_id, e);
        }
    }
}

pub struct JobRunner {
    queue: JobQueue,
    platform: Arc<dyn TargetPlatform>,
    settings: SyncSettings,
    reports_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        queue: JobQueue,
        platform: Arc<dyn TargetPlatform>,
        settings: SyncSettings,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queue,
            platform,
            settings,
            reports_dir: reports_dir.into(),
        }
    }

    /// Run a claimed job to a terminal state
    pub async fn run(&self, job: ImportJob) {
        let job_id = job.id;
        let _heartbeat = self.queue.heartbeat(job_id);
        info!("Running job {} ({}, {})", job_id, job.resource_key, job.original_file_name);

        let recorded = match self.execute(&job).await {
            Ok(summary) => self.queue.mark_completed(job_id, &summary).await,
            Err(e) => {
                warn!("Job {} failed: {}", job_id, e);
                self.queue.mark_failed(job_id, e.message(), &e.to_string()).await
            }
        };

        if let Err(e) = recorded {
            error!("Failed to record outcome of job {}: {}", job_id, e);
        }
    }

    async fn execute(&self, job: &ImportJob) -> Result<MigrationSummary, JobError> {
        let progress = JobProgressSink {
            queue: &self.queue,
            job_id: job.id,
        };

        progress.message("Reading file...").await;
        let bytes = match tokio::fs::read(&job.uploaded_file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobError::MissingFile(job.uploaded_file_path.clone()))
            }
            Err(source) => {
                return Err(JobError::Io {
                    path: job.uploaded_file_path.clone(),
                    source,
                })
            }
        };

        match job.resource_key {
            ResourceKey::Products => {
                let report = ProductSyncEngine::new(Arc::clone(&self.platform), self.settings.clone())
                    .run(&job.original_file_name, &bytes, &progress)
                    .await?;
                Ok(report.finish(&self.reports_dir, job.id, Utc::now()).await?)
            }
            other => Err(JobError::UnsupportedResource(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::{JobStore, MemoryJobStore};
    use crate::services::platform::{MockPlatform, UserError};
    use crate::types::{JobStatus, NewImportJob};
    use std::time::Duration;

    const SHEET: &str = "Handle,Title,Option1 Name,Option1 Value,Variant Price\n\
                         tee,Tee,Size,S,10\n\
                         mug,Mug,Title,Default Title,5\n\
                         cap,Cap,Title,Default Title,7\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        store: MemoryJobStore,
        runner: JobRunner,
        queue: JobQueue,
        uploads: PathBuf,
    }

    fn fixture(platform: MockPlatform) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let store = MemoryJobStore::new();
        let queue = JobQueue::new(Arc::new(store.clone()), "test-worker", Duration::from_secs(60));
        let settings = SyncSettings {
            product_delay: Duration::ZERO,
            metafield_definition_delay: Duration::ZERO,
        };
        let runner = JobRunner::new(queue.clone(), Arc::new(platform), settings, dir.path().join("reports"));
        Fixture { _dir: dir, store, runner, queue, uploads }
    }

    async fn submit(f: &Fixture, resource: ResourceKey, name: &str, contents: Option<&str>) -> Uuid {
        let path = f.uploads.join(name);
        if let Some(contents) = contents {
            std::fs::write(&path, contents).unwrap();
        }
        let job = f
            .store
            .create(NewImportJob::new(resource, name, &path.display().to_string()))
            .await
            .unwrap();
        job.id
    }

    async fn claim_and_run(f: &Fixture) -> ImportJob {
        let job = f.queue.claim_next().await.unwrap().unwrap();
        let id = job.id;
        f.runner.run(job).await;
        f.store.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn completed_job_carries_report_and_counters() {
        let platform = MockPlatform::dry_run()
            .with_product_set_errors("mug", vec![UserError::new(Some("INVALID"), &["input"], "Bad")]);
        let f = fixture(platform);
        submit(&f, ResourceKey::Products, "products.csv", Some(SHEET)).await;

        let job = claim_and_run(&f).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.message, "Completed");
        assert_eq!(job.progress, JobProgress { total: 3, processed: 3, success: 2, failed: 1 });
        assert_eq!(job.locked_by, None);
        let report_path = job.report_path.unwrap();
        assert!(std::path::Path::new(&report_path).exists());
        assert!(job.report_file_name.unwrap().ends_with(".xlsx"));
    }

    #[tokio::test]
    async fn missing_upload_fails_without_report() {
        let f = fixture(MockPlatform::dry_run());
        submit(&f, ResourceKey::Products, "gone.csv", None).await;

        let job = claim_and_run(&f).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Uploaded file not found");
        assert!(job.error.starts_with("Missing file: "));
        assert!(job.report_path.is_none());
    }

    #[tokio::test]
    async fn resources_without_pipeline_fail_as_unsupported() {
        let f = fixture(MockPlatform::dry_run());
        submit(&f, ResourceKey::Customers, "customers.csv", Some("Email\na@b.c\n")).await;

        let job = claim_and_run(&f).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Unsupported resourceKey");
        assert_eq!(job.error, "Unsupported resourceKey: customers");
    }

    #[tokio::test]
    async fn unsupported_file_type_fails_the_job() {
        let f = fixture(MockPlatform::dry_run());
        submit(&f, ResourceKey::Products, "products.txt", Some(SHEET)).await;

        let job = claim_and_run(&f).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Failed to parse file");
        assert!(job.error.contains("Unsupported file type"), "{}", job.error);
    }

    #[tokio::test]
    async fn sheet_without_header_row_fails_the_job() {
        let f = fixture(MockPlatform::dry_run());
        submit(&f, ResourceKey::Products, "blank.csv", Some("")).await;

        let job = claim_and_run(&f).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "Failed to parse file");
        assert!(job.error.contains("no worksheet or header row"), "{}", job.error);
        assert!(job.report_path.is_none());
    }
}
