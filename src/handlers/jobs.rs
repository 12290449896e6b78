//! Job status query and report download boundaries

use std::path::PathBuf;

use uuid::Uuid;

use super::HandlerError;
use crate::services::job_store::JobStore;
use crate::types::{ImportJob, JobStatus, ResourceKey};

pub async fn get_job(store: &dyn JobStore, job_id: Uuid) -> Result<ImportJob, HandlerError> {
    store.get(job_id).await?.ok_or(HandlerError::JobNotFound(job_id))
}

/// Newest first
pub async fn list_jobs(store: &dyn JobStore, resource_key: ResourceKey) -> Result<Vec<ImportJob>, HandlerError> {
    Ok(store.list_by_resource(resource_key).await?)
}

/// An opened report ready to be streamed
#[derive(Debug)]
pub struct ReportDownload {
    pub file: tokio::fs::File,
    pub file_name: String,
}

pub async fn open_report(store: &dyn JobStore, job_id: Uuid) -> Result<ReportDownload, HandlerError> {
    let job = get_job(store, job_id).await?;
    if job.status != JobStatus::Completed {
        return Err(HandlerError::ReportNotReady(job_id));
    }
    let path = job.report_path.map(PathBuf::from).ok_or(HandlerError::ReportNotReady(job_id))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HandlerError::ReportMissing(path.display().to_string()))
        }
        Err(source) => {
            return Err(HandlerError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let file_name = job.report_file_name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.xlsx".to_string())
    });

    Ok(ReportDownload { file, file_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::MemoryJobStore;
    use crate::types::{MigrationSummary, NewImportJob};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    async fn completed_job(store: &MemoryJobStore, report_path: &str) -> Uuid {
        let job = store
            .create(NewImportJob::new(ResourceKey::Products, "p.csv", "uploads/p.csv"))
            .await
            .unwrap();
        store.claim_next("w", Duration::from_secs(60), None).await.unwrap();
        let summary = MigrationSummary {
            total_processed: 1,
            report_count: 1,
            success_count: 1,
            failed_count: 0,
            report_path: report_path.to_string(),
        };
        store.mark_completed(job.id, "w", &summary).await.unwrap();
        job.id
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = get_job(&store, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "JOB_NOT_FOUND");
    }

    #[tokio::test]
    async fn queued_job_has_no_report() {
        let store = MemoryJobStore::new();
        let job = store
            .create(NewImportJob::new(ResourceKey::Products, "p.csv", "uploads/p.csv"))
            .await
            .unwrap();
        let err = open_report(&store, job.id).await.unwrap_err();
        assert_eq!(err.code(), "REPORT_NOT_READY");
    }

    #[tokio::test]
    async fn completed_report_opens_with_stored_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products_upload_report_x.xlsx");
        std::fs::write(&path, b"xlsx-bytes").unwrap();
        let store = MemoryJobStore::new();
        let id = completed_job(&store, &path.display().to_string()).await;

        let mut download = open_report(&store, id).await.unwrap();
        let mut contents = Vec::new();
        download.file.read_to_end(&mut contents).await.unwrap();

        assert_eq!(download.file_name, "products_upload_report_x.xlsx");
        assert_eq!(contents, b"xlsx-bytes");
    }

    #[tokio::test]
    async fn deleted_report_file_is_reported_missing() {
        let store = MemoryJobStore::new();
        let id = completed_job(&store, "/nonexistent/report.xlsx").await;
        let err = open_report(&store, id).await.unwrap_err();
        assert_eq!(err.code(), "REPORT_MISSING");
    }
}
