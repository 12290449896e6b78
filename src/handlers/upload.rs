//! Job creation boundary

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use super::HandlerError;
use crate::services::job_store::JobStore;
use crate::services::sheet::{SheetError, SheetFormat};
use crate::types::{ImportJob, NewImportJob, ResourceKey};

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if clean.is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}

/// `{unix_millis}_{8 hex}_{name}` under `uploads_dir`
fn stored_path(uploads_dir: &Path, safe_name: &str) -> PathBuf {
    let suffix: u32 = rand::random();
    uploads_dir.join(format!("{}_{:08x}_{}", Utc::now().timestamp_millis(), suffix, safe_name))
}

/// Store the uploaded sheet and queue a job for it.
/// Never waits for the job to run. The store announces the job to serving pools.
pub async fn submit_upload(
    store: &dyn JobStore,
    uploads_dir: &Path,
    resource_key: ResourceKey,
    file_name: &str,
    bytes: &[u8],
) -> Result<ImportJob, HandlerError> {
    let safe_name = sanitize_file_name(file_name);
    SheetFormat::from_file_name(&safe_name).map_err(|e| match e {
        SheetError::UnsupportedExtension(ext) => HandlerError::UnsupportedExtension(ext),
        other => HandlerError::UnsupportedExtension(other.to_string()),
    })?;
    if bytes.is_empty() {
        return Err(HandlerError::EmptyFile);
    }

    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|source| HandlerError::Io {
            path: uploads_dir.display().to_string(),
            source,
        })?;
    let path = stored_path(uploads_dir, &safe_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| HandlerError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let hash = hex::encode(Sha256::digest(bytes));
    let job = store
        .create(NewImportJob::new(resource_key, file_name, &path.display().to_string()).with_file_hash(hash))
        .await?;
    info!("Queued {} job {} for {} ({} bytes)", resource_key, job.id, file_name, bytes.len());

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::MemoryJobStore;
    use crate::types::JobStatus;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("My Products (1).xlsx"), "My_Products__1_.xlsx");
        assert_eq!(sanitize_file_name("../../etc/passwd.csv"), "passwd.csv");
        assert_eq!(sanitize_file_name("ok-name_2.csv"), "ok-name_2.csv");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[tokio::test]
    async fn upload_is_stored_hashed_and_queued() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();

        let job = submit_upload(&store, dir.path(), ResourceKey::Products, "Export 1.CSV", b"Handle\ntee\n")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.message, "File uploaded");
        assert_eq!(job.original_file_name, "Export 1.CSV");
        assert!(job.uploaded_file_path.ends_with("_Export_1.CSV"));
        assert_eq!(std::fs::read(&job.uploaded_file_path).unwrap(), b"Handle\ntee\n");
        assert_eq!(job.file_hash.as_deref().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::new();

        let err = submit_upload(&store, dir.path(), ResourceKey::Products, "notes.txt", b"x")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "UNSUPPORTED_FILE_TYPE");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.list_by_resource(ResourceKey::Products).await.unwrap().is_empty());
    }
}
