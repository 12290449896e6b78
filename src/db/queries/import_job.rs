//! Import job queries
//!
//! Every state transition is a single `UPDATE` so the database is the only
//! arbiter between worker processes.

use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{ImportJob, ImportJobRow, JobProgress, MigrationSummary, NewImportJob, ResourceKey};

const COLUMNS: &str = "id, resource_key, original_file_name, uploaded_file_path, file_hash, \
     status, locked_at, locked_by, \
     progress_total, progress_processed, progress_success, progress_failed, \
     message, error, report_path, report_file_name, created_at, updated_at";

/// Channel a serving pool listens on for newly queued jobs
pub const JOBS_QUEUED_CHANNEL: &str = "import_jobs_queued";

// =============================================================================
// CREATE / READ
// =============================================================================

/// Insert a new queued job
pub async fn create_import_job(pool: &PgPool, job: &NewImportJob) -> Result<ImportJob> {
    let query = format!(
        "INSERT INTO import_jobs (id, resource_key, original_file_name, uploaded_file_path, file_hash, status, message) \
         VALUES ($1, $2, $3, $4, $5, 'queued', $6) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, ImportJobRow>(&query)
        .bind(job.id)
        .bind(job.resource_key)
        .bind(&job.original_file_name)
        .bind(&job.uploaded_file_path)
        .bind(&job.file_hash)
        .bind(&job.message)
        .fetch_one(pool)
        .await?;

    Ok(row.into())
}

/// Announce a queued job to listening pools. Payload is the job id.
pub async fn notify_import_job_queued(pool: &PgPool, job_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(JOBS_QUEUED_CHANNEL)
        .bind(job_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_import_job(pool: &PgPool, job_id: Uuid) -> Result<Option<ImportJob>> {
    let query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1");
    let row = sqlx::query_as::<_, ImportJobRow>(&query)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Into::into))
}

/// All jobs for a resource, newest first
pub async fn list_import_jobs_by_resource(pool: &PgPool, resource_key: ResourceKey) -> Result<Vec<ImportJob>> {
    let query = format!(
        "SELECT {COLUMNS} FROM import_jobs WHERE resource_key = $1 ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, ImportJobRow>(&query)
        .bind(resource_key)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// CLAIM / LOCK
// =============================================================================

/// Atomically claim the oldest claimable job.
///
/// Claimable means queued with no lock or a stale one, or running with a
/// stale lock (the previous owner is presumed dead). `SKIP LOCKED` keeps
/// concurrent claimers from blocking on, or both receiving, the same row.
pub async fn claim_next_import_job(
    pool: &PgPool,
    worker_id: &str,
    lock_ttl: Duration,
    resource_key: Option<ResourceKey>,
) -> Result<Option<ImportJob>> {
    let query = format!(
        "UPDATE import_jobs \
         SET status = 'running', locked_at = NOW(), locked_by = $1, \
             message = 'Job claimed', error = '', updated_at = NOW() \
         WHERE id = ( \
             SELECT id FROM import_jobs \
             WHERE ($2::resource_key IS NULL OR resource_key = $2) \
               AND ( \
                   (status = 'queued' AND (locked_at IS NULL OR locked_at < NOW() - make_interval(secs => $3))) \
                OR (status = 'running' AND locked_at < NOW() - make_interval(secs => $3)) \
               ) \
             ORDER BY created_at ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, ImportJobRow>(&query)
        .bind(worker_id)
        .bind(resource_key)
        .bind(lock_ttl.as_secs_f64())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Into::into))
}

/// Refresh `locked_at` for a job the worker still owns. Returns false if the lock was lost.
pub async fn renew_import_job_lock(pool: &PgPool, job_id: Uuid, worker_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE import_jobs SET locked_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status = 'running' AND locked_by = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// PROGRESS
// =============================================================================

pub async fn update_import_job_message(pool: &PgPool, job_id: Uuid, worker_id: &str, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE import_jobs SET message = $3, updated_at = NOW() \
         WHERE id = $1 AND status = 'running' AND locked_by = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Write progress counters; `GREATEST` keeps each counter non-decreasing
pub async fn update_import_job_progress(
    pool: &PgPool,
    job_id: Uuid,
    worker_id: &str,
    progress: &JobProgress,
) -> Result<()> {
    sqlx::query(
        "UPDATE import_jobs SET \
             progress_total = GREATEST(progress_total, $3), \
             progress_processed = GREATEST(progress_processed, $4), \
             progress_success = GREATEST(progress_success, $5), \
             progress_failed = GREATEST(progress_failed, $6), \
             updated_at = NOW() \
         WHERE id = $1 AND status = 'running' AND locked_by = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .bind(progress.total)
    .bind(progress.processed)
    .bind(progress.success)
    .bind(progress.failed)
    .execute(pool)
    .await?;

    Ok(())
}

// =============================================================================
// TERMINAL TRANSITIONS
// =============================================================================

/// Move an owned running job to `completed`. Returns false if the worker no longer owns it.
pub async fn complete_import_job(
    pool: &PgPool,
    job_id: Uuid,
    worker_id: &str,
    summary: &MigrationSummary,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE import_jobs SET \
             status = 'completed', locked_at = NULL, locked_by = NULL, \
             progress_total = $3, progress_processed = $3, \
             progress_success = $4, progress_failed = $5, \
             report_path = $6, report_file_name = $7, \
             message = 'Completed', error = '', updated_at = NOW() \
         WHERE id = $1 AND status = 'running' AND locked_by = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .bind(summary.report_count)
    .bind(summary.success_count)
    .bind(summary.failed_count)
    .bind(&summary.report_path)
    .bind(summary.report_file_name())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Move an owned running job to `failed`. Returns false if the worker no longer owns it.
pub async fn fail_import_job(
    pool: &PgPool,
    job_id: Uuid,
    worker_id: &str,
    message: &str,
    error: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE import_jobs SET \
             status = 'failed', locked_at = NULL, locked_by = NULL, \
             message = $3, error = $4, updated_at = NOW() \
         WHERE id = $1 AND status = 'running' AND locked_by = $2",
    )
    .bind(job_id)
    .bind(worker_id)
    .bind(message)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
