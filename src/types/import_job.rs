//! Import job record types
//!
//! One `ImportJob` row exists per migration run. Status moves
//! `queued -> running -> {completed | failed}` and never leaves a terminal state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ==========================================================================
// Enums
// ==========================================================================

/// Kind of catalog data carried by an uploaded sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "resource_key", rename_all = "snake_case")]
pub enum ResourceKey {
    Products,
    Orders,
    Customers,
}

impl ResourceKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKey::Products => "products",
            ResourceKey::Orders => "orders",
            ResourceKey::Customers => "customers",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "products" => Ok(ResourceKey::Products),
            "orders" => Ok(ResourceKey::Orders),
            "customers" => Ok(ResourceKey::Customers),
            other => Err(format!("unknown resource key: {}", other)),
        }
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "import_job_status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

// ==========================================================================
// Records
// ==========================================================================

/// Progress counters, monotonically non-decreasing while a job runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total: i32,
    pub processed: i32,
    pub success: i32,
    pub failed: i32,
}

impl JobProgress {
    /// Field-wise maximum, used so a late or repeated write never moves a counter backwards
    pub fn max(self, other: JobProgress) -> JobProgress {
        JobProgress {
            total: self.total.max(other.total),
            processed: self.processed.max(other.processed),
            success: self.success.max(other.success),
            failed: self.failed.max(other.failed),
        }
    }
}

/// Durable migration job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub resource_key: ResourceKey,
    pub original_file_name: String,
    pub uploaded_file_path: String,
    pub file_hash: Option<String>,
    pub status: JobStatus,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub progress: JobProgress,
    pub message: String,
    pub error: String,
    pub report_path: Option<String>,
    pub report_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// Build a freshly queued job (the Postgres store lets the database fill timestamps)
    pub fn queued(new: NewImportJob, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            resource_key: new.resource_key,
            original_file_name: new.original_file_name,
            uploaded_file_path: new.uploaded_file_path,
            file_hash: new.file_hash,
            status: JobStatus::Queued,
            locked_at: None,
            locked_by: None,
            progress: JobProgress::default(),
            message: new.message,
            error: String::new(),
            report_path: None,
            report_file_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_locked_by(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Running && self.locked_by.as_deref() == Some(worker_id)
    }
}

/// Flat database row for `import_jobs`
#[derive(Debug, Clone, FromRow)]
pub struct ImportJobRow {
    pub id: Uuid,
    pub resource_key: ResourceKey,
    pub original_file_name: String,
    pub uploaded_file_path: String,
    pub file_hash: Option<String>,
    pub status: JobStatus,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub progress_total: i32,
    pub progress_processed: i32,
    pub progress_success: i32,
    pub progress_failed: i32,
    pub message: String,
    pub error: String,
    pub report_path: Option<String>,
    pub report_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ImportJobRow> for ImportJob {
    fn from(row: ImportJobRow) -> Self {
        Self {
            id: row.id,
            resource_key: row.resource_key,
            original_file_name: row.original_file_name,
            uploaded_file_path: row.uploaded_file_path,
            file_hash: row.file_hash,
            status: row.status,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
            progress: JobProgress {
                total: row.progress_total,
                processed: row.progress_processed,
                success: row.progress_success,
                failed: row.progress_failed,
            },
            message: row.message,
            error: row.error,
            report_path: row.report_path,
            report_file_name: row.report_file_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating a job at upload acceptance
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub id: Uuid,
    pub resource_key: ResourceKey,
    pub original_file_name: String,
    pub uploaded_file_path: String,
    pub file_hash: Option<String>,
    pub message: String,
}

impl NewImportJob {
    pub fn new(resource_key: ResourceKey, original_file_name: &str, uploaded_file_path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_key,
            original_file_name: original_file_name.to_string(),
            uploaded_file_path: uploaded_file_path.to_string(),
            file_hash: None,
            message: "File uploaded".to_string(),
        }
    }

    pub fn with_file_hash(mut self, hash: impl Into<String>) -> Self {
        self.file_hash = Some(hash.into());
        self
    }
}
