//! Per-product report rows and the aggregate handed back to the job queue

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Success,
    Failed,
}

impl ReportStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Success => "SUCCESS",
            ReportStatus::Failed => "FAILED",
        }
    }
}

/// Outcome for one staging product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub product_id: Option<String>,
    pub handle: String,
    pub title: Option<String>,
    pub status: ReportStatus,
    pub created_id: Option<String>,
    pub reason: String,
}

/// Aggregate result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub total_processed: i32,
    pub report_count: i32,
    pub success_count: i32,
    pub failed_count: i32,
    pub report_path: String,
}

impl MigrationSummary {
    /// File name part of `report_path`
    pub fn report_file_name(&self) -> String {
        std::path::Path::new(&self.report_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.report_path.clone())
    }
}
