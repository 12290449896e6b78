//! Report Builder
//!
//! Collects one `ReportRow` per staging product and renders them into the
//! downloadable `.xlsx` report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::info;
use uuid::Uuid;

use crate::types::{MigrationSummary, ReportRow, ReportStatus};

const SHEET_NAME: &str = "Products Report";

const HEADERS: [&str; 7] = [
    "Sr No",
    "Product ID",
    "Handle",
    "Title",
    "Status",
    "Created Product GID",
    "Reason",
];

const COLUMN_WIDTHS: [f64; 7] = [8.0, 28.0, 32.0, 40.0, 10.0, 36.0, 60.0];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to create reports directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render report: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Report rendering task failed: {0}")]
    Task(#[from] JoinError),

    #[error("Failed to save report {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
pub struct ReportBuilder {
    rows: Vec<ReportRow>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ReportRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn success_count(&self) -> usize {
        self.count(ReportStatus::Success)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ReportStatus::Failed)
    }

    fn count(&self, status: ReportStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Render the workbook into memory
    pub fn to_xlsx(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, (header, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, *header, &bold)?;
            worksheet.set_column_width(col, width)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let r = i as u32 + 1;
            worksheet.write_number(r, 0, (i + 1) as f64)?;
            worksheet.write_string(r, 1, row.product_id.as_deref().unwrap_or_default())?;
            worksheet.write_string(r, 2, &row.handle)?;
            worksheet.write_string(r, 3, row.title.as_deref().unwrap_or_default())?;
            worksheet.write_string(r, 4, row.status.as_str())?;
            worksheet.write_string(r, 5, row.created_id.as_deref().unwrap_or_default())?;
            worksheet.write_string(r, 6, &row.reason)?;
        }

        workbook.save_to_buffer()
    }

    /// Persist the report under `reports_dir` and return the job's counters.
    /// Rendering runs on the blocking pool.
    pub async fn finish(
        self,
        reports_dir: &Path,
        job_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MigrationSummary, ReportError> {
        tokio::fs::create_dir_all(reports_dir)
            .await
            .map_err(|source| ReportError::Directory {
                path: reports_dir.display().to_string(),
                source,
            })?;

        let path = report_path(reports_dir, job_id, now);
        let summary = MigrationSummary {
            total_processed: self.rows.len() as i32,
            report_count: self.rows.len() as i32,
            success_count: self.success_count() as i32,
            failed_count: self.failed_count() as i32,
            report_path: path.display().to_string(),
        };

        let bytes = tokio::task::spawn_blocking(move || self.to_xlsx()).await??;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ReportError::Save {
                path: path.display().to_string(),
                source,
            })?;

        info!(
            "Report saved to {} ({} success, {} failed)",
            summary.report_path, summary.success_count, summary.failed_count
        );
        Ok(summary)
    }
}

/// `products_upload_report_{timestamp}_{job short id}.xlsx`
pub fn report_path(reports_dir: &Path, job_id: Uuid, now: DateTime<Utc>) -> PathBuf {
    let short_id: String = job_id.simple().to_string().chars().take(8).collect();
    reports_dir.join(format!(
        "products_upload_report_{}_{}.xlsx",
        now.format("%Y-%m-%d_%H-%M-%S"),
        short_id
    ))
}
