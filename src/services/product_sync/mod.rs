//! Target Synchronization Engine
//!
//! Runs the products pipeline for one uploaded file:
//! 1. parse the sheet and classify its columns
//! 2. load collections, publications and locations from the target
//! 3. reconcile metafield definitions
//! 4. fold rows into staging products
//! 5. for each product, in order: lookup by handle → create → publish
//!
//! Product calls are strictly sequential with a fixed delay after each product.
//! A failure on one product becomes a FAILED report row; the loop continues.

pub mod publish;
pub mod transform;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::metafield_schema::MetafieldReconciler;
use crate::services::platform::{
    format_user_errors, PlatformError, PublicationMap, TargetPlatform,
};
use crate::services::report_builder::ReportBuilder;
use crate::services::row_assembler::columns::ColumnSchema;
use crate::services::row_assembler::{LocationMap, RowAssembler};
use crate::services::sheet::{read_sheet, SheetError};
use crate::types::{JobProgress, ReportRow, ReportStatus, StagingProduct};

use self::publish::publication_targets;
use self::transform::build_product_set_input;

pub const ALREADY_EXISTS_REASON: &str = "Product already exists on target store";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error("Invalid header pattern: {0}")]
    HeaderPattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Pause after every product
    pub product_delay: Duration,
    /// Pause after every metafield definition create
    pub metafield_definition_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            product_delay: Duration::from_millis(1000),
            metafield_definition_delay: Duration::from_millis(250),
        }
    }
}

/// Receives pipeline progress. Implemented by the job runner to persist it.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn message(&self, message: &str);

    async fn progress(&self, progress: JobProgress);
}

/// Discards progress
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn message(&self, _message: &str) {}

    async fn progress(&self, _progress: JobProgress) {}
}

/// Lookup maps fetched once per run. A map that fails to load stays empty.
#[derive(Debug, Clone, Default)]
pub struct TargetContext {
    pub collections: HashMap<String, String>,
    pub publications: PublicationMap,
    pub locations: LocationMap,
}

impl TargetContext {
    pub async fn load(platform: &dyn TargetPlatform) -> Self {
        let collections = platform.collection_ids_by_handle().await.unwrap_or_else(|e| {
            warn!("Collections not loaded, collection links will be skipped: {}", e);
            HashMap::new()
        });

        let publications = match platform.publications().await {
            Ok(publications) => PublicationMap::from_publications(&publications),
            Err(e) => {
                warn!("Publications not loaded, products will not be published: {}", e);
                PublicationMap::default()
            }
        };

        let locations = match platform.locations().await {
            Ok(locations) => locations.into_iter().map(|l| (l.name, l.id)).collect(),
            Err(e) => {
                warn!("Locations not loaded, inventory quantities will be skipped: {}", e);
                LocationMap::new()
            }
        };

        debug!(
            "Target context: {} collections, {} locations, publications loaded: {}",
            collections.len(),
            locations.len(),
            !publications.is_empty()
        );
        Self { collections, publications, locations }
    }
}

pub struct ProductSyncEngine {
    platform: Arc<dyn TargetPlatform>,
    settings: SyncSettings,
}

impl ProductSyncEngine {
    pub fn new(platform: Arc<dyn TargetPlatform>, settings: SyncSettings) -> Self {
        Self { platform, settings }
    }

    /// Migrate every product in the file. Only parse failures are errors.
    pub async fn run(
        &self,
        file_name: &str,
        bytes: &[u8],
        progress: &dyn ProgressSink,
    ) -> Result<ReportBuilder, SyncError> {
        let table = read_sheet(file_name, bytes)?;
        let schema = ColumnSchema::from_headers(&table.headers)?;
        info!("Parsed {} rows from {} via {}", table.rows.len(), file_name, self.platform.name());

        let context = TargetContext::load(self.platform.as_ref()).await;

        MetafieldReconciler::new(self.platform.as_ref(), self.settings.metafield_definition_delay)
            .reconcile(&schema)
            .await;

        let products = RowAssembler::new(&schema, &context.locations).assemble(&table);
        let total = products.len() as i32;
        info!("Assembled {} products", total);

        progress.message("Migrating...").await;
        let mut counters = JobProgress { total, ..Default::default() };
        progress.progress(counters).await;

        let mut report = ReportBuilder::new();
        for (i, product) in products.iter().enumerate() {
            info!("Migrating product {}/{}: {}", i + 1, total, product.handle);

            let row = self.sync_product(product, &context).await;
            match row.status {
                ReportStatus::Success => counters.success += 1,
                ReportStatus::Failed => counters.failed += 1,
            }
            counters.processed += 1;
            report.push(row);
            progress.progress(counters).await;

            tokio::time::sleep(self.settings.product_delay).await;
        }

        Ok(report)
    }

    async fn sync_product(&self, product: &StagingProduct, context: &TargetContext) -> ReportRow {
        match self.try_sync_product(product, context).await {
            Ok(row) => row,
            Err(e) => {
                warn!("Product {} failed: {}", product.handle, e);
                report_row(product, ReportStatus::Failed, None, e.to_string())
            }
        }
    }

    async fn try_sync_product(
        &self,
        product: &StagingProduct,
        context: &TargetContext,
    ) -> Result<ReportRow, PlatformError> {
        if let Some(existing_id) = self.platform.product_id_by_handle(&product.handle).await? {
            info!("Product {} already exists on target as {}", product.handle, existing_id);
            return Ok(report_row(
                product,
                ReportStatus::Success,
                Some(existing_id),
                ALREADY_EXISTS_REASON.to_string(),
            ));
        }

        let input = build_product_set_input(product, &context.collections, None);
        let outcome = self.platform.product_set(&input).await?;

        if !outcome.user_errors.is_empty() {
            let reason = format_user_errors(&outcome.user_errors);
            warn!("Product {} rejected: {}", product.handle, reason);
            return Ok(report_row(product, ReportStatus::Failed, None, reason));
        }

        let Some(product_id) = outcome.product_id else {
            warn!("Product {} created but no id was returned", product.handle);
            return Ok(report_row(product, ReportStatus::Success, None, String::new()));
        };
        info!("Created {} → {}", product.handle, product_id);

        let targets = publication_targets(product, &context.publications);
        if targets.is_empty() {
            debug!("No publications for {}", product.handle);
        } else {
            let errors = self.platform.publish(&product_id, &targets).await?;
            if !errors.is_empty() {
                let reason = format_user_errors(&errors);
                warn!("Product {} created but not published: {}", product.handle, reason);
                return Ok(report_row(product, ReportStatus::Failed, Some(product_id), reason));
            }
            info!("Published {} to {} publication(s)", product.handle, targets.len());
        }

        Ok(report_row(product, ReportStatus::Success, Some(product_id), String::new()))
    }
}

fn report_row(
    product: &StagingProduct,
    status: ReportStatus,
    created_id: Option<String>,
    reason: String,
) -> ReportRow {
    ReportRow {
        product_id: product.source_id.clone(),
        handle: product.handle.clone(),
        title: product.title.clone(),
        status,
        created_id,
        reason,
    }
}
