//! Target platform abstraction
//!
//! - `ShopifyClient` → Admin GraphQL API over HTTPS
//! - `MockPlatform` → deterministic in-memory store (tests, dry runs)
//!
//! Selected via TARGET_BACKEND (`shopify` or `mock`).

pub mod error;
pub mod graphql;
pub mod inputs;
pub mod mock;
pub mod shopify;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{TargetBackend, TargetConfig};

pub use error::{format_user_errors, PlatformError, UserError};
pub use inputs::ProductSetInput;
pub use mock::MockPlatform;
pub use shopify::ShopifyClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetafieldOwnerType {
    #[serde(rename = "PRODUCT")]
    Product,
    #[serde(rename = "PRODUCTVARIANT")]
    ProductVariant,
}

impl MetafieldOwnerType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MetafieldOwnerType::Product => "PRODUCT",
            MetafieldOwnerType::ProductVariant => "PRODUCTVARIANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetafieldDefinition {
    pub namespace: String,
    pub key: String,
    pub value_type: String,
}

impl MetafieldDefinition {
    pub fn new(namespace: &str, key: &str, value_type: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value_type: value_type.to_string(),
        }
    }

    pub fn full_key(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Publication {
    pub id: String,
    pub catalog_title: Option<String>,
    pub app_title: Option<String>,
    pub app_handle: Option<String>,
}

/// Channel name/handle/title → publication id, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationMap {
    ids: IndexMap<String, String>,
}

impl PublicationMap {
    /// App handle always wins; app title and catalog title only fill gaps
    pub fn from_publications(publications: &[Publication]) -> Self {
        let mut ids = IndexMap::new();
        for publication in publications {
            if let Some(handle) = &publication.app_handle {
                ids.insert(handle.clone(), publication.id.clone());
            }
            for name in [&publication.app_title, &publication.catalog_title].into_iter().flatten() {
                ids.entry(name.clone()).or_insert_with(|| publication.id.clone());
            }
        }
        Self { ids }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    pub fn online_store(&self) -> Option<&str> {
        self.get("Online Store").or_else(|| self.get("online store"))
    }

    /// Every known publication id once, in discovery order
    pub fn unique_ids(&self) -> Vec<String> {
        let mut unique: Vec<String> = Vec::new();
        for id in self.ids.values() {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        unique
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Result of a `productSet` call that reached the platform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSetOutcome {
    pub product_id: Option<String>,
    pub user_errors: Vec<UserError>,
}

/// Remote platform operations used by the migration pipeline.
///
/// Setup queries return complete, fully paginated results.
#[async_trait]
pub trait TargetPlatform: Send + Sync {
    /// Collection handle → collection id
    async fn collection_ids_by_handle(&self) -> Result<HashMap<String, String>, PlatformError>;

    async fn publications(&self) -> Result<Vec<Publication>, PlatformError>;

    async fn locations(&self) -> Result<Vec<Location>, PlatformError>;

    async fn metafield_definitions(
        &self,
        owner: MetafieldOwnerType,
    ) -> Result<Vec<MetafieldDefinition>, PlatformError>;

    async fn create_metafield_definition(
        &self,
        owner: MetafieldOwnerType,
        definition: &MetafieldDefinition,
    ) -> Result<Vec<UserError>, PlatformError>;

    async fn product_id_by_handle(&self, handle: &str) -> Result<Option<String>, PlatformError>;

    async fn product_set(&self, input: &ProductSetInput) -> Result<ProductSetOutcome, PlatformError>;

    async fn publish(&self, product_id: &str, publication_ids: &[String]) -> Result<Vec<UserError>, PlatformError>;

    /// Get the name of this platform implementation
    fn name(&self) -> &'static str;
}

/// Build the configured platform client, shared by reference across all job runs
pub fn create_platform(config: &TargetConfig) -> Result<Arc<dyn TargetPlatform>> {
    match config.backend {
        TargetBackend::Mock => Ok(Arc::new(MockPlatform::dry_run())),
        TargetBackend::Shopify => {
            let client = ShopifyClient::new(config).context("Failed to build Shopify client")?;
            Ok(Arc::new(client))
        }
    }
}
