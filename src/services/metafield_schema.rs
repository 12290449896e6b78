//! Metafield Schema Reconciler
//!
//! Makes sure every metafield column found in the sheet has a definition on
//! the target before product data is sent. Runs once per job, per owner type.
//! Nothing here is fatal: failures are logged and the migration continues.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::services::platform::{
    format_user_errors, MetafieldDefinition, MetafieldOwnerType, PlatformError, TargetPlatform,
};
use crate::services::row_assembler::columns::{ColumnSchema, MetafieldColumn};

/// Namespace owned by the platform itself
const RESERVED_NAMESPACE: &str = "shopify";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub mismatched: usize,
    pub failed: usize,
}

pub struct MetafieldReconciler<'a> {
    platform: &'a dyn TargetPlatform,
    create_delay: Duration,
}

impl<'a> MetafieldReconciler<'a> {
    pub fn new(platform: &'a dyn TargetPlatform, create_delay: Duration) -> Self {
        Self { platform, create_delay }
    }

    pub async fn reconcile(&self, schema: &ColumnSchema) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let owners = [
            (
                MetafieldOwnerType::Product,
                wanted_definitions(schema.product_metafield_columns().map(|(_, c)| c)),
            ),
            (
                MetafieldOwnerType::ProductVariant,
                wanted_definitions(schema.variant_metafield_columns().map(|(_, c)| c)),
            ),
        ];

        for (owner, wanted) in owners {
            if wanted.is_empty() {
                continue;
            }
            if let Err(e) = self.reconcile_owner(owner, &wanted, &mut outcome).await {
                warn!("Metafield definitions for {} not reconciled: {}", owner.as_str(), e);
                outcome.failed += 1;
            }
        }

        info!(
            "Metafield definitions reconciled: {} created, {} type mismatches, {} failures",
            outcome.created, outcome.mismatched, outcome.failed
        );
        outcome
    }

    async fn reconcile_owner(
        &self,
        owner: MetafieldOwnerType,
        wanted: &[MetafieldDefinition],
        outcome: &mut ReconcileOutcome,
    ) -> Result<(), PlatformError> {
        let existing: HashMap<String, String> = self
            .platform
            .metafield_definitions(owner)
            .await?
            .into_iter()
            .map(|d| (d.full_key(), d.value_type))
            .collect();
        debug!("{} existing {} metafield definitions", existing.len(), owner.as_str());

        for definition in wanted {
            match existing.get(&definition.full_key()) {
                Some(existing_type) if *existing_type != definition.value_type => {
                    warn!(
                        "Metafield {} ({}) is '{}' on target but '{}' in sheet; type not changed",
                        definition.full_key(),
                        owner.as_str(),
                        existing_type,
                        definition.value_type
                    );
                    outcome.mismatched += 1;
                }
                Some(_) => {}
                None => {
                    self.create(owner, definition, outcome).await;
                    tokio::time::sleep(self.create_delay).await;
                }
            }
        }
        Ok(())
    }

    async fn create(&self, owner: MetafieldOwnerType, definition: &MetafieldDefinition, outcome: &mut ReconcileOutcome) {
        match self.platform.create_metafield_definition(owner, definition).await {
            Ok(errors) if errors.is_empty() => {
                info!(
                    "Created metafield definition {} [{}] for {}",
                    definition.full_key(),
                    definition.value_type,
                    owner.as_str()
                );
                outcome.created += 1;
            }
            Ok(errors) => {
                warn!(
                    "Metafield definition {} for {} rejected: {}",
                    definition.full_key(),
                    owner.as_str(),
                    format_user_errors(&errors)
                );
                outcome.failed += 1;
            }
            Err(e) => {
                warn!("Metafield definition {} for {} failed: {}", definition.full_key(), owner.as_str(), e);
                outcome.failed += 1;
            }
        }
    }
}

/// Distinct `namespace.key` definitions, first column wins, reserved namespace excluded
fn wanted_definitions<'c>(columns: impl Iterator<Item = &'c MetafieldColumn>) -> Vec<MetafieldDefinition> {
    let mut wanted: IndexMap<String, MetafieldDefinition> = IndexMap::new();
    for column in columns {
        if column.namespace == RESERVED_NAMESPACE {
            continue;
        }
        wanted
            .entry(column.full_key())
            .or_insert_with(|| MetafieldDefinition::new(&column.namespace, &column.key, &column.value_type));
    }
    wanted.into_values().collect()
}
