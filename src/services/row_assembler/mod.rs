//! Row Assembler
//!
//! Folds flat sheet rows into one `StagingProduct` per handle:
//! - scalar fields: first non-blank value wins
//! - options and option values: first-seen order, deduplicated per option
//! - variants: one per row with selected options, minus default-title and
//!   repeated variant-id rows
//! - media and metafields: deduplicated
//! - inventory quantities: resolved against the target location names

pub mod columns;
pub mod normalize;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::services::sheet::{SheetRow, SheetTable};
use crate::types::{
    InventoryItemDraft, InventoryQuantity, InventoryQuantityName, MediaImage, MetafieldValue,
    ProductOption, SelectedOption, StagingProduct, StagingVariant, Weight,
};

use self::columns::{ColumnSchema, Field, MetafieldColumn, MAX_OPTIONS};
use self::normalize::{
    normalize_category_id, normalize_inventory_policy, normalize_status, normalize_weight_unit,
    parse_bool, parse_decimal, parse_integer, parse_position, split_tags,
};

/// Target location name → location id
pub type LocationMap = HashMap<String, String>;

/// Folds the rows of one sheet. Build with `new`, then `assemble`.
pub struct RowAssembler<'a> {
    schema: &'a ColumnSchema,
    locations: &'a LocationMap,
}

impl<'a> RowAssembler<'a> {
    pub fn new(schema: &'a ColumnSchema, locations: &'a LocationMap) -> Self {
        Self { schema, locations }
    }

    /// Products in first-seen handle order
    pub fn assemble(&self, table: &SheetTable) -> Vec<StagingProduct> {
        self.warn_unknown_locations();

        let mut products: IndexMap<String, ProductBuilder> = IndexMap::new();
        let mut skipped = 0usize;

        for row in &table.rows {
            let Some(handle) = self.schema.value(row, Field::Handle) else {
                skipped += 1;
                continue;
            };

            let builder = products
                .entry(handle.to_string())
                .or_insert_with(|| ProductBuilder::new(handle));

            builder.merge_scalars(self.schema, row);
            builder.add_media(self.schema, row);
            let selected = builder.register_options(self.schema, row);
            if let Some(variant) = self.build_variant(row, selected) {
                builder.push_variant(variant);
            }
            builder.add_product_metafields(self.schema, row);
        }

        if skipped > 0 {
            debug!("Skipped {} rows without a handle", skipped);
        }

        products.into_values().map(ProductBuilder::finish).collect()
    }

    fn warn_unknown_locations(&self) {
        for columns in self.schema.inventory_columns() {
            if !self.locations.contains_key(&columns.location) {
                warn!(
                    "Location '{}' not found on target store, its inventory columns are skipped",
                    columns.location
                );
            }
        }
    }

    fn build_variant(&self, row: &SheetRow, selected_options: Vec<SelectedOption>) -> Option<StagingVariant> {
        if selected_options.is_empty() {
            return None;
        }

        let schema = self.schema;
        let text = |field: Field| schema.value(row, field).map(str::to_string);
        let sku = text(Field::VariantSku);

        let weight = match (
            schema.value(row, Field::VariantWeight).and_then(parse_decimal),
            schema.value(row, Field::VariantWeightUnit).and_then(normalize_weight_unit),
        ) {
            (Some(value), Some(unit)) => Some(Weight { value, unit }),
            _ => None,
        };

        Some(StagingVariant {
            source_id: text(Field::VariantId),
            position: schema.value(row, Field::VariantPosition).and_then(parse_position),
            sku: sku.clone(),
            barcode: text(Field::VariantBarcode),
            price: text(Field::VariantPrice),
            compare_at_price: text(Field::VariantCompareAtPrice),
            taxable: schema.value(row, Field::VariantTaxable).and_then(parse_bool),
            inventory_policy: schema.value(row, Field::VariantInventoryPolicy).map(normalize_inventory_policy),
            image_src: text(Field::VariantImage),
            selected_options,
            inventory_item: InventoryItemDraft {
                sku,
                cost: text(Field::VariantCost),
                country_code_of_origin: text(Field::VariantCountryOfOrigin),
                province_code_of_origin: text(Field::VariantProvinceOfOrigin),
                harmonized_system_code: text(Field::VariantHsCode),
                tracked: schema.value(row, Field::VariantInventoryTracker).is_some(),
                requires_shipping: schema.value(row, Field::VariantRequiresShipping).and_then(parse_bool),
                weight,
            },
            inventory_quantities: self.inventory_quantities(row),
            metafields: collect_metafields(schema.variant_metafield_columns(), row),
        })
    }

    /// On-hand beats available beats the plain `Inventory:` column
    fn inventory_quantities(&self, row: &SheetRow) -> Vec<InventoryQuantity> {
        let mut quantities = Vec::new();

        for columns in self.schema.inventory_columns() {
            let Some(location_id) = self.locations.get(&columns.location) else {
                continue;
            };

            let read = |index: Option<usize>| index.and_then(|i| row.cell(i)).and_then(parse_integer);
            let picked = read(columns.on_hand)
                .map(|q| (InventoryQuantityName::OnHand, q))
                .or_else(|| read(columns.available).map(|q| (InventoryQuantityName::Available, q)))
                .or_else(|| read(columns.plain).map(|q| (InventoryQuantityName::Available, q)));

            if let Some((name, quantity)) = picked {
                quantities.push(InventoryQuantity {
                    location_id: location_id.clone(),
                    name,
                    quantity,
                });
            }
        }

        quantities
    }
}

/// Metafield values from the given columns, first value per `namespace.key`
fn collect_metafields<'s>(
    columns: impl Iterator<Item = (usize, &'s MetafieldColumn)>,
    row: &SheetRow,
) -> Vec<MetafieldValue> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for (index, column) in columns {
        let Some(value) = row.cell(index) else { continue };
        if seen.insert(column.full_key()) {
            values.push(MetafieldValue {
                namespace: column.namespace.clone(),
                key: column.key.clone(),
                value_type: column.value_type.clone(),
                value: value.to_string(),
            });
        }
    }
    values
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        *slot = value.map(str::to_string);
    }
}

struct ProductBuilder {
    product: StagingProduct,
    media_keys: HashSet<(String, Option<String>, Option<i32>)>,
    variant_ids: HashSet<String>,
    metafield_keys: HashSet<String>,
}

impl ProductBuilder {
    fn new(handle: &str) -> Self {
        Self {
            product: StagingProduct::new(handle),
            media_keys: HashSet::new(),
            variant_ids: HashSet::new(),
            metafield_keys: HashSet::new(),
        }
    }

    fn merge_scalars(&mut self, schema: &ColumnSchema, row: &SheetRow) {
        let p = &mut self.product;
        let value = |field| schema.value(row, field);

        fill(&mut p.source_id, value(Field::SourceId));
        fill(&mut p.title, value(Field::Title));
        fill(&mut p.description_html, value(Field::DescriptionHtml));
        fill(&mut p.product_type, value(Field::ProductType));
        fill(&mut p.vendor, value(Field::Vendor));
        fill(&mut p.template_suffix, value(Field::TemplateSuffix));
        fill(&mut p.collections_raw, value(Field::CustomCollections));
        fill(&mut p.seo.title, value(Field::SeoTitle));
        fill(&mut p.seo.description, value(Field::SeoDescription));

        if p.status.is_none() {
            p.status = value(Field::Status).map(normalize_status);
        }
        if p.category.is_none() {
            p.category = value(Field::CategoryId).map(normalize_category_id);
        }
        if p.published_scope.is_none() {
            p.published_scope = value(Field::PublishedScope).map(|s| s.to_ascii_lowercase());
        }
        if p.gift_card.is_none() {
            p.gift_card = value(Field::GiftCard).and_then(parse_bool);
        }
        if p.published.is_none() {
            p.published = value(Field::Published).and_then(parse_bool);
        }
        if p.tags.is_empty() {
            if let Some(raw) = value(Field::Tags) {
                p.tags = split_tags(raw);
            }
        }
    }

    fn add_media(&mut self, schema: &ColumnSchema, row: &SheetRow) {
        let Some(src) = schema.value(row, Field::ImageSrc) else { return };
        let alt = schema
            .value(row, Field::ImageAlt)
            .map(str::to_string)
            .or_else(|| self.product.title.clone());
        let position = schema.value(row, Field::ImagePosition).and_then(parse_position);

        if self.media_keys.insert((src.to_string(), alt.clone(), position)) {
            self.product.media.push(MediaImage {
                src: src.to_string(),
                alt,
                position,
            });
        }
    }

    fn register_options(&mut self, schema: &ColumnSchema, row: &SheetRow) -> Vec<SelectedOption> {
        let mut selected = Vec::new();

        for n in 1..=MAX_OPTIONS {
            let (Some(name), Some(value)) = (
                schema.value(row, Field::OptionName(n)),
                schema.value(row, Field::OptionValue(n)),
            ) else {
                continue;
            };

            let options = &mut self.product.options;
            let index = match options.iter().position(|o| o.name == name) {
                Some(i) => i,
                None => {
                    options.push(ProductOption {
                        name: name.to_string(),
                        position: options.len() as i32 + 1,
                        values: Vec::new(),
                    });
                    options.len() - 1
                }
            };
            if !options[index].values.iter().any(|v| v == value) {
                options[index].values.push(value.to_string());
            }

            selected.push(SelectedOption {
                name: name.to_string(),
                value: value.to_string(),
            });
        }

        selected
    }

    fn push_variant(&mut self, variant: StagingVariant) {
        if variant.is_default_title() && !self.product.variants.is_empty() {
            debug!("{}: dropping default-title row, product already has variants", self.product.handle);
            return;
        }
        if let Some(id) = &variant.source_id {
            if !self.variant_ids.insert(id.clone()) {
                debug!("{}: duplicate variant id {}", self.product.handle, id);
                return;
            }
        }
        self.product.variants.push(variant);
    }

    fn add_product_metafields(&mut self, schema: &ColumnSchema, row: &SheetRow) {
        for metafield in collect_metafields(schema.product_metafield_columns(), row) {
            if self.metafield_keys.insert(metafield.full_key()) {
                self.product.metafields.push(metafield);
            }
        }
    }

    /// Drops option values no surviving variant selects, then renumbers positions
    fn finish(mut self) -> StagingProduct {
        let p = &mut self.product;
        if p.variants.is_empty() {
            return self.product;
        }

        let used: HashSet<(&str, &str)> = p
            .variants
            .iter()
            .flat_map(|v| v.selected_options.iter().map(|o| (o.name.as_str(), o.value.as_str())))
            .collect();

        let mut options = std::mem::take(&mut p.options);
        for option in &mut options {
            option.values.retain(|v| used.contains(&(option.name.as_str(), v.as_str())));
        }
        options.retain(|o| !o.values.is_empty());
        for (i, option) in options.iter_mut().enumerate() {
            option.position = i as i32 + 1;
        }
        p.options = options;

        self.product
    }
}
