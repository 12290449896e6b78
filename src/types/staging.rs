//! In-memory staging entities built from sheet rows.
//!
//! A `StagingProduct` is the result of folding every row that shares a handle.
//! Nothing here is persisted; entities live for one job run.

use serde::Serialize;

/// Product assembled from one or more sheet rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingProduct {
    /// Source store id from the sheet, echoed into the report
    pub source_id: Option<String>,
    pub handle: String,
    pub title: Option<String>,
    pub description_html: Option<String>,
    pub product_type: Option<String>,
    pub vendor: Option<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
    pub template_suffix: Option<String>,
    pub gift_card: Option<bool>,
    pub seo: Seo,
    /// Taxonomy category in GID form
    pub category: Option<String>,
    pub published: Option<bool>,
    pub published_scope: Option<String>,
    /// Comma-separated collection handles as found in the sheet
    pub collections_raw: Option<String>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<StagingVariant>,
    pub media: Vec<MediaImage>,
    pub metafields: Vec<MetafieldValue>,
}

impl StagingProduct {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }

    /// Collection handles listed for this product, trimmed, empty entries dropped
    pub fn collection_handles(&self) -> Vec<&str> {
        self.collections_raw
            .as_deref()
            .map(|raw| raw.split(',').map(str::trim).filter(|h| !h.is_empty()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Seo {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Seo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Product option with values in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct ProductOption {
    pub name: String,
    pub position: i32,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingVariant {
    pub source_id: Option<String>,
    pub position: Option<i32>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub price: Option<String>,
    pub compare_at_price: Option<String>,
    pub taxable: Option<bool>,
    pub inventory_policy: Option<String>,
    pub image_src: Option<String>,
    pub selected_options: Vec<SelectedOption>,
    pub inventory_item: InventoryItemDraft,
    pub inventory_quantities: Vec<InventoryQuantity>,
    pub metafields: Vec<MetafieldValue>,
}

impl StagingVariant {
    /// True for the single-variant sentinel `Title = Default Title`
    pub fn is_default_title(&self) -> bool {
        matches!(
            self.selected_options.as_slice(),
            [only] if only.name == "Title" && only.value == "Default Title"
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryItemDraft {
    pub sku: Option<String>,
    pub cost: Option<String>,
    pub country_code_of_origin: Option<String>,
    pub province_code_of_origin: Option<String>,
    pub harmonized_system_code: Option<String>,
    pub tracked: bool,
    pub requires_shipping: Option<bool>,
    pub weight: Option<Weight>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub value: f64,
    pub unit: WeightUnit,
}

/// Canonical weight units accepted by the target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightUnit {
    Grams,
    Kilograms,
    Pounds,
    Ounces,
}

/// Quantity for one target location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryQuantity {
    pub location_id: String,
    pub name: InventoryQuantityName,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryQuantityName {
    Available,
    OnHand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaImage {
    pub src: String,
    pub alt: Option<String>,
    pub position: Option<i32>,
}

/// Metafield value attached to a product or variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetafieldValue {
    pub namespace: String,
    pub key: String,
    pub value_type: String,
    pub value: String,
}

impl MetafieldValue {
    pub fn full_key(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(name: &str, value: &str) -> SelectedOption {
        SelectedOption { name: name.into(), value: value.into() }
    }

    #[test]
    fn default_title_sentinel_requires_single_title_option() {
        let mut variant = StagingVariant {
            selected_options: vec![opt("Title", "Default Title")],
            ..Default::default()
        };
        assert!(variant.is_default_title());

        variant.selected_options.push(opt("Size", "M"));
        assert!(!variant.is_default_title());

        variant.selected_options = vec![opt("Title", "Large")];
        assert!(!variant.is_default_title());
    }

    #[test]
    fn collection_handles_are_trimmed_and_skip_blanks() {
        let mut product = StagingProduct::new("tee");
        product.collections_raw = Some(" summer, ,sale ,".into());
        assert_eq!(product.collection_handles(), vec!["summer", "sale"]);
    }
}
