//! Header-pattern table.
//!
//! Headers are classified once per file into a `ColumnRole`. The assembler
//! then reads cells by role instead of matching header text per cell.
//!
//! Fixed headers are matched case-sensitively. The metafield and inventory
//! families are regex-driven and case-insensitive.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use super::super::sheet::SheetRow;

/// Fixed, recognized columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Handle,
    SourceId,
    Title,
    DescriptionHtml,
    ProductType,
    Vendor,
    Tags,
    Status,
    TemplateSuffix,
    GiftCard,
    CustomCollections,
    CategoryId,
    SeoTitle,
    SeoDescription,
    Published,
    PublishedScope,
    ImageSrc,
    ImageAlt,
    ImagePosition,
    OptionName(u8),
    OptionValue(u8),
    VariantId,
    VariantSku,
    VariantBarcode,
    VariantPrice,
    VariantCompareAtPrice,
    VariantTaxable,
    VariantRequiresShipping,
    VariantInventoryPolicy,
    VariantInventoryTracker,
    VariantPosition,
    VariantWeight,
    VariantWeightUnit,
    VariantImage,
    VariantHsCode,
    VariantCountryOfOrigin,
    VariantProvinceOfOrigin,
    VariantCost,
}

/// Header aliases. For a field with several aliases, the earlier entry wins
/// when more than one column holds a value.
const FIXED_HEADERS: &[(&str, Field)] = &[
    ("Handle", Field::Handle),
    ("Product: Handle", Field::Handle),
    ("ID", Field::SourceId),
    ("Product ID", Field::SourceId),
    ("Title", Field::Title),
    ("Product: Title", Field::Title),
    ("Body HTML", Field::DescriptionHtml),
    ("Product: Description HTML", Field::DescriptionHtml),
    ("Type", Field::ProductType),
    ("Product Type", Field::ProductType),
    ("Product: Type", Field::ProductType),
    ("Vendor", Field::Vendor),
    ("Product: Vendor", Field::Vendor),
    ("Tags", Field::Tags),
    ("Product: Tags", Field::Tags),
    ("Status", Field::Status),
    ("Product: Status", Field::Status),
    ("Template Suffix", Field::TemplateSuffix),
    ("Product: Template Suffix", Field::TemplateSuffix),
    ("Gift Card", Field::GiftCard),
    ("Product: Gift Card", Field::GiftCard),
    ("Custom Collections", Field::CustomCollections),
    ("Category: ID", Field::CategoryId),
    ("Metafield: title_tag [string]", Field::SeoTitle),
    ("SEO: Title", Field::SeoTitle),
    ("Metafield: description_tag [string]", Field::SeoDescription),
    ("SEO: Description", Field::SeoDescription),
    ("Published", Field::Published),
    ("Published Scope", Field::PublishedScope),
    ("Image Src", Field::ImageSrc),
    ("Image: Src", Field::ImageSrc),
    ("Image URL", Field::ImageSrc),
    ("Image", Field::ImageSrc),
    ("Image Alt Text", Field::ImageAlt),
    ("Image: Alt Text", Field::ImageAlt),
    ("Image Position", Field::ImagePosition),
    ("Image: Position", Field::ImagePosition),
    ("Variant ID", Field::VariantId),
    ("Variant: ID", Field::VariantId),
    ("Variant SKU", Field::VariantSku),
    ("Variant: SKU", Field::VariantSku),
    ("SKU", Field::VariantSku),
    ("Variant Barcode", Field::VariantBarcode),
    ("Variant: Barcode", Field::VariantBarcode),
    ("Variant Price", Field::VariantPrice),
    ("Variant: Price", Field::VariantPrice),
    ("Price", Field::VariantPrice),
    ("Variant Compare At Price", Field::VariantCompareAtPrice),
    ("Variant: Compare At Price", Field::VariantCompareAtPrice),
    ("Variant Taxable", Field::VariantTaxable),
    ("Variant: Taxable", Field::VariantTaxable),
    ("Variant Requires Shipping", Field::VariantRequiresShipping),
    ("Variant: Requires Shipping", Field::VariantRequiresShipping),
    ("Variant Inventory Policy", Field::VariantInventoryPolicy),
    ("Variant: Inventory Policy", Field::VariantInventoryPolicy),
    ("Variant Inventory Tracker", Field::VariantInventoryTracker),
    ("Variant Position", Field::VariantPosition),
    ("Variant: Position", Field::VariantPosition),
    ("Variant Weight", Field::VariantWeight),
    ("Weight Value", Field::VariantWeight),
    ("Variant Weight Unit", Field::VariantWeightUnit),
    ("Variant: Weight Unit", Field::VariantWeightUnit),
    ("Weight Unit", Field::VariantWeightUnit),
    ("Variant Image", Field::VariantImage),
    ("Variant HS Code", Field::VariantHsCode),
    ("Variant Country of Origin", Field::VariantCountryOfOrigin),
    ("Variant Province of Origin", Field::VariantProvinceOfOrigin),
    ("Variant Cost", Field::VariantCost),
];

/// Precedence for SEO values found in namespaced `title_tag`/`description_tag` columns
const SEO_METAFIELD_RANK: usize = 10_000;

/// Highest option index recognized (`Option1` .. `Option3`)
pub const MAX_OPTIONS: u8 = 3;

/// Metafield keys never sent to the platform
const SKIPPED_METAFIELD_KEYS: &[&str] = &["harmonized_system_code"];

const SUPPORTED_METAFIELD_TYPES: &[&str] = &[
    "boolean",
    "color",
    "date",
    "date_time",
    "dimension",
    "id",
    "json",
    "link",
    "money",
    "multi_line_text_field",
    "number_decimal",
    "number_integer",
    "rating",
    "rich_text_field",
    "single_line_text_field",
    "url",
    "volume",
    "weight",
    "article_reference",
    "collection_reference",
    "company_reference",
    "customer_reference",
    "file_reference",
    "mixed_reference",
    "page_reference",
    "product_reference",
    "variant_reference",
    "list.article_reference",
    "list.collection_reference",
    "list.color",
    "list.customer_reference",
    "list.date",
    "list.date_time",
    "list.dimension",
    "list.file_reference",
    "list.id",
    "list.link",
    "list.mixed_reference",
    "list.number_decimal",
    "list.number_integer",
    "list.page_reference",
    "list.product_reference",
    "list.rating",
    "list.single_line_text_field",
    "list.url",
    "list.variant_reference",
    "list.volume",
    "list.weight",
];

/// Metaobject and taxonomy-value references need target-side ids that a
/// sheet export cannot carry, so they are never migrated.
pub fn is_supported_metafield_type(value_type: &str) -> bool {
    !value_type.contains("metaobject_reference")
        && !value_type.contains("product_taxonomy_value_reference")
        && SUPPORTED_METAFIELD_TYPES.contains(&value_type)
}

/// `namespace.key [type]` parsed from a metafield header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetafieldColumn {
    pub namespace: String,
    pub key: String,
    pub value_type: String,
}

impl MetafieldColumn {
    pub fn full_key(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryColumnKind {
    /// `Inventory: <location>`
    Plain,
    /// `Inventory Available: <location>`
    Available,
    /// `Inventory On Hand: <location>`
    OnHand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRole {
    Fixed(Field),
    ProductMetafield(MetafieldColumn),
    VariantMetafield(MetafieldColumn),
    Inventory { location: String, kind: InventoryColumnKind },
    Ignored,
}

/// Quantity columns for one location name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryColumns {
    pub location: String,
    pub plain: Option<usize>,
    pub available: Option<usize>,
    pub on_hand: Option<usize>,
}

struct HeaderPatterns {
    product_metafield: Regex,
    variant_metafield: Regex,
    inventory_plain: Regex,
    inventory_kind: Regex,
}

impl HeaderPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            product_metafield: Regex::new(r"(?i)^Metafield:\s*(.+?)\.(.+?)\s*\[(.+?)\]\s*$")?,
            variant_metafield: Regex::new(r"(?i)^Variant\s+Metafield:\s*(.+?)\.(.+?)\s*\[(.+?)\]\s*$")?,
            inventory_plain: Regex::new(r"(?i)^Inventory:\s*(.+?)\s*$")?,
            inventory_kind: Regex::new(r"(?i)^Inventory\s+(Available|On Hand):\s*(.+?)\s*$")?,
        })
    }

    fn metafield(re: &Regex, header: &str) -> Option<MetafieldColumn> {
        let caps = re.captures(header)?;
        Some(MetafieldColumn {
            namespace: caps[1].trim().to_string(),
            key: caps[2].trim().to_string(),
            value_type: caps[3].trim().to_string(),
        })
    }
}

/// Role of every column plus precedence-ordered indices for fixed fields
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    roles: Vec<ColumnRole>,
    fixed: HashMap<Field, Vec<(usize, usize)>>,
    inventory: Vec<InventoryColumns>,
}

impl ColumnSchema {
    pub fn from_headers(headers: &[String]) -> Result<Self, regex::Error> {
        let patterns = HeaderPatterns::new()?;
        let mut schema = ColumnSchema::default();

        for (index, header) in headers.iter().enumerate() {
            let header = header.trim();
            let (role, rank) = classify(&patterns, header);

            match &role {
                ColumnRole::Fixed(field) => {
                    schema.fixed.entry(*field).or_default().push((rank, index));
                }
                ColumnRole::Inventory { location, kind } => {
                    schema.add_inventory_column(location, *kind, index);
                }
                ColumnRole::Ignored if !header.is_empty() => {
                    debug!("Ignoring column '{}'", header);
                }
                _ => {}
            }
            schema.roles.push(role);
        }

        for columns in schema.fixed.values_mut() {
            columns.sort();
        }
        Ok(schema)
    }

    fn add_inventory_column(&mut self, location: &str, kind: InventoryColumnKind, index: usize) {
        let entry = match self.inventory.iter().position(|c| c.location == location) {
            Some(pos) => &mut self.inventory[pos],
            None => {
                self.inventory.push(InventoryColumns {
                    location: location.to_string(),
                    ..Default::default()
                });
                let last = self.inventory.len() - 1;
                &mut self.inventory[last]
            }
        };
        let slot = match kind {
            InventoryColumnKind::Plain => &mut entry.plain,
            InventoryColumnKind::Available => &mut entry.available,
            InventoryColumnKind::OnHand => &mut entry.on_hand,
        };
        slot.get_or_insert(index);
    }

    /// First non-blank value among the field's columns, in alias order
    pub fn value<'r>(&self, row: &'r SheetRow, field: Field) -> Option<&'r str> {
        self.fixed
            .get(&field)?
            .iter()
            .find_map(|&(_, index)| row.cell(index))
    }

    pub fn product_metafield_columns(&self) -> impl Iterator<Item = (usize, &MetafieldColumn)> {
        self.roles.iter().enumerate().filter_map(|(i, role)| match role {
            ColumnRole::ProductMetafield(column) => Some((i, column)),
            _ => None,
        })
    }

    pub fn variant_metafield_columns(&self) -> impl Iterator<Item = (usize, &MetafieldColumn)> {
        self.roles.iter().enumerate().filter_map(|(i, role)| match role {
            ColumnRole::VariantMetafield(column) => Some((i, column)),
            _ => None,
        })
    }

    /// Location columns in first-seen order
    pub fn inventory_columns(&self) -> &[InventoryColumns] {
        &self.inventory
    }
}

fn fixed_field(header: &str) -> Option<(Field, usize)> {
    if let Some(rank) = FIXED_HEADERS.iter().position(|(h, _)| *h == header) {
        return Some((FIXED_HEADERS[rank].1, rank));
    }

    // OptionN Name / Variant OptionN Name (and Value)
    let (rest, rank) = match header.strip_prefix("Variant ") {
        Some(rest) => (rest, FIXED_HEADERS.len() + 1),
        None => (header, FIXED_HEADERS.len()),
    };
    let rest = rest.strip_prefix("Option")?;
    let (digit, suffix) = rest.split_at(rest.find(' ')?);
    let n: u8 = digit.parse().ok().filter(|n| (1..=MAX_OPTIONS).contains(n))?;
    match suffix {
        " Name" => Some((Field::OptionName(n), rank)),
        " Value" => Some((Field::OptionValue(n), rank)),
        _ => None,
    }
}

fn classify(patterns: &HeaderPatterns, header: &str) -> (ColumnRole, usize) {
    if let Some((field, rank)) = fixed_field(header) {
        return (ColumnRole::Fixed(field), rank);
    }

    if let Some(column) = HeaderPatterns::metafield(&patterns.variant_metafield, header) {
        return (metafield_role(column, ColumnRole::VariantMetafield), 0);
    }

    if let Some(column) = HeaderPatterns::metafield(&patterns.product_metafield, header) {
        match column.key.as_str() {
            "title_tag" => return (ColumnRole::Fixed(Field::SeoTitle), SEO_METAFIELD_RANK),
            "description_tag" => return (ColumnRole::Fixed(Field::SeoDescription), SEO_METAFIELD_RANK),
            _ => return (metafield_role(column, ColumnRole::ProductMetafield), 0),
        }
    }

    if let Some(caps) = patterns.inventory_kind.captures(header) {
        let kind = if caps[1].eq_ignore_ascii_case("available") {
            InventoryColumnKind::Available
        } else {
            InventoryColumnKind::OnHand
        };
        let location = caps[2].trim().to_string();
        return (ColumnRole::Inventory { location, kind }, 0);
    }

    if let Some(caps) = patterns.inventory_plain.captures(header) {
        let location = caps[1].trim().to_string();
        return (ColumnRole::Inventory { location, kind: InventoryColumnKind::Plain }, 0);
    }

    (ColumnRole::Ignored, 0)
}

fn metafield_role(column: MetafieldColumn, wrap: fn(MetafieldColumn) -> ColumnRole) -> ColumnRole {
    if SKIPPED_METAFIELD_KEYS.contains(&column.key.as_str()) {
        debug!("Skipping metafield column {}", column.full_key());
        return ColumnRole::Ignored;
    }
    if !is_supported_metafield_type(&column.value_type) {
        debug!("Skipping metafield column {} with unsupported type {}", column.full_key(), column.value_type);
        return ColumnRole::Ignored;
    }
    wrap(column)
}
