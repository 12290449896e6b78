//! StagingProduct → `productSet` input

use std::collections::HashMap;

use tracing::warn;

use crate::services::platform::inputs::{
    FileSetInput, InventoryItemInput, InventoryQuantityInput, MeasurementInput, MetafieldInput,
    OptionSetInput, OptionValueSetInput, ProductSetInput, ProductVariantSetInput, SeoInput,
    VariantOptionValueInput, WeightInput,
};
use crate::types::{
    InventoryItemDraft, InventoryQuantity, InventoryQuantityName, MetafieldValue, StagingProduct,
    StagingVariant,
};

/// Build the upsert payload. `existing_id` turns it into an update of that product.
///
/// Collection handles missing from `collections` are dropped with a warning.
pub fn build_product_set_input(
    product: &StagingProduct,
    collections: &HashMap<String, String>,
    existing_id: Option<&str>,
) -> ProductSetInput {
    let mut collection_ids = Vec::new();
    for handle in product.collection_handles() {
        match collections.get(handle) {
            Some(id) => collection_ids.push(id.clone()),
            None => warn!(
                "Collection handle '{}' not found on target store (product {})",
                handle, product.handle
            ),
        }
    }

    let files = product
        .media
        .iter()
        .map(|m| FileSetInput::image(&m.src, m.alt.clone().or_else(|| product.title.clone())))
        .collect();

    let product_options = product
        .options
        .iter()
        .enumerate()
        .map(|(idx, opt)| OptionSetInput {
            name: opt.name.clone(),
            position: if opt.position > 0 { opt.position } else { idx as i32 + 1 },
            values: opt
                .values
                .iter()
                .map(|v| OptionValueSetInput { name: v.clone() })
                .collect(),
        })
        .collect();

    let variants = product
        .variants
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.selected_options.is_empty())
        .map(|(idx, v)| variant_input(v, idx))
        .collect();

    let seo = (!product.seo.is_empty()).then(|| SeoInput {
        title: product.seo.title.clone(),
        description: product.seo.description.clone(),
    });

    ProductSetInput {
        id: existing_id.map(str::to_string),
        handle: product.handle.clone(),
        title: product.title.clone(),
        description_html: product.description_html.clone(),
        product_type: product.product_type.clone(),
        vendor: product.vendor.clone(),
        tags: product.tags.clone(),
        status: product.status.clone(),
        template_suffix: product.template_suffix.clone(),
        gift_card: product.gift_card,
        category: product.category.clone(),
        seo,
        collections: collection_ids,
        product_options,
        variants,
        files,
        metafields: metafield_inputs(&product.metafields),
    }
}

fn variant_input(variant: &StagingVariant, idx: usize) -> ProductVariantSetInput {
    ProductVariantSetInput {
        position: Some(variant.position.unwrap_or(idx as i32 + 1)),
        sku: variant.sku.clone(),
        barcode: variant.barcode.clone(),
        price: variant.price.clone(),
        compare_at_price: variant.compare_at_price.clone(),
        taxable: variant.taxable,
        inventory_policy: variant.inventory_policy.clone(),
        option_values: variant
            .selected_options
            .iter()
            .map(|o| VariantOptionValueInput {
                option_name: o.name.clone(),
                name: o.value.clone(),
            })
            .collect(),
        file: variant.image_src.as_deref().map(|src| FileSetInput::image(src.trim(), None)),
        inventory_item: Some(inventory_item_input(&variant.inventory_item, variant.sku.as_deref())),
        inventory_quantities: variant.inventory_quantities.iter().map(quantity_input).collect(),
        metafields: metafield_inputs(&variant.metafields),
    }
}

fn inventory_item_input(item: &InventoryItemDraft, variant_sku: Option<&str>) -> InventoryItemInput {
    InventoryItemInput {
        sku: item.sku.clone().or_else(|| variant_sku.map(str::to_string)),
        cost: item.cost.clone(),
        country_code_of_origin: item.country_code_of_origin.clone(),
        province_code_of_origin: item.province_code_of_origin.clone(),
        harmonized_system_code: item.harmonized_system_code.clone(),
        tracked: item.tracked,
        requires_shipping: item.requires_shipping,
        measurement: item.weight.map(|w| MeasurementInput {
            weight: WeightInput {
                value: w.value,
                unit: w.unit,
            },
        }),
    }
}

fn quantity_input(quantity: &InventoryQuantity) -> InventoryQuantityInput {
    let name = match quantity.name {
        InventoryQuantityName::Available => "available",
        InventoryQuantityName::OnHand => "on_hand",
    };
    InventoryQuantityInput {
        location_id: quantity.location_id.clone(),
        name: name.to_string(),
        quantity: quantity.quantity,
    }
}

fn metafield_inputs(metafields: &[MetafieldValue]) -> Vec<MetafieldInput> {
    metafields
        .iter()
        .map(|m| MetafieldInput {
            namespace: m.namespace.clone(),
            key: m.key.clone(),
            value_type: m.value_type.clone(),
            value: m.value.clone(),
        })
        .collect()
}
