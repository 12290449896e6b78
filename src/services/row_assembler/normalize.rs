//! Cell value normalization

use crate::types::WeightUnit;

const CATEGORY_GID_PREFIX: &str = "gid://shopify/TaxonomyCategory/";

/// Taxonomy category ids become GIDs; values already in GID form pass through
pub fn normalize_category_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("gid://") {
        raw.to_string()
    } else {
        format!("{}{}", CATEGORY_GID_PREFIX, raw)
    }
}

/// Map the g/kg/lb/oz vocabulary to the platform enum. Unknown units yield `None`.
pub fn normalize_weight_unit(raw: &str) -> Option<WeightUnit> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "g" | "gram" | "grams" => Some(WeightUnit::Grams),
        "kg" | "kilogram" | "kilograms" => Some(WeightUnit::Kilograms),
        "lb" | "lbs" | "pound" | "pounds" => Some(WeightUnit::Pounds),
        "oz" | "ounce" | "ounces" => Some(WeightUnit::Ounces),
        _ => None,
    }
}

/// Upper-cases the status; the legacy `LIVE` maps to `ACTIVE`
pub fn normalize_status(raw: &str) -> String {
    let status = raw.trim().to_ascii_uppercase();
    if status == "LIVE" {
        "ACTIVE".to_string()
    } else {
        status
    }
}

pub fn normalize_inventory_policy(raw: &str) -> String {
    let policy = raw.trim().to_ascii_uppercase();
    match policy.as_str() {
        "DENY" | "DENIED" | "NO" => "DENY".to_string(),
        "CONTINUE" | "ALLOW" | "YES" => "CONTINUE".to_string(),
        _ => policy,
    }
}

/// `true/1/yes/y` and `false/0/no/n`; anything else is unknown
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Integer-valued numbers only (`"12"` and `"12.0"` qualify, `"1.5"` does not)
pub fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_position(raw: &str) -> Option<i32> {
    parse_integer(raw).and_then(|n| i32::try_from(n).ok())
}

pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Comma-separated tags, trimmed, duplicates removed keeping first occurrence
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
