use serde_json::{Map, Value};
use tracing::debug;

// ── Blob decoding ─────────────────────────────────────────────────────────────

/// Why a semi-structured text field produced no mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The column value was null.
    Missing,
    /// The text is not valid JSON.
    Malformed(String),
    /// Valid JSON, but not an object.
    NotAMapping,
}

/// Decode a purchase-history / login-history text blob into a JSON object.
pub fn decode_blob(text: Option<&str>) -> Result<Map<String, Value>, DecodeFailure> {
    let text = text.ok_or(DecodeFailure::Missing)?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeFailure::NotAMapping),
        Err(e) => Err(DecodeFailure::Malformed(e.to_string())),
    }
}

/// Best-effort variant of [`decode_blob`]: any failure yields an empty map.
pub fn decode_blob_or_empty(text: Option<&str>) -> Map<String, Value> {
    match decode_blob(text) {
        Ok(map) => map,
        Err(DecodeFailure::Missing) => Map::new(),
        Err(failure) => {
            debug!("Ignoring undecodable blob: {:?}", failure);
            Map::new()
        }
    }
}

// ── PurchaseExtractor ─────────────────────────────────────────────────────────

/// Fields pulled out of a decoded purchase-history blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseFields {
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub average_price: Option<f64>,
}

/// Extracts purchase fields, tolerating the key-name variations between data
/// generations (`categories` in newer files, `category` in older ones).
pub struct PurchaseExtractor;

impl PurchaseExtractor {
    const CATEGORY_KEYS: &'static [&'static str] = &["categories", "category"];

    pub fn extract(map: &Map<String, Value>) -> PurchaseFields {
        PurchaseFields {
            category: Self::CATEGORY_KEYS
                .iter()
                .find_map(|key| non_empty_str(map.get(*key))),
            payment_method: non_empty_str(map.get("payment_method")),
            average_price: map.get("average_price").and_then(as_number),
        }
    }
}

// ── LoginExtractor ────────────────────────────────────────────────────────────

pub struct LoginExtractor;

impl LoginExtractor {
    /// Device names from the `devices` array; anything that is not an array
    /// contributes nothing, and non-string elements are skipped.
    pub fn devices(map: &Map<String, Value>) -> Vec<String> {
        match map.get("devices") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| non_empty_str(Some(item)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
