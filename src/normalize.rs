//! Maps whatever JSON a plant provider returns onto [`PlantSearchResult`].
//!
//! Providers disagree on field names ("watering" vs "Watering" vs
//! "care.watering", ...). This is the only module that knows about them.

use serde_json::Value;

use crate::models::PlantSearchResult;

const MAX_ID_LEN: usize = 50;

const COMMON_NAME: &[&str] = &["/common_name", "/common_names", "/Common name", "/name", "/display_name"];
const SCIENTIFIC_NAME: &[&str] = &["/scientific_name", "/Latin name"];
const OTHER_NAMES: &[&str] = &["/other_name", "/common_names", "/Common name"];
const WATERING: &[&str] = &[
    "/watering",
    "/watering_requirements",
    "/care/watering",
    "/care/watering_requirements",
    "/Watering",
];
const SUNLIGHT: &[&str] = &["/sunlight", "/light", "/care/sunlight", "/sunlight_requirements", "/Light ideal"];
const IMAGE: &[&str] = &[
    "/default_image/original_url",
    "/default_image/image_url",
    "/default_image/regular_url",
    "/default_image/medium_url",
    "/default_image/small_url",
    "/image_url",
    "/Img",
];
const CARE_LEVEL: &[&str] = &["/care_level", "/care/difficulty"];
const DESCRIPTION: &[&str] = &["/description", "/summary", "/wikipedia_extracts/text"];
const TOXICITY: &[&str] = &["/toxicity", "/toxicity_level"];
const GROWTH_RATE: &[&str] = &["/growth_rate", "/growth"];
const CYCLE: &[&str] = &["/cycle"];
const HUMIDITY: &[&str] = &["/humidity"];
const FAMILY: &[&str] = &["/family", "/taxonomy/family", "/family_common"];
const ORIGIN: &[&str] = &["/origin", "/distribution", "/native_region"];
const USES: &[&str] = &["/use", "/uses", "/human_uses"];
const SOIL: &[&str] = &["/soil", "/soil_type"];
const PROPAGATION: &[&str] = &["/propagation", "/propagation_methods"];
const ID: &[&str] = &["/id", "/species_id", "/slug"];

/// Normalizes a search response: `{data: [..]}`, `{species: [..]}` or a
/// bare array. Anything else yields no results.
pub fn normalize_search_payload(payload: &Value) -> Vec<PlantSearchResult> {
    let items = ["data", "species"]
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_array))
        .or_else(|| payload.as_array());

    items
        .map(|items| items.iter().filter_map(|it| normalize_item(it, None)).collect())
        .unwrap_or_default()
}

/// Normalizes a details response, which may be wrapped in `data`,
/// `species` or `result`. `requested_id` fills in a missing id.
pub fn normalize_detail_payload(payload: &Value, requested_id: &str) -> Option<PlantSearchResult> {
    let core = match payload.get("data") {
        Some(Value::Array(items)) => items.first()?,
        Some(data @ Value::Object(_)) => data,
        _ => ["species", "result"]
            .iter()
            .find_map(|key| payload.get(key).filter(|v| v.is_object()))
            .unwrap_or(payload),
    };
    if !core.is_object() {
        return None;
    }
    normalize_item(core, Some(requested_id))
}

/// Normalizes one provider item. Items with nothing to identify them by
/// are dropped.
pub fn normalize_item(item: &Value, fallback_id: Option<&str>) -> Option<PlantSearchResult> {
    let core = item.get("item").filter(|v| v.is_object()).unwrap_or(item);
    if !core.is_object() {
        return None;
    }

    let common_name = pick(core, COMMON_NAME, first_text);
    let scientific_name = pick(core, SCIENTIFIC_NAME, first_text);

    let id = pick(core, ID, text)
        .or_else(|| fallback_id.filter(|id| !id.is_empty()).map(str::to_string))
        .or_else(|| common_name.clone())
        .or_else(|| scientific_name.clone())?;

    Some(PlantSearchResult {
        id: id.chars().take(MAX_ID_LEN).collect(),
        other_names: pick(core, OTHER_NAMES, list).unwrap_or_default(),
        watering: pick(core, WATERING, text),
        sunlight: pick(core, SUNLIGHT, list).unwrap_or_default(),
        care_level: pick(core, CARE_LEVEL, text),
        description: pick(core, DESCRIPTION, text),
        toxicity: pick(core, TOXICITY, text),
        growth_rate: pick(core, GROWTH_RATE, text),
        cycle: pick(core, CYCLE, text),
        humidity: pick(core, HUMIDITY, text),
        image_url: pick(core, IMAGE, text),
        family: pick(core, FAMILY, text),
        origin: pick(core, ORIGIN, text),
        uses: pick(core, USES, text),
        soil: pick(core, SOIL, text),
        propagation: pick(core, PROPAGATION, text),
        common_name,
        scientific_name,
    })
}

fn pick<T>(core: &Value, pointers: &[&str], read: fn(&Value) -> Option<T>) -> Option<T> {
    pointers
        .iter()
        .filter_map(|p| core.pointer(p))
        .find_map(read)
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(text),
        other => text(other),
    }
}

fn list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    };
    (!items.is_empty()).then_some(items)
}
