//! Strategies for catalog API detail documents (JSON).

use serde_json::Value;

use super::DetailDocument;

/// First non-blank string among `keys` of `obj`.
fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// SPARQL
// ---------------------------------------------------------------------------

/// `requestConfig.payload.{query,sparql,q}`, or the payload itself when it is a string.
pub(super) fn request_config_payload(doc: &DetailDocument) -> Option<String> {
    let payload = doc.json()?.pointer("/requestConfig/payload")?;
    match payload {
        Value::Object(_) => first_string(payload, &["query", "sparql", "q"]),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Top-level `query` or `sparql`.
pub(super) fn top_level_query(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?, &["query", "sparql"])
}

/// `payload.query`.
pub(super) fn payload_query(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?.get("payload")?, &["query"])
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

pub(super) fn display_name(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?, &["displayName"])
}

pub(super) fn name(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?, &["name"])
}

pub(super) fn description(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?, &["description"])
}

pub(super) fn category(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?, &["category"])
}

pub(super) fn owner(doc: &DetailDocument) -> Option<String> {
    let owner = doc.json()?.get("owner")?;
    first_string(owner, &["name", "accountName"])
}

pub(super) fn visualization(doc: &DetailDocument) -> Option<String> {
    first_string(doc.json()?.get("renderConfig")?, &["output"])
}

/// `tags` and `keywords` arrays, string items only.
pub(super) fn tags(doc: &DetailDocument) -> Vec<String> {
    let Some(json) = doc.json() else {
        return Vec::new();
    };
    ["tags", "keywords"]
        .iter()
        .filter_map(|key| json.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// `dataset.displayName` (or `dataset.name`) and `dataset.prefixes`.
pub(super) fn dataset(doc: &DetailDocument) -> (Option<String>, Vec<Value>) {
    let Some(dataset) = doc.json().and_then(|j| j.get("dataset")) else {
        return (None, Vec::new());
    };
    let name = first_string(dataset, &["displayName", "name"]);
    let prefixes = dataset
        .get("prefixes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    (name, prefixes)
}
