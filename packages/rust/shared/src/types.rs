//! Core domain types for harvested catalog queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// One item of the catalog listing. Lives only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Identifier, unique within one listing pass.
    pub id: String,
    /// Query name as the catalog knows it.
    pub name: String,
    /// Owning account name.
    pub owner: String,
    /// URL of the entry's detail document.
    pub source_url: String,
}

// ---------------------------------------------------------------------------
// QueryExample
// ---------------------------------------------------------------------------

/// Dataset context used to prime a query-generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetContext {
    /// Dataset display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Prefix declarations, passed through as the catalog returns them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<Value>,
}

/// The normalized unit of output, written as `<sanitized-id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExample {
    /// Stable identifier; the output filename is derived from it.
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cleaned SPARQL text. Never empty.
    pub sparql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Where the example was extracted from.
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Catalog render hint (e.g. `Table`, `Geo`, `Gallery`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetContext>,
    /// Extraction time. Omitted when the run freezes output for determinism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
}

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Outcome class of a query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// A single bound value, as encoded by the SPARQL 1.1 JSON results format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdfTerm {
    /// `uri`, `literal`, `bnode` or `triple`.
    #[serde(rename = "type")]
    pub kind: String,
    /// A string for plain terms; a `{subject, predicate, object}` object of
    /// nested terms for RDF-star `triple` bindings.
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// One result row: variable name to bound term. Unbound variables are absent.
pub type Row = BTreeMap<String, RdfTerm>;

/// Outcome of running an example's SPARQL against the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Projection variables in endpoint order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    /// ASK query answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Non-tabular response body (e.g. Turtle from a CONSTRUCT), truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_sample: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Present iff `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    /// Result for an example whose execution was disabled.
    pub fn skipped() -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            vars: Vec::new(),
            rows: Vec::new(),
            boolean: None,
            content_type: None,
            text_sample: None,
            status_code: None,
            error: None,
            elapsed_ms: 0,
        }
    }

    /// Result for a failed execution.
    pub fn failed(error: impl Into<String>, status_code: Option<u16>, elapsed_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            status_code,
            error: Some(error.into()),
            elapsed_ms,
            ..Self::skipped()
        }
    }

    /// Empty successful result; callers fill in whichever payload the endpoint returned.
    pub fn succeeded(status_code: u16, elapsed_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            status_code: Some(status_code),
            elapsed_ms,
            ..Self::skipped()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_example() -> QueryExample {
        let mut row = Row::new();
        row.insert(
            "label".into(),
            RdfTerm {
                kind: "literal".into(),
                value: "Amsterdam".into(),
                datatype: None,
                lang: Some("nl".into()),
            },
        );

        QueryExample {
            id: "q-1".into(),
            title: "Cities".into(),
            description: Some("All municipalities".into()),
            sparql: "SELECT ?label WHERE { ?s rdfs:label ?label }".into(),
            category: None,
            tags: vec!["geo".into()],
            source_url: "https://example.com/_api/queries/kadaster/cities".into(),
            owner: Some("kadaster".into()),
            visualization: Some("Table".into()),
            dataset: Some(DatasetContext {
                name: Some("KKG".into()),
                prefixes: vec![json!({"prefixLabel": "rdfs"})],
            }),
            extracted_at: Some(Utc::now()),
            execution: Some(ExecutionResult {
                vars: vec!["label".into()],
                rows: vec![row],
                ..ExecutionResult::succeeded(200, 12)
            }),
        }
    }

    #[test]
    fn example_serialization_preserves_fields() {
        let example = sample_example();
        let json = serde_json::to_string_pretty(&example).expect("serialize");
        let parsed: QueryExample = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, example);
    }

    #[test]
    fn rdf_term_uses_results_format_keys() {
        let json = serde_json::to_value(&sample_example()).expect("serialize");
        let term = &json["execution"]["rows"][0]["label"];
        assert_eq!(term["type"], "literal");
        assert_eq!(term["xml:lang"], "nl");
        assert!(term.get("datatype").is_none());
    }

    #[test]
    fn execution_status_is_snake_case() {
        let json = serde_json::to_value(ExecutionResult::skipped()).expect("serialize");
        assert_eq!(json["status"], "skipped");
        assert!(json.get("error").is_none());

        let failed = ExecutionResult::failed("timed out", None, 10_000);
        assert!(failed.is_failed());
        assert_eq!(failed.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn triple_term_keeps_nested_value() {
        let term: RdfTerm = serde_json::from_value(json!({
            "type": "triple",
            "value": {
                "subject": { "type": "uri", "value": "http://example.com/a" },
                "predicate": { "type": "uri", "value": "http://example.com/p" },
                "object": { "type": "literal", "value": "x" }
            }
        }))
        .expect("deserialize");

        assert_eq!(term.kind, "triple");
        assert_eq!(term.value["subject"]["value"], "http://example.com/a");
        let json = serde_json::to_value(&term).expect("serialize");
        assert_eq!(json["value"]["object"]["value"], "x");
    }
}
