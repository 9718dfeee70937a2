//! Decoding of endpoint responses.
//!
//! Tabular (`SELECT`) and boolean (`ASK`) answers in the SPARQL 1.1 JSON
//! results format are decoded into rows. Anything else (Turtle from a
//! `CONSTRUCT`, vendor JSON) is passed through as a truncated text sample.

use serde::Deserialize;

use queryharvest_shared::{ExecutionResult, Row};

/// Maximum characters kept from a non-tabular response body.
pub const TEXT_SAMPLE_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    head: Head,
    #[serde(default)]
    results: Option<Bindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct Head {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Bindings {
    bindings: Vec<Row>,
}

/// Decode a successful (2xx) response body.
pub fn decode(
    body: &str,
    content_type: Option<String>,
    status_code: u16,
    elapsed_ms: u64,
) -> ExecutionResult {
    let mut result = ExecutionResult::succeeded(status_code, elapsed_ms);
    result.content_type = content_type;

    match serde_json::from_str::<SparqlResults>(body) {
        Ok(parsed) if parsed.results.is_some() || parsed.boolean.is_some() => {
            result.vars = parsed.head.vars;
            result.rows = parsed.results.map(|r| r.bindings).unwrap_or_default();
            result.boolean = parsed.boolean;
        }
        _ => {
            result.text_sample = Some(truncate(body.trim(), TEXT_SAMPLE_LIMIT));
        }
    }

    result
}

/// First `limit` characters of `text`.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queryharvest_shared::ExecutionStatus;

    #[test]
    fn decodes_select_bindings() {
        let body = r#"{
            "head": { "vars": ["s", "label"] },
            "results": { "bindings": [
                { "s": { "type": "uri", "value": "http://example.com/a" },
                  "label": { "type": "literal", "value": "A", "xml:lang": "en" } },
                { "s": { "type": "uri", "value": "http://example.com/b" } }
            ] }
        }"#;

        let result = decode(body, Some("application/sparql-results+json".into()), 200, 5);
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.vars, vec!["s", "label"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0]["label"].lang.as_deref(), Some("en"));
        // Unbound variables stay absent.
        assert!(!result.rows[1].contains_key("label"));
        assert!(result.text_sample.is_none());
    }

    #[test]
    fn decodes_rdf_star_triple_bindings() {
        let body = r#"{
            "head": { "vars": ["t", "n"] },
            "results": { "bindings": [
                { "t": { "type": "triple", "value": {
                      "subject": { "type": "uri", "value": "http://example.com/a" },
                      "predicate": { "type": "uri", "value": "http://example.com/p" },
                      "object": { "type": "literal", "value": "x" } } },
                  "n": { "type": "literal", "value": "1" } }
            ] }
        }"#;

        let result = decode(body, Some("application/sparql-results+json".into()), 200, 2);
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert!(result.text_sample.is_none());
        assert_eq!(result.vars, vec!["t", "n"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["t"].kind, "triple");
        assert_eq!(result.rows[0]["t"].value["predicate"]["value"], "http://example.com/p");
        assert_eq!(result.rows[0]["n"].value, "1");
    }

    #[test]
    fn decodes_ask_boolean() {
        let result = decode(r#"{ "head": {}, "boolean": true }"#, None, 200, 1);
        assert_eq!(result.boolean, Some(true));
        assert!(result.rows.is_empty());
    }

    #[test]
    fn empty_result_set_is_success() {
        let body = r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [] } }"#;
        let result = decode(body, None, 200, 1);
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert!(result.rows.is_empty());
        assert_eq!(result.vars, vec!["x"]);
    }

    #[test]
    fn non_tabular_body_becomes_text_sample() {
        let turtle = "<http://example.com/a> <http://example.com/p> \"x\" .\n";
        let result = decode(turtle, Some("text/turtle".into()), 200, 3);
        assert_eq!(result.status, ExecutionStatus::Succeeded);
        assert_eq!(result.content_type.as_deref(), Some("text/turtle"));
        assert_eq!(result.text_sample.as_deref(), Some(turtle.trim()));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
        let long = "x".repeat(TEXT_SAMPLE_LIMIT + 5);
        let result = decode(&long, None, 200, 1);
        assert_eq!(result.text_sample.unwrap().len(), TEXT_SAMPLE_LIMIT);
    }
}
