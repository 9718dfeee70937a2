//! Detail extraction: turns one catalog entry's detail document into a
//! [`QueryExample`].
//!
//! Every field is read by an ordered list of [`Strategy`] values. Each
//! strategy is a pure function over the parsed document; the first one whose
//! cleaned result is non-empty wins. JSON API documents and HTML pages share
//! the same lists: a JSON strategy yields nothing for an HTML page and vice
//! versa.

mod clean;
mod html;
mod json;

use chrono::Utc;
use scraper::Html;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use queryharvest_shared::{CatalogEntry, DatasetContext, HarvestError, QueryExample, Result};

use crate::http::HttpClient;

pub use clean::{TextOrigin, clean_block, clean_inline, clean_sparql, decode_entities};

// ---------------------------------------------------------------------------
// Document + strategies
// ---------------------------------------------------------------------------

/// A fetched detail document.
pub enum DetailDocument {
    /// A catalog API response (any body that parses as a JSON object).
    Json(Value),
    /// Anything else, parsed leniently as HTML.
    Html(Html),
}

impl DetailDocument {
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => Self::Json(value),
            _ => Self::Html(Html::parse_document(body)),
        }
    }

    /// How text read out of this document must be cleaned.
    pub fn origin(&self) -> TextOrigin {
        match self {
            Self::Json(_) => TextOrigin::Json,
            Self::Html(_) => TextOrigin::Markup,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Html(_) => None,
        }
    }

    pub fn html(&self) -> Option<&Html> {
        match self {
            Self::Html(html) => Some(html),
            Self::Json(_) => None,
        }
    }
}

/// A named, pure field extractor.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub apply: fn(&DetailDocument) -> Option<String>,
}

/// Where the query text may live, in priority order.
pub const SPARQL_STRATEGIES: &[Strategy] = &[
    Strategy { name: "json:requestConfig.payload", apply: json::request_config_payload },
    Strategy { name: "json:query", apply: json::top_level_query },
    Strategy { name: "json:payload.query", apply: json::payload_query },
    Strategy { name: "html:code.language-sparql", apply: html::language_sparql_code },
    Strategy { name: "html:pre.sparql", apply: html::sparql_pre },
    Strategy { name: "html:textarea[name=query]", apply: html::query_textarea },
    Strategy { name: "html:pre code", apply: html::pre_code },
];

const TITLE_STRATEGIES: &[Strategy] = &[
    Strategy { name: "json:displayName", apply: json::display_name },
    Strategy { name: "json:name", apply: json::name },
    Strategy { name: "html:h1", apply: html::heading },
    Strategy { name: "html:title", apply: html::title_tag },
];

const DESCRIPTION_STRATEGIES: &[Strategy] = &[
    Strategy { name: "json:description", apply: json::description },
    Strategy { name: "html:meta[name=description]", apply: html::meta_description },
];

const CATEGORY_STRATEGIES: &[Strategy] = &[
    Strategy { name: "json:category", apply: json::category },
    Strategy { name: "html:[data-category]", apply: html::data_category },
    Strategy { name: "html:.category", apply: html::category_class },
];

/// Run `strategies` in order; return the first value that survives `clean`.
pub fn first_match(
    strategies: &[Strategy],
    doc: &DetailDocument,
    clean: fn(&str, TextOrigin) -> Option<String>,
) -> Option<(&'static str, String)> {
    strategies.iter().find_map(|strategy| {
        let raw = (strategy.apply)(doc)?;
        clean(&raw, doc.origin()).map(|value| (strategy.name, value))
    })
}

fn clean_json_inline(raw: &str) -> Option<String> {
    clean_inline(raw, TextOrigin::Json)
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Fetches and normalizes detail documents.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    /// Stamp examples with `extracted_at`.
    timestamps: bool,
}

impl DetailExtractor {
    pub fn new(timestamps: bool) -> Self {
        Self { timestamps }
    }

    /// Fetch the entry's detail document and extract an example from it.
    #[instrument(skip_all, fields(id = %entry.id))]
    pub async fn extract(
        &self,
        client: &mut HttpClient,
        entry: &CatalogEntry,
    ) -> Result<QueryExample> {
        let url = Url::parse(&entry.source_url).map_err(|e| {
            let message = format!("invalid detail URL '{}': {e}", entry.source_url);
            HarvestError::extraction(&entry.id, message)
        })?;
        let body = client.fetch(&url).await?;
        self.extract_from_body(entry, &body)
    }

    /// Extract an example from an already-fetched detail body.
    pub fn extract_from_body(&self, entry: &CatalogEntry, body: &str) -> Result<QueryExample> {
        let doc = DetailDocument::parse(body);

        let Some((strategy, sparql)) = first_match(SPARQL_STRATEGIES, &doc, clean_sparql) else {
            return Err(HarvestError::extraction(
                &entry.id,
                "no SPARQL query found in detail document",
            ));
        };
        debug!(strategy, chars = sparql.len(), "query text extracted");

        let title = first_match(TITLE_STRATEGIES, &doc, clean_inline)
            .map(|(_, title)| title)
            .or_else(|| clean_json_inline(&entry.name))
            .unwrap_or_else(|| entry.id.clone());

        let description =
            first_match(DESCRIPTION_STRATEGIES, &doc, clean_block).map(|(_, text)| text);
        let category = first_match(CATEGORY_STRATEGIES, &doc, clean_inline).map(|(_, text)| text);

        let owner = json::owner(&doc)
            .as_deref()
            .and_then(clean_json_inline)
            .or_else(|| clean_json_inline(&entry.owner));
        let visualization = json::visualization(&doc).as_deref().and_then(clean_json_inline);

        let (dataset_name, prefixes) = json::dataset(&doc);
        let dataset_name = dataset_name.as_deref().and_then(clean_json_inline);
        let dataset = (dataset_name.is_some() || !prefixes.is_empty()).then(|| DatasetContext {
            name: dataset_name,
            prefixes,
        });

        Ok(QueryExample {
            id: entry.id.clone(),
            title,
            description,
            sparql,
            category,
            tags: collect_tags(&doc),
            source_url: entry.source_url.clone(),
            owner,
            visualization,
            dataset,
            extracted_at: self.timestamps.then(Utc::now),
            execution: None,
        })
    }
}

/// Tags from every source, cleaned, first occurrence kept.
fn collect_tags(doc: &DetailDocument) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let json_tags = json::tags(doc).into_iter().map(|raw| (raw, TextOrigin::Json));
    let html_tags = html::tags(doc).into_iter().map(|raw| (raw, TextOrigin::Markup));
    for (raw, origin) in json_tags.chain(html_tags) {
        if let Some(tag) = clean_inline(&raw, origin) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}
