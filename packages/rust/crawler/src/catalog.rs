//! Catalog listing: pages through `{base}/facets/queries?page=N` and turns
//! each listed query into a [`CatalogEntry`].

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use queryharvest_shared::{CatalogEntry, HarvestError, PipelineConfig, Result};

use crate::http::HttpClient;

/// Build `base/seg1/seg2/...`, percent-encoding each segment.
pub(crate) fn api_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

// ---------------------------------------------------------------------------
// Pager
// ---------------------------------------------------------------------------

/// One decoded catalog page.
#[derive(Debug)]
struct CatalogPage {
    entries: Vec<CatalogEntry>,
    /// Number of raw items on the page, including ones we could not use.
    item_count: usize,
    /// `false` when the page explicitly says nothing follows.
    has_more: bool,
}

/// Forward-only page generator. Pages are numbered from 1; iteration stops on
/// an empty page or an explicit "no next page" marker, and fails once
/// `max_pages` is exceeded.
#[derive(Debug)]
pub struct CatalogPager {
    base: Url,
    next: u32,
    max_pages: u32,
    done: bool,
}

impl CatalogPager {
    /// Fetch the next page. Returns `None` once the catalog is exhausted.
    pub async fn next_page(
        &mut self,
        client: &mut HttpClient,
    ) -> Result<Option<Vec<CatalogEntry>>> {
        if self.done {
            return Ok(None);
        }
        if self.next > self.max_pages {
            return Err(HarvestError::catalog(format!(
                "pagination did not terminate within {} pages",
                self.max_pages
            )));
        }

        let mut url = api_url(&self.base, &["facets", "queries"]);
        url.query_pairs_mut()
            .append_pair("page", &self.next.to_string());

        debug!(page = self.next, %url, "fetching catalog page");
        let doc = client.fetch_json(&url).await.map_err(|e| match e {
            HarvestError::Serialization(msg) => HarvestError::catalog(msg),
            other => other,
        })?;

        let page = parse_page(&doc, &self.base)
            .map_err(|e| HarvestError::catalog(format!("page {}: {e}", self.next)))?;
        self.next += 1;

        if page.item_count == 0 {
            self.done = true;
            return Ok(None);
        }
        if !page.has_more {
            self.done = true;
        }
        Ok(Some(page.entries))
    }
}

// ---------------------------------------------------------------------------
// Lister
// ---------------------------------------------------------------------------

/// Lists every entry in the catalog.
#[derive(Debug, Clone)]
pub struct CatalogLister {
    base: Url,
    max_pages: u32,
}

impl CatalogLister {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            base: config.catalog_url.clone(),
            max_pages: config.max_pages,
        }
    }

    /// A fresh pager starting at page 1.
    pub fn pager(&self) -> CatalogPager {
        CatalogPager {
            base: self.base.clone(),
            next: 1,
            max_pages: self.max_pages,
            done: false,
        }
    }

    /// Drain every page and return the deduplicated entries. A network failure
    /// after the first page ends pagination early instead of failing the listing.
    #[instrument(skip_all, fields(catalog = %self.base))]
    pub async fn list(&self, client: &mut HttpClient) -> Result<Vec<CatalogEntry>> {
        let mut pager = self.pager();
        let mut listed = Vec::new();
        let mut pages = 0u32;

        loop {
            match pager.next_page(client).await {
                Ok(Some(entries)) => {
                    pages += 1;
                    listed.extend(entries);
                }
                Ok(None) => break,
                // Only an unreachable first page means there is no catalog.
                Err(e @ HarvestError::Network { .. }) if pages > 0 => {
                    warn!(
                        page = pages + 1,
                        error = %e,
                        "catalog page failed, keeping entries listed so far"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let raw = listed.len();
        let entries = dedupe(listed);
        info!(pages, listed = raw, unique = entries.len(), "catalog listed");
        Ok(entries)
    }
}

/// Deduplicate by id. The last occurrence's data wins; the entry keeps the
/// position where its id first appeared.
pub fn dedupe(entries: impl IntoIterator<Item = CatalogEntry>) -> Vec<CatalogEntry> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CatalogEntry> = Vec::new();

    for entry in entries {
        match positions.get(&entry.id) {
            Some(&i) => {
                debug!(id = %entry.id, "duplicate catalog entry, keeping latest");
                out[i] = entry;
            }
            None => {
                positions.insert(entry.id.clone(), out.len());
                out.push(entry);
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

fn parse_page(doc: &Value, base: &Url) -> std::result::Result<CatalogPage, String> {
    let (items, has_more) = match doc {
        Value::Array(items) => (items, true),
        Value::Object(map) => {
            let items = map
                .get("results")
                .and_then(Value::as_array)
                .ok_or("unrecognized catalog page: no 'results' array")?;
            let explicit_end = map.get("hasNextPage") == Some(&Value::Bool(false))
                || map.get("next").is_some_and(Value::is_null);
            (items, !explicit_end)
        }
        _ => return Err("unrecognized catalog page: expected an object or array".into()),
    };

    let entries = items
        .iter()
        .filter_map(|item| entry_from_item(item, base))
        .collect();

    Ok(CatalogPage {
        entries,
        item_count: items.len(),
        has_more,
    })
}

fn entry_from_item(item: &Value, base: &Url) -> Option<CatalogEntry> {
    let name = non_empty_str(item.get("name"));
    let owner = non_empty_str(item.get("ownerAccountName"))
        .or_else(|| non_empty_str(item.pointer("/owner/accountName")));

    let (Some(name), Some(owner)) = (name, owner) else {
        warn!(item = %item, "catalog item without name or owner, skipping");
        return None;
    };

    let id = match item.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        // Account and query names never contain '/', so this cannot collide.
        _ => format!("{owner}/{name}"),
    };

    let source_url = api_url(base, &["queries", owner, name]).to_string();

    Some(CatalogEntry {
        id,
        name: name.to_string(),
        owner: owner.to_string(),
        source_url,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
