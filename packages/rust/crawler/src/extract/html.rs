//! Strategies for HTML detail pages.

use scraper::Selector;

use super::DetailDocument;

/// Text of the first element matching `selector` with non-blank content.
fn select_text(doc: &DetailDocument, selector: &str) -> Option<String> {
    let html = doc.html()?;
    let sel = Selector::parse(selector).ok()?;
    html.select(&sel)
        .map(|el| el.text().collect::<String>())
        .find(|text| !text.trim().is_empty())
}

/// Attribute `attr` of the first element matching `selector`.
fn select_attr(doc: &DetailDocument, selector: &str, attr: &str) -> Option<String> {
    let html = doc.html()?;
    let sel = Selector::parse(selector).ok()?;
    html.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// SPARQL containers, most specific first
// ---------------------------------------------------------------------------

pub(super) fn language_sparql_code(doc: &DetailDocument) -> Option<String> {
    select_text(doc, "code.language-sparql")
}

pub(super) fn sparql_pre(doc: &DetailDocument) -> Option<String> {
    select_text(doc, "pre.sparql")
}

pub(super) fn query_textarea(doc: &DetailDocument) -> Option<String> {
    select_text(doc, r#"textarea[name="query"]"#)
}

pub(super) fn pre_code(doc: &DetailDocument) -> Option<String> {
    select_text(doc, "pre code")
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

pub(super) fn heading(doc: &DetailDocument) -> Option<String> {
    select_text(doc, "h1")
}

pub(super) fn title_tag(doc: &DetailDocument) -> Option<String> {
    select_text(doc, "title")
}

pub(super) fn meta_description(doc: &DetailDocument) -> Option<String> {
    select_attr(doc, r#"meta[name="description"]"#, "content")
}

pub(super) fn data_category(doc: &DetailDocument) -> Option<String> {
    select_attr(doc, "[data-category]", "data-category")
}

pub(super) fn category_class(doc: &DetailDocument) -> Option<String> {
    select_text(doc, ".category")
}

pub(super) fn tags(doc: &DetailDocument) -> Vec<String> {
    let Some(html) = doc.html() else {
        return Vec::new();
    };
    let Ok(sel) = Selector::parse(r#".tag, a[rel="tag"]"#) else {
        return Vec::new();
    };
    html.select(&sel)
        .map(|el| el.text().collect::<String>())
        .collect()
}
