//! Normalization of scraped text fields.
//!
//! SPARQL cleanup is a sequence of `&str -> String` passes; the result is
//! `None` when nothing but whitespace and markup debris remains.

use std::sync::LazyLock;

use regex::Regex;

/// Where a raw string was read from. Text taken out of parsed HTML already
/// had its entities decoded by the parser and must not be decoded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrigin {
    /// A JSON string value; entities are still encoded.
    Json,
    /// Element text or an attribute value from a parsed HTML document.
    Markup,
}

/// Clean a raw SPARQL candidate. Returns `None` if it is empty afterwards.
pub fn clean_sparql(raw: &str, origin: TextOrigin) -> Option<String> {
    let mut text = raw.trim().trim_start_matches('\u{feff}').trim().to_string();

    text = strip_wrapping_quotes(&text);
    text = decode_for(&text, origin);
    text = unescape_literals(&text);
    text = normalize_invisibles(&text);
    text = drop_marker_lines(&text);
    text = collapse_blank_lines(&text);

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Clean a single-line field (title, tag, category): entities decoded,
/// whitespace runs collapsed.
pub fn clean_inline(raw: &str, origin: TextOrigin) -> Option<String> {
    let decoded = decode_for(raw, origin);
    let text = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Clean a multi-line field (description): entities decoded, line endings
/// normalized, outer whitespace trimmed.
pub fn clean_block(raw: &str, origin: TextOrigin) -> Option<String> {
    let text = normalize_invisibles(&decode_for(raw, origin));
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// `"SELECT ..."` or `'SELECT ...'` → `SELECT ...`.
fn strip_wrapping_quotes(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return text[1..text.len() - 1].trim().to_string();
        }
    }
    text.to_string()
}

fn decode_for(text: &str, origin: TextOrigin) -> String {
    match origin {
        TextOrigin::Json => decode_entities(text),
        TextOrigin::Markup => text.to_string(),
    }
}

/// Decode the HTML entities that leak into scraped query text.
/// Unknown named entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid regex")
    });

    if !text.contains('&') {
        return text.to_string();
    }

    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let hex = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"));
            let decoded = if let Some(hex) = hex {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Turn literal `\n`, `\r\n` and `\t` escapes (from double-encoded JSON)
/// into real whitespace.
fn unescape_literals(text: &str) -> String {
    let mut out = text.to_string();
    if out.contains("\\n") {
        out = out.replace("\\r\\n", "\n").replace("\\n", "\n");
    }
    if out.contains("\\t") {
        out = out.replace("\\t", " ");
    }
    out
}

/// Normalize line endings, turn NBSP into spaces and drop zero-width characters.
fn normalize_invisibles(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{a0}', " ")
        .replace(['\u{200b}', '\u{200c}', '\u{200d}'], "")
}

/// Strip trailing whitespace per line and drop caret-marker lines copied
/// from endpoint error output (`-----^`, `------`).
fn drop_marker_lines(text: &str) -> String {
    static CARET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^-{3,}\^.*$").expect("valid regex"));
    static RULE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^-{3,}\s*$").expect("valid regex"));

    text.split('\n')
        .map(str::trim_end)
        .filter(|line| !CARET_RE.is_match(line) && !RULE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));
    MULTI_BLANK_RE.replace_all(text, "\n\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_strips_bom() {
        let raw = "\u{feff}  SELECT * WHERE { ?s ?p ?o }  \n";
        assert_eq!(
            clean_sparql(raw, TextOrigin::Json).as_deref(),
            Some("SELECT * WHERE { ?s ?p ?o }")
        );
    }

    #[test]
    fn empty_after_cleanup_is_none() {
        assert_eq!(clean_sparql("   \n\t ", TextOrigin::Json), None);
        assert_eq!(clean_sparql("\"\"", TextOrigin::Json), None);
        assert_eq!(clean_sparql("&nbsp;\u{200b}", TextOrigin::Json), None);
        assert_eq!(clean_sparql("-----\n   ", TextOrigin::Json), None);
    }

    #[test]
    fn decodes_entities() {
        let raw = "SELECT ?s WHERE { ?s a &lt;http://example.com/C&gt; FILTER(?x &amp;&amp; ?y) }";
        assert_eq!(
            clean_sparql(raw, TextOrigin::Json).as_deref(),
            Some("SELECT ?s WHERE { ?s a <http://example.com/C> FILTER(?x && ?y) }")
        );
        assert_eq!(decode_entities("&#60;a&#x3E; &unknown;"), "<a> &unknown;");
    }

    #[test]
    fn leaves_logical_operators_alone() {
        let raw = "FILTER(?a && ?b)";
        assert_eq!(clean_sparql(raw, TextOrigin::Json).as_deref(), Some(raw));
    }

    #[test]
    fn unwraps_quotes_and_escapes() {
        let raw = r#""SELECT ?s\nWHERE {\n\t?s ?p ?o\n}""#;
        assert_eq!(
            clean_sparql(raw, TextOrigin::Json).as_deref(),
            Some("SELECT ?s\nWHERE {\n ?s ?p ?o\n}")
        );
    }

    #[test]
    fn drops_caret_markers_and_collapses_blank_lines() {
        let raw = "SELECT ?s   \r\n----------^\nWHERE { ?s ?p ?o }\n\n\n\n\n\nLIMIT 10";
        assert_eq!(
            clean_sparql(raw, TextOrigin::Json).as_deref(),
            Some("SELECT ?s\nWHERE { ?s ?p ?o }\n\n\nLIMIT 10")
        );
    }

    #[test]
    fn inline_and_block_fields() {
        assert_eq!(
            clean_inline("  Big\n  &amp; small  ", TextOrigin::Json).as_deref(),
            Some("Big & small")
        );
        assert_eq!(clean_inline(" \n ", TextOrigin::Json), None);
        assert_eq!(
            clean_block("  Line one\r\nLine two  ", TextOrigin::Json).as_deref(),
            Some("Line one\nLine two")
        );
    }

    #[test]
    fn markup_text_is_not_decoded_twice() {
        let raw = r#"SELECT ?s { ?s ?p "&lt;b&gt;" }"#;
        assert_eq!(clean_sparql(raw, TextOrigin::Markup).as_deref(), Some(raw));
        assert_eq!(
            clean_sparql(raw, TextOrigin::Json).as_deref(),
            Some(r#"SELECT ?s { ?s ?p "<b>" }"#)
        );
        assert_eq!(
            clean_inline("Tom &amp; Jerry", TextOrigin::Markup).as_deref(),
            Some("Tom &amp; Jerry")
        );
        assert_eq!(
            clean_block(" a &gt; b ", TextOrigin::Markup).as_deref(),
            Some("a &gt; b")
        );
    }
}
