//! SPARQL query construction and result parsing
//!
//! Concept text is always escaped with [`escape_literal`] before being
//! embedded in a query string.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::scoring::relevance_score;
use super::types::ExternalOntologyResult;

const MAX_CATEGORIES: usize = 10;
const MAX_RELATED: usize = 15;

/// Query dialect of a SPARQL endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SparqlDialect {
    /// Wikidata Query Service (`wdt:` / `schema:` vocabulary)
    Wikidata,
    /// DBpedia (`dbo:` / `dct:` vocabulary)
    Dbpedia,
}

impl SparqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wikidata => "wikidata",
            Self::Dbpedia => "dbpedia",
        }
    }
}

/// Escape text for use inside a double-quoted SPARQL string literal
///
/// Quotes and backslashes are backslash-escaped, the common whitespace
/// controls use their short escapes, and every other control character is
/// written as a `\uXXXX` escape.
pub fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{08}' => escaped.push_str("\\b"),
            '\u{0C}' => escaped.push_str("\\f"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Lowercase and title-case spellings of the concept, as language-tagged
/// literals for a `VALUES` clause
fn term_values(concept: &str, language: &str) -> String {
    let lower = concept.trim().to_lowercase();
    let mut title = String::with_capacity(lower.len());
    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        title.extend(first.to_uppercase());
        title.push_str(chars.as_str());
    }

    let mut variants = vec![lower];
    if !variants.contains(&title) {
        variants.push(title);
    }
    variants
        .iter()
        .map(|v| format!("\"{}\"@{}", escape_literal(v), language))
        .collect::<Vec<_>>()
        .join(" ")
}

fn language_filter(var: &str, languages: &[String]) -> String {
    let list = languages
        .iter()
        .map(|l| format!("\"{}\"", escape_literal(l)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("FILTER(LANG({}) IN ({}))", var, list)
}

/// Build the lookup query for a concept
///
/// Matches the concept against labels and aliases, pulls descriptions in
/// the configured languages and follows one hop of category and related
/// concept relations.
pub fn build_query(
    dialect: SparqlDialect,
    concept: &str,
    languages: &[String],
    limit: usize,
) -> String {
    let primary = languages.first().map(String::as_str).unwrap_or("en");
    let terms = term_values(concept, primary);
    let primary_only = vec![primary.to_string()];

    match dialect {
        SparqlDialect::Wikidata => format!(
            "SELECT ?item ?label ?description ?categoryLabel ?relatedLabel WHERE {{\n\
             VALUES ?term {{ {terms} }}\n\
             {{ ?item rdfs:label ?term }} UNION {{ ?item skos:altLabel ?term }}\n\
             ?item rdfs:label ?label . {label_filter}\n\
             OPTIONAL {{ ?item schema:description ?description . {desc_filter} }}\n\
             OPTIONAL {{ ?item wdt:P31|wdt:P279 ?category . ?category rdfs:label ?categoryLabel . {cat_filter} }}\n\
             OPTIONAL {{ ?item wdt:P361|wdt:P527|wdt:P1269|wdt:P921 ?related . ?related rdfs:label ?relatedLabel . {rel_filter} }}\n\
             }} LIMIT {limit}",
            terms = terms,
            label_filter = language_filter("?label", &primary_only),
            desc_filter = language_filter("?description", languages),
            cat_filter = language_filter("?categoryLabel", &primary_only),
            rel_filter = language_filter("?relatedLabel", &primary_only),
            limit = limit,
        ),
        SparqlDialect::Dbpedia => format!(
            "SELECT ?item ?label ?description ?categoryLabel ?relatedLabel WHERE {{\n\
             VALUES ?term {{ {terms} }}\n\
             {{ ?item rdfs:label ?term . ?item a owl:Thing }} UNION {{ ?alias dbo:wikiPageRedirects ?item . ?alias rdfs:label ?term }}\n\
             ?item rdfs:label ?label . {label_filter}\n\
             OPTIONAL {{ ?item dbo:abstract ?description . {desc_filter} }}\n\
             OPTIONAL {{ ?item dct:subject ?category . ?category rdfs:label ?categoryLabel . {cat_filter} }}\n\
             OPTIONAL {{ ?item dbo:wikiPageWikiLink ?related . ?related rdfs:label ?relatedLabel . {rel_filter} }}\n\
             }} LIMIT {limit}",
            terms = terms,
            label_filter = language_filter("?label", &primary_only),
            desc_filter = language_filter("?description", languages),
            cat_filter = language_filter("?categoryLabel", &primary_only),
            rel_filter = language_filter("?relatedLabel", &primary_only),
            limit = limit,
        ),
    }
}

/// SPARQL 1.1 JSON results document
#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, SparqlValue>>,
}

/// One bound value in a result row
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(rename = "xml:lang", default)]
    pub lang: Option<String>,
}

/// Parse a SPARQL JSON results body into rows
pub fn parse_response(body: &str) -> Result<Vec<HashMap<String, SparqlValue>>> {
    let response: SparqlResponse = serde_json::from_str(body)?;
    Ok(response.results.bindings)
}

#[derive(Default)]
struct ItemAccumulator {
    label: Option<String>,
    descriptions: Vec<(Option<String>, String)>,
    categories: Vec<String>,
    related: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str, cap: usize) {
    let value = value.trim();
    if value.is_empty() || list.len() >= cap {
        return;
    }
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

/// Fold result rows into one result per item
///
/// Rows are the cartesian expansion of the optional category/related
/// patterns, so they are grouped by item URI. The description is taken
/// from the first configured language that has one.
pub fn aggregate_bindings(
    concept: &str,
    rows: &[HashMap<String, SparqlValue>],
    languages: &[String],
    source: &str,
) -> Vec<ExternalOntologyResult> {
    let mut order: Vec<String> = Vec::new();
    let mut items: HashMap<String, ItemAccumulator> = HashMap::new();

    for row in rows {
        let Some(item) = row.get("item") else {
            continue;
        };
        let uri = item.value.clone();
        let acc = items.entry(uri.clone()).or_insert_with(|| {
            order.push(uri.clone());
            ItemAccumulator::default()
        });

        if acc.label.is_none() {
            if let Some(label) = row.get("label") {
                acc.label = Some(label.value.clone());
            }
        }
        if let Some(desc) = row.get("description") {
            if !acc.descriptions.iter().any(|(_, d)| d == &desc.value) {
                acc.descriptions.push((desc.lang.clone(), desc.value.clone()));
            }
        }
        if let Some(cat) = row.get("categoryLabel") {
            push_unique(&mut acc.categories, &cat.value, MAX_CATEGORIES);
        }
        if let Some(rel) = row.get("relatedLabel") {
            push_unique(&mut acc.related, &rel.value, MAX_RELATED);
        }
    }

    order
        .into_iter()
        .filter_map(|uri| {
            let acc = items.remove(&uri)?;
            let label = acc.label?;
            let description = languages
                .iter()
                .find_map(|lang| {
                    acc.descriptions
                        .iter()
                        .find(|(l, _)| l.as_deref() == Some(lang.as_str()))
                        .map(|(_, d)| d.clone())
                })
                .or_else(|| acc.descriptions.first().map(|(_, d)| d.clone()));

            let score = relevance_score(concept, &label);
            let mut result = ExternalOntologyResult::new(uri, label, source)
                .with_categories(acc.categories)
                .with_related(acc.related)
                .with_score(score);
            result.description = description;
            Some(result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<String> {
        vec!["en".to_string(), "de".to_string()]
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_literal(r"a\b"), r"a\\b");
        assert_eq!(escape_literal("it's"), r"it\'s");
        assert_eq!(escape_literal("a\nb\tc"), r"a\nb\tc");
        assert_eq!(escape_literal("x\u{0}y"), r"x\u0000y");
        assert_eq!(escape_literal("plain text"), "plain text");
    }

    #[test]
    fn test_query_escapes_injection_attempt() {
        let malicious = r#"x"@en } ; DROP ALL ; { "y"#;
        let query = build_query(SparqlDialect::Wikidata, malicious, &langs(), 10);
        assert!(query.contains(r#"x\"@en } ; drop all ; { \"y"#));
        assert!(!query.contains(r#"x"@en } ;"#));
    }

    #[test]
    fn test_wikidata_query_shape() {
        let query = build_query(SparqlDialect::Wikidata, "entropy", &langs(), 25);
        assert!(query.contains(r#""entropy"@en "Entropy"@en"#));
        assert!(query.contains("skos:altLabel"));
        assert!(query.contains("wdt:P31|wdt:P279"));
        assert!(query.contains(r#"FILTER(LANG(?description) IN ("en", "de"))"#));
        assert!(query.ends_with("LIMIT 25"));
    }

    #[test]
    fn test_dbpedia_query_shape() {
        let query = build_query(SparqlDialect::Dbpedia, "Graph theory", &langs(), 5);
        assert!(query.contains(r#""graph theory"@en "Graph theory"@en"#));
        assert!(query.contains("dct:subject"));
        assert!(query.contains("dbo:wikiPageRedirects"));
    }

    #[test]
    fn test_aggregate_bindings_groups_rows() {
        let body = r#"{
          "head": {"vars": ["item", "label", "description", "categoryLabel", "relatedLabel"]},
          "results": {"bindings": [
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q130868"},
             "label": {"type": "literal", "value": "entropy", "xml:lang": "en"},
             "description": {"type": "literal", "value": "Entropie", "xml:lang": "de"},
             "categoryLabel": {"type": "literal", "value": "physical quantity", "xml:lang": "en"}},
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q130868"},
             "label": {"type": "literal", "value": "entropy", "xml:lang": "en"},
             "description": {"type": "literal", "value": "measure of disorder", "xml:lang": "en"},
             "categoryLabel": {"type": "literal", "value": "Physical Quantity", "xml:lang": "en"},
             "relatedLabel": {"type": "literal", "value": "thermodynamics", "xml:lang": "en"}},
            {"item": {"type": "uri", "value": "http://www.wikidata.org/entity/Q204570"},
             "label": {"type": "literal", "value": "entropy (information theory)", "xml:lang": "en"}}
          ]}
        }"#;

        let rows = parse_response(body).unwrap();
        let results = aggregate_bindings("entropy", &rows, &langs(), "wikidata");

        assert_eq!(results.len(), 2);
        let first = &results[0];
        assert_eq!(first.label, "entropy");
        assert_eq!(first.description.as_deref(), Some("measure of disorder"));
        assert_eq!(first.categories, vec!["physical quantity"]);
        assert_eq!(first.related_concepts, vec!["thermodynamics"]);
        assert_eq!(first.relevance_score, 100.0);
        assert_eq!(first.source, "wikidata");
        assert_eq!(results[1].relevance_score, 70.0);
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(parse_response("<html>rate limited</html>").is_err());
    }
}
