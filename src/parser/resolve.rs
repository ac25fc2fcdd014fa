use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::dom::{element_text, find_heading, main_content, tables_after};

static INFOBOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("aside.portable-infobox").unwrap());
static PI_DATA: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".pi-data").unwrap());
static PI_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pi-data-label").unwrap());
static PI_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pi-data-value").unwrap());
static PI_SOURCED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pi-item[data-source]").unwrap());
static PI_SPACING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pi-item-spacing").unwrap());
static PI_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".pi-item[data-source='description'] .pi-data-value").unwrap()
});
static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static TABLES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TOP_PARAGRAPHS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mw-parser-output > p").unwrap());

const REQUIREMENTS_TABLE_STEPS: usize = 80;
const DESCRIPTION_MAX: usize = 400;

/// Stock opener of disambiguation notices, never a real description.
const DISAMBIGUATION_MARKER: &str = "This article is about";

/// Label→value pairs from the portable infobox, keys lowercased and in
/// page order. Covers both encodings Fandom emits: explicit label/value
/// rows and `data-source`-tagged items whose attribute doubles as the
/// label. A repeated key keeps its first position but takes the later
/// value.
pub fn infobox_kv(doc: &Html) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let Some(infobox) = doc.select(&INFOBOX).next() else {
        return out;
    };

    for row in infobox.select(&PI_DATA) {
        let label = row.select(&PI_LABEL).next().and_then(element_text);
        let value = row.select(&PI_VALUE).next().and_then(element_text);
        if let (Some(label), Some(value)) = (label, value) {
            put(&mut out, label.to_lowercase(), value);
        }
    }

    for item in infobox.select(&PI_SOURCED) {
        let Some(source) = item.value().attr("data-source") else {
            continue;
        };
        let value = item
            .select(&PI_VALUE)
            .next()
            .or_else(|| item.select(&PI_SPACING).next())
            .and_then(element_text);
        if let Some(value) = value {
            put(&mut out, source.to_lowercase(), value);
        }
    }

    out
}

fn put(out: &mut Vec<(String, String)>, key: String, value: String) {
    match out.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => out.push((key, value)),
    }
}

type Strategy = fn(&Html, &Regex) -> Option<String>;

/// Resolution order: infobox, then tables under the Requirements heading,
/// then any table on the page. Each strategy fully fails before the next
/// is tried; results are never merged across strategies.
const STRATEGIES: [Strategy; 3] = [from_infobox, from_requirements_section, from_any_table];

/// Find the value for a label matching `pattern` (case-insensitivity is
/// the pattern's job), degrading across the page-layout variants.
pub fn resolve_value(doc: &Html, pattern: &Regex) -> Option<String> {
    STRATEGIES.iter().find_map(|strategy| strategy(doc, pattern))
}

fn from_infobox(doc: &Html, pattern: &Regex) -> Option<String> {
    infobox_kv(doc)
        .into_iter()
        .find(|(k, _)| pattern.is_match(k))
        .map(|(_, v)| v)
}

fn from_requirements_section(doc: &Html, pattern: &Regex) -> Option<String> {
    let heading = find_heading(doc, "Requirements")?;
    tables_after(doc, heading, REQUIREMENTS_TABLE_STEPS)
        .into_iter()
        .find_map(|tbl| table_label_value(tbl, pattern))
}

fn from_any_table(doc: &Html, pattern: &Regex) -> Option<String> {
    doc.select(&TABLES)
        .find_map(|tbl| table_label_value(tbl, pattern))
}

/// Scan a table's two-cell rows for a left cell matching the pattern.
fn table_label_value(table: ElementRef, pattern: &Regex) -> Option<String> {
    for row in table.select(&ROWS) {
        let cells: Vec<_> = row.select(&CELLS).collect();
        if cells.len() < 2 {
            continue;
        }
        if let Some(left) = element_text(cells[0]) {
            if pattern.is_match(&left) {
                return element_text(cells[1]);
            }
        }
    }
    None
}

/// Short customer blurb. Prefers the infobox description, falls back to
/// the first real body paragraph. Always returns a value.
pub fn resolve_description(doc: &Html) -> String {
    if let Some(infobox) = doc.select(&INFOBOX).next() {
        if let Some(txt) = infobox.select(&PI_DESCRIPTION).next().and_then(element_text) {
            if txt.chars().count() <= DESCRIPTION_MAX {
                return txt;
            }
        }

        // Some pages only carry a plain "Description" label row.
        for row in infobox.select(&PI_DATA) {
            let Some(label) = row.select(&PI_LABEL).next().and_then(element_text) else {
                continue;
            };
            if !label.to_lowercase().contains("description") {
                continue;
            }
            if let Some(txt) = row.select(&PI_VALUE).next().and_then(element_text) {
                if txt.chars().count() <= DESCRIPTION_MAX {
                    return txt;
                }
            }
        }
    }

    if main_content(doc).is_some() {
        for p in doc.select(&TOP_PARAGRAPHS) {
            if let Some(txt) = element_text(p) {
                if txt.chars().count() > 10 && !txt.contains(DISAMBIGUATION_MARKER) {
                    return txt.chars().take(DESCRIPTION_MAX).collect();
                }
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(s: &str) -> Regex {
        Regex::new(&format!("(?i){}", s)).unwrap()
    }

    const INFOBOX_HTML: &str = "<aside class=\"portable-infobox\">\
        <div class=\"pi-item pi-data\" data-source=\"lives_in\">\
          <h3 class=\"pi-data-label\">Lives in</h3>\
          <div class=\"pi-data-value\">Village</div>\
        </div>\
        <div class=\"pi-item pi-data\" data-source=\"description\">\
          <h3 class=\"pi-data-label\">Description</h3>\
          <div class=\"pi-data-value\">A shy hedgehog.</div>\
        </div>\
        </aside>";

    #[test]
    fn infobox_reads_both_encodings() {
        let html = "<aside class=\"portable-infobox\">\
            <div class=\"pi-item pi-data\">\
              <h3 class=\"pi-data-label\">Appearance Weight</h3>\
              <div class=\"pi-data-value\">15</div>\
            </div>\
            <div class=\"pi-item\" data-source=\"required_food\">\
              <div class=\"pi-item-spacing\">Sushi</div>\
            </div>\
            </aside>";
        let doc = Html::parse_document(html);
        let kv = infobox_kv(&doc);
        let get = |key: &str| {
            kv.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("appearance weight"), Some("15"));
        assert_eq!(get("required_food"), Some("Sushi"));
    }

    #[test]
    fn first_infobox_row_in_page_order_wins() {
        // "winter weight" sorts after "appearance weight"; page order
        // must win regardless.
        let html = "<aside class=\"portable-infobox\">\
            <div class=\"pi-item pi-data\">\
              <h3 class=\"pi-data-label\">Winter weight</h3>\
              <div class=\"pi-data-value\">40</div>\
            </div>\
            <div class=\"pi-item pi-data\">\
              <h3 class=\"pi-data-label\">Appearance weight</h3>\
              <div class=\"pi-data-value\">15</div>\
            </div>\
            </aside>";
        let doc = Html::parse_document(html);
        assert_eq!(resolve_value(&doc, &pat("weight")).as_deref(), Some("40"));
    }

    #[test]
    fn infobox_wins_over_section_table() {
        let html = format!(
            "<html><body>{}\
             <h2><span class=\"mw-headline\">Requirements</span></h2>\
             <table><tr><td>Lives in</td><td>Town</td></tr></table>\
             </body></html>",
            INFOBOX_HTML
        );
        let doc = Html::parse_document(&html);
        let v = resolve_value(&doc, &pat("^lives in$|^lives\\s+in"));
        assert_eq!(v.as_deref(), Some("Village"));
    }

    #[test]
    fn section_table_wins_over_stray_table() {
        let html = "<html><body>\
            <table><tr><td>Lives in</td><td>Nearby</td></tr></table>\
            <h2><span class=\"mw-headline\">Requirements</span></h2>\
            <table><tr><td>Lives in</td><td>Town</td></tr></table>\
            </body></html>";
        let doc = Html::parse_document(html);
        let v = resolve_value(&doc, &pat("^lives in$|^lives\\s+in"));
        assert_eq!(v.as_deref(), Some("Town"));
    }

    #[test]
    fn any_table_fallback_when_no_requirements_heading() {
        let html = "<html><body>\
            <table><tr><td>Appearance Weight</td><td>22</td></tr></table>\
            </body></html>";
        let doc = Html::parse_document(html);
        let v = resolve_value(&doc, &pat("^appearance weight$|^appearance\\s+weight"));
        assert_eq!(v.as_deref(), Some("22"));
    }

    #[test]
    fn unmatched_label_resolves_to_none() {
        let doc = Html::parse_document("<html><body><p>nothing</p></body></html>");
        assert_eq!(resolve_value(&doc, &pat("^lives in$")), None);
    }

    #[test]
    fn description_prefers_infobox() {
        let html = format!(
            "<html><body>{}<div class=\"mw-parser-output\">\
             <p>Body paragraph that is long enough.</p></div></body></html>",
            INFOBOX_HTML
        );
        let doc = Html::parse_document(&html);
        assert_eq!(resolve_description(&doc), "A shy hedgehog.");
    }

    #[test]
    fn description_falls_back_past_disambiguation_notice() {
        let html = "<html><body><div class=\"mw-parser-output\">\
            <p>This article is about the customer. For the dish, see elsewhere.</p>\
            <p>short</p>\
            <p>A cheerful otter who visits on rainy days.</p>\
            </div></body></html>";
        let doc = Html::parse_document(html);
        assert_eq!(
            resolve_description(&doc),
            "A cheerful otter who visits on rainy days."
        );
    }

    #[test]
    fn description_defaults_to_empty() {
        let doc = Html::parse_document("<html><body></body></html>");
        assert_eq!(resolve_description(&doc), "");
    }
}
