use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::parser::dom::{element_text, find_heading, tables_after};
use crate::parser::text::clean;
use crate::records::MementoRecord;

static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());

static SERVE_SELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bServe\b|\bSell\b").unwrap());
static PLUS_DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+\d").unwrap());
static STARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+(\d[\d,]*)").unwrap());
static STARS_STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+\d[\d,]*").unwrap());
// "Serve ... times." optionally extended through a trailing "Sell ..." clause.
static REQUIREMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Serve .*?times\.?(?:.*?Sell .*?\.)?").unwrap());
static SERVE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bServe\b").unwrap());

const TABLE_SEARCH_STEPS: usize = 120;
const NAME_MAX_CHARS: usize = 80;
const DESCRIPTION_MAX_CHARS: usize = 240;

/// Mementos earned from this customer, in table row order. A page with
/// no memento section simply yields an empty list.
pub fn extract(doc: &Html) -> Vec<MementoRecord> {
    let Some(table) = find_memento_table(doc) else {
        return Vec::new();
    };

    let mut mementos = Vec::new();
    for row in table.select(&ROWS) {
        if row.select(&HEADER_CELL).next().is_some() {
            continue;
        }
        let Some(row_text) = element_text(row) else {
            continue;
        };
        if !SERVE_SELL_RE.is_match(&row_text) {
            continue;
        }
        if let Some(memento) = parse_row(row, &row_text) {
            mementos.push(memento);
        }
    }
    mementos
}

/// The reward table follows a "Memento(s)" heading and, unlike the decor
/// tables around it, talks about serving/selling and carries a +N bonus.
fn find_memento_table(doc: &Html) -> Option<ElementRef> {
    let heading = find_heading(doc, "Memento").or_else(|| find_heading(doc, "Mementos"))?;
    tables_after(doc, heading, TABLE_SEARCH_STEPS)
        .into_iter()
        .find(|tbl| {
            let txt = element_text(*tbl).unwrap_or_default();
            SERVE_SELL_RE.is_match(&txt) && PLUS_DIGIT_RE.is_match(&txt)
        })
}

fn parse_row(row: ElementRef, row_text: &str) -> Option<MementoRecord> {
    let stars = STARS_RE
        .captures(row_text)
        .and_then(|c| c[1].replace(',', "").parse::<i64>().ok());

    // Name is usually bolded; otherwise take whatever precedes "Serve".
    // A row with no plausible name is dropped entirely.
    let name = row
        .select(&BOLD)
        .filter_map(element_text)
        .find(|t| t.chars().count() <= NAME_MAX_CHARS)
        .or_else(|| {
            let prefix = SERVE_SPLIT_RE.splitn(row_text, 2).next()?;
            clean(prefix).filter(|t| t.chars().count() <= NAME_MAX_CHARS)
        })?;

    let requirement = REQUIREMENT_RE
        .find(row_text)
        .and_then(|m| clean(m.as_str()));

    // Residual description: strip requirement, then +N tokens, then the
    // name, in that order. Reordering changes output for overlaps.
    let mut desc = row_text.to_string();
    if let Some(req) = &requirement {
        desc = desc.replace(req.as_str(), " ");
    }
    desc = STARS_STRIP_RE.replace_all(&desc, " ").to_string();
    desc = desc.replace(name.as_str(), " ");
    let description = clean(&desc).map(|d| d.chars().take(DESCRIPTION_MAX_CHARS).collect());

    Some(MementoRecord::customer_gift(name, stars, description, requirement))
}
