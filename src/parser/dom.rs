use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text::clean;

static ANY_EL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());
static HEADLINE_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.mw-headline").unwrap());
static SECTION_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3").unwrap());
static CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.mw-parser-output").unwrap());

/// Element text with a space between text nodes, whitespace-normalized.
pub fn element_text(el: ElementRef) -> Option<String> {
    clean(&el.text().collect::<Vec<_>>().join(" "))
}

/// Visible label of a section heading. MediaWiki wraps the title in a
/// `mw-headline` span next to edit links; fall back to the heading's own
/// text when the span is absent.
pub fn heading_label(el: ElementRef) -> Option<String> {
    el.select(&HEADLINE_SPAN)
        .next()
        .and_then(element_text)
        .or_else(|| element_text(el))
}

/// Find an h2/h3 section heading whose label equals `title` exactly
/// (case-insensitive, whole line). Partial matches must not trigger.
pub fn find_heading<'a>(doc: &'a Html, title: &str) -> Option<ElementRef<'a>> {
    let wanted = title.trim().to_lowercase();
    doc.select(&SECTION_HEADINGS)
        .find(|h| heading_label(*h).is_some_and(|t| t.to_lowercase() == wanted))
}

/// All elements strictly after `from` in document order.
pub fn elements_after<'a>(
    doc: &'a Html,
    from: ElementRef<'a>,
) -> impl Iterator<Item = ElementRef<'a>> {
    let from_id = from.id();
    doc.select(&ANY_EL)
        .skip_while(move |el| el.id() != from_id)
        .skip(1)
}

/// Element siblings after `el`, in order.
pub fn sibling_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.next_siblings().filter_map(ElementRef::wrap)
}

pub fn is_navbox(el: ElementRef) -> bool {
    el.value().attr("class").is_some_and(|c| c.contains("navbox"))
}

/// Tables after `from` within `limit` forward element steps, navigation
/// boxes skipped. Explicit step counter so the bound is enforceable.
pub fn tables_after<'a>(
    doc: &'a Html,
    from: ElementRef<'a>,
    limit: usize,
) -> Vec<ElementRef<'a>> {
    let mut out = Vec::new();
    let mut steps = 0usize;
    for el in elements_after(doc, from) {
        steps += 1;
        if steps > limit {
            break;
        }
        if el.value().name() != "table" || is_navbox(el) {
            continue;
        }
        out.push(el);
    }
    out
}

/// The article body (everything the wiki renders from page source).
pub fn main_content(doc: &Html) -> Option<ElementRef> {
    doc.select(&CONTENT).next()
}
