use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::info;
use url::Url;

use crate::parser::dom::{element_text, heading_label, main_content, sibling_elements};
use crate::parser::text::slugify;

const BASE: &str = "https://animalrestaurant.fandom.com";
const START_URL: &str = "https://animalrestaurant.fandom.com/wiki/Regular_Customers";

/// The four customer groups on the listing page. Headings outside this
/// set (booth owners, performers, posters) must contribute nothing.
const WANTED_SECTIONS: [&str; 4] = ["nearby", "village", "town", "city"];

/// Sibling walk stops after this many elements even without a heading.
const SIBLING_STEPS: usize = 30;

/// A paragraph only counts as a name list when it links this often;
/// one-off mentions in prose stay out.
const MIN_PARAGRAPH_LINKS: usize = 5;

static BASE_URL: LazyLock<Url> = LazyLock::new(|| Url::parse(BASE).unwrap());
static LISTING_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4").unwrap());
static WIKI_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='/wiki/']").unwrap());

/// Fetch the seed listing page and return (url, slug) pairs for every
/// regular customer article, sorted and deduplicated.
pub async fn discover_customer_urls(client: &reqwest::Client) -> Result<Vec<(String, String)>> {
    info!("Fetching seed listing page: {}", START_URL);
    let html = client
        .get(START_URL)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .context("Failed to fetch seed listing page")?;

    let doc = Html::parse_document(&html);
    let urls = extract_listing_urls(&doc);
    info!("Discovered {} regular customer pages", urls.len());

    Ok(urls
        .into_iter()
        .map(|url| {
            let slug = page_slug(&url);
            (url, slug)
        })
        .collect())
}

/// Collect article links nested inside the four accepted section lists.
/// For each accepted heading, walk forward through sibling elements
/// (bounded, stopping at the next heading): lists always contribute
/// their links, paragraphs only when they hold enough links to be a
/// name list rather than prose.
pub fn extract_listing_urls(doc: &Html) -> Vec<String> {
    let Some(content) = main_content(doc) else {
        return Vec::new();
    };

    let mut urls: BTreeSet<String> = BTreeSet::new();

    for heading in content.select(&LISTING_HEADINGS) {
        let Some(title) = heading_label(heading) else {
            continue;
        };
        if !WANTED_SECTIONS.contains(&title.to_lowercase().as_str()) {
            continue;
        }

        let mut steps = 0usize;
        for sibling in sibling_elements(heading) {
            steps += 1;
            if steps > SIBLING_STEPS {
                break;
            }
            let name = sibling.value().name();
            if matches!(name, "h2" | "h3" | "h4") {
                break;
            }
            match name {
                "ul" => collect_article_links(sibling, &mut urls),
                "p" if sibling.select(&WIKI_LINKS).count() >= MIN_PARAGRAPH_LINKS => {
                    collect_article_links(sibling, &mut urls)
                }
                _ => {}
            }
        }
    }

    urls.into_iter().collect()
}

fn collect_article_links(el: ElementRef, urls: &mut BTreeSet<String>) {
    for a in el.select(&WIKI_LINKS) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        // Namespace pages (File:, Category:, Template:) are not articles.
        if href.contains(':') {
            continue;
        }
        let bare = href.split('#').next().unwrap_or(href);
        let Ok(full) = BASE_URL.join(bare) else {
            continue;
        };
        let full = full.to_string();

        // The seed page and its sibling hub link themselves.
        if full.ends_with("/wiki/Regular_Customers") || full.ends_with("/wiki/Customers") {
            continue;
        }

        // Section-name link text marks an anchor link, not an entity.
        let Some(text) = element_text(a) else {
            continue;
        };
        if WANTED_SECTIONS.contains(&text.to_lowercase().as_str()) {
            continue;
        }

        urls.insert(full);
    }
}

/// Stable queue key for an article URL: its decoded last path segment.
fn page_slug(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or(url);
    let decoded = urlencoding::decode(segment)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    slugify(&decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_doc() -> Html {
        let html = std::fs::read_to_string("tests/fixtures/regular_customers.html").unwrap();
        Html::parse_document(&html)
    }

    fn wiki(name: &str) -> String {
        format!("{}/wiki/{}", BASE, name)
    }

    #[test]
    fn collects_only_links_inside_accepted_sections() {
        let urls = extract_listing_urls(&listing_doc());
        assert!(urls.contains(&wiki("Gumi")));
        assert!(urls.contains(&wiki("Wolfe")));
        // "Booth Owners" list must contribute nothing.
        assert!(!urls.iter().any(|u| u.ends_with("/wiki/Cotton")));
    }

    #[test]
    fn result_is_sorted_and_deduplicated() {
        let urls = extract_listing_urls(&listing_doc());
        let mut sorted = urls.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(urls, sorted);
        // Mimi is linked twice (once with a fragment) but appears once.
        assert_eq!(urls.iter().filter(|u| u.ends_with("/wiki/Mimi")).count(), 1);
    }

    #[test]
    fn paragraph_needs_five_links_to_count() {
        let urls = extract_listing_urls(&listing_doc());
        // The two-link paragraph under Village contributes nothing.
        assert!(!urls.contains(&wiki("Stray_Mention")));
        // The five-link paragraph does.
        for name in ["Ada", "Bell", "Coco", "Daisy", "Elva"] {
            assert!(urls.contains(&wiki(name)), "missing {}", name);
        }
    }

    #[test]
    fn rejects_hub_pages_namespaces_and_anchor_links() {
        let urls = extract_listing_urls(&listing_doc());
        assert!(!urls.iter().any(|u| u.ends_with("/wiki/Customers")));
        assert!(!urls.iter().any(|u| u.ends_with("/wiki/Regular_Customers")));
        assert!(!urls.iter().any(|u| u.contains("File:")));
        // A link whose visible text is "Town" is a jump link, not a name.
        assert!(!urls.iter().any(|u| u.ends_with("/wiki/Jump_Target")));
    }

    #[test]
    fn sibling_walk_stops_at_next_heading() {
        let urls = extract_listing_urls(&listing_doc());
        // Listed after the Gallery heading that follows City, so out of reach.
        assert!(!urls.contains(&wiki("After_Gallery")));
    }

    #[test]
    fn page_slug_decodes_and_normalizes() {
        assert_eq!(page_slug("https://animalrestaurant.fandom.com/wiki/Gumi"), "gumi");
        assert_eq!(
            page_slug("https://animalrestaurant.fandom.com/wiki/Mr._O%27Hare"),
            "mr_ohare"
        );
    }
}
