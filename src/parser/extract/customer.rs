use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::mementos;
use crate::parser::dom::element_text;
use crate::parser::resolve::{resolve_description, resolve_value};
use crate::parser::text::{parse_int, slugify, split_list};
use crate::records::{CustomerRecord, Requirements};

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

// Labels vary in spacing across page layouts, so each pattern tolerates
// both "lives in" and arbitrary whitespace between the words.
static LIVES_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^lives in$|^lives\s+in").unwrap());
static APPEARANCE_WEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^appearance weight$|^appearance\s+weight").unwrap());
static REQUIRED_FOOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^required food$|^required\s+food").unwrap());
static DISHES_ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^dishes ordered$|^dishes\s+ordered").unwrap());
static REQUIRED_FACILITIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^required facilities$|^required\s+facilities").unwrap());
static REQUIRED_FLOWERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^required flowers$|^required\s+flowers").unwrap());
static REQUIRED_LETTERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^required letters$|^required\s+letters").unwrap());

const BASE_TAGS: [&str; 3] = ["customer", "restaurant", "regular"];

/// Build the customer record for one article page. Missing optional
/// fields degrade to absent/empty; this never fails.
pub fn extract(doc: &Html, url: &str) -> CustomerRecord {
    let name = doc
        .select(&H1)
        .next()
        .and_then(element_text)
        .or_else(|| doc.select(&TITLE).next().and_then(element_text))
        .unwrap_or_else(|| "Unknown".to_string());

    let lives_in = resolve_value(doc, &LIVES_IN_RE);
    let appearance_weight =
        resolve_value(doc, &APPEARANCE_WEIGHT_RE).and_then(|v| parse_int(&v));

    // Some pages list several foods; policy is "first wins".
    let required_food_id = resolve_value(doc, &REQUIRED_FOOD_RE).and_then(|v| {
        let normalized = v.replace(['·', '•'], ",");
        let first = normalized.split(',').next().unwrap_or("").trim().to_string();
        if first.is_empty() { None } else { Some(slugify(&first)) }
    });

    let dishes_ordered_ids = resolve_value(doc, &DISHES_ORDERED_RE)
        .map(|v| split_list(&v))
        .unwrap_or_default();
    let facilities = resolve_value(doc, &REQUIRED_FACILITIES_RE)
        .map(|v| split_list(&v))
        .unwrap_or_default();
    let flowers = resolve_value(doc, &REQUIRED_FLOWERS_RE)
        .map(|v| split_list(&v))
        .unwrap_or_default();
    let letters = resolve_value(doc, &REQUIRED_LETTERS_RE)
        .map(|v| split_list(&v))
        .unwrap_or_default();

    let mut tags: Vec<String> = BASE_TAGS.iter().map(|t| t.to_string()).collect();
    if let Some(loc) = &lives_in {
        tags.push(slugify(loc));
    }

    CustomerRecord {
        id: slugify(&name),
        name,
        tags,
        lives_in,
        appearance_weight,
        required_food_id,
        dishes_ordered_ids,
        customer_description: resolve_description(doc),
        requirements: Requirements {
            rating: None,
            recipes: Vec::new(),
            facilities,
            letters,
            customers: Vec::new(),
            flowers,
        },
        mementos: mementos::extract(doc),
        source_url: url.to_string(),
    }
}
