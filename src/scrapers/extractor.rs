use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{RawField, RawRecord};

static BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("div.propertyBlock"));
static PROMO_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".Ad__pr"));
static UPDATE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".propertyBlock__update"));
static PRICE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".price"));
static GROSS_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".gross"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("a.propertyBlock__content"));
static CONTENTS_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".propertyBlock__contents"));
static SPAN_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("span"));

/// Label substrings and the field each one fills, checked in order
const LABELS: &[(&str, RawField)] = &[
    ("築年月", RawField::BuildAt),
    ("建物構造", RawField::Structure),
    ("所在地", RawField::Place),
    ("交通", RawField::Access),
    ("階数", RawField::Stories),
    ("総戸数", RawField::Doors),
    ("面積", RawField::Square),
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extract one record per non-promotional listing block.
///
/// An empty result means the page had no listing blocks, which usually
/// points at a layout change or a block page rather than a parse problem.
pub fn extract_listings(html: &str, base_url: &str) -> Vec<RawRecord> {
    let base = match Url::parse(base_url) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(base_url, error = %e, "Base URL does not parse; detail links stay relative");
            None
        }
    };

    let document = Html::parse_document(html);
    let mut records = Vec::new();
    let mut promoted = 0usize;

    for block in document.select(&BLOCK_SELECTOR) {
        if block.select(&PROMO_SELECTOR).next().is_some() {
            promoted += 1;
            continue;
        }
        records.push(extract_block(block, base.as_ref()));
    }

    info!(listings = records.len(), promoted, "Extracted listing blocks");
    records
}

fn extract_block(block: ElementRef<'_>, base: Option<&Url>) -> RawRecord {
    let mut record = RawRecord {
        pub_date: first_text(block, &UPDATE_SELECTOR),
        price: first_text(block, &PRICE_SELECTOR),
        gross: first_text(block, &GROSS_SELECTOR),
        ..RawRecord::default()
    };

    record.detail_url = block
        .select(&LINK_SELECTOR)
        .find_map(|link| link.value().attr("href"))
        .map(|href| resolve(base, href));

    if let Some(contents) = block.select(&CONTENTS_SELECTOR).next() {
        read_labeled_fields(contents, &mut record);
    }

    debug!(detail_url = ?record.detail_url, "Extracted listing");
    record
}

/// Scan label spans and read each value from the element that follows the label.
fn read_labeled_fields(contents: ElementRef<'_>, record: &mut RawRecord) {
    let spans: Vec<ElementRef<'_>> = contents.select(&SPAN_SELECTOR).collect();
    let mut consumed = HashSet::new();

    for (idx, span) in spans.iter().enumerate() {
        if consumed.contains(&span.id()) {
            continue;
        }

        let label = element_text(*span);
        let Some(field) = LABELS
            .iter()
            .find(|(needle, _)| label.contains(needle))
            .map(|(_, field)| *field)
        else {
            continue;
        };

        let value = next_sibling_element(*span).or_else(|| spans.get(idx + 1).copied());
        let Some(value) = value else {
            continue;
        };

        consumed.insert(value.id());
        let text = element_text(value);
        if !text.is_empty() {
            record.set(field, text);
        }
    }
}

fn next_sibling_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

fn first_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = element_text(block.select(selector).next()?);
    (!text.is_empty()).then_some(text)
}

/// Element text with runs of whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}
