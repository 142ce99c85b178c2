// src/portal/listing.rs
//! Structural parsing of portal pages: the search result listing and the
//! publication (detail) page.

use crate::portal::models::Candidate;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static RESULT_CONTAINER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.result_container").expect("Failed to compile RESULT_CONTAINER_SELECTOR")
});

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.row").expect("Failed to compile ROW_SELECTOR")
});

static INFO_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.info a").expect("Failed to compile INFO_LINK_SELECTOR")
});

static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.date").expect("Failed to compile DATE_SELECTOR")
});

static COMPANY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.first").expect("Failed to compile COMPANY_SELECTOR")
});

static PUBLICATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.publication_container").expect("Failed to compile PUBLICATION_SELECTOR")
});

/// Parses the search result page into candidates.
///
/// Rows lacking a link, a date or a company name are skipped; a page without a
/// result container yields no candidates.
pub fn parse_result_listing(page_html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(page_html);

    let Some(container) = document.select(&RESULT_CONTAINER_SELECTOR).next() else {
        tracing::debug!("No result container on search page");
        return Vec::new();
    };

    let mut candidates = Vec::new();
    for row in container.select(&ROW_SELECTOR) {
        match parse_row(row) {
            Some(candidate) => candidates.push(candidate),
            None => tracing::debug!("Skipping malformed result row"),
        }
    }
    candidates
}

fn parse_row(row: ElementRef<'_>) -> Option<Candidate> {
    let link = row.select(&INFO_LINK_SELECTOR).next()?;
    let detail_url = link.value().attr("href")?.trim().to_string();
    let title = leading_text(link)?;
    let date = leading_text(row.select(&DATE_SELECTOR).next()?)?;
    let company = leading_text(row.select(&COMPANY_SELECTOR).next()?)?;

    Some(Candidate { date, title, detail_url, company })
}

/// Text of an element's first non-blank text node, trimmed.
/// Listing cells put the value first and may append nested markup after it.
fn leading_text(element: ElementRef<'_>) -> Option<String> {
    element
        .text()
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Returns the trimmed text of the publication container, or `None` when the
/// page does not carry one (which means the portal served a challenge instead).
pub fn publication_text(document: &Html) -> Option<String> {
    document
        .select(&PUBLICATION_SELECTOR)
        .next()
        .map(|container| container.text().collect::<String>().trim().to_string())
}

pub fn has_publication(page_html: &str) -> bool {
    let document = Html::parse_document(page_html);
    document.select(&PUBLICATION_SELECTOR).next().is_some()
}
