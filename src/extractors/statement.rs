// src/extractors/statement.rs

// --- Imports ---
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

// --- Constants ---
// Both must occur (lowercased) in the heading that introduces the income statement,
// e.g. "Gewinn- und Verlustrechnung für das Geschäftsjahr 2022".
const PROFIT_MARKER: &str = "gewinn";
const STATEMENT_MARKER: &str = "verlustrechnung";

// --- CSS Selectors (Lazy Static) ---
// Headings that may introduce the statement, plus tables, in document order.
static HEADING_OR_TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2, h3, h4, table").expect("Failed to compile HEADING_OR_TABLE_SELECTOR")
});

/// Isolates the income statement (GuV) inside a publication page.
///
/// The statement is the first matching heading together with the first table
/// that follows it in document order. Filings without such a heading are
/// common (small companies only publish a balance sheet), so "not found" is
/// an empty string rather than an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatementLocator;

impl StatementLocator {
    pub fn new() -> Self { Self }

    pub fn locate(&self, document: &Html) -> String {
        let mut elements = document.select(&HEADING_OR_TABLE_SELECTOR);

        let Some(heading) = elements.find(|el| el.value().name() != "table" && is_statement_heading(*el)) else {
            tracing::debug!("No income statement heading found");
            return String::new();
        };
        tracing::debug!("Found income statement heading <{}>", heading.value().name());

        let mut section: String = heading.text().collect();
        match elements.find(|el| el.value().name() == "table") {
            Some(table) => section.extend(table.text()),
            None => tracing::debug!("Income statement heading is not followed by a table"),
        }

        section.trim().to_string()
    }
}

fn is_statement_heading(element: ElementRef<'_>) -> bool {
    let text = element.text().collect::<String>().to_lowercase();
    text.contains(PROFIT_MARKER) && text.contains(STATEMENT_MARKER)
}
