// src/pipeline/mod.rs
//! Turns the raw harvest into the canonical record set:
//! normalize and extract every filing, merge duplicates, sort.

pub mod merge;
pub mod normalize;
pub mod record;

pub use record::{NormalizedRecord, OriginSet};

use crate::extractors::metrics::MetricExtractor;
use crate::portal::models::HarvestedFiling;

pub fn process_reports(raw: Vec<HarvestedFiling>) -> Vec<NormalizedRecord> {
    let extractor = MetricExtractor::new();
    let processed: Vec<NormalizedRecord> = raw
        .into_iter()
        .map(|filing| normalize::process_filing(filing, &extractor))
        .collect();

    let mut records = merge::merge_duplicates(processed);
    sort_records(&mut records);
    records
}

/// Two stable passes: report begin (raw string), then company name ignoring case.
/// The last pass dominates, so records end up grouped by company and report
/// begin only orders filings of the same company.
pub fn sort_records(records: &mut [NormalizedRecord]) {
    records.sort_by(|a, b| {
        let a_begin = a.report_begin.as_deref().unwrap_or_default();
        let b_begin = b.report_begin.as_deref().unwrap_or_default();
        a_begin.cmp(b_begin)
    });
    records.sort_by_cached_key(|record| record.company.to_lowercase());
}
