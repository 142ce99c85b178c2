// src/pipeline/merge.rs
use crate::pipeline::record::NormalizedRecord;
use indexmap::map::Entry;
use indexmap::IndexMap;

/// Collapses records sharing (title, company) into one.
///
/// The first record seen for a key is canonical and keeps its own fields;
/// later duplicates only contribute their search terms and domains.
/// Output keeps first-seen order.
pub fn merge_duplicates(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    let total = records.len();
    let mut unique: IndexMap<(String, String), NormalizedRecord> = IndexMap::with_capacity(total);

    for record in records {
        match unique.entry(record.canonical_key()) {
            Entry::Occupied(mut canonical) => {
                let canonical = canonical.get_mut();
                canonical.search_company_names.extend_from(&record.search_company_names);
                canonical.domains.extend_from(&record.domains);
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    tracing::info!("Merged {} records into {} unique filings", total, unique.len());
    unique.into_values().collect()
}
