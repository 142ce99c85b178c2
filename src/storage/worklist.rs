// src/storage/worklist.rs
use crate::portal::models::WorklistEntry;
use crate::utils::error::StorageError;
use std::path::Path;

/// Reads the companies to crawl from a CSV file with a header row.
///
/// The company column is required. A missing domain column or cell yields an
/// empty domain, rows with a blank company name are skipped.
pub fn load_worklist<P: AsRef<Path>>(
    path: P,
    company_column: &str,
    domain_column: &str,
) -> Result<Vec<WorklistEntry>, StorageError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let company_idx = headers
        .iter()
        .position(|h| h.trim() == company_column)
        .ok_or_else(|| StorageError::MissingColumn(company_column.to_string()))?;
    let domain_idx = headers.iter().position(|h| h.trim() == domain_column);
    if domain_idx.is_none() {
        tracing::warn!("Worklist {} has no '{}' column, domains stay empty", path.display(), domain_column);
    }

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row?;
        let company = row.get(company_idx).map(str::trim).unwrap_or_default();
        if company.is_empty() {
            continue;
        }
        let domain = domain_idx
            .and_then(|idx| row.get(idx))
            .map(str::trim)
            .unwrap_or_default();
        entries.push(WorklistEntry { company: company.to_string(), domain: domain.to_string() });
    }

    tracing::info!("Loaded {} companies from {}", entries.len(), path.display());
    Ok(entries)
}
