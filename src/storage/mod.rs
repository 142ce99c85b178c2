// src/storage/mod.rs
pub mod worklist;

use crate::extractors::metrics::Metric;
use crate::pipeline::NormalizedRecord;
use crate::portal::models::HarvestedFiling;
use crate::utils::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub use worklist::load_worklist;

pub const RAW_STORE_FILE: &str = "reports.json";
pub const PROCESSED_STORE_FILE: &str = "processed_reports.json";
pub const EXPORT_FILE: &str = "transformed_reports.csv";

/// Export columns ahead of the metric columns.
const RECORD_COLUMNS: [&str; 7] = [
    "report_title",
    "company",
    "report_begin",
    "report_end",
    "no_guv",
    "search_company_names",
    "domains",
];

/// Owns the output directory and the three files the pipeline stages hand over.
pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating the directory if it doesn't exist
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }
        Ok(Self { base_dir: base_path })
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    pub fn save_raw_filings(&self, filings: &[HarvestedFiling]) -> Result<PathBuf, StorageError> {
        self.write_json(RAW_STORE_FILE, filings)
    }

    pub fn load_raw_filings(&self) -> Result<Vec<HarvestedFiling>, StorageError> {
        self.read_json(RAW_STORE_FILE)
    }

    pub fn save_processed(&self, records: &[NormalizedRecord]) -> Result<PathBuf, StorageError> {
        self.write_json(PROCESSED_STORE_FILE, records)
    }

    pub fn load_processed(&self) -> Result<Vec<NormalizedRecord>, StorageError> {
        self.read_json(PROCESSED_STORE_FILE)
    }

    /// Writes one row per record: the record columns, then one column per metric
    /// (empty when the metric was not found).
    pub fn export_csv(&self, records: &[NormalizedRecord]) -> Result<PathBuf, StorageError> {
        let file_path = self.path(EXPORT_FILE);
        let mut writer = csv::Writer::from_path(&file_path)?;

        let header = RECORD_COLUMNS.iter().copied().chain(Metric::ALL.iter().map(|m| m.key()));
        writer.write_record(header)?;

        for record in records {
            let mut row = vec![
                record.report_title.clone(),
                record.company.clone(),
                record.report_begin.clone().unwrap_or_default(),
                record.report_end.clone().unwrap_or_default(),
                record.no_guv.to_string(),
                record.search_company_names.to_delimited(),
                record.domains.to_delimited(),
            ];
            row.extend(Metric::ALL.iter().map(|m| record.metrics.get(*m).unwrap_or_default().to_string()));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        tracing::info!("Exported {} records to {}", records.len(), file_path.display());
        Ok(file_path)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.path(file_name);
        let writer = BufWriter::new(fs::File::create(&file_path)?);
        serde_json::to_writer_pretty(writer, value)?;
        tracing::info!("Saved {}", file_path.display());
        Ok(file_path)
    }

    fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, StorageError> {
        let file_path = self.path(file_name);
        let reader = BufReader::new(fs::File::open(&file_path)?);
        let value = serde_json::from_reader(reader)?;
        tracing::debug!("Loaded {}", file_path.display());
        Ok(value)
    }
}
