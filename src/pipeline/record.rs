// src/pipeline/record.rs
use crate::extractors::metrics::MetricValues;
use crate::portal::models::FilingDate;
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator used when an origin set is flattened for the stores and the CSV export.
pub const ORIGIN_DELIMITER: &str = ", ";

/// Insertion-ordered set of origins (search terms or domains) that led to a filing.
/// Only flattened to a delimited string when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginSet(IndexSet<String>);

impl OriginSet {
    pub fn single(origin: &str) -> Self {
        let mut set = Self::default();
        set.insert(origin);
        set
    }

    /// Adds an origin unless already present. Returns whether it was added.
    pub fn insert(&mut self, origin: &str) -> bool {
        if self.0.contains(origin) {
            return false;
        }
        self.0.insert(origin.to_string())
    }

    pub fn extend_from(&mut self, other: &OriginSet) {
        for origin in other.iter() {
            self.insert(origin);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// First-seen order, blank entries dropped.
    pub fn to_delimited(&self) -> String {
        self.iter()
            .filter(|origin| !origin.trim().is_empty())
            .collect::<Vec<_>>()
            .join(ORIGIN_DELIMITER)
    }

    pub fn from_delimited(text: &str) -> Self {
        let mut set = Self::default();
        for origin in text.split(ORIGIN_DELIMITER).filter(|o| !o.trim().is_empty()) {
            set.insert(origin);
        }
        set
    }
}

impl Serialize for OriginSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_delimited())
    }
}

impl<'de> Deserialize<'de> for OriginSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::from_delimited(&text))
    }
}

/// A processed filing: normalized dates, extracted metrics and merged origins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Search term of the first harvest that produced this filing.
    pub search_company_name: String,
    #[serde(default)]
    pub domain: String,
    pub date: FilingDate,
    pub report_title: String,
    pub company: String,
    pub report: String,
    pub guv: String,
    #[serde(default)]
    pub report_begin: Option<String>,
    #[serde(default)]
    pub report_end: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricValues,
    /// True when no income statement text was found.
    pub no_guv: bool,
    pub search_company_names: OriginSet,
    pub domains: OriginSet,
}

impl NormalizedRecord {
    /// Identity of a filing across searches: exact, case-sensitive title and company.
    pub fn canonical_key(&self) -> (String, String) {
        (self.report_title.clone(), self.company.clone())
    }
}
