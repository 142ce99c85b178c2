// src/portal/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Date format used by the portal's result listing and report titles.
pub const PORTAL_DATE_FORMAT: &str = "%d.%m.%Y";

/// A company to search for, as read from the worklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklistEntry {
    pub company: String,
    /// Website domain of the company, may be empty.
    pub domain: String,
}

/// One row of the search result listing, before its detail page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: String,        // Raw portal date, e.g. "31.05.2023"
    pub title: String,
    pub detail_url: String,  // As found in the listing, may be relative
    pub company: String,     // Company name as shown in the listing
}

impl Candidate {
    /// File label for debug artifacts. Titles repeat across companies, so the company is part of it.
    pub fn debug_label(&self) -> String {
        format!("{}_{}", self.company, self.title)
    }
}

/// Publication date of a filing.
///
/// Raw stores written by earlier runs hold epoch-millisecond timestamps, newer
/// ones hold ISO strings; unparseable portal dates are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilingDate {
    EpochMillis(i64),
    Text(String),
}

impl Default for FilingDate {
    fn default() -> Self {
        FilingDate::Text(String::new())
    }
}

/// Reads JSON `null` as the field's default. Stores written by the dataframe
/// tooling of earlier runs encode missing domains and dates that way.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FilingDate {
    /// Parses the listing's `DD.MM.YYYY` date into ISO form, keeping the raw text otherwise.
    pub fn from_portal(raw: &str) -> Self {
        let raw = raw.trim();
        match NaiveDate::parse_from_str(raw, PORTAL_DATE_FORMAT) {
            Ok(date) => FilingDate::Text(date.format("%Y-%m-%d").to_string()),
            Err(_) => FilingDate::Text(raw.to_string()),
        }
    }
}

impl std::fmt::Display for FilingDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilingDate::EpochMillis(ms) => write!(f, "{}", ms),
            FilingDate::Text(text) => f.write_str(text),
        }
    }
}

/// A fetched and scanned filing. Identity is the (title, company) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filing {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: FilingDate,
    #[serde(rename = "report_title")]
    pub title: String,
    pub company: String,
    /// Full text of the publication container.
    #[serde(default, deserialize_with = "null_as_default")]
    pub report: String,
    /// Isolated income statement text, empty when none was found.
    #[serde(default, deserialize_with = "null_as_default")]
    pub guv: String,
}

/// Field set hashed for content identity; fields in key order so the JSON is canonical.
#[derive(Serialize)]
struct CanonicalFiling<'a> {
    company: &'a str,
    date: String,
    guv: &'a str,
    name: &'a str,
    report: &'a str,
}

impl Filing {
    pub fn from_candidate(candidate: &Candidate, report: String, guv: String) -> Self {
        Self {
            date: FilingDate::from_portal(&candidate.date),
            title: candidate.title.clone(),
            company: candidate.company.clone(),
            report,
            guv,
        }
    }

    /// Hex SHA-256 over the canonical field set, used to drop identical results of one search.
    pub fn content_hash(&self) -> String {
        let canonical = CanonicalFiling {
            company: &self.company,
            date: self.date.to_string(),
            guv: &self.guv,
            name: &self.title,
            report: &self.report,
        };
        // Serializing plain strings into a Vec cannot fail.
        let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }
}

/// A filing together with the worklist entry whose search produced it.
/// This is the row type of the raw report store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestedFiling {
    pub search_company_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub domain: String,
    #[serde(flatten)]
    pub filing: Filing,
}
