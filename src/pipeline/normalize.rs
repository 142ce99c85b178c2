// src/pipeline/normalize.rs
use crate::extractors::metrics::{MetricExtractor, MetricValues};
use crate::pipeline::record::{NormalizedRecord, OriginSet};
use crate::portal::models::{FilingDate, HarvestedFiling};
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("Failed to compile ISO_DATE_RE")
});

// Report titles read "Jahresabschluss zum Geschäftsjahr vom 01.01.2022 bis zum 31.12.2022".
static REPORT_BEGIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"vom (\d{2}\.\d{2}\.\d{4})").expect("Failed to compile REPORT_BEGIN_RE")
});

static REPORT_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"zum (\d{2}\.\d{2}\.\d{4})").expect("Failed to compile REPORT_END_RE")
});

/// ISO dates pass through; epoch-millisecond timestamps become ISO dates (UTC).
/// Anything else is left as it is.
pub fn normalize_date(date: &FilingDate) -> FilingDate {
    let millis = match date {
        FilingDate::Text(text) if ISO_DATE_RE.is_match(text) => return date.clone(),
        FilingDate::Text(text) => match text.trim().parse::<i64>() {
            Ok(millis) => millis,
            Err(_) => {
                tracing::debug!("Leaving unrecognized date '{}' as is", text);
                return date.clone();
            }
        },
        FilingDate::EpochMillis(millis) => *millis,
    };

    match DateTime::from_timestamp_millis(millis) {
        Some(timestamp) => FilingDate::Text(timestamp.format("%Y-%m-%d").to_string()),
        None => {
            tracing::warn!("Timestamp {} is out of range", millis);
            date.clone()
        }
    }
}

/// Fills an empty report begin/end from the title's "vom DATE" / "zum DATE" phrases.
pub fn recover_report_range(title: &str, begin: &mut Option<String>, end: &mut Option<String>) {
    fill_from_title(begin, &REPORT_BEGIN_RE, title);
    fill_from_title(end, &REPORT_END_RE, title);
}

fn fill_from_title(field: &mut Option<String>, pattern: &Regex, title: &str) {
    if field.as_deref().is_some_and(|value| !value.is_empty()) {
        return;
    }
    if let Some(captures) = pattern.captures(title) {
        *field = Some(captures[1].to_string());
    }
}

/// Turns one harvested filing into a normalized record.
/// Steps run in a fixed order: date, report range, metrics, statement flag.
pub fn process_filing(harvested: HarvestedFiling, extractor: &MetricExtractor) -> NormalizedRecord {
    let HarvestedFiling { search_company_name, domain, filing } = harvested;

    let mut record = NormalizedRecord {
        search_company_names: OriginSet::single(&search_company_name),
        domains: OriginSet::single(&domain),
        search_company_name,
        domain,
        date: normalize_date(&filing.date),
        report_title: filing.title,
        company: filing.company,
        report: filing.report,
        guv: filing.guv,
        report_begin: None,
        report_end: None,
        metrics: MetricValues::default(),
        no_guv: false,
    };

    recover_report_range(&record.report_title, &mut record.report_begin, &mut record.report_end);
    extractor.extract_into(&record.guv, &mut record.metrics);
    record.no_guv = record.guv.trim().is_empty();

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::metrics::Metric;
    use crate::portal::models::Filing;

    fn harvested(title: &str, guv: &str) -> HarvestedFiling {
        HarvestedFiling {
            search_company_name: "Muster".into(),
            domain: "muster.de".into(),
            filing: Filing {
                date: FilingDate::EpochMillis(1_700_000_000_000),
                title: title.into(),
                company: "Muster GmbH".into(),
                report: "Bilanz ...".into(),
                guv: guv.into(),
            },
        }
    }

    #[test]
    fn timestamps_become_iso_dates() {
        assert_eq!(normalize_date(&FilingDate::EpochMillis(1_700_000_000_000)), FilingDate::Text("2023-11-14".into()));
        assert_eq!(normalize_date(&FilingDate::Text("1700000000000".into())), FilingDate::Text("2023-11-14".into()));
    }

    #[test]
    fn iso_and_unknown_dates_pass_through() {
        assert_eq!(normalize_date(&FilingDate::Text("2023-01-01".into())), FilingDate::Text("2023-01-01".into()));
        assert_eq!(normalize_date(&FilingDate::Text("Mai 2023".into())), FilingDate::Text("Mai 2023".into()));
    }

    #[test]
    fn report_range_is_read_from_title() {
        let (mut begin, mut end) = (None, None);
        recover_report_range("Jahresabschluss vom 01.01.2022 zum 31.12.2022", &mut begin, &mut end);
        assert_eq!(begin.as_deref(), Some("01.01.2022"));
        assert_eq!(end.as_deref(), Some("31.12.2022"));
    }

    #[test]
    fn populated_range_is_not_overwritten() {
        let (mut begin, mut end) = (Some("2021-07-01".to_string()), Some(String::new()));
        recover_report_range("Jahresabschluss vom 01.01.2022 zum 31.12.2022", &mut begin, &mut end);
        assert_eq!(begin.as_deref(), Some("2021-07-01"));
        assert_eq!(end.as_deref(), Some("31.12.2022"));
    }

    #[test]
    fn processed_filing_carries_metrics_and_flag() {
        let record = process_filing(
            harvested("Jahresabschluss zum 31.12.2022", "Gewinn- und Verlustrechnung\nUmsatzerlöse\n1.000,00\nEnde"),
            &MetricExtractor::new(),
        );

        assert_eq!(record.date, FilingDate::Text("2023-11-14".into()));
        assert_eq!(record.report_begin, None);
        assert_eq!(record.report_end.as_deref(), Some("31.12.2022"));
        assert_eq!(record.metrics.get(Metric::Revenue), Some("1000.00"));
        assert!(!record.no_guv);
        assert_eq!(record.domains.to_delimited(), "muster.de");
    }

    #[test]
    fn statement_flag_ignores_metric_matches() {
        let extractor = MetricExtractor::new();
        assert!(process_filing(harvested("t", "  \n "), &extractor).no_guv);

        let without_metrics = process_filing(harvested("t", "Gewinn- und Verlustrechnung"), &extractor);
        assert!(!without_metrics.no_guv);
        assert!(without_metrics.metrics.is_empty());
    }
}
