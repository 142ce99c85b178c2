// src/extractors/metrics.rs
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A financial figure read from the income statement.
/// Serialized under the German key used in the report stores and the CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "umsatz")]
    Revenue,
    #[serde(rename = "rohergebnis")]
    GrossProfit,
    #[serde(rename = "ergebnis")]
    NetIncome,
    #[serde(rename = "ebitda")]
    Ebitda,
    #[serde(rename = "ebit")]
    Ebit,
    #[serde(rename = "ebt")]
    Ebt,
    #[serde(rename = "eigenkapital")]
    Equity,
    #[serde(rename = "vortrag")]
    Carryforward,
    #[serde(rename = "jahresfehlbetrag")]
    NetLossForYear,
    #[serde(rename = "jahresüberschuss")]
    NetProfitForYear,
    #[serde(rename = "bilanzgewinn")]
    BalanceSheetProfit,
    #[serde(rename = "bilanzverlust")]
    BalanceSheetLoss,
    #[serde(rename = "bilanzsumme")]
    BalanceSheetTotal,
}

impl Metric {
    /// Every metric, in extraction and export order.
    pub const ALL: [Metric; 13] = [
        Metric::Revenue,
        Metric::GrossProfit,
        Metric::NetIncome,
        Metric::Ebitda,
        Metric::Ebit,
        Metric::Ebt,
        Metric::Equity,
        Metric::Carryforward,
        Metric::NetLossForYear,
        Metric::NetProfitForYear,
        Metric::BalanceSheetProfit,
        Metric::BalanceSheetLoss,
        Metric::BalanceSheetTotal,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Metric::Revenue => "umsatz",
            Metric::GrossProfit => "rohergebnis",
            Metric::NetIncome => "ergebnis",
            Metric::Ebitda => "ebitda",
            Metric::Ebit => "ebit",
            Metric::Ebt => "ebt",
            Metric::Equity => "eigenkapital",
            Metric::Carryforward => "vortrag",
            Metric::NetLossForYear => "jahresfehlbetrag",
            Metric::NetProfitForYear => "jahresüberschuss",
            Metric::BalanceSheetProfit => "bilanzgewinn",
            Metric::BalanceSheetLoss => "bilanzverlust",
            Metric::BalanceSheetTotal => "bilanzsumme",
        }
    }
}

/// Extracted figures keyed by metric. Values are normalized numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValues(BTreeMap<Metric, String>);

impl MetricValues {
    pub fn get(&self, metric: Metric) -> Option<&str> {
        self.0.get(&metric).map(String::as_str)
    }

    /// Stores `value` unless the metric already has one. Returns whether it was stored.
    pub fn insert_if_absent(&mut self, metric: Metric, value: String) -> bool {
        match self.0.get(&metric) {
            Some(existing) if !existing.is_empty() => false,
            _ => {
                self.0.insert(metric, value);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of the extraction table.
#[derive(Debug)]
pub struct MetricSpec {
    pub metric: Metric,
    pub pattern: Regex,
    /// Capture group holding the number (2 when the label is itself a group).
    pub value_group: usize,
}

// The label sits on its own line; the number follows on a later line (blank lines allowed)
// and must end its line.
const LABEL_LINE_REST: &str = r"[^\n]*\n[\s\n]*";
const LABEL_LINE_END: &str = r" *\n[\s\n]*";
const VALUE: &str = r"(-?\(?\d[ \d.,]*\)?) *\n";

/// (metric, label pattern, rest-of-label-line pattern, value group)
const METRIC_TABLE: [(Metric, &str, &str, usize); 13] = [
    (Metric::Revenue, "umsatzerlöse", LABEL_LINE_REST, 1),
    (Metric::GrossProfit, "rohergebnis", LABEL_LINE_REST, 1),
    (Metric::NetIncome, "(ergebnis nach steuern|ergebnis des geschäftsjahres)", LABEL_LINE_REST, 2),
    (
        Metric::Ebitda,
        "(ebitda|ergebnis vor zinsen, steuern und abschreibungen|ergebnis vor zinsen, ertragsteuern, abschreibungen und amortisationen)",
        LABEL_LINE_REST,
        2,
    ),
    (
        Metric::Ebit,
        // "ebit" must not run into further letters ("EBITDA").
        "(ebit(?:[^a-zA-Z\n]|$)|betriebsergebnis|ergebnis vor steuern, zinsen|ergebnis der gewöhnlichen geschäftstätigkeit|ergebnis vor zinsen und ertragssteuern|ergebnis vor zinsen und steuern)",
        LABEL_LINE_REST,
        2,
    ),
    (Metric::Ebt, r"(ergebnis vor steuern|ebt\)?)", LABEL_LINE_END, 2),
    (Metric::Equity, "eigenkapital", LABEL_LINE_REST, 1),
    (Metric::Carryforward, "(verlustvortrag|gewinnvortrag)", LABEL_LINE_REST, 2),
    (Metric::NetLossForYear, "fehlbetrag", LABEL_LINE_REST, 1),
    (Metric::NetProfitForYear, "überschuss", LABEL_LINE_REST, 1),
    (Metric::BalanceSheetProfit, "bilanzgewinn", LABEL_LINE_REST, 1),
    (Metric::BalanceSheetLoss, "bilanzverlust", LABEL_LINE_REST, 1),
    (Metric::BalanceSheetTotal, "(aktiva|passiva)", LABEL_LINE_REST, 2),
];

pub fn build_metric_table() -> Result<Vec<MetricSpec>, ExtractError> {
    METRIC_TABLE
        .iter()
        .map(|&(metric, label, rest, value_group)| {
            let pattern = Regex::new(&format!("(?im){}{}{}", label, rest, VALUE))?;
            Ok(MetricSpec { metric, pattern, value_group })
        })
        .collect()
}

static METRIC_SPECS: Lazy<Vec<MetricSpec>> = Lazy::new(|| {
    build_metric_table().expect("Failed to compile metric patterns")
});

/// Normalizes a German-formatted number: thousands dots dropped, decimal comma
/// turned into a point, whitespace removed. Signs and parentheses stay as captured,
/// so "(1.234,56)" becomes "(1234.56)", not "-1234.56".
pub fn normalize_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Pattern-matches the metric table against statement text.
#[derive(Debug, Clone, Copy)]
pub struct MetricExtractor {
    specs: &'static [MetricSpec],
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricExtractor {
    pub fn new() -> Self {
        Self { specs: METRIC_SPECS.as_slice() }
    }

    pub fn extract(&self, statement: &str) -> MetricValues {
        let mut values = MetricValues::default();
        self.extract_into(statement, &mut values);
        values
    }

    /// Adds every metric found in `statement` to `values`.
    /// Metrics already present are never overwritten.
    pub fn extract_into(&self, statement: &str, values: &mut MetricValues) {
        for spec in self.specs {
            if values.get(spec.metric).is_some_and(|v| !v.is_empty()) {
                continue;
            }
            let Some(captures) = spec.pattern.captures(statement) else {
                continue;
            };
            if let Some(raw) = captures.get(spec.value_group) {
                let value = normalize_number(raw.as_str());
                tracing::trace!("Matched {} = {}", spec.metric.key(), value);
                values.insert_if_absent(spec.metric, value);
            }
        }
    }
}
