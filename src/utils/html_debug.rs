// src/utils/html_debug.rs
use std::fs;
use std::path::{Path, PathBuf};
use crate::utils::error::StorageError;

/// Patterns highlighted when a filing has no locatable income statement.
pub const STATEMENT_DEBUG_PATTERNS: [(&str, &str); 4] = [
    (r"(?i)<h[2-4][^>]*>", "heading"),
    (r"(?i)gewinn", "marker"),
    (r"(?i)verlustrechnung", "marker"),
    (r"(?i)<table[^>]*>", "table"),
];

/// Writes diagnostic artifacts (gated pages, annotated filings) into one directory.
/// Failures are logged, never propagated: debug output must not abort a crawl.
#[derive(Debug, Clone)]
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Saves a page verbatim, e.g. a challenge page that could not be resolved.
    pub fn save_page(&self, label: &str, html: &str) {
        let path = self.dir.join(format!("{}.html", file_stem(label)));
        match fs::write(&path, html) {
            Ok(()) => tracing::info!("Saved debug page to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save debug page {}: {}", path.display(), e),
        }
    }

    /// Saves a page with every match of `patterns` wrapped in a highlight span.
    pub fn save_annotated(&self, label: &str, html: &str, patterns: &[(&str, &str)]) {
        let path = self.dir.join(format!("{}_annotated.html", file_stem(label)));
        if let Err(e) = create_debug_html(html, &path, patterns) {
            tracing::warn!("Failed to create debug HTML {}: {}", path.display(), e);
        }
    }
}

/// Turns an arbitrary label (company name, URL) into a safe file stem.
fn file_stem(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    stem.chars().take(120).collect()
}

/// Saves a HTML snippet to a file with debug highlights
pub fn save_debug_html(html: &str, path: &Path, highlights: &[(usize, usize, &str)]) -> Result<(), StorageError> {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");
    debug_html.push_str(".highlight-heading { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-marker { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-table { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-custom { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    let mut sorted_highlights = highlights.to_vec();
    sorted_highlights.sort_by_key(|h| h.0);

    let mut last_pos = 0;
    for (start, end, highlight_type) in sorted_highlights {
        // Overlapping matches would duplicate text.
        if start < last_pos {
            continue;
        }
        debug_html.push_str(&html[last_pos..start]);

        let css_class = match highlight_type {
            "heading" => "highlight-heading",
            "marker" => "highlight-marker",
            "table" => "highlight-table",
            _ => "highlight-custom",
        };

        debug_html.push_str(&format!("<span class=\"{}\" title=\"Position: {}-{}, Type: {}\">",
            css_class, start, end, highlight_type));
        // Escape so highlighted tags show up as text instead of being rendered.
        debug_html.push_str(&html[start..end].replace('<', "&lt;").replace('>', "&gt;"));
        debug_html.push_str("</span>");

        last_pos = end;
    }

    if last_pos < html.len() {
        debug_html.push_str(&html[last_pos..]);
    }
    debug_html.push_str("\n</body>\n</html>");

    fs::write(path, debug_html)?;
    tracing::info!("Saved debug HTML to {}", path.display());
    Ok(())
}

/// Creates a debug version of an HTML document with locations of specified regex patterns highlighted
pub fn create_debug_html(html: &str, path: &Path, patterns: &[(&str, &str)]) -> Result<(), StorageError> {
    use regex::Regex;

    let mut highlights = Vec::new();
    for (pattern, highlight_type) in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!("Skipping invalid debug pattern '{}': {}", pattern, e);
                continue;
            }
        };
        for mat in re.find_iter(html) {
            highlights.push((mat.start(), mat.end(), *highlight_type));
        }
    }

    save_debug_html(html, path, &highlights)
}
