// src/config.rs
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Portal entry point; every other path is resolved against it.
pub const DEFAULT_BASE_URL: &str = "https://www.bundesanzeiger.de/";
/// Consent cookie (`cc`) the portal expects before it serves non-degraded pages.
pub const DEFAULT_SESSION_COOKIE: &str = "1628606977-805e172265bfdbde-10";
/// Appended to every company name to restrict the full-text search to annual statements.
pub const DEFAULT_SEARCH_SUFFIX: &str = "Jahresabschluss";
/// Minimum spacing between two requests, across all sessions.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 150;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

/// Everything a crawl needs, passed explicitly into each portal session.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub base_url: Url,
    pub session_cookie: String,
    pub search_suffix: String,
    pub proxy: ProxyConfig,
    pub request_delay: Duration,
    pub timeout: Duration,
    /// Extra attempts for a request that failed on the network or with a 5xx status.
    pub max_retries: u32,
    /// Companies crawled concurrently, each with its own session.
    pub workers: usize,
    /// Where diagnostic pages are written, if anywhere.
    pub debug_dir: Option<PathBuf>,
}

impl CrawlerConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            search_suffix: DEFAULT_SEARCH_SUFFIX.to_string(),
            proxy: ProxyConfig::default(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 0,
            workers: 1,
            debug_dir: None,
        }
    }

    /// Full-text search term for a company, e.g. "Muster GmbH Jahresabschluss".
    pub fn search_term(&self, company_name: &str) -> String {
        format!("{} {}", company_name.trim(), self.search_suffix)
    }
}
