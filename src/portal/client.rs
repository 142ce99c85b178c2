// src/portal/client.rs
use crate::classifier::CaptchaSolver;
use crate::config::CrawlerConfig;
use crate::extractors::statement::StatementLocator;
use crate::portal::challenge::ChallengeResolver;
use crate::portal::listing::{has_publication, parse_result_listing, publication_text};
use crate::portal::models::{Candidate, Filing, HarvestedFiling, WorklistEntry};
use crate::utils::error::PortalError;
use crate::utils::html_debug::{DebugSink, STATEMENT_DEBUG_PATTERNS};
use futures::stream::{self, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use indexmap::IndexMap;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// The portal serves degraded pages to clients that do not look like a browser.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.131 Safari/537.36";
const RETRY_BASE_DELAY_MS: u64 = 500;

const START_PATH: &str = "pub/de/start";
// Wicket form id of the full-text search panel.
const SEARCH_FORM_PARAM: &str = "0-2.-top~content~panel-left~card-form";
// Search category "Rechnungslegung/Finanzberichte".
const SEARCH_AREA: &str = "22";

/// Request spacing shared by all sessions of a crawl.
pub type SharedRateLimiter = Arc<DefaultDirectRateLimiter>;

/// `None` when no spacing is wanted.
pub fn build_rate_limiter(delay: Duration) -> Option<SharedRateLimiter> {
    Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)))
}

fn browser_headers(referer: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9",
    ));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("sec-fetch-user", HeaderValue::from_static("?1"));
    if let Ok(value) = HeaderValue::from_str(referer.as_str()) {
        headers.insert(header::REFERER, value);
    }
    headers
}

fn check_status(response: Response) -> Result<Response, PortalError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::error!("HTTP error status: {} for URL: {}", status, response.url());
        Err(PortalError::Http { status, url: response.url().to_string() })
    }
}

fn is_transient(error: &PortalError) -> bool {
    match error {
        PortalError::Network(_) => true,
        PortalError::Http { status, .. } => {
            status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
        }
        _ => false,
    }
}

/// A fetched page and the URL it was finally served from (after redirects).
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

/// One authenticated portal session. The portal ties navigation and challenge
/// state to the cookie jar, so a session serves exactly one company search
/// and everything fetched for it.
pub struct PortalSession {
    client: reqwest::Client,
    base_url: Url,
    config: CrawlerConfig,
    limiter: Option<SharedRateLimiter>,
    resolver: ChallengeResolver,
    locator: StatementLocator,
    debug: Option<DebugSink>,
}

impl PortalSession {
    pub fn new(
        config: &CrawlerConfig,
        solver: Arc<dyn CaptchaSolver>,
        limiter: Option<SharedRateLimiter>,
    ) -> Result<Self, PortalError> {
        let jar = Jar::default();
        jar.add_cookie_str(&format!("cc={}", config.session_cookie), &config.base_url);

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(browser_headers(&config.base_url))
            .cookie_provider(Arc::new(jar))
            .timeout(config.timeout);
        if let Some(http) = &config.proxy.http {
            builder = builder.proxy(reqwest::Proxy::http(http)?);
        }
        if let Some(https) = &config.proxy.https {
            builder = builder.proxy(reqwest::Proxy::https(https)?);
        }

        let debug = config.debug_dir.as_ref().and_then(|dir| match DebugSink::new(dir) {
            Ok(sink) => Some(sink),
            Err(e) => {
                tracing::warn!("Debug output disabled, cannot create {}: {}", dir.display(), e);
                None
            }
        });

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            config: config.clone(),
            limiter,
            resolver: ChallengeResolver::new(solver),
            locator: StatementLocator::new(),
            debug,
        })
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Sends a request, retrying transient failures with exponential backoff
    /// up to `max_retries` extra attempts.
    async fn send(&self, request: RequestBuilder) -> Result<Response, PortalError> {
        let mut attempt = 0;
        loop {
            let Some(current) = request.try_clone() else {
                // Streaming bodies cannot be replayed.
                self.throttle().await;
                return check_status(request.send().await?);
            };

            self.throttle().await;
            let outcome = match current.send().await {
                Ok(response) => check_status(response),
                Err(e) => Err(PortalError::Network(e)),
            };

            match outcome {
                Err(e) if attempt < self.config.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let backoff = Duration::from_millis(RETRY_BASE_DELAY_MS * 2_u64.pow(attempt - 1));
                    tracing::warn!("Request failed ({}), retry {} in {:?}", e, attempt, backoff);
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    pub async fn fetch_page(&self, url: Url) -> Result<Page, PortalError> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        let url = response.url().clone();
        let html = response.text().await?;
        Ok(Page { url, html })
    }

    pub async fn fetch_bytes(&self, url: Url) -> Result<Vec<u8>, PortalError> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Submits form fields the way the form declares it (query string for GET, urlencoded body otherwise).
    pub async fn submit_form(&self, method: Method, action: Url, fields: &[(&str, &str)]) -> Result<String, PortalError> {
        tracing::debug!("{} {}", method, action);
        let request = if method == Method::GET {
            self.client.get(action).query(fields)
        } else {
            self.client.request(method, action).form(fields)
        };
        let response = self.send(request).await?;
        Ok(response.text().await?)
    }

    /// Warm-up navigation followed by the full-text search. Returns the result page.
    pub async fn search(&self, term: &str) -> Result<Page, PortalError> {
        self.fetch_page(self.base_url.clone()).await?;

        let mut start = self.base_url.join(START_PATH)?;
        start.set_query(Some("0"));
        self.fetch_page(start).await?;

        let mut search_url = self.base_url.join(START_PATH)?;
        search_url
            .query_pairs_mut()
            .append_pair(SEARCH_FORM_PARAM, "")
            .append_pair("fulltext", term)
            .append_pair("area_select", SEARCH_AREA)
            .append_pair("search_button", "Suchen");
        self.fetch_page(search_url).await
    }

    /// Searches the annual statements of one company and fetches every listed filing.
    /// Filings that cannot be fetched or unlocked are skipped; only a failing
    /// search is an error.
    pub async fn get_reports(&self, company_name: &str) -> Result<Vec<Filing>, PortalError> {
        let term = self.config.search_term(company_name);
        tracing::info!("Searching for reports: {}", term);

        let listing = self.search(&term).await?;
        let candidates = parse_result_listing(&listing.html);
        tracing::info!("Found {} candidate filings for {}", candidates.len(), company_name);

        let mut filings: IndexMap<String, Filing> = IndexMap::new();
        for candidate in &candidates {
            match self.fetch_filing(&listing.url, candidate).await {
                Ok(Some(filing)) => {
                    filings.entry(filing.content_hash()).or_insert(filing);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    company = %company_name,
                    url = %candidate.detail_url,
                    "Failed to fetch filing: {}", e
                ),
            }
        }

        Ok(filings.into_values().collect())
    }

    async fn fetch_filing(&self, listing_url: &Url, candidate: &Candidate) -> Result<Option<Filing>, PortalError> {
        let url = listing_url.join(&candidate.detail_url)?;
        let mut page = self.fetch_page(url).await?;

        if !has_publication(&page.html) {
            tracing::debug!("No publication on {}, assuming challenge", page.url);
            match self.resolver.resolve(self, &page.url, &page.html).await {
                Ok(unlocked) => page.html = unlocked,
                Err(e) => {
                    tracing::warn!(company = %candidate.company, url = %page.url, "Skipping filing: {}", e);
                    if let Some(debug) = &self.debug {
                        debug.save_page(&format!("challenge_{}", candidate.debug_label()), &page.html);
                    }
                    return Ok(None);
                }
            }
        }

        let document = Html::parse_document(&page.html);
        let Some(report) = publication_text(&document) else {
            tracing::warn!(company = %candidate.company, url = %page.url, "Publication container vanished");
            return Ok(None);
        };

        let guv = self.locator.locate(&document);
        if guv.is_empty() {
            tracing::info!("No income statement in '{}' ({})", candidate.title, candidate.company);
            if let Some(debug) = &self.debug {
                debug.save_annotated(&candidate.debug_label(), &page.html, &STATEMENT_DEBUG_PATTERNS);
            }
        }

        Ok(Some(Filing::from_candidate(candidate, report, guv)))
    }
}

/// Crawls every worklist entry, `config.workers` companies at a time.
///
/// Each company gets its own session; the classifier handle and the rate
/// limiter are shared. Results come back in worklist order whatever the
/// worker count. A failing company is logged and contributes nothing.
pub async fn crawl_worklist(
    entries: &[WorklistEntry],
    config: &CrawlerConfig,
    solver: Arc<dyn CaptchaSolver>,
) -> Vec<HarvestedFiling> {
    let limiter = build_rate_limiter(config.request_delay);
    let workers = config.workers.max(1);
    tracing::info!("Crawling {} companies with {} worker(s)", entries.len(), workers);

    let per_company: Vec<Vec<HarvestedFiling>> = stream::iter(entries)
        .map(|entry| crawl_company(entry, config, Arc::clone(&solver), limiter.clone()))
        .buffered(workers)
        .collect()
        .await;

    per_company.into_iter().flatten().collect()
}

async fn crawl_company(
    entry: &WorklistEntry,
    config: &CrawlerConfig,
    solver: Arc<dyn CaptchaSolver>,
    limiter: Option<SharedRateLimiter>,
) -> Vec<HarvestedFiling> {
    let session = match PortalSession::new(config, solver, limiter) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(company = %entry.company, "Failed to open portal session: {}", e);
            return Vec::new();
        }
    };

    match session.get_reports(&entry.company).await {
        Ok(filings) => {
            tracing::info!("Acquired {} reports for {}", filings.len(), entry.company);
            filings
                .into_iter()
                .map(|filing| HarvestedFiling {
                    search_company_name: entry.company.clone(),
                    domain: entry.domain.clone(),
                    filing,
                })
                .collect()
        }
        Err(e) => {
            tracing::error!(company = %entry.company, "Search failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SESSION_COOKIE;
    use crate::portal::models::FilingDate;
    use crate::utils::error::ClassifierError;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PUBLICATION: &str = "<html><body><div class=\"publication_container\">
        <h3>Gewinn- und Verlustrechnung</h3>
        <table>
        <tr>
        <td>Umsatzerlöse</td>
        <td>1.000,00</td>
        </tr>
        </table>
        </div></body></html>";

    const GATE: &str = r#"<html><body>
        <form action="/pub/de/suche"><input name="fulltext"></form>
        <div class="captcha_wrapper"><img src="/captcha.png"></div>
        <form action="/pub/de/solve" method="post"><input name="solution"><input type="submit" name="confirm-button"></form>
        </body></html>"#;

    const CAPTCHA_IMAGE: &[u8] = b"captcha-image-bytes";

    fn config(server: &MockServer) -> CrawlerConfig {
        let mut config = CrawlerConfig::new(Url::parse(&server.uri()).unwrap());
        config.request_delay = Duration::ZERO;
        config
    }

    /// Answers "ABCDE" for the expected image, fails for anything else.
    fn solver() -> Arc<dyn CaptchaSolver> {
        Arc::new(|image: &[u8]| {
            if image == CAPTCHA_IMAGE {
                Ok("ABCDE".to_string())
            } else {
                Err(ClassifierError::ImageDecode("unexpected image".to_string()))
            }
        })
    }

    fn listing(rows: &[(&str, &str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(company, title, href)| format!(
                r#"<div class="row"><div class="first">{company}</div><div class="info"><a href="{href}">{title}</a></div><div class="date">15.06.2023</div></div>"#
            ))
            .collect();
        format!(r#"<html><body><div class="result_container">{rows}</div></body></html>"#)
    }

    async fn mount_portal(server: &MockServer, company: &str, listing_html: String) {
        Mock::given(method("GET"))
            .and(path("/pub/de/start"))
            .and(query_param("fulltext", format!("{company} Jahresabschluss")))
            .and(header("cookie", format!("cc={DEFAULT_SESSION_COOKIE}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html))
            .with_priority(1)
            .mount(server)
            .await;
        mount_warm_up(server).await;
    }

    async fn mount_warm_up(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/pub/de/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .with_priority(10)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(server)
            .await;
    }

    async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn ungated_filings_are_fetched_and_scanned() {
        let server = MockServer::start().await;
        let html = listing(&[
            ("Muster GmbH", "Jahresabschluss zum 31.12.2022", "/pub/de/detail/1"),
            ("Muster GmbH", "Jahresabschluss zum 31.12.2021", "/pub/de/detail/2"),
        ]);
        mount_portal(&server, "Muster GmbH", html).await;
        mount_page(&server, "/pub/de/detail/1", PUBLICATION).await;
        mount_page(&server, "/pub/de/detail/2", "<html><body><div class=\"publication_container\">Bilanz</div></body></html>").await;

        let session = PortalSession::new(&config(&server), solver(), None).unwrap();
        let filings = session.get_reports("Muster GmbH").await.unwrap();

        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].title, "Jahresabschluss zum 31.12.2022");
        assert_eq!(filings[0].date, FilingDate::Text("2023-06-15".into()));
        assert!(filings[0].guv.starts_with("Gewinn- und Verlustrechnung"));
        assert!(filings[0].guv.contains("1.000,00"));
        assert_eq!(filings[1].report, "Bilanz");
        assert_eq!(filings[1].guv, "");
    }

    #[tokio::test]
    async fn gated_filing_is_unlocked_with_the_classified_code() {
        let server = MockServer::start().await;
        mount_portal(&server, "Muster GmbH", listing(&[("Muster GmbH", "Jahresabschluss", "/pub/de/detail/1")])).await;
        mount_page(&server, "/pub/de/detail/1", GATE).await;
        Mock::given(method("GET"))
            .and(path("/captcha.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_IMAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pub/de/solve"))
            .and(body_string_contains("solution=ABCDE"))
            .and(body_string_contains("confirm-button=OK"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PUBLICATION))
            .expect(1)
            .mount(&server)
            .await;

        let session = PortalSession::new(&config(&server), solver(), None).unwrap();
        let filings = session.get_reports("Muster GmbH").await.unwrap();

        assert_eq!(filings.len(), 1);
        assert!(filings[0].guv.contains("Umsatzerlöse"));
    }

    #[tokio::test]
    async fn rejected_challenge_skips_only_that_filing() {
        let server = MockServer::start().await;
        let html = listing(&[
            ("Muster GmbH", "Gesperrt", "/pub/de/detail/1"),
            ("Muster GmbH", "Offen", "/pub/de/detail/2"),
            ("Muster GmbH", "Fehlt", "/pub/de/detail/404"),
        ]);
        mount_portal(&server, "Muster GmbH", html).await;
        mount_page(&server, "/pub/de/detail/1", GATE).await;
        mount_page(&server, "/pub/de/detail/2", PUBLICATION).await;
        Mock::given(method("GET"))
            .and(path("/captcha.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_IMAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/pub/de/solve"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GATE))
            .mount(&server)
            .await;

        let session = PortalSession::new(&config(&server), solver(), None).unwrap();
        let filings = session.get_reports("Muster GmbH").await.unwrap();

        let titles: Vec<_> = filings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Offen"]);
    }

    #[tokio::test]
    async fn identical_results_are_kept_once() {
        let server = MockServer::start().await;
        let html = listing(&[
            ("Muster GmbH", "Jahresabschluss", "/pub/de/detail/1"),
            ("Muster GmbH", "Jahresabschluss", "/pub/de/detail/1"),
        ]);
        mount_portal(&server, "Muster GmbH", html).await;
        mount_page(&server, "/pub/de/detail/1", PUBLICATION).await;

        let session = PortalSession::new(&config(&server), solver(), None).unwrap();
        assert_eq!(session.get_reports("Muster GmbH").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_company_does_not_stop_the_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pub/de/start"))
            .and(query_param("fulltext", "Kaputt AG Jahresabschluss"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_portal(&server, "Muster GmbH", listing(&[("Muster GmbH", "Jahresabschluss", "/pub/de/detail/1")])).await;
        mount_page(&server, "/pub/de/detail/1", PUBLICATION).await;

        let entries = vec![
            WorklistEntry { company: "Kaputt AG".into(), domain: "kaputt.de".into() },
            WorklistEntry { company: "Muster GmbH".into(), domain: "muster.de".into() },
        ];
        let mut config = config(&server);
        config.workers = 2;

        let harvested = crawl_worklist(&entries, &config, solver()).await;

        assert_eq!(harvested.len(), 1);
        assert_eq!(harvested[0].search_company_name, "Muster GmbH");
        assert_eq!(harvested[0].domain, "muster.de");
    }

    #[tokio::test]
    async fn harvest_follows_worklist_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pub/de/start"))
            .and(query_param("fulltext", "Langsam AG Jahresabschluss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(listing(&[("Langsam AG", "Jahresabschluss", "/pub/de/detail/1")]))
                    .set_delay(Duration::from_millis(300)),
            )
            .with_priority(1)
            .mount(&server)
            .await;
        mount_portal(&server, "Muster GmbH", listing(&[("Muster GmbH", "Jahresabschluss", "/pub/de/detail/2")])).await;
        mount_portal(&server, "Beispiel AG", listing(&[("Beispiel AG", "Jahresabschluss", "/pub/de/detail/3")])).await;
        for detail in ["/pub/de/detail/1", "/pub/de/detail/2", "/pub/de/detail/3"] {
            mount_page(&server, detail, PUBLICATION).await;
        }

        let entries = vec![
            WorklistEntry { company: "Langsam AG".into(), domain: "langsam.de".into() },
            WorklistEntry { company: "Muster GmbH".into(), domain: "muster.de".into() },
            WorklistEntry { company: "Beispiel AG".into(), domain: "beispiel.de".into() },
        ];
        let mut config = config(&server);
        config.workers = 3;

        let harvested = crawl_worklist(&entries, &config, solver()).await;

        let companies: Vec<_> = harvested.iter().map(|h| h.filing.company.as_str()).collect();
        assert_eq!(companies, vec!["Langsam AG", "Muster GmbH", "Beispiel AG"]);
    }

    #[tokio::test]
    async fn request_spacing_is_shared_by_all_workers() {
        let server = MockServer::start().await;
        mount_portal(&server, "Muster GmbH", listing(&[])).await;
        mount_portal(&server, "Beispiel AG", listing(&[])).await;

        let entries = vec![
            WorklistEntry { company: "Muster GmbH".into(), domain: String::new() },
            WorklistEntry { company: "Beispiel AG".into(), domain: String::new() },
        ];
        let mut config = config(&server);
        config.workers = 2;
        config.request_delay = Duration::from_millis(100);

        let started = std::time::Instant::now();
        crawl_worklist(&entries, &config, solver()).await;
        let elapsed = started.elapsed();

        // Warm-up, start page and search for each company.
        let requests = server.received_requests().await.unwrap().len();
        assert_eq!(requests, 6);
        let minimum = config.request_delay * (requests as u32 - 1);
        assert!(elapsed >= minimum, "{requests} requests took {elapsed:?}, expected at least {minimum:?}");
    }

    #[tokio::test]
    async fn debug_artifacts_of_different_companies_do_not_collide() {
        let server = MockServer::start().await;
        let bare = "<html><body><div class=\"publication_container\">Bilanz</div></body></html>";
        mount_portal(&server, "Muster GmbH", listing(&[("Muster GmbH", "Jahresabschluss", "/pub/de/detail/1")])).await;
        mount_portal(&server, "Beispiel AG", listing(&[("Beispiel AG", "Jahresabschluss", "/pub/de/detail/2")])).await;
        mount_page(&server, "/pub/de/detail/1", bare).await;
        mount_page(&server, "/pub/de/detail/2", bare).await;

        let debug_dir = tempfile::tempdir().unwrap();
        let mut config = config(&server);
        config.debug_dir = Some(debug_dir.path().to_path_buf());
        let entries = vec![
            WorklistEntry { company: "Muster GmbH".into(), domain: String::new() },
            WorklistEntry { company: "Beispiel AG".into(), domain: String::new() },
        ];

        crawl_worklist(&entries, &config, solver()).await;

        let artifacts = std::fs::read_dir(debug_dir.path()).unwrap().count();
        assert_eq!(artifacts, 2);
    }

    #[tokio::test]
    async fn panicking_solver_only_skips_the_gated_filing() {
        let server = MockServer::start().await;
        let html = listing(&[
            ("Muster GmbH", "Gesperrt", "/pub/de/detail/1"),
            ("Muster GmbH", "Offen", "/pub/de/detail/2"),
        ]);
        mount_portal(&server, "Muster GmbH", html).await;
        mount_page(&server, "/pub/de/detail/1", GATE).await;
        mount_page(&server, "/pub/de/detail/2", PUBLICATION).await;
        Mock::given(method("GET"))
            .and(path("/captcha.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(CAPTCHA_IMAGE))
            .mount(&server)
            .await;

        let broken: Arc<dyn CaptchaSolver> = Arc::new(|_: &[u8]| -> Result<String, ClassifierError> {
            panic!("model crashed")
        });
        let session = PortalSession::new(&config(&server), broken, None).unwrap();
        let filings = session.get_reports("Muster GmbH").await.unwrap();

        let titles: Vec<_> = filings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Offen"]);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        mount_page(&server, "/flaky", "ok").await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut config = config(&server);

        let no_retry = PortalSession::new(&config, solver(), None).unwrap();
        let err = no_retry.fetch_page(config.base_url.join("down").unwrap()).await.unwrap_err();
        assert!(matches!(err, PortalError::Http { status, .. } if status.as_u16() == 503));

        config.max_retries = 1;
        let retrying = PortalSession::new(&config, solver(), None).unwrap();
        let page = retrying.fetch_page(config.base_url.join("flaky").unwrap()).await.unwrap();
        assert_eq!(page.html, "ok");
    }

    #[test]
    fn zero_delay_disables_rate_limiting() {
        assert!(build_rate_limiter(Duration::ZERO).is_none());
        assert!(build_rate_limiter(Duration::from_millis(150)).is_some());
    }
}
