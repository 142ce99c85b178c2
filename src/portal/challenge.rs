// src/portal/challenge.rs
//! CAPTCHA gate handling: the portal may serve a challenge page instead of a
//! publication. The page carries the challenge image and a form; submitting the
//! classified code through that form returns the publication.

use crate::classifier::CaptchaSolver;
use crate::portal::client::PortalSession;
use crate::portal::listing::has_publication;
use crate::utils::error::{ChallengeError, ClassifierError, PortalError};
use once_cell::sync::Lazy;
use reqwest::Method;
use scraper::{Html, Selector};
use std::sync::Arc;
use url::Url;

/// Form used when no form on the page declares a `solution` field.
pub const FALLBACK_FORM_INDEX: usize = 1;
const SOLUTION_FIELD: &str = "solution";

static CHALLENGE_WRAPPER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.captcha_wrapper").expect("Failed to compile CHALLENGE_WRAPPER_SELECTOR")
});

static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("img[src]").expect("Failed to compile IMAGE_SELECTOR")
});

static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("form").expect("Failed to compile FORM_SELECTOR")
});

static SOLUTION_INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("input[name='solution']").expect("Failed to compile SOLUTION_INPUT_SELECTOR")
});

/// What a gated page declares about its challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeForm {
    pub image_url: Url,
    pub action: Url,
    pub method: Method,
}

/// Locates the challenge image and the submission form on a gated page.
/// Relative links are resolved against `page_url`.
pub fn parse_challenge(page_html: &str, page_url: &Url) -> Result<ChallengeForm, ChallengeError> {
    let document = Html::parse_document(page_html);

    let wrapper = document
        .select(&CHALLENGE_WRAPPER_SELECTOR)
        .next()
        .ok_or_else(|| ChallengeError::WrapperNotFound(page_url.to_string()))?;

    let image_src = wrapper
        .select(&IMAGE_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or_else(|| ChallengeError::ImageNotFound(page_url.to_string()))?;
    let image_url = page_url.join(image_src.trim()).map_err(PortalError::from)?;

    let forms: Vec<_> = document.select(&FORM_SELECTOR).collect();
    let form = forms
        .iter()
        .find(|form| form.select(&SOLUTION_INPUT_SELECTOR).next().is_some())
        .or_else(|| forms.get(FALLBACK_FORM_INDEX))
        .ok_or_else(|| ChallengeError::FormNotFound(page_url.to_string()))?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => {
            page_url.join(action).map_err(PortalError::from)?
        }
        _ => page_url.clone(),
    };
    let method = match form.value().attr("method") {
        Some(method) if method.trim().eq_ignore_ascii_case("get") => Method::GET,
        _ => Method::POST,
    };

    Ok(ChallengeForm { image_url, action, method })
}

/// Solves challenge gates using the shared classifier handle.
#[derive(Clone)]
pub struct ChallengeResolver {
    solver: Arc<dyn CaptchaSolver>,
}

impl std::fmt::Debug for ChallengeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeResolver").finish_non_exhaustive()
    }
}

impl ChallengeResolver {
    pub fn new(solver: Arc<dyn CaptchaSolver>) -> Self {
        Self { solver }
    }

    /// Resolves the gate on `page_html` and returns the unlocked page.
    /// Any error means the filing behind the gate has to be skipped.
    pub async fn resolve(
        &self,
        session: &PortalSession,
        page_url: &Url,
        page_html: &str,
    ) -> Result<String, ChallengeError> {
        let form = parse_challenge(page_html, page_url)?;
        tracing::debug!("Challenge on {}: image {}, form {} {}", page_url, form.image_url, form.method, form.action);

        let image = session.fetch_bytes(form.image_url.clone()).await?;
        // Inference is CPU-bound and runs on the blocking pool.
        let solver = Arc::clone(&self.solver);
        let code = tokio::task::spawn_blocking(move || solver.solve(&image))
            .await
            .map_err(|e| ClassifierError::Inference(format!("Classifier task failed: {}", e)))??;
        tracing::debug!("Submitting challenge solution {} for {}", code, page_url);

        let fields = [(SOLUTION_FIELD, code.as_str()), ("confirm-button", "OK")];
        let response = session.submit_form(form.method, form.action, &fields).await?;

        if has_publication(&response) {
            tracing::info!("Challenge solved for {}", page_url);
            Ok(response)
        } else {
            Err(ChallengeError::Rejected(page_url.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://portal.example/pub/de/suchergebnis?1").unwrap()
    }

    #[test]
    fn form_with_solution_field_is_preferred() {
        let html = r#"
            <form action="/pub/de/search" method="get"><input name="fulltext"></form>
            <div class="captcha_wrapper"><img src="/captcha.png?id=7"></div>
            <form action="./solve?2" method="post"><input name="solution"><input name="confirm-button"></form>
        "#;

        let form = parse_challenge(html, &page_url()).unwrap();

        assert_eq!(form.image_url.as_str(), "https://portal.example/captcha.png?id=7");
        assert_eq!(form.action.as_str(), "https://portal.example/pub/de/solve?2");
        assert_eq!(form.method, Method::POST);
    }

    #[test]
    fn second_form_is_the_fallback() {
        let html = r#"
            <form action="/first"></form>
            <div class="captcha_wrapper"><img src="https://img.example/c.jpg"></div>
            <form action="/second" method="GET"></form>
        "#;

        let form = parse_challenge(html, &page_url()).unwrap();

        assert_eq!(form.image_url.as_str(), "https://img.example/c.jpg");
        assert_eq!(form.action.as_str(), "https://portal.example/second");
        assert_eq!(form.method, Method::GET);
    }

    #[test]
    fn form_without_action_posts_back_to_the_page() {
        let html = r#"<div class="captcha_wrapper"><img src="c.png"><form><input name="solution"></form></div>"#;

        let form = parse_challenge(html, &page_url()).unwrap();

        assert_eq!(form.action, page_url());
        assert_eq!(form.image_url.as_str(), "https://portal.example/pub/de/c.png");
    }

    #[test]
    fn missing_parts_are_reported() {
        assert!(matches!(
            parse_challenge("<p>Wartungsarbeiten</p>", &page_url()),
            Err(ChallengeError::WrapperNotFound(_))
        ));
        assert!(matches!(
            parse_challenge(r#"<div class="captcha_wrapper"></div>"#, &page_url()),
            Err(ChallengeError::ImageNotFound(_))
        ));
        assert!(matches!(
            parse_challenge(r#"<div class="captcha_wrapper"><img src="c.png"></div><form></form>"#, &page_url()),
            Err(ChallengeError::FormNotFound(_))
        ));
    }
}
