//! C10: SearXNG-style HTTP backend adapter.
//!
//! Grounded on `searxng_client.py`'s `SearXNGClient.search`: same query
//! parameters, same metadata-preserving result parsing. TLS/browser
//! rotation (`tls_rotation.py`) lives in [`tls`].

mod tls;

pub use tls::{BrowserProfile, NoTlsProfile, RotatingTlsProfile, TlsConfig, TlsProfile};

use search_core::{BackendId, RawResult, SearchError};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

const STANDARD_FIELDS: &[&str] = &["title", "url", "content", "engine", "score", "category", "thumbnail", "publishedDate"];

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub engines: Option<Vec<BackendId>>,
    pub categories: Option<Vec<String>>,
    pub language: Option<String>,
    pub time_range: Option<String>,
    pub page: Option<u32>,
    pub safesearch: Option<u8>,
}

pub struct SearxngAdapter {
    client: reqwest::Client,
    base_url: String,
    tls: Arc<dyn TlsProfile>,
}

impl SearxngAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_tls_profile(base_url, Arc::new(NoTlsProfile))
    }

    pub fn with_tls_profile(base_url: impl Into<String>, tls: Arc<dyn TlsProfile>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            tls,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawResult>, SearchError<Infallible>> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let mut params: Vec<(&str, String)> = vec![("q", query.to_string()), ("format", "json".to_string())];

        params.push(("language", options.language.clone().unwrap_or_else(|| "en-US".to_string())));
        params.push(("pageno", options.page.unwrap_or(1).to_string()));
        params.push(("safesearch", options.safesearch.unwrap_or(0).to_string()));
        if let Some(engines) = &options.engines {
            let joined: Vec<&str> = engines.iter().map(|e| e.as_str()).collect();
            params.push(("engines", joined.join(",")));
        }
        if let Some(categories) = &options.categories {
            params.push(("categories", categories.join(",")));
        }
        if let Some(time_range) = &options.time_range {
            params.push(("time_range", time_range.clone()));
        }

        let headers = self.tls.headers().await;
        let response = self
            .client
            .get(&url)
            .query(&params)
            .headers(headers)
            .send()
            .await
            .map_err(|e| SearchError::BackendTransient {
                backend: BackendId::new("searxng"),
                detail: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::BackendRateLimit { backend: BackendId::new("searxng"), retry_after: None });
        }
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(SearchError::BackendAntiBot { backend: BackendId::new("searxng") });
        }
        if !response.status().is_success() {
            return Err(SearchError::BackendTransient {
                backend: BackendId::new("searxng"),
                detail: format!("status {}", response.status()),
            });
        }

        let body_text = response.text().await.map_err(|e| SearchError::BackendTransient {
            backend: BackendId::new("searxng"),
            detail: e.to_string(),
        })?;

        if has_captcha_marker(&body_text) {
            return Err(SearchError::BackendAntiBot { backend: BackendId::new("searxng") });
        }

        let body: serde_json::Value = serde_json::from_str(&body_text).map_err(|e| SearchError::BackendTransient {
            backend: BackendId::new("searxng"),
            detail: e.to_string(),
        })?;

        Ok(parse_results(&body))
    }
}

const CAPTCHA_MARKERS: &[&str] = &["captcha", "recaptcha", "hcaptcha", "cf-challenge", "are you a human", "verify you are human"];

fn has_captcha_marker(body: &str) -> bool {
    let lower = body.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn parse_results(body: &serde_json::Value) -> Vec<RawResult> {
    let Some(results) = body["results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|hit| {
            let url = hit.get("url")?.as_str()?.to_string();
            let engine = hit.get("engine").and_then(|v| v.as_str()).unwrap_or("unknown");

            let mut metadata = HashMap::new();
            if let Some(object) = hit.as_object() {
                for (key, value) in object {
                    if !STANDARD_FIELDS.contains(&key.as_str()) {
                        metadata.insert(key.clone(), value.clone());
                    }
                }
            }

            Some(RawResult {
                title: hit.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                url,
                content: hit.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                backend: BackendId::new(engine),
                score: hit.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0),
                category: hit.get("category").and_then(|v| v.as_str()).unwrap_or("general").to_string(),
                thumbnail: hit.get("thumbnail").and_then(|v| v.as_str()).map(str::to_string),
                published_date: hit.get("publishedDate").and_then(|v| v.as_str()).map(str::to_string),
                metadata,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_results_preserves_non_standard_fields_in_metadata() {
        let body = serde_json::json!({
            "results": [
                {
                    "title": "FANUC SRVO-063",
                    "url": "https://fanuc.example/srvo-063",
                    "content": "Servo alarm troubleshooting",
                    "engine": "brave",
                    "score": 0.9,
                    "category": "general",
                    "pretty_url": "fanuc.example › srvo-063",
                    "positions": [1, 4]
                }
            ]
        });

        let results = parse_results(&body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].backend.as_str(), "brave");
        assert!(results[0].metadata.contains_key("pretty_url"));
        assert!(results[0].metadata.contains_key("positions"));
        assert!(!results[0].metadata.contains_key("title"));
    }

    #[test]
    fn parse_results_skips_hits_with_no_url() {
        let body = serde_json::json!({ "results": [{ "title": "no url here" }] });
        assert!(parse_results(&body).is_empty());
    }

    #[test]
    fn parse_results_on_missing_results_key_is_empty() {
        let body = serde_json::json!({});
        assert!(parse_results(&body).is_empty());
    }

    #[test]
    fn has_captcha_marker_detects_common_challenge_pages() {
        assert!(has_captcha_marker("<div class=\"g-recaptcha\">Please verify you are human</div>"));
        assert!(has_captcha_marker("Attention Required! | Cloudflare cf-challenge"));
        assert!(!has_captcha_marker(r#"{"results": [{"title": "ok"}]}"#));
    }
}
