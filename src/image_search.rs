//! Image search used to find a representative picture of a figure.
//!
//! DuckDuckGo's image endpoint needs a per-query `vqd` token that only appears
//! in the HTML of a normal search, so every lookup is two requests. "Nothing
//! found" in any form is `Ok(None)`; only transport failures are errors.

use crate::config::ImageSearchConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// First image URL for `query`, if any.
    async fn search(&self, query: &str) -> Result<Option<String>, ServiceError>;
}

pub struct DuckDuckGoImageSearch {
    client: reqwest::Client,
    endpoint: String,
    user_agent: String,
    timeout: Duration,
}

impl DuckDuckGoImageSearch {
    pub fn new(config: &ImageSearchConfig) -> Self {
        let endpoint = if config.endpoint.ends_with('/') {
            config.endpoint.clone()
        } else {
            format!("{}/", config.endpoint)
        };

        Self {
            client: reqwest::Client::new(),
            endpoint,
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn fetch_token(&self, query: &str) -> Result<Option<String>, ServiceError> {
        let html = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::ImageSearch(format!("token request failed: {e}")))?
            .text()
            .await
            .map_err(|e| ServiceError::ImageSearch(format!("token body unreadable: {e}")))?;

        Ok(extract_vqd(&html).map(str::to_string))
    }
}

#[async_trait]
impl ImageSearch for DuckDuckGoImageSearch {
    async fn search(&self, query: &str) -> Result<Option<String>, ServiceError> {
        let Some(vqd) = self.fetch_token(query).await? else {
            tracing::debug!(query, "No vqd token in search page");
            return Ok(None);
        };

        let resp = self
            .client
            .get(format!("{}i.js", self.endpoint))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[("q", query), ("vqd", vqd.as_str()), ("o", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::ImageSearch(format!("image request failed: {e}")))?;

        if !resp.status().is_success() {
            tracing::debug!(query, status = %resp.status(), "Image search returned an error status");
            return Ok(None);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::ImageSearch(format!("image body unreadable: {e}")))?;

        Ok(first_image(&body))
    }
}

fn vqd_regexes() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"vqd=([\d-]+)&").expect("regex for vqd query parameter"),
            Regex::new(r#"vqd=["']([\d-]+)["']"#).expect("regex for quoted vqd"),
        ]
    })
}

/// Pull the `vqd` token out of a search results page.
pub fn extract_vqd(html: &str) -> Option<&str> {
    vqd_regexes()
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Deserialize)]
struct ImageResults {
    #[serde(default)]
    results: Vec<ImageResult>,
}

#[derive(Deserialize)]
struct ImageResult {
    image: Option<String>,
}

/// First image URL from an `i.js` JSON body. Non-JSON bodies yield nothing.
pub fn first_image(body: &str) -> Option<String> {
    if !body.trim_start().starts_with('{') {
        return None;
    }
    let parsed: ImageResults = serde_json::from_str(body).ok()?;
    parsed
        .results
        .into_iter()
        .filter_map(|r| r.image)
        .find(|url| !url.is_empty())
}

/// True for absolute http(s) URLs, the only pictures worth storing.
pub fn is_usable_picture_url(url: &str) -> bool {
    let url = url.trim();
    (url.starts_with("https://") || url.starts_with("http://")) && !url.contains(char::is_whitespace)
}
