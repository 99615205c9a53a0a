// client.rs
use crate::scraper::models::{ArticlePage, ArticleQuery, ClusterListResponse, ClusterQuery, CortarDetail};
use crate::scraper::ApiError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_BASE_URL: &str = "https://m.land.naver.com";

/// Anything that can answer listing and cluster queries.
///
/// The collector and the region discovery only ever see this trait, so tests
/// can drive them with scripted pages instead of the network.
pub trait ListingSource {
    fn fetch_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, ApiError>;

    /// `Ok(None)` means upstream answered but had no region for that viewport.
    fn fetch_cortar(&self, query: &ClusterQuery) -> Result<Option<CortarDetail>, ApiError>;
}

impl<T: ListingSource + ?Sized> ListingSource for &T {
    fn fetch_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, ApiError> {
        (**self).fetch_articles(query)
    }

    fn fetch_cortar(&self, query: &ClusterQuery) -> Result<Option<CortarDetail>, ApiError> {
        (**self).fetch_cortar(query)
    }
}

/// Thin blocking wrapper around the mobile map API. No retries, no pacing.
pub struct NaverLandClient {
    client: Client,
    base_url: String,
}

impl NaverLandClient {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(REFERER, HeaderValue::from_static("https://m.land.naver.com/"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let url = Url::parse_with_params(&format!("{}{}", self.base_url, path), params)
            .map_err(|e| ApiError::Setup(format!("Bad URL for {path}: {e}")))?;

        tracing::debug!(%url, "GET");

        let resp = self.client.get(url).send().map_err(|e| {
            // Timeouts, refused connections and broken bodies are all worth retrying.
            ApiError::Transient(e.to_string())
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ApiError::Transient(format!("Failed to read body: {e}")))?;

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ApiError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                body: truncate(&text, 200),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ApiError::UpstreamFormat(format!("Invalid JSON from {path}: {e}: {}", truncate(&text, 200)))
        })
    }
}

impl ListingSource for NaverLandClient {
    fn fetch_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, ApiError> {
        let page: ArticlePage = self.get_json("/cluster/ajax/articleList", &query.params())?;
        check_code(&page.code)?;
        Ok(page)
    }

    fn fetch_cortar(&self, query: &ClusterQuery) -> Result<Option<CortarDetail>, ApiError> {
        let resp: ClusterListResponse = self.get_json("/cluster/clusterList", &query.params())?;
        check_code(&resp.code)?;
        Ok(resp
            .data
            .and_then(|d| d.cortar)
            .and_then(|c| c.detail)
            .filter(|d| d.cortar_no.as_deref().is_some_and(|no| !no.is_empty())))
    }
}

fn check_code(code: &str) -> Result<(), ApiError> {
    if code == "success" {
        Ok(())
    } else {
        Err(ApiError::UpstreamFormat(format!("Upstream returned code={code}")))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
