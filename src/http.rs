use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::settings::HttpSettings;

/// Status and body of a completed GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal GET interface shared by the harvester, the enricher and the OMDb client.
pub trait Fetch {
    /// Fetch `url`. Transport errors are `Err`; any HTTP status is `Ok`.
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError>;

    /// Like `get`, but non-2xx statuses become `FetchError::Status`.
    async fn get_ok(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: redact(url),
                status: response.status,
            });
        }
        Ok(response)
    }
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for ReqwestFetcher {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: redact(url),
            message: e.without_url().to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        debug!(url = %redact(url), status, bytes = body.len(), "fetched");

        Ok(HttpResponse { status, body })
    }
}

/// URL text safe for logs: the `apikey` query value is masked.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "apikey") {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "apikey" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
