use std::fmt;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::http::Fetch;

/// Outcome of one metadata lookup. Only `Found` carries fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiLookupResult {
    Found(Vec<(String, String)>),
    NotFound(String),
    RequestFailed(String),
}

impl ApiLookupResult {
    /// Supplemental fields; empty unless the lookup found the title.
    pub fn into_fields(self) -> Vec<(String, String)> {
        match self {
            ApiLookupResult::Found(fields) => fields,
            _ => Vec::new(),
        }
    }

    pub fn kind(&self) -> LookupKind {
        match self {
            ApiLookupResult::Found(_) => LookupKind::Found,
            ApiLookupResult::NotFound(_) => LookupKind::NotFound,
            ApiLookupResult::RequestFailed(_) => LookupKind::Failed,
        }
    }
}

/// Which way a lookup went, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Found,
    NotFound,
    Failed,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupKind::Found => "found",
            LookupKind::NotFound => "not_found",
            LookupKind::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub struct OmdbClient {
    endpoint: Url,
    api_key: String,
}

impl OmdbClient {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
        }
    }

    pub fn request_url(&self, title: &str, year: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("t", title)
            .append_pair("y", year)
            .append_pair("apikey", &self.api_key);
        url
    }

    /// Look a title up by name and year. Never fails; problems become
    /// `NotFound` or `RequestFailed`.
    pub async fn lookup<F: Fetch>(&self, fetcher: &F, title: &str, year: &str) -> ApiLookupResult {
        let url = self.request_url(title, year);
        let result = match fetcher.get_ok(&url).await {
            Ok(response) => decode(&response.body),
            Err(e) => ApiLookupResult::RequestFailed(e.to_string()),
        };
        match &result {
            ApiLookupResult::RequestFailed(reason) => {
                debug!(title, year, reason, "omdb lookup failed")
            }
            other => debug!(title, year, outcome = %other.kind(), "omdb lookup"),
        }
        result
    }
}

/// Interpret an OMDb response body.
pub fn decode(body: &str) -> ApiLookupResult {
    let payload: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return ApiLookupResult::RequestFailed(format!("invalid json: {e}")),
    };
    let Value::Object(map) = payload else {
        return ApiLookupResult::RequestFailed("payload is not an object".into());
    };
    if let Some(error) = map.get("Error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return ApiLookupResult::NotFound(message);
    }

    let fields = map
        .into_iter()
        .filter(|(key, _)| key != "Response")
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect();
    ApiLookupResult::Found(fields)
}
