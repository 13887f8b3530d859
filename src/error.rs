use thiserror::Error;

/// A request that did not produce a usable response.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// A required detail-page element was not found.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("detail page has no {field} element")]
    Missing { field: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("configuration key `{0}` is missing or empty")]
    MissingKey(&'static str),
    #[error("invalid CSS selector for {name} ({selector}): {message}")]
    Selector {
        name: &'static str,
        selector: String,
        message: String,
    },
    #[error("invalid URL for {name}: {source}")]
    Url {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
