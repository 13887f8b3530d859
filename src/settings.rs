use config::{Config, Environment, File};
use scraper::Selector;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::ConfigError;
use crate::harvest::{Order, PageQuery};

const ENV_PREFIX: &str = "FLIXABLE";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub omdb_key: String,
    #[serde(default)]
    pub site: SiteSettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub omdb: OmdbSettings,
    #[serde(default)]
    pub selectors: SelectorSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub base_url: String,
    pub pages: u32,
    pub fail_fast: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://flixable.com/".into(),
            pages: 3,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub min_rating: f32,
    pub min_year: i32,
    pub max_year: i32,
    pub order: Order,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            min_rating: 0.0,
            min_year: 1920,
            max_year: 2021,
            order: Order::Date,
        }
    }
}

impl QuerySettings {
    /// Filters for the first list page; the harvest loop derives the rest.
    pub fn first_page(&self) -> PageQuery {
        PageQuery {
            page: 1,
            min_rating: self.min_rating,
            min_year: self.min_year,
            max_year: self.max_year,
            order: self.order,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OmdbSettings {
    pub endpoint: String,
}

impl Default for OmdbSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://www.omdbapi.com/".into(),
        }
    }
}

/// CSS selectors for the list and detail pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub title_link: String,
    pub title: String,
    pub year: String,
    pub mpaa_rating: String,
    pub added_to_netflix: String,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            title_link: "h5.card-title a".into(),
            title: "h1.title".into(),
            year: "span.year".into(),
            mpaa_rating: "span.mpaa-rating".into(),
            added_to_netflix: "p.added-date".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("flixable_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: String,
    pub prefix: String,
    pub failure_report: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: ".".into(),
            prefix: "netflix_titles".into(),
            failure_report: true,
        }
    }
}

impl Settings {
    /// Layer the secrets file (optional on disk) under `FLIXABLE_*` environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        match raw.get_string("omdb_key") {
            Ok(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingKey("omdb_key")),
        }

        let settings: Settings = raw.try_deserialize()?;
        info!(
            config = path,
            base_url = %settings.site.base_url,
            pages = settings.site.pages,
            "configuration loaded"
        );
        Ok(settings)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        parse_url("site.base_url", &self.site.base_url)
    }

    pub fn omdb_endpoint(&self) -> Result<Url, ConfigError> {
        parse_url("omdb.endpoint", &self.omdb.endpoint)
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::Url { name, source })
}

/// Compile one configured selector, naming the setting on failure.
pub fn compile_selector(name: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        name,
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
