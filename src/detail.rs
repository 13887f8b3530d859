use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{ConfigError, ParseError};
use crate::harvest::normalize_text;
use crate::settings::{compile_selector, SelectorSettings};

/// Fields scraped from a title's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub title: String,
    pub year: String,
    pub mpaa_rating: String,
    pub added_to_netflix: String,
}

pub struct DetailSelectors {
    title: Selector,
    year: Selector,
    mpaa_rating: Selector,
    added_to_netflix: Selector,
}

impl DetailSelectors {
    pub fn compile(settings: &SelectorSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            title: compile_selector("title", &settings.title)?,
            year: compile_selector("year", &settings.year)?,
            mpaa_rating: compile_selector("mpaa_rating", &settings.mpaa_rating)?,
            added_to_netflix: compile_selector("added_to_netflix", &settings.added_to_netflix)?,
        })
    }

    /// Extract all four fields or name the first one that is missing.
    ///
    /// Malformed detail URLs are redirected by the site to a generic page
    /// with a 200 status, so a missing element is the real failure signal.
    pub fn parse(&self, html: &str) -> Result<DetailFields, ParseError> {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.title, "title")?;
        let year = first_text(&document, &self.year, "year")?;
        let mpaa_rating = first_text(&document, &self.mpaa_rating, "mpaa_rating")?;
        let added = first_text(&document, &self.added_to_netflix, "added_to_netflix")?;

        Ok(DetailFields {
            title,
            year: extract_year(&year),
            mpaa_rating,
            added_to_netflix: label_value(&added).to_string(),
        })
    }
}

fn first_text(
    document: &Html,
    selector: &Selector,
    field: &'static str,
) -> Result<String, ParseError> {
    document
        .select(selector)
        .next()
        .map(|el| normalize_text(el.text()))
        .filter(|text| !text.is_empty())
        .ok_or(ParseError::Missing { field })
}

/// `"Added to Netflix: March 1, 2019"` -> `"March 1, 2019"`.
pub fn label_value(text: &str) -> &str {
    match text.split_once(':') {
        Some((_, value)) => value.trim(),
        None => text.trim(),
    }
}

/// First 19xx/20xx year in the text, or the trimmed text when there is none.
pub fn extract_year(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
    re.find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}
