use std::collections::HashSet;
use std::fmt;

use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, FetchError};
use crate::http::{redact, Fetch};
use crate::settings::{compile_selector, Settings};

/// Sort order accepted by the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Date,
    Rating,
    Title,
    Year,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Order::Date => "date",
            Order::Rating => "rating",
            Order::Title => "title",
            Order::Year => "year",
        };
        f.write_str(s)
    }
}

/// Filters and page number for one list request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageQuery {
    pub page: u32,
    pub min_rating: f32,
    pub min_year: i32,
    pub max_year: i32,
    pub order: Order,
}

impl PageQuery {
    /// Same filters, different page.
    pub fn for_page(&self, page: u32) -> PageQuery {
        PageQuery { page, ..*self }
    }

    pub fn params(&self) -> [(&'static str, String); 5] {
        [
            ("page", self.page.to_string()),
            ("min-rating", self.min_rating.to_string()),
            ("min-year", self.min_year.to_string()),
            ("max-year", self.max_year.to_string()),
            ("order", self.order.to_string()),
        ]
    }

    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().clear().extend_pairs(self.params());
        url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLink {
    pub title: String,
    pub url: String,
}

/// Links gathered across the page loop plus the pages that could not be fetched.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub links: Vec<TitleLink>,
    pub failed_pages: Vec<(u32, FetchError)>,
    pub duplicates: usize,
}

impl HarvestReport {
    pub fn urls(&self) -> Vec<String> {
        self.links.iter().map(|l| l.url.clone()).collect()
    }
}

pub struct Harvester {
    base_url: Url,
    title_link: Selector,
}

impl Harvester {
    pub fn new(base_url: Url, title_link: Selector) -> Self {
        Self {
            base_url,
            title_link,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            settings.base_url()?,
            compile_selector("title_link", &settings.selectors.title_link)?,
        ))
    }

    /// Fetch one list page and extract its title links.
    pub async fn harvest<F: Fetch>(
        &self,
        fetcher: &F,
        query: &PageQuery,
    ) -> Result<Vec<TitleLink>, FetchError> {
        let url = query.url(&self.base_url);
        debug!(page = query.page, url = %redact(&url), "fetching list page");
        let response = fetcher.get_ok(&url).await?;
        Ok(self.parse_links(&response.body))
    }

    /// Title text and absolute detail URL for every matching anchor.
    pub fn parse_links(&self, html: &str) -> Vec<TitleLink> {
        let document = Html::parse_document(html);
        let mut links = Vec::new();

        for element in document.select(&self.title_link) {
            let title = normalize_text(element.text());
            let Some(href) = element.value().attr("href") else {
                debug!(title, "title element has no href");
                continue;
            };
            match self.base_url.join(href) {
                Ok(url) => links.push(TitleLink {
                    title,
                    url: url.to_string(),
                }),
                Err(e) => debug!(title, href, error = %e, "unresolvable detail link"),
            }
        }

        links
    }

    /// Harvest pages `1..=pages` in order.
    ///
    /// A failed page is recorded and skipped unless `fail_fast` is set, in
    /// which case its error ends the loop. If every page fails, the last
    /// error is returned. A URL already collected from an earlier page is
    /// dropped; distinct URLs sharing a title are kept.
    pub async fn harvest_pages<F: Fetch>(
        &self,
        fetcher: &F,
        query: &PageQuery,
        pages: u32,
        fail_fast: bool,
    ) -> Result<HarvestReport, FetchError> {
        let mut report = HarvestReport::default();
        let mut seen = HashSet::new();

        for page in 1..=pages {
            let page_query = query.for_page(page);
            match self.harvest(fetcher, &page_query).await {
                Ok(links) => {
                    info!(page, found = links.len(), "harvested list page");
                    for link in links {
                        if seen.insert(link.url.clone()) {
                            report.links.push(link);
                        } else {
                            debug!(url = %link.url, "duplicate detail url");
                            report.duplicates += 1;
                        }
                    }
                }
                Err(e) if fail_fast => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "list page failed, continuing");
                    report.failed_pages.push((page, e));
                }
            }
        }

        if pages > 0 && report.failed_pages.len() == pages as usize {
            if let Some((_, e)) = report.failed_pages.pop() {
                return Err(e);
            }
        }
        Ok(report)
    }
}

/// Visible text with runs of whitespace collapsed.
pub fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeFetcher;

    const BASE: &str = "https://flixable.com/";

    fn harvester() -> Harvester {
        Harvester::new(
            Url::parse(BASE).unwrap(),
            Selector::parse("h5.card-title a").unwrap(),
        )
    }

    fn query() -> PageQuery {
        PageQuery {
            page: 1,
            min_rating: 0.0,
            min_year: 1920,
            max_year: 2021,
            order: Order::Date,
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn list_page(entries: &[(&str, &str)]) -> String {
        let cards: String = entries
            .iter()
            .map(|(title, href)| {
                format!(r#"<div class="card"><h5 class="card-title"><a href="{href}">{title}</a></h5></div>"#)
            })
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    #[test]
    fn query_url_carries_all_filters() {
        let url = query().for_page(4).url(&Url::parse(BASE).unwrap());
        assert_eq!(
            url.as_str(),
            "https://flixable.com/?page=4&min-rating=0&min-year=1920&max-year=2021&order=date"
        );
    }

    #[test]
    fn for_page_leaves_the_base_query_untouched() {
        let q = query();
        let p3 = q.for_page(3);
        assert_eq!(q.page, 1);
        assert_eq!(p3.page, 3);
        assert_eq!(p3.min_year, q.min_year);
    }

    #[test]
    fn list_fixture_links() {
        let links = harvester().parse_links(&fixture("list_page"));
        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0],
            TitleLink {
                title: "The Irishman".into(),
                url: "https://flixable.com/title/the-irishman/".into(),
            }
        );
        assert_eq!(links[1].title, "Roma");
        // absolute hrefs are kept as they are
        assert_eq!(links[2].url, "https://flixable.com/title/okja/");
    }

    #[test]
    fn page_without_titles_is_empty() {
        let links = harvester().parse_links("<html><body><p>No results</p></body></html>");
        assert!(links.is_empty());
    }

    #[test]
    fn anchor_without_href_is_skipped() {
        let html = r#"<h5 class="card-title"><a>Nameless</a></h5><h5 class="card-title"><a href="/title/x/">X</a></h5>"#;
        let links = harvester().parse_links(html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "X");
    }

    #[tokio::test]
    async fn empty_page_harvests_to_empty_list() {
        let url = query().url(&Url::parse(BASE).unwrap());
        let fetcher = FakeFetcher::new().with(url.as_str(), 200, "<html></html>");
        let links = harvester().harvest(&fetcher, &query()).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn harvest_surfaces_http_errors() {
        let url = query().url(&Url::parse(BASE).unwrap());
        let fetcher = FakeFetcher::new().with(url.as_str(), 503, "busy");
        let err = harvester().harvest(&fetcher, &query()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    fn paged_fetcher(pages: &[(u32, Option<String>)]) -> FakeFetcher {
        let base = Url::parse(BASE).unwrap();
        pages.iter().fold(FakeFetcher::new(), |f, (page, body)| {
            let url = query().for_page(*page).url(&base);
            match body {
                Some(body) => f.with(url.as_str(), 200, body.clone()),
                None => f.with(url.as_str(), 500, "oops"),
            }
        })
    }

    #[tokio::test]
    async fn failed_page_does_not_stop_later_pages() {
        let fetcher = paged_fetcher(&[
            (1, Some(list_page(&[("A", "/title/a/")]))),
            (2, None),
            (3, Some(list_page(&[("C", "/title/c/")]))),
        ]);
        let report = harvester()
            .harvest_pages(&fetcher, &query(), 3, false)
            .await
            .unwrap();
        assert_eq!(
            report.urls(),
            vec!["https://flixable.com/title/a/", "https://flixable.com/title/c/"]
        );
        assert_eq!(report.failed_pages.len(), 1);
        assert_eq!(report.failed_pages[0].0, 2);
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[tokio::test]
    async fn fail_fast_aborts_on_first_failed_page() {
        let fetcher = paged_fetcher(&[
            (1, Some(list_page(&[("A", "/title/a/")]))),
            (2, None),
            (3, Some(list_page(&[("C", "/title/c/")]))),
        ]);
        let err = harvester()
            .harvest_pages(&fetcher, &query(), 3, true)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_urls_dropped_duplicate_titles_kept() {
        let fetcher = paged_fetcher(&[
            (1, Some(list_page(&[("Heat", "/title/heat/"), ("Dark", "/title/dark-2017/")]))),
            (2, Some(list_page(&[("Heat", "/title/heat/"), ("Dark", "/title/dark-2005/")]))),
        ]);
        let report = harvester()
            .harvest_pages(&fetcher, &query(), 2, false)
            .await
            .unwrap();
        let titles: Vec<&str> = report.links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Heat", "Dark", "Dark"]);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn every_page_failing_is_an_error() {
        let fetcher = FakeFetcher::new();
        let err = harvester()
            .harvest_pages(&fetcher, &query(), 3, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[tokio::test]
    async fn zero_pages_is_an_empty_report() {
        let fetcher = FakeFetcher::new();
        let report = harvester()
            .harvest_pages(&fetcher, &query(), 0, false)
            .await
            .unwrap();
        assert!(report.links.is_empty());
        assert!(fetcher.requests().is_empty());
    }
}
