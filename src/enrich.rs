use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::detail::DetailSelectors;
use crate::error::{FetchError, ParseError};
use crate::http::Fetch;
use crate::omdb::{ApiLookupResult, LookupKind, OmdbClient};
use crate::record::{EnrichedRecord, ADDED_TO_NETFLIX, FLIXABLE_URL, MPAA_RATING, TITLE, YEAR};

/// Why a URL produced only a degraded record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DegradeReason {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Enriched {
        record: EnrichedRecord,
        lookup: LookupKind,
    },
    Degraded {
        url: String,
        reason: DegradeReason,
    },
}

impl EnrichOutcome {
    /// Output-table shape: degraded outcomes keep only the URL.
    pub fn into_record(self) -> EnrichedRecord {
        match self {
            EnrichOutcome::Enriched { record, .. } => record,
            EnrichOutcome::Degraded { url, .. } => EnrichedRecord::url_only(&url),
        }
    }

    pub fn lookup(&self) -> Option<LookupKind> {
        match self {
            EnrichOutcome::Enriched { lookup, .. } => Some(*lookup),
            EnrichOutcome::Degraded { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<(&str, &DegradeReason)> {
        match self {
            EnrichOutcome::Degraded { url, reason } => Some((url.as_str(), reason)),
            EnrichOutcome::Enriched { .. } => None,
        }
    }
}

pub struct Enricher<'a, F> {
    fetcher: &'a F,
    selectors: &'a DetailSelectors,
    omdb: &'a OmdbClient,
}

impl<'a, F: Fetch> Enricher<'a, F> {
    pub fn new(fetcher: &'a F, selectors: &'a DetailSelectors, omdb: &'a OmdbClient) -> Self {
        Self {
            fetcher,
            selectors,
            omdb,
        }
    }

    /// Scrape one detail page and merge in OMDb data.
    pub async fn enrich(&self, url: &str) -> EnrichOutcome {
        match self.try_enrich(url).await {
            Ok((record, lookup)) => EnrichOutcome::Enriched { record, lookup },
            Err(reason) => EnrichOutcome::Degraded {
                url: url.to_string(),
                reason,
            },
        }
    }

    async fn try_enrich(&self, url: &str) -> Result<(EnrichedRecord, LookupKind), DegradeReason> {
        let parsed = Url::parse(url).map_err(|e| DegradeReason::InvalidUrl(e.to_string()))?;
        let page = self.fetcher.get_ok(&parsed).await?;
        let fields = self.selectors.parse(&page.body)?;

        let lookup = self.omdb.lookup(self.fetcher, &fields.title, &fields.year).await;
        let kind = lookup.kind();
        if let ApiLookupResult::NotFound(message) = &lookup {
            info!(title = %fields.title, year = %fields.year, error = %message, "no OMDb match");
        }

        // Detail-page values win over same-named API fields.
        let mut record = EnrichedRecord::from_fields(lookup.into_fields());
        record.insert(TITLE, fields.title);
        record.insert(YEAR, fields.year);
        record.insert(MPAA_RATING, fields.mpaa_rating);
        record.insert(ADDED_TO_NETFLIX, fields.added_to_netflix);
        record.insert(FLIXABLE_URL, url);
        Ok((record, kind))
    }

    /// Enrich every URL in order. One failure never affects the others.
    pub async fn enrich_all(&self, urls: &[String], progress: bool) -> Vec<EnrichOutcome> {
        let pb = if progress {
            ProgressBar::new(urls.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            let outcome = self.enrich(url).await;
            if let Some((url, reason)) = outcome.failure() {
                warn!(url, reason = %reason, "degraded record");
            }
            outcomes.push(outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let degraded = outcomes.iter().filter(|o| o.failure().is_some()).count();
        let matched = outcomes.iter().filter(|o| o.lookup() == Some(LookupKind::Found)).count();
        info!(
            "Enriched {} urls ({} ok, {} degraded, {} matched on OMDb)",
            outcomes.len(),
            outcomes.len() - degraded,
            degraded,
            matched
        );
        outcomes
    }
}
