// src/services/listings.rs

//! Listing collector service.
//!
//! Fetches result pages from the configured sources and parses them into
//! listings using per-source CSS selectors. Parsing is best-effort per
//! fragment: a malformed fragment is skipped and the rest of the page is kept.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future;
use rand::seq::SliceRandom;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CollectorConfig, Listing, Source, SourceConfig};
use crate::services::selectors::CompiledSelectors;
use crate::utils::http::{fetch_html, jitter_delay, pick_user_agent};
use crate::utils::price::units_to_cents;
use crate::utils::{normalize_whitespace, resolve_url};

/// Shown when a fragment has a price and link but no readable title.
pub const UNTITLED_PLACEHOLDER: &str = "Offerta senza titolo";

/// Anything that can produce the listings for one broadcast cycle.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Collect, merge and in-cycle dedupe the listings for one cycle.
    async fn collect_cycle(&self) -> Result<Vec<Listing>>;
}

/// Outcome of parsing one result page.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub listings: Vec<Listing>,
    /// Fragments dropped because a mandatory field was missing
    pub skipped: usize,
    /// Listings dropped for exceeding the broadcast price ceiling
    pub over_ceiling: usize,
}

/// Page-level inputs shared by every fragment on the page.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub base_url: &'a Url,
    pub source: Source,
    /// Ceiling in whole currency units
    pub max_price: i64,
    pub category: Option<&'a str>,
}

struct CompiledSource {
    config: SourceConfig,
    selectors: CompiledSelectors,
}

/// Service for collecting listings from marketplace and aggregator pages.
pub struct ListingCollector {
    config: CollectorConfig,
    client: reqwest::Client,
    sources: Vec<CompiledSource>,
}

impl ListingCollector {
    /// Create a collector; fails if any configured selector is invalid.
    pub fn new(config: CollectorConfig, client: reqwest::Client) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|source| {
                Ok(CompiledSource {
                    selectors: CompiledSelectors::compile(&source.selectors)?,
                    config: source.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            client,
            sources,
        })
    }

    /// Collect up to `limit` listings for a search query, or from the deals
    /// pages when `query` is empty.
    ///
    /// Sources are fetched concurrently. A source answering with a non-success
    /// status contributes nothing. The call only fails when every source was
    /// unreachable.
    pub async fn collect(&self, query: Option<&str>, limit: usize) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        let mut last_error = None;
        let mut reached = 0;

        let results = future::join_all(
            self.sources
                .iter()
                .map(|source| self.collect_source(source, query)),
        )
        .await;

        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(found) => {
                    reached += 1;
                    listings.extend(found);
                }
                Err(error) => {
                    log::warn!("Source {} failed: {}", source.config.name, error);
                    last_error = Some(error);
                }
            }
        }

        if reached == 0 {
            if let Some(error) = last_error {
                return Err(error);
            }
        }

        let mut listings = dedupe_by_title(listings, self.config.title_key_length);
        listings.truncate(limit);
        Ok(listings)
    }

    /// Query a random sample of trending topics and merge the results.
    pub async fn collect_trending(&self) -> Result<Vec<Listing>> {
        let topics = self.sample_topics();
        let mut merged = Vec::new();
        let mut last_error = None;
        let mut reached = 0;

        for topic in &topics {
            match self.collect(Some(topic), self.config.per_query_limit).await {
                Ok(found) => {
                    reached += 1;
                    log::debug!("Topic '{}' yielded {} listings", topic, found.len());
                    merged.extend(found);
                }
                Err(error) => {
                    log::warn!("Trending topic '{}' failed: {}", topic, error);
                    last_error = Some(error);
                }
            }
        }

        if reached == 0 {
            if let Some(error) = last_error {
                return Err(error);
            }
        }

        Ok(dedupe_by_title(merged, self.config.title_key_length))
    }

    fn sample_topics(&self) -> Vec<String> {
        let mut rng = rand::thread_rng();
        self.config
            .topics
            .choose_multiple(&mut rng, self.config.trending_sample_size)
            .cloned()
            .collect()
    }

    /// Fetch and parse one source for one query.
    async fn collect_source(
        &self,
        source: &CompiledSource,
        query: Option<&str>,
    ) -> Result<Vec<Listing>> {
        let url = source.config.request_url(query);
        let base_url = Url::parse(&url)?;

        let delay = jitter_delay(self.config.jitter_min_ms, self.config.jitter_max_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let user_agent = pick_user_agent(&self.config.user_agents);
        let Some(body) = fetch_html(&self.client, &url, user_agent).await? else {
            return Ok(Vec::new());
        };

        let context = ParseContext {
            base_url: &base_url,
            source: source.config.kind,
            max_price: self.config.max_listing_price,
            category: query.map(str::trim).filter(|q| !q.is_empty()),
        };
        let page = parse_listings(&body, &source.selectors, &context);

        log::info!(
            "{}: {} listings ({} fragments skipped, {} over price ceiling)",
            source.config.name,
            page.listings.len(),
            page.skipped,
            page.over_ceiling
        );
        Ok(page.listings)
    }
}

#[async_trait]
impl ListingSource for ListingCollector {
    async fn collect_cycle(&self) -> Result<Vec<Listing>> {
        let deals = self.collect(None, self.config.per_query_limit).await;
        let trending = self.collect_trending().await;

        let merged = match (deals, trending) {
            (Err(error), Err(_)) => return Err(error),
            (deals, trending) => {
                let mut merged = deals.unwrap_or_default();
                merged.extend(trending.unwrap_or_default());
                merged
            }
        };

        Ok(dedupe_by_title(merged, self.config.title_key_length))
    }
}

/// Parse every listing fragment on a page, skipping malformed ones.
pub fn parse_listings(
    html: &str,
    selectors: &CompiledSelectors,
    context: &ParseContext<'_>,
) -> ParsedPage {
    let document = Html::parse_document(html);
    let mut page = ParsedPage::default();
    let ceiling = units_to_cents(context.max_price);

    for fragment in document.select(&selectors.fragment) {
        match parse_fragment(&fragment, selectors, context) {
            Ok(listing) => match listing.price_cents() {
                Some(price) if price > ceiling => page.over_ceiling += 1,
                _ => page.listings.push(listing),
            },
            Err(error) => {
                page.skipped += 1;
                log::debug!("Skipping fragment: {}", error);
            }
        }
    }
    page
}

/// Parse a single fragment; price and link are mandatory.
fn parse_fragment(
    fragment: &ElementRef<'_>,
    selectors: &CompiledSelectors,
    context: &ParseContext<'_>,
) -> Result<Listing> {
    let price = first_text(fragment, &selectors.price)
        .ok_or_else(|| AppError::parse("fragment has no price"))?;

    let href = fragment
        .select(&selectors.link)
        .find_map(|el| el.value().attr(&selectors.link_attr))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or_else(|| AppError::parse("fragment has no product link"))?;

    let title = first_text(fragment, &selectors.title)
        .unwrap_or_else(|| UNTITLED_PLACEHOLDER.to_string());

    let original_price = selectors
        .original_price
        .as_ref()
        .and_then(|sel| first_text(fragment, sel))
        .filter(|original| *original != price);

    let image_url = selectors
        .image
        .as_ref()
        .and_then(|sel| fragment.select(sel).next())
        .and_then(|el| el.value().attr(&selectors.image_attr))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.starts_with("data:"))
        .map(|src| resolve_url(context.base_url, src));

    let rating = selectors
        .rating
        .as_ref()
        .and_then(|sel| first_text(fragment, sel));

    Ok(Listing::new(
        title,
        price,
        resolve_url(context.base_url, href),
        context.source,
    )
    .with_original_price(original_price)
    .with_image(image_url)
    .with_rating(rating)
    .with_category(context.category.map(String::from)))
}

fn first_text(fragment: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    fragment
        .select(selector)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

/// Drop listings whose title prefix was already seen; the first occurrence wins.
///
/// Untitled listings share the placeholder title, so they are keyed by URL too.
pub fn dedupe_by_title(listings: Vec<Listing>, key_length: usize) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| {
            let key = if listing.title() == UNTITLED_PLACEHOLDER {
                format!("{}|{}", listing.title_key(key_length), listing.source_url)
            } else {
                listing.title_key(key_length)
            };
            seen.insert(key)
        })
        .collect()
}
