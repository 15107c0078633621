//! Listing data structure.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::fingerprint::fingerprint;
use crate::utils::price::parse_price_cents;

/// Where a listing was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Marketplace,
    DealAggregator,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Marketplace => write!(f, "marketplace"),
            Source::DealAggregator => write!(f, "deal aggregator"),
        }
    }
}

/// A candidate promotional item extracted from a source page.
///
/// Title and price are fixed at construction and the fingerprint is derived
/// from them, so a changed title or price is always a different listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    title: String,
    price_display: String,
    price_cents: Option<i64>,
    fingerprint: String,

    /// Struck-through list price, if the page showed one
    pub original_price_display: Option<String>,

    /// Canonical product URL, before affiliate tagging
    pub source_url: String,

    /// Product image
    pub image_url: Option<String>,

    /// Rating text as shown on the page
    pub rating_display: Option<String>,

    /// Site the listing came from
    pub source: Source,

    /// Category hint (usually the query that surfaced the listing)
    pub category: Option<String>,
}

impl Listing {
    /// Create a listing and derive its fingerprint and numeric price.
    pub fn new(
        title: impl Into<String>,
        price_display: impl Into<String>,
        source_url: impl Into<String>,
        source: Source,
    ) -> Self {
        let title = title.into();
        let price_display = price_display.into();
        let price_cents = parse_price_cents(&price_display);
        let fingerprint = fingerprint(&title, &price_display);

        Self {
            title,
            price_display,
            price_cents,
            fingerprint,
            original_price_display: None,
            source_url: source_url.into(),
            image_url: None,
            rating_display: None,
            source,
            category: None,
        }
    }

    pub fn with_original_price(mut self, original: Option<String>) -> Self {
        self.original_price_display = original;
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_rating(mut self, rating: Option<String>) -> Self {
        self.rating_display = rating;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price_display(&self) -> &str {
        &self.price_display
    }

    /// Price in cents, `None` when the display price was unparsable.
    pub fn price_cents(&self) -> Option<i64> {
        self.price_cents
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Case-folded title prefix used to collapse near-duplicates within one cycle.
    pub fn title_key(&self, length: usize) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
            .chars()
            .take(length)
            .collect()
    }

    /// Whether the listing matches a set of category filters.
    ///
    /// An empty filter matches everything.
    pub fn matches_categories(&self, categories: &[String]) -> bool {
        if categories.is_empty() {
            return true;
        }
        let title = self.title.to_lowercase();
        let category = self.category.as_deref().map(str::to_lowercase);
        categories.iter().any(|wanted| {
            let wanted = wanted.trim().to_lowercase();
            !wanted.is_empty()
                && (title.contains(&wanted)
                    || category.as_deref().is_some_and(|c| c.contains(&wanted)))
        })
    }
}
