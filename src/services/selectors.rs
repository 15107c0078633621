//! Compiled CSS selectors for listing fragments.

use scraper::Selector;

use crate::error::{AppError, Result};
use crate::models::ListingSelectors;

/// Selectors parsed once per source instead of once per page.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub fragment: Selector,
    pub title: Selector,
    pub price: Selector,
    pub original_price: Option<Selector>,
    pub link: Selector,
    pub link_attr: String,
    pub image: Option<Selector>,
    pub image_attr: String,
    pub rating: Option<Selector>,
}

impl CompiledSelectors {
    /// Compile the configured selectors, failing on the first invalid one.
    pub fn compile(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            fragment: parse_selector(&selectors.fragment_selector)?,
            title: parse_selector(&selectors.title_selector)?,
            price: parse_selector(&selectors.price_selector)?,
            original_price: parse_optional(selectors.original_price_selector.as_deref())?,
            link: parse_selector(&selectors.link_selector)?,
            link_attr: selectors.link_attr.clone(),
            image: parse_optional(selectors.image_selector.as_deref())?,
            image_attr: selectors.image_attr.clone(),
            rating: parse_optional(selectors.rating_selector.as_deref())?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn parse_optional(s: Option<&str>) -> Result<Option<Selector>> {
    s.map(parse_selector).transpose()
}
