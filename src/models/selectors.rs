// src/models/selectors.rs

//! CSS selectors for scraping listing fragments from a result page.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping listing fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each listing fragment on the page
    pub fragment_selector: String,

    /// Selector for the title element within a fragment
    pub title_selector: String,

    /// Selector for the current price within a fragment
    pub price_selector: String,

    /// Selector for the struck-through list price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price_selector: Option<String>,

    /// Selector for the product link
    pub link_selector: String,

    /// HTML attribute holding the link (usually "href")
    #[serde(default = "default_link_attr")]
    pub link_attr: String,

    /// Selector for the product image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_selector: Option<String>,

    /// HTML attribute holding the image URL
    #[serde(default = "default_image_attr")]
    pub image_attr: String,

    /// Selector for the rating text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_selector: Option<String>,
}

fn default_link_attr() -> String {
    "href".to_string()
}

fn default_image_attr() -> String {
    "src".to_string()
}

impl Default for ListingSelectors {
    /// Marketplace search result layout.
    fn default() -> Self {
        Self {
            fragment_selector: r#"div[data-component-type="s-search-result"]"#.to_string(),
            title_selector: "h2 span".to_string(),
            price_selector: ".a-price:not(.a-text-price) .a-offscreen".to_string(),
            original_price_selector: Some(".a-price.a-text-price .a-offscreen".to_string()),
            link_selector: "h2 a, a.a-link-normal".to_string(),
            link_attr: default_link_attr(),
            image_selector: Some("img.s-image".to_string()),
            image_attr: default_image_attr(),
            rating_selector: Some("span.a-icon-alt".to_string()),
        }
    }
}

impl ListingSelectors {
    /// Selectors for a deal-aggregator thread listing.
    pub fn aggregator() -> Self {
        Self {
            fragment_selector: "article.thread".to_string(),
            title_selector: "a.thread-link".to_string(),
            price_selector: ".thread-price".to_string(),
            original_price_selector: Some(".text--lineThrough".to_string()),
            link_selector: "a.thread-link".to_string(),
            link_attr: default_link_attr(),
            image_selector: Some("img.thread-image".to_string()),
            image_attr: default_image_attr(),
            rating_selector: Some(".vote-temp".to_string()),
        }
    }
}
