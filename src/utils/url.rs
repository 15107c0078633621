// src/utils/url.rs

//! Product URL canonicalization and affiliate tagging.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::AffiliateConfig;

static PRODUCT_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/dp/([A-Z0-9]{10})(?:[/?#]|$)",
        r"/gp/product/([A-Z0-9]{10})(?:[/?#]|$)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract the 10-character product identifier from a marketplace URL.
///
/// Recognizes `/dp/{id}` and `/gp/product/{id}` paths.
///
/// # Examples
/// ```
/// use dealcast::utils::url::extract_product_id;
///
/// assert_eq!(
///     extract_product_id("https://www.amazon.it/Cuffie-Wireless/dp/B09B8V1LZ3/ref=sr_1_1"),
///     Some("B09B8V1LZ3".to_string())
/// );
/// ```
pub fn extract_product_id(url: &str) -> Option<String> {
    for pattern in PRODUCT_ID_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}

/// Rewrites product URLs into affiliate-tagged links.
#[derive(Debug, Clone)]
pub struct AffiliateLinker {
    tag: String,
    extra_params: String,
    base_url: String,
}

impl AffiliateLinker {
    pub fn new(config: &AffiliateConfig) -> Self {
        let tag: String = url::form_urlencoded::byte_serialize(config.tag.trim().as_bytes()).collect();
        Self {
            tag,
            extra_params: config.extra_params.trim().trim_start_matches(['?', '&']).to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Produce the affiliate link for a product URL.
    ///
    /// Known product URLs are rebuilt as `{origin}/dp/{id}?tag=..` and lose every
    /// other query parameter. Anything else keeps its URL and gets the tag appended.
    pub fn affiliate_link(&self, url: &str) -> String {
        match extract_product_id(url) {
            Some(id) => {
                let mut link = format!("{}/dp/{}?tag={}", self.origin_of(url), id, self.tag);
                if !self.extra_params.is_empty() {
                    link.push('&');
                    link.push_str(&self.extra_params);
                }
                link
            }
            None => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}tag={}", self.tag)
            }
        }
    }

    fn origin_of(&self, url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|host| format!("{}://{}", u.scheme(), host))
            })
            .unwrap_or_else(|| self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linker() -> AffiliateLinker {
        AffiliateLinker::new(&AffiliateConfig {
            tag: "dealcast-21".to_string(),
            extra_params: "psc=1".to_string(),
            base_url: "https://www.amazon.it/".to_string(),
        })
    }

    #[test]
    fn test_extract_product_id() {
        assert_eq!(
            extract_product_id("https://marketplace.example/dp/B09B8V1LZ3"),
            Some("B09B8V1LZ3".to_string())
        );
        assert_eq!(
            extract_product_id("https://www.amazon.it/gp/product/B0C1234567?th=1"),
            Some("B0C1234567".to_string())
        );
        assert_eq!(extract_product_id("https://marketplace.example/x?ref=1"), None);
        // Too long to be a product id
        assert_eq!(extract_product_id("https://www.amazon.it/dp/B09B8V1LZ3X"), None);
    }

    #[test]
    fn test_product_id_patterns_compile_once() {
        assert_eq!(PRODUCT_ID_PATTERNS.len(), 2);
        let first = PRODUCT_ID_PATTERNS.as_ptr();
        extract_product_id("https://www.amazon.it/dp/B09B8V1LZ3");
        assert_eq!(PRODUCT_ID_PATTERNS.as_ptr(), first);
    }

    #[test]
    fn test_link_for_known_product() {
        let link = linker().affiliate_link("https://marketplace.example/dp/B09B8V1LZ3");
        assert!(link.contains("/dp/B09B8V1LZ3"));
        assert!(link.contains("tag=dealcast-21"));
        assert_eq!(
            link,
            "https://marketplace.example/dp/B09B8V1LZ3?tag=dealcast-21&psc=1"
        );
    }

    #[test]
    fn test_link_drops_tracking_params() {
        let link = linker().affiliate_link(
            "https://www.amazon.it/Robot-Aspirapolvere/dp/B0C1234567/ref=sr_1_3?crid=XYZ&sprefix=robot",
        );
        assert_eq!(
            link,
            "https://www.amazon.it/dp/B0C1234567?tag=dealcast-21&psc=1"
        );
    }

    #[test]
    fn test_link_for_unknown_url_with_query() {
        assert_eq!(
            linker().affiliate_link("https://marketplace.example/x?ref=1"),
            "https://marketplace.example/x?ref=1&tag=dealcast-21"
        );
    }

    #[test]
    fn test_link_for_unknown_url_without_query() {
        assert_eq!(
            linker().affiliate_link("https://www.pepper.it/offerte/cuffie-123"),
            "https://www.pepper.it/offerte/cuffie-123?tag=dealcast-21"
        );
    }

    #[test]
    fn test_relative_product_path_uses_base_url() {
        assert_eq!(
            linker().affiliate_link("/dp/B09B8V1LZ3"),
            "https://www.amazon.it/dp/B09B8V1LZ3?tag=dealcast-21&psc=1"
        );
    }
}
