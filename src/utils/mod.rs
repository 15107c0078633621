//! Utility functions and helpers.

pub mod fingerprint;
pub mod http;
pub mod log;
pub mod price;
pub mod url;

use ::url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse whitespace runs and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.amazon.it/s?k=lego").unwrap();
        assert_eq!(
            resolve_url(&base, "/dp/B09B8V1LZ3"),
            "https://www.amazon.it/dp/B09B8V1LZ3"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Echo \n  Dot\t5 "), "Echo Dot 5");
    }
}
