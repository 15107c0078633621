//! Listing presentation.
//!
//! A listing is rendered once per target kind and can then be turned into
//! progressively smaller payloads for retries.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{DeliveryConfig, Listing};

/// Inline link button under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub url: String,
}

/// A message ready for the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    /// Whether `text` uses HTML markup
    pub html: bool,
    pub photo_url: Option<String>,
    pub button: Option<Button>,
}

/// How much of the rendered listing a send attempt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PayloadLevel {
    /// Photo with caption and link button
    Full,
    /// Formatted text and link button, no photo
    WithoutImage,
    /// Unformatted text with the link inline
    PlainText,
}

impl PayloadLevel {
    /// The next smaller payload, if any.
    pub fn reduced(self) -> Option<Self> {
        match self {
            Self::Full => Some(Self::WithoutImage),
            Self::WithoutImage => Some(Self::PlainText),
            Self::PlainText => None,
        }
    }
}

/// A listing rendered for one kind of target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedListing {
    pub html: String,
    pub plain: String,
    pub image_url: Option<String>,
    pub action_url: String,
    pub button_label: String,
}

impl RenderedListing {
    /// Largest payload this listing supports.
    pub fn initial_level(&self) -> PayloadLevel {
        if self.image_url.is_some() {
            PayloadLevel::Full
        } else {
            PayloadLevel::WithoutImage
        }
    }

    pub fn message(&self, level: PayloadLevel) -> OutgoingMessage {
        let button = Button {
            label: self.button_label.clone(),
            url: self.action_url.clone(),
        };
        match level {
            PayloadLevel::Full => OutgoingMessage {
                text: self.html.clone(),
                html: true,
                photo_url: self.image_url.clone(),
                button: Some(button),
            },
            PayloadLevel::WithoutImage => OutgoingMessage {
                text: self.html.clone(),
                html: true,
                photo_url: None,
                button: Some(button),
            },
            PayloadLevel::PlainText => OutgoingMessage {
                text: self.plain.clone(),
                html: false,
                photo_url: None,
                button: None,
            },
        }
    }
}

/// Builds presentation payloads from listings.
#[derive(Debug, Clone)]
pub struct Renderer {
    max_title_len: usize,
    button_label: String,
}

impl Renderer {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            max_title_len: config.max_title_len,
            button_label: config.button_label.clone(),
        }
    }

    /// Render a listing pointing at `action_url` (the affiliate link).
    pub fn render(&self, listing: &Listing, action_url: &str, personal: bool) -> RenderedListing {
        let title = truncate_graphemes(listing.title(), self.max_title_len);

        let mut html = String::new();
        let mut plain = String::new();

        if personal {
            html.push_str("🎯 <b>Selezionata per te</b>\n");
            plain.push_str("🎯 Selezionata per te\n");
        }

        html.push_str(&format!("🔥 <b>{}</b>\n\n", escape_html(&title)));
        plain.push_str(&format!("🔥 {}\n\n", title));

        match &listing.original_price_display {
            Some(original) => {
                html.push_str(&format!(
                    "💰 <b>{}</b> <s>{}</s>\n",
                    escape_html(listing.price_display()),
                    escape_html(original)
                ));
                plain.push_str(&format!(
                    "💰 {} (invece di {})\n",
                    listing.price_display(),
                    original
                ));
            }
            None => {
                html.push_str(&format!(
                    "💰 <b>{}</b>\n",
                    escape_html(listing.price_display())
                ));
                plain.push_str(&format!("💰 {}\n", listing.price_display()));
            }
        }

        if let Some(rating) = &listing.rating_display {
            html.push_str(&format!("⭐ {}\n", escape_html(rating)));
            plain.push_str(&format!("⭐ {}\n", rating));
        }

        plain.push_str(&format!("\n👉 {}", action_url));

        RenderedListing {
            html: html.trim_end().to_string(),
            plain,
            image_url: listing.image_url.clone(),
            action_url: action_url.to_string(),
            button_label: self.button_label.clone(),
        }
    }
}

/// Truncate to at most `max` grapheme clusters, marking the cut with an ellipsis.
fn truncate_graphemes(text: &str, max: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= max || max == 0 {
        return text.to_string();
    }
    let mut truncated: String = graphemes[..max - 1].concat();
    truncated = truncated.trim_end().to_string();
    truncated.push('…');
    truncated
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn renderer(max_title_len: usize) -> Renderer {
        Renderer {
            max_title_len,
            button_label: "Vai".to_string(),
        }
    }

    fn listing() -> Listing {
        Listing::new(
            "Cuffie <Pro> & Co",
            "29,99 €",
            "https://www.amazon.it/dp/B09B8V1LZ3",
            Source::Marketplace,
        )
        .with_original_price(Some("59,99 €".into()))
        .with_image(Some("https://m.media-amazon.com/x.jpg".into()))
    }

    #[test]
    fn test_render_escapes_and_links() {
        let rendered = renderer(100).render(&listing(), "https://aff.link/x", false);

        assert!(rendered.html.contains("Cuffie &lt;Pro&gt; &amp; Co"));
        assert!(rendered.html.contains("<s>59,99 €</s>"));
        assert!(rendered.plain.contains("Cuffie <Pro> & Co"));
        assert!(rendered.plain.ends_with("https://aff.link/x"));
        assert!(!rendered.html.contains("Selezionata"));
    }

    #[test]
    fn test_personal_header() {
        let rendered = renderer(100).render(&listing(), "https://aff.link/x", true);
        assert!(rendered.html.starts_with("🎯"));
    }

    #[test]
    fn test_payload_ladder() {
        let rendered = renderer(100).render(&listing(), "https://aff.link/x", false);
        assert_eq!(rendered.initial_level(), PayloadLevel::Full);

        let full = rendered.message(PayloadLevel::Full);
        assert!(full.photo_url.is_some() && full.button.is_some() && full.html);

        let reduced = rendered.message(PayloadLevel::WithoutImage);
        assert!(reduced.photo_url.is_none() && reduced.button.is_some());

        let plain = rendered.message(PayloadLevel::PlainText);
        assert!(plain.photo_url.is_none() && plain.button.is_none() && !plain.html);

        assert_eq!(PayloadLevel::Full.reduced(), Some(PayloadLevel::WithoutImage));
        assert_eq!(PayloadLevel::PlainText.reduced(), None);
    }

    #[test]
    fn test_no_image_starts_without_image() {
        let no_image = listing().with_image(None);
        let rendered = renderer(100).render(&no_image, "https://aff.link/x", false);
        assert_eq!(rendered.initial_level(), PayloadLevel::WithoutImage);
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("breve", 10), "breve");
        assert_eq!(truncate_graphemes("abcdefghij", 5), "abcd…");
        // Flag emoji is one grapheme made of two code points
        assert_eq!(truncate_graphemes("🇮🇹🇮🇹🇮🇹", 2), "🇮🇹…");
    }
}
