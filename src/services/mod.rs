//! Service layer for the broadcast pipeline.
//!
//! This module contains the business logic for:
//! - Listing collection (`ListingCollector`)
//! - Listing presentation (`Renderer`)
//! - Paced, retried delivery (`DeliveryEngine`)
//! - The Telegram transport (`TelegramMessenger`)

pub mod delivery;
pub mod listings;
pub mod render;
pub mod selectors;
pub mod telegram;

pub use delivery::{DeliveryEngine, Messenger, Sent, Target};
pub use listings::{ListingCollector, ListingSource};
pub use render::{RenderedListing, Renderer};
pub use selectors::CompiledSelectors;
pub use telegram::TelegramMessenger;
