// src/models/mod.rs

//! Domain models for the broadcast pipeline.

mod config;
mod listing;
mod recipient;
mod selectors;

// Re-export all public types
pub use config::{
    AffiliateConfig, BroadcastConfig, CollectorConfig, Config, DeliveryConfig, ScheduleConfig,
    SourceConfig, StoreConfig,
};
pub use listing::{Listing, Source};
pub use recipient::{DeliveryRecord, PreferenceUpdate, Recipient, RecipientId};
pub use selectors::ListingSelectors;
