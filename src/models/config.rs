//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ListingSelectors, Source};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source fetching and parsing behavior
    #[serde(default)]
    pub collector: CollectorConfig,

    /// Affiliate attribution settings
    #[serde(default)]
    pub affiliate: AffiliateConfig,

    /// Message delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Per-cycle caps
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Scheduler timing
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Persistent store settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.collector.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(AppError::validation("collector.user_agents is empty"));
        }
        if self.collector.timeout_secs == 0 {
            return Err(AppError::validation("collector.timeout_secs must be > 0"));
        }
        if self.collector.jitter_min_ms > self.collector.jitter_max_ms {
            return Err(AppError::validation(
                "collector.jitter_min_ms must not exceed collector.jitter_max_ms",
            ));
        }
        if self.collector.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        for source in &self.collector.sources {
            if !source.search_url.contains("{query}") {
                return Err(AppError::validation(format!(
                    "source '{}': search_url must contain {{query}}",
                    source.name
                )));
            }
        }
        if self.affiliate.tag.trim().is_empty() {
            return Err(AppError::validation("affiliate.tag is empty"));
        }
        if self.delivery.channel_id.trim().is_empty() {
            return Err(AppError::validation("delivery.channel_id is empty"));
        }
        if self.delivery.max_attempts == 0 {
            return Err(AppError::validation("delivery.max_attempts must be > 0"));
        }
        if self.broadcast.max_channel_per_cycle == 0 {
            return Err(AppError::validation(
                "broadcast.max_channel_per_cycle must be > 0",
            ));
        }
        if self.schedule.interval_secs == 0 {
            return Err(AppError::validation("schedule.interval_secs must be > 0"));
        }
        if self.store.retention_days <= 0 {
            return Err(AppError::validation("store.retention_days must be > 0"));
        }
        Ok(())
    }

    /// Apply deployment-level overrides read through `lookup`.
    ///
    /// Recognized: `AFFILIATE_TAG`, `DATABASE_URL`, `CHANNEL_ID`, `BROADCAST_INTERVAL`.
    pub(crate) fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(tag) = lookup("AFFILIATE_TAG") {
            self.affiliate.tag = tag;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.store.database_url = url;
        }
        if let Some(channel) = lookup("CHANNEL_ID") {
            self.delivery.channel_id = channel;
        }
        if let Some(interval) = lookup("BROADCAST_INTERVAL") {
            self.schedule.interval_secs = interval.trim().parse().map_err(|_| {
                AppError::config(format!("BROADCAST_INTERVAL is not a number: {interval}"))
            })?;
        }
        Ok(())
    }
}

/// Source fetching and parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// User-Agent pool; one is picked at random per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Lower bound of the random delay before each request
    #[serde(default = "defaults::jitter_min")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random delay before each request
    #[serde(default = "defaults::jitter_max")]
    pub jitter_max_ms: u64,

    /// Listings priced above this are dropped at collection time
    #[serde(default = "defaults::max_listing_price")]
    pub max_listing_price: i64,

    /// Number of topics sampled per trending collection
    #[serde(default = "defaults::trending_sample_size")]
    pub trending_sample_size: usize,

    /// Listings kept per query
    #[serde(default = "defaults::per_query_limit")]
    pub per_query_limit: usize,

    /// Length of the title prefix used for in-cycle dedup
    #[serde(default = "defaults::title_key_length")]
    pub title_key_length: usize,

    /// Trending topic search terms
    #[serde(default = "defaults::topics")]
    pub topics: Vec<String>,

    /// Sources queried each cycle
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            user_agents: defaults::user_agents(),
            timeout_secs: defaults::timeout(),
            jitter_min_ms: defaults::jitter_min(),
            jitter_max_ms: defaults::jitter_max(),
            max_listing_price: defaults::max_listing_price(),
            trending_sample_size: defaults::trending_sample_size(),
            per_query_limit: defaults::per_query_limit(),
            title_key_length: defaults::title_key_length(),
            topics: defaults::topics(),
            sources: defaults::sources(),
        }
    }
}

/// A single listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs
    pub name: String,

    /// Which kind of site this is
    pub kind: Source,

    /// Search endpoint; `{query}` is replaced by the encoded search terms
    pub search_url: String,

    /// Endpoint used when no query is given
    pub deals_url: String,

    /// Selectors for listing fragments on result pages
    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl SourceConfig {
    /// Build the request URL for a query, or the deals page when the query is empty.
    pub fn request_url(&self, query: Option<&str>) -> String {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let encoded: String = url::form_urlencoded::byte_serialize(q.as_bytes()).collect();
                self.search_url.replace("{query}", &encoded)
            }
            None => self.deals_url.clone(),
        }
    }
}

/// Affiliate attribution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateConfig {
    /// Attribution tag appended as `tag=`
    #[serde(default = "defaults::affiliate_tag")]
    pub tag: String,

    /// Extra query parameters on canonical product links
    #[serde(default = "defaults::extra_params")]
    pub extra_params: String,

    /// Origin used when the input URL has no usable host
    #[serde(default = "defaults::marketplace_base")]
    pub base_url: String,
}

impl Default for AffiliateConfig {
    fn default() -> Self {
        Self {
            tag: defaults::affiliate_tag(),
            extra_params: defaults::extra_params(),
            base_url: defaults::marketplace_base(),
        }
    }
}

/// Message delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Broadcast channel identifier (`@name` or numeric id)
    #[serde(default = "defaults::channel_id")]
    pub channel_id: String,

    /// Minimum gap between consecutive channel sends
    #[serde(default = "defaults::channel_pacing")]
    pub channel_pacing_ms: u64,

    /// Minimum gap between consecutive sends to individual recipients
    #[serde(default = "defaults::individual_pacing")]
    pub individual_pacing_ms: u64,

    /// Attempts per target, each with a smaller payload
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: usize,

    /// Base backoff between attempts
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Upper bound on a server-requested rate-limit wait
    #[serde(default = "defaults::max_retry_after")]
    pub max_retry_after_secs: u64,

    /// Titles longer than this (in graphemes) are truncated
    #[serde(default = "defaults::max_title_len")]
    pub max_title_len: usize,

    /// Label of the link button
    #[serde(default = "defaults::button_label")]
    pub button_label: String,

    /// Per-call timeout for the messaging API
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel_id: defaults::channel_id(),
            channel_pacing_ms: defaults::channel_pacing(),
            individual_pacing_ms: defaults::individual_pacing(),
            max_attempts: defaults::max_attempts(),
            retry_backoff_ms: defaults::retry_backoff(),
            max_retry_after_secs: defaults::max_retry_after(),
            max_title_len: defaults::max_title_len(),
            button_label: defaults::button_label(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Per-cycle delivery caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// New listings posted to the channel per cycle
    #[serde(default = "defaults::max_channel_per_cycle")]
    pub max_channel_per_cycle: usize,

    /// Personalized matches sent to one recipient per cycle
    #[serde(default = "defaults::max_personal_per_recipient")]
    pub max_personal_per_recipient: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_channel_per_cycle: defaults::max_channel_per_cycle(),
            max_personal_per_recipient: defaults::max_personal_per_recipient(),
        }
    }
}

/// Scheduler timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between cycle ticks
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Seconds before the first tick
    #[serde(default = "defaults::initial_delay")]
    pub initial_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            initial_delay_secs: defaults::initial_delay(),
        }
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path
    #[serde(default = "defaults::database_url")]
    pub database_url: String,

    /// Recipients inactive for longer are not broadcast to
    #[serde(default = "defaults::retention_days")]
    pub retention_days: i64,

    /// Budget ceiling given to new recipients
    #[serde(default = "defaults::default_max_price")]
    pub default_max_price: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::database_url(),
            retention_days: defaults::retention_days(),
            default_max_price: defaults::default_max_price(),
        }
    }
}

mod defaults {
    use super::SourceConfig;
    use crate::models::{ListingSelectors, Source};

    // Collector defaults
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".into(),
            "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".into(),
        ]
    }
    pub fn timeout() -> u64 {
        20
    }
    pub fn jitter_min() -> u64 {
        1_000
    }
    pub fn jitter_max() -> u64 {
        3_000
    }
    pub fn max_listing_price() -> i64 {
        500
    }
    pub fn trending_sample_size() -> usize {
        3
    }
    pub fn per_query_limit() -> usize {
        10
    }
    pub fn title_key_length() -> usize {
        40
    }
    pub fn topics() -> Vec<String> {
        [
            "cuffie bluetooth",
            "smartwatch",
            "power bank",
            "robot aspirapolvere",
            "friggitrice ad aria",
            "ssd",
            "monitor",
            "tastiera meccanica",
            "lego",
            "macchina caffè",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn sources() -> Vec<SourceConfig> {
        vec![SourceConfig {
            name: "amazon.it".to_string(),
            kind: Source::Marketplace,
            search_url: "https://www.amazon.it/s?k={query}".to_string(),
            deals_url: "https://www.amazon.it/s?k=offerte&rh=p_n_deal_type%3A26980358031"
                .to_string(),
            selectors: ListingSelectors::default(),
        }]
    }

    // Affiliate defaults
    pub fn affiliate_tag() -> String {
        "dealcast-21".into()
    }
    pub fn extra_params() -> String {
        "psc=1".into()
    }
    pub fn marketplace_base() -> String {
        "https://www.amazon.it".into()
    }

    // Delivery defaults
    pub fn channel_id() -> String {
        "@dealcast".into()
    }
    pub fn channel_pacing() -> u64 {
        3_000
    }
    pub fn individual_pacing() -> u64 {
        1_000
    }
    pub fn max_attempts() -> usize {
        3
    }
    pub fn retry_backoff() -> u64 {
        2_000
    }
    pub fn max_retry_after() -> u64 {
        30
    }
    pub fn max_title_len() -> usize {
        100
    }
    pub fn button_label() -> String {
        "🛒 Vai all'offerta".into()
    }

    // Broadcast defaults
    pub fn max_channel_per_cycle() -> usize {
        5
    }
    pub fn max_personal_per_recipient() -> usize {
        3
    }

    // Schedule defaults
    pub fn interval() -> u64 {
        3 * 60 * 60
    }
    pub fn initial_delay() -> u64 {
        60
    }

    // Store defaults
    pub fn database_url() -> String {
        "dealcast.db".into()
    }
    pub fn retention_days() -> i64 {
        30
    }
    pub fn default_max_price() -> i64 {
        100
    }
}
