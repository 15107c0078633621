// src/pipeline/broadcast.rs

//! Broadcast cycle orchestration.
//!
//! One cycle runs `Idle → Collecting → Filtering → Delivering → Idle`:
//!
//! 1. Collect listings from every configured source
//! 2. Drop listings whose fingerprint was already delivered
//! 3. Send the new ones to the channel, marking each right after its send
//! 4. Send per-recipient matches to active subscribers
//!
//! Cycles never overlap: a cycle started while another is running is skipped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::DeliveryError;
use crate::models::{BroadcastConfig, Config, DeliveryRecord, Listing};
use crate::services::{DeliveryEngine, ListingSource, Messenger, Renderer, Target};
use crate::storage::Store;
use crate::utils::log::{header, summary};
use crate::utils::url::AffiliateLinker;

use super::filter::{partition_new, personal_matches};

/// Where the broadcaster is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Collecting,
    Filtering,
    Delivering,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Collecting => "collecting",
            CycleState::Filtering => "filtering",
            CycleState::Delivering => "delivering",
        };
        f.write_str(name)
    }
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub collected: usize,
    pub already_sent: usize,
    /// Not yet delivered, before the per-cycle cap
    pub fresh: usize,
    /// New listings selected for the channel, after the per-cycle cap
    pub selected: usize,
    pub channel_sent: usize,
    pub channel_failed: usize,
    pub marked: usize,
    pub recipients: usize,
    pub personal_sent: usize,
    pub personal_failed: usize,
    pub duration: Duration,
}

/// How a call to [`Broadcaster::run_cycle`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was still running
    Skipped,
    /// The cycle ended early; the reason was logged
    Aborted(String),
    Completed(CycleReport),
}

/// Runs broadcast cycles against a listing source, a store and a messenger.
pub struct Broadcaster {
    source: Arc<dyn ListingSource>,
    store: Arc<dyn Store>,
    engine: DeliveryEngine,
    linker: AffiliateLinker,
    renderer: Renderer,
    channel: Target,
    limits: BroadcastConfig,
    in_flight: AtomicBool,
    state: Mutex<CycleState>,
    cycles_started: AtomicU64,
}

/// Returns the broadcaster to `Idle` however the cycle ends.
struct CycleGuard<'a> {
    broadcaster: &'a Broadcaster,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.broadcaster.set_state(CycleState::Idle);
        self.broadcaster.in_flight.store(false, Ordering::Release);
    }
}

impl Broadcaster {
    pub fn new(
        source: Arc<dyn ListingSource>,
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            store,
            engine: DeliveryEngine::new(messenger, &config.delivery),
            linker: AffiliateLinker::new(&config.affiliate),
            renderer: Renderer::new(&config.delivery),
            channel: Target::Channel(config.delivery.channel_id.clone()),
            limits: config.broadcast.clone(),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(CycleState::Idle),
            cycles_started: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.lock_state()
    }

    /// Number of cycles that got past the single-flight check.
    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::Acquire)
    }

    /// Run one full cycle, or skip it if a cycle is already in progress.
    ///
    /// Never returns an error: a failed collection ends the cycle early and
    /// per-listing delivery failures are counted in the report.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Previous cycle still {}; skipping this one", self.state());
            return CycleOutcome::Skipped;
        }
        let _guard = CycleGuard { broadcaster: self };

        let cycle = self.cycles_started.fetch_add(1, Ordering::AcqRel) + 1;
        let started = Instant::now();
        header(&format!("Broadcast cycle #{}", cycle));

        self.set_state(CycleState::Collecting);
        let listings = match self.source.collect_cycle().await {
            Ok(listings) => listings,
            Err(e) => {
                log::error!("Cycle #{} aborted, collection failed: {}", cycle, e);
                return CycleOutcome::Aborted(e.to_string());
            }
        };

        let mut report = CycleReport {
            collected: listings.len(),
            ..CycleReport::default()
        };

        self.set_state(CycleState::Filtering);
        let partition = partition_new(self.store.as_ref(), listings).await;
        report.already_sent = partition.already_sent.len();
        report.fresh = partition.fresh.len();

        let mut selected = partition.fresh;
        selected.truncate(self.limits.max_channel_per_cycle);
        report.selected = selected.len();
        log::info!(
            "{} collected, {} new, {} already sent, {} selected for the channel",
            report.collected,
            report.fresh,
            report.already_sent,
            report.selected
        );

        self.set_state(CycleState::Delivering);
        let delivered = self.deliver_channel(selected, &mut report).await;
        self.deliver_personal(&delivered, &mut report).await;

        report.duration = started.elapsed();
        summary(
            &format!("Cycle #{}", cycle),
            &[
                ("Collected", report.collected.to_string()),
                ("New", report.fresh.to_string()),
                ("Already sent", report.already_sent.to_string()),
                (
                    "Channel",
                    format!("{} sent, {} failed", report.channel_sent, report.channel_failed),
                ),
                ("Marked", report.marked.to_string()),
                ("Subscribers", report.recipients.to_string()),
                (
                    "Personal",
                    format!(
                        "{} sent, {} failed",
                        report.personal_sent, report.personal_failed
                    ),
                ),
                ("Duration", format!("{:.1?}", report.duration)),
            ],
        );

        CycleOutcome::Completed(report)
    }

    /// Send each listing to the channel and return the ones that went out.
    async fn deliver_channel(
        &self,
        listings: Vec<Listing>,
        report: &mut CycleReport,
    ) -> Vec<Listing> {
        let mut delivered = Vec::with_capacity(listings.len());
        for listing in listings {
            let action_url = self.linker.affiliate_link(&listing.source_url);
            let rendered = self.renderer.render(&listing, &action_url, false);

            if let Err(e) = self.engine.deliver(&self.channel, &rendered).await {
                report.channel_failed += 1;
                log::warn!("Channel delivery skipped for '{}': {}", listing.title(), e);
                continue;
            }
            report.channel_sent += 1;

            let record = DeliveryRecord {
                fingerprint: listing.fingerprint().to_string(),
                title: listing.title().to_string(),
                price: listing.price_display().to_string(),
                url: action_url,
                sent_at: Utc::now(),
            };
            match self.store.mark_delivered(&record).await {
                Ok(()) => report.marked += 1,
                Err(e) => log::warn!(
                    "Sent '{}' but could not record it ({}); it may be sent again",
                    listing.title(),
                    e
                ),
            }
            delivered.push(listing);
        }
        delivered
    }

    async fn deliver_personal(&self, listings: &[Listing], report: &mut CycleReport) {
        if listings.is_empty() {
            return;
        }

        let subscribers = match self.store.list_active_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                log::warn!("Cannot load subscribers, skipping personal sends: {}", e);
                return;
            }
        };
        report.recipients = subscribers.len();

        for recipient in &subscribers {
            let target = Target::Recipient(recipient.id);
            let matches =
                personal_matches(recipient, listings, self.limits.max_personal_per_recipient);

            for listing in matches {
                let action_url = self.linker.affiliate_link(&listing.source_url);
                let rendered = self.renderer.render(listing, &action_url, true);

                match self.engine.deliver(&target, &rendered).await {
                    Ok(_) => report.personal_sent += 1,
                    Err(DeliveryError::Permanent(reason)) => {
                        report.personal_failed += 1;
                        log::info!("Stopping sends to {} this cycle: {}", target, reason);
                        break;
                    }
                    Err(e) => {
                        report.personal_failed += 1;
                        log::debug!("Personal send to {} skipped: {}", target, e);
                    }
                }
            }
        }
    }

    fn set_state(&self, state: CycleState) {
        *self.lock_state() = state;
    }

    fn lock_state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
