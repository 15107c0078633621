// src/services/delivery.rs

//! Delivery engine.
//!
//! Sends rendered listings to the broadcast channel or to single recipients.
//! Consecutive sends to the same target class are paced, and transient
//! failures are retried with a smaller payload each time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::DeliveryError;
use crate::models::{DeliveryConfig, RecipientId};
use crate::services::render::{OutgoingMessage, PayloadLevel, RenderedListing};

/// Outbound messaging capability.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: &str, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Channel(String),
    Recipient(RecipientId),
}

/// Sends to the same class share one pacing gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetClass {
    Channel,
    Individual,
}

impl Target {
    pub fn class(&self) -> TargetClass {
        match self {
            Target::Channel(_) => TargetClass::Channel,
            Target::Recipient(_) => TargetClass::Individual,
        }
    }

    pub fn chat_id(&self) -> String {
        match self {
            Target::Channel(id) => id.clone(),
            Target::Recipient(id) => id.to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Channel(id) => write!(f, "channel {}", id),
            Target::Recipient(id) => write!(f, "recipient {}", id),
        }
    }
}

/// A successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    /// Payload that finally went through
    pub level: PayloadLevel,
    pub attempts: usize,
}

/// Sends rendered listings with pacing and a shrinking-payload retry ladder.
pub struct DeliveryEngine {
    messenger: Arc<dyn Messenger>,
    max_attempts: usize,
    retry_backoff: Duration,
    max_retry_after: Duration,
    channel_pacing: Duration,
    individual_pacing: Duration,
    channel_gate: Mutex<Option<Instant>>,
    individual_gate: Mutex<Option<Instant>>,
}

impl DeliveryEngine {
    pub fn new(messenger: Arc<dyn Messenger>, config: &DeliveryConfig) -> Self {
        Self {
            messenger,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
            channel_pacing: Duration::from_millis(config.channel_pacing_ms),
            individual_pacing: Duration::from_millis(config.individual_pacing_ms),
            channel_gate: Mutex::new(None),
            individual_gate: Mutex::new(None),
        }
    }

    /// Deliver a rendered listing to one target.
    ///
    /// Each transient failure drops to the next smaller payload (photo, then
    /// text with button, then plain text). A permanent failure returns at once.
    pub async fn deliver(
        &self,
        target: &Target,
        rendered: &RenderedListing,
    ) -> Result<Sent, DeliveryError> {
        let chat_id = target.chat_id();
        let mut level = rendered.initial_level();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.pace(target.class()).await;

            let error = match self.messenger.send(&chat_id, &rendered.message(level)).await {
                Ok(()) => {
                    log::debug!("Sent to {} ({:?}, attempt {})", target, level, attempt);
                    return Ok(Sent {
                        level,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= self.max_attempts {
                log::warn!(
                    "Delivery to {} failed after {} attempt(s): {}",
                    target,
                    attempt,
                    error
                );
                return Err(error);
            }

            log::debug!(
                "Attempt {} to {} failed ({}); retrying with a smaller payload",
                attempt,
                target,
                error
            );
            tokio::time::sleep(self.backoff(&error, attempt)).await;
            level = level.reduced().unwrap_or(level);
        }
    }

    fn backoff(&self, error: &DeliveryError, attempt: usize) -> Duration {
        match error {
            DeliveryError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs).min(self.max_retry_after)
            }
            _ => {
                let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(6);
                self.retry_backoff.saturating_mul(1 << exponent)
            }
        }
    }

    /// Wait until the pacing interval for this class has elapsed since its last send.
    async fn pace(&self, class: TargetClass) {
        let (gate, interval) = match class {
            TargetClass::Channel => (&self.channel_gate, self.channel_pacing),
            TargetClass::Individual => (&self.individual_gate, self.individual_pacing),
        };

        let mut last = gate.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + interval).await;
        }
        *last = Some(Instant::now());
    }
}
