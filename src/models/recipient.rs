//! Subscriber and delivery-log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::price::units_to_cents;

/// Messaging-platform user id.
pub type RecipientId = i64;

/// A subscriber and their broadcast preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub id: RecipientId,
    pub display_name: String,
    pub notifications_enabled: bool,

    /// Inclusive budget ceiling in whole currency units
    pub max_price: i64,

    /// Category filters; empty means everything
    pub categories: Vec<String>,

    pub last_activity: DateTime<Utc>,
}

impl Recipient {
    /// Whether a listing priced at `price_cents` is within this recipient's budget.
    ///
    /// Listings without a numeric price never qualify.
    pub fn accepts_price(&self, price_cents: Option<i64>) -> bool {
        price_cents.is_some_and(|p| p <= units_to_cents(self.max_price))
    }
}

/// Partial preference update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceUpdate {
    pub notifications: Option<bool>,
    pub categories: Option<Vec<String>>,
    pub max_price: Option<i64>,
}

impl PreferenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.notifications.is_none() && self.categories.is_none() && self.max_price.is_none()
    }
}

/// Proof that a fingerprint was already sent to the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub fingerprint: String,
    pub title: String,
    pub price: String,
    pub url: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_price() {
        let recipient = Recipient {
            id: 1,
            display_name: "Giulia".into(),
            notifications_enabled: true,
            max_price: 50,
            categories: Vec::new(),
            last_activity: Utc::now(),
        };
        assert!(recipient.accepts_price(Some(5000)));
        assert!(recipient.accepts_price(Some(1299)));
        assert!(!recipient.accepts_price(Some(5001)));
        assert!(!recipient.accepts_price(None));
    }

    #[test]
    fn test_cents_above_budget_rejected() {
        let recipient = Recipient {
            id: 2,
            display_name: "Marco".into(),
            notifications_enabled: true,
            max_price: 29,
            categories: Vec::new(),
            last_activity: Utc::now(),
        };
        assert!(!recipient.accepts_price(Some(2999)));
        assert!(!recipient.accepts_price(Some(2901)));
        assert!(recipient.accepts_price(Some(2900)));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(PreferenceUpdate::default().is_empty());
        let update = PreferenceUpdate {
            max_price: Some(80),
            ..PreferenceUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
