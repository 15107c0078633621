//! Listing selection for a cycle.
//!
//! Splits collected listings into new and already-sent against the delivery
//! log, and picks the personalized matches for each recipient.

use std::collections::HashSet;

use crate::models::{Listing, Recipient};
use crate::storage::DeliveryLog;

/// Collected listings split by delivery history.
#[derive(Debug, Default)]
pub struct Partition {
    /// Not yet delivered, in collection order
    pub fresh: Vec<Listing>,
    /// Already delivered in an earlier cycle
    pub already_sent: Vec<Listing>,
}

/// Keep the first listing per fingerprint.
pub fn collapse_fingerprints(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.fingerprint().to_string()))
        .collect()
}

/// Split listings into new and already-sent.
///
/// When the log cannot be read the listing counts as new.
pub async fn partition_new<L>(store: &L, listings: Vec<Listing>) -> Partition
where
    L: DeliveryLog + ?Sized,
{
    let mut partition = Partition::default();

    for listing in collapse_fingerprints(listings) {
        match store.was_delivered(listing.fingerprint()).await {
            Ok(true) => {
                log::debug!(
                    "Already sent: {} ({})",
                    listing.title(),
                    listing.fingerprint()
                );
                partition.already_sent.push(listing);
            }
            Ok(false) => partition.fresh.push(listing),
            Err(e) => {
                log::warn!(
                    "Dedup check failed for {}: {}; treating as new",
                    listing.fingerprint(),
                    e
                );
                partition.fresh.push(listing);
            }
        }
    }
    partition
}

/// Listings a recipient should get: within budget, matching their categories,
/// at most `cap` of them.
pub fn personal_matches<'a>(
    recipient: &Recipient,
    listings: &'a [Listing],
    cap: usize,
) -> Vec<&'a Listing> {
    listings
        .iter()
        .filter(|listing| recipient.accepts_price(listing.price_cents()))
        .filter(|listing| listing.matches_categories(&recipient.categories))
        .take(cap)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{DeliveryRecord, Source, StoreConfig};
    use crate::storage::MemoryStore;

    fn listing(title: &str, price: &str) -> Listing {
        Listing::new(title, price, "https://www.amazon.it/dp/B000000001", Source::Marketplace)
    }

    fn recipient(max_price: i64, categories: &[&str]) -> Recipient {
        Recipient {
            id: 1,
            display_name: "Sara".into(),
            notifications_enabled: true,
            max_price,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            last_activity: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_partition_new() {
        let store = MemoryStore::new(&StoreConfig::default());
        let sent = listing("Echo Dot", "29,99 €");
        store
            .mark_delivered(&DeliveryRecord {
                fingerprint: sent.fingerprint().to_string(),
                title: sent.title().to_string(),
                price: sent.price_display().to_string(),
                url: sent.source_url.clone(),
                sent_at: Utc::now(),
            })
            .await
            .unwrap();

        let partition = partition_new(
            &store,
            vec![
                listing("Echo Dot", "29,99 €"),
                listing("Kindle", "89,99 €"),
                listing("Kindle", "89,99 €"),
            ],
        )
        .await;

        assert_eq!(partition.already_sent.len(), 1);
        assert_eq!(partition.fresh.len(), 1);
        assert_eq!(partition.fresh[0].title(), "Kindle");
    }

    #[test]
    fn test_budget_filter() {
        let listings = vec![
            listing("Economico", "19,99 €"),
            listing("Al limite", "50,00 €"),
            listing("Costoso", "79,99 €"),
            listing("Senza prezzo", "Vedi offerta"),
        ];
        let matches = personal_matches(&recipient(50, &[]), &listings, 10);
        let titles: Vec<&str> = matches.iter().map(|l| l.title()).collect();
        assert_eq!(titles, vec!["Economico", "Al limite"]);
    }

    #[test]
    fn test_budget_counts_cents() {
        let listings = vec![listing("Quasi", "29,99 €"), listing("Esatto", "29,00 €")];
        let matches = personal_matches(&recipient(29, &[]), &listings, 10);
        let titles: Vec<&str> = matches.iter().map(|l| l.title()).collect();
        assert_eq!(titles, vec!["Esatto"]);
    }

    #[test]
    fn test_category_filter_and_cap() {
        let listings = vec![
            listing("Set LEGO Technic", "39,99 €"),
            listing("Cuffie bluetooth", "29,99 €"),
            listing("LEGO City", "19,99 €"),
            listing("LEGO Star Wars", "9,99 €"),
        ];
        let matches = personal_matches(&recipient(100, &["lego"]), &listings, 2);
        let titles: Vec<&str> = matches.iter().map(|l| l.title()).collect();
        assert_eq!(titles, vec!["Set LEGO Technic", "LEGO City"]);
    }
}
