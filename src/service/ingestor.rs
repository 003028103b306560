//! Bounded, deduplicated event ingestion.
//!
//! The ingestor pages through `suix_queryEvents` newest first until it has
//! collected the requested number of events or the node runs out. Several
//! event types can be fetched together; their streams are merged,
//! deduplicated by [`EventId`], and stable-sorted by timestamp descending.

use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::EventSource;
use crate::domain::{ChainEvent, ChainEventKind, EventId};
use crate::error::GatewayError;

/// Events produced by one ingestion plus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingested {
    /// Validated events, newest first.
    pub events: Vec<ChainEvent>,
    /// Raw events returned by the node.
    pub fetched: usize,
    /// Events dropped as duplicates.
    pub duplicates: usize,
    /// Events whose payload failed validation.
    pub malformed: usize,
}

/// Reads events from an [`EventSource`].
#[derive(Debug, Clone)]
pub struct EventIngestor {
    source: Arc<dyn EventSource>,
    page_size: usize,
}

impl EventIngestor {
    /// Creates an ingestor with the given page size (at least one).
    #[must_use]
    pub fn new(source: Arc<dyn EventSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    /// Fetches up to `bound` events of one type, newest first.
    ///
    /// # Errors
    ///
    /// Returns the source error if any page query fails; no partial result
    /// is returned.
    pub async fn fetch(
        &self,
        kind: ChainEventKind,
        event_type: &str,
        bound: usize,
    ) -> Result<Ingested, GatewayError> {
        let mut out = Ingested::default();
        let mut seen: HashSet<EventId> = HashSet::new();
        let mut cursor: Option<EventId> = None;

        while out.fetched < bound {
            let limit = self.page_size.min(bound - out.fetched);
            let page = self
                .source
                .query_events(event_type, cursor.as_ref(), limit, true)
                .await?;

            if page.data.is_empty() {
                break;
            }
            out.fetched += page.data.len();

            for raw in &page.data {
                if !seen.insert(raw.id.clone()) {
                    out.duplicates += 1;
                    continue;
                }
                match ChainEvent::parse(kind, raw) {
                    Ok(event) => out.events.push(event),
                    Err(e) => {
                        out.malformed += 1;
                        tracing::debug!(event_id = %raw.id, %kind, error = %e, "skipping malformed event");
                    }
                }
            }

            match page.next_cursor {
                Some(next) if page.has_next_page && cursor.as_ref() != Some(&next) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        sort_newest_first(&mut out.events);
        tracing::debug!(
            %kind,
            fetched = out.fetched,
            kept = out.events.len(),
            duplicates = out.duplicates,
            malformed = out.malformed,
            "ingested events"
        );
        Ok(out)
    }

    /// Fetches several event types, each up to `bound_per_type`, and merges
    /// them into one deduplicated stream, newest first.
    ///
    /// # Errors
    ///
    /// Returns the first source error; the whole fetch fails together.
    pub async fn fetch_many(
        &self,
        streams: &[(ChainEventKind, String)],
        bound_per_type: usize,
    ) -> Result<Ingested, GatewayError> {
        let fetches = streams
            .iter()
            .map(|(kind, event_type)| self.fetch(*kind, event_type, bound_per_type));
        let results = futures_util::future::try_join_all(fetches).await?;

        let mut merged = Ingested::default();
        let mut seen: HashSet<EventId> = HashSet::new();
        for part in results {
            merged.fetched += part.fetched;
            merged.duplicates += part.duplicates;
            merged.malformed += part.malformed;
            for event in part.events {
                if seen.insert(event.id.clone()) {
                    merged.events.push(event);
                } else {
                    merged.duplicates += 1;
                }
            }
        }
        sort_newest_first(&mut merged.events);
        Ok(merged)
    }
}

/// Stable sort by timestamp, descending; equal timestamps keep input order.
fn sort_newest_first(events: &mut [ChainEvent]) {
    events.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::MemoryChain;
    use crate::chain::memory::fixtures::raw_event;
    use serde_json::json;

    const LISTED: &str = "0x2::kiosk::ItemListed<0x9::nft::Nft>";
    const PURCHASED: &str = "0x2::kiosk::ItemPurchased<0x9::nft::Nft>";

    fn listing_json(item: &str) -> serde_json::Value {
        json!({ "kiosk": "0xe1", "id": item, "price": "100" })
    }

    async fn chain_with(count: u64) -> Arc<MemoryChain> {
        let chain = Arc::new(MemoryChain::new());
        for i in 0..count {
            chain
                .push_event(raw_event(LISTED, &format!("tx{i}"), 1_000 + i, listing_json("0x5")))
                .await;
        }
        chain
    }

    #[tokio::test]
    async fn stops_at_bound() {
        let chain = chain_with(30).await;
        let ingestor = EventIngestor::new(Arc::clone(&chain) as Arc<dyn EventSource>, 10);
        let Ok(out) = ingestor.fetch(ChainEventKind::Listed, LISTED, 25).await else {
            panic!("fetch");
        };
        assert_eq!(out.events.len(), 25);
        assert_eq!(chain.event_queries(), 3);
        assert_eq!(out.events.first().map(|e| e.timestamp_ms), Some(1_029));
    }

    #[tokio::test]
    async fn stops_at_end_of_stream() {
        let chain = chain_with(7).await;
        let ingestor = EventIngestor::new(Arc::clone(&chain) as Arc<dyn EventSource>, 5);
        let Ok(out) = ingestor.fetch(ChainEventKind::Listed, LISTED, 100).await else {
            panic!("fetch");
        };
        assert_eq!(out.events.len(), 7);
        assert_eq!(chain.event_queries(), 2);
    }

    #[tokio::test]
    async fn empty_stream_is_ok_and_empty() {
        let chain = Arc::new(MemoryChain::new());
        let ingestor = EventIngestor::new(chain, 5);
        let out = ingestor.fetch(ChainEventKind::Listed, LISTED, 10).await;
        assert_eq!(out, Ok(Ingested::default()));
    }

    #[tokio::test]
    async fn failure_is_typed_error() {
        let chain = Arc::new(MemoryChain::new());
        chain.fail_event_type(LISTED).await;
        let ingestor = EventIngestor::new(chain, 5);
        let out = ingestor.fetch(ChainEventKind::Listed, LISTED, 10).await;
        assert!(matches!(out, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn dedups_and_counts_malformed() {
        let chain = Arc::new(MemoryChain::new());
        let event = raw_event(LISTED, "dup", 10, listing_json("0x5"));
        chain.push_event(event.clone()).await;
        chain.push_event(event).await;
        chain
            .push_event(raw_event(LISTED, "bad", 20, json!({ "kiosk": "0xe1" })))
            .await;
        let ingestor = EventIngestor::new(chain, 50);
        let Ok(out) = ingestor.fetch(ChainEventKind::Listed, LISTED, 50).await else {
            panic!("fetch");
        };
        assert_eq!(out.fetched, 3);
        assert_eq!(out.duplicates, 1);
        assert_eq!(out.malformed, 1);
        assert_eq!(out.events.len(), 1);
    }

    #[tokio::test]
    async fn merges_types_newest_first() {
        let chain = Arc::new(MemoryChain::new());
        chain
            .push_event(raw_event(LISTED, "a", 100, listing_json("0x5")))
            .await;
        chain
            .push_event(raw_event(PURCHASED, "b", 200, listing_json("0x5")))
            .await;
        let ingestor = EventIngestor::new(chain, 50);
        let streams = vec![
            (ChainEventKind::Listed, LISTED.to_string()),
            (ChainEventKind::Purchased, PURCHASED.to_string()),
        ];
        let Ok(out) = ingestor.fetch_many(&streams, 10).await else {
            panic!("fetch");
        };
        let kinds: Vec<ChainEventKind> = out.events.iter().map(ChainEvent::kind).collect();
        assert_eq!(kinds, vec![ChainEventKind::Purchased, ChainEventKind::Listed]);
    }
}
