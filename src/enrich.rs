use crate::hop::Hop;
use crate::lookup::Lookup;
use crate::sink::{EventSink, HopEvent};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs one metadata lookup task per public hop.
///
/// Tasks are spawned on the current tokio runtime and run unordered. Each
/// task owns its copy of the hop; enriched copies are handed back by
/// [`Dispatcher::join`].
pub struct Dispatcher {
    lookup: Arc<dyn Lookup>,
    sink: Arc<dyn EventSink>,
    tasks: JoinSet<Option<Hop>>,
    dispatched: usize,
}

impl Dispatcher {
    pub fn new(lookup: Arc<dyn Lookup>, sink: Arc<dyn EventSink>) -> Dispatcher {
        Dispatcher {
            lookup,
            sink,
            tasks: JoinSet::new(),
            dispatched: 0,
        }
    }

    /// Starts a lookup for `hop` if it is eligible. Returns whether one was started.
    pub fn dispatch(&mut self, hop: &Hop) -> bool {
        if !hop.is_enrichable() || hop.enrichment.is_some() {
            return false;
        }
        let lookup = Arc::clone(&self.lookup);
        let sink = Arc::clone(&self.sink);
        self.tasks.spawn(enrich(hop.clone(), lookup, sink));
        self.dispatched += 1;
        true
    }

    /// Number of lookups still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every lookup to settle and returns the enriched hops.
    ///
    /// If `cancel` fires first, the remaining lookups are aborted and only
    /// the ones already finished are returned.
    pub async fn join(mut self, cancel: &CancellationToken) -> Vec<Hop> {
        let mut enriched: Vec<Hop> = Vec::with_capacity(self.dispatched);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(pending = self.tasks.len(), "aborting outstanding lookups");
                    self.tasks.shutdown().await;
                    break;
                }
                joined = self.tasks.join_next() => match joined {
                    Some(Ok(Some(hop))) => enriched.push(hop),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => warn!(error = %e, "lookup task failed"),
                    None => break,
                },
            }
        }
        enriched.sort_by_key(|hop| hop.number);
        enriched
    }
}

async fn enrich(mut hop: Hop, lookup: Arc<dyn Lookup>, sink: Arc<dyn EventSink>) -> Option<Hop> {
    let ip_addr = hop.ip_addr?;
    match lookup.lookup(ip_addr).await {
        Ok(info) => {
            debug!(hop = hop.number, addr = %ip_addr, "lookup done");
            hop.enrichment = Some(info);
            sink.emit(HopEvent::HopInfo(hop.clone()));
            Some(hop)
        }
        Err(e) => {
            warn!(hop = hop.number, addr = %ip_addr, error = %e, "lookup failed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::lookup::{EnrichmentInfo, Lookup, LookupError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every address with a fixed AS name, failing for `broken` ones.
    #[derive(Default)]
    pub(crate) struct StaticLookup {
        pub broken: HashSet<IpAddr>,
        pub delay: Duration,
        pub calls: AtomicUsize,
        pub completed: AtomicUsize,
    }

    #[async_trait]
    impl Lookup for StaticLookup {
        async fn lookup(&self, ip_addr: IpAddr) -> Result<EnrichmentInfo, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(&ip_addr) {
                let err = serde_json::from_str::<EnrichmentInfo>("{not json").unwrap_err();
                return Err(LookupError::Decode(err));
            }
            Ok(EnrichmentInfo {
                success: true,
                as_name: Some(format!("AS-{}", ip_addr)),
                country_code: Some("US".to_string()),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticLookup;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn public_hop(number: u8, addr: &str) -> Hop {
        Hop::reply(number, addr.parse().unwrap(), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_enriches_public_hops_only() {
        let lookup = Arc::new(StaticLookup::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(lookup.clone(), Arc::new(tx));

        assert!(!dispatcher.dispatch(&Hop::timeout(1)));
        assert!(!dispatcher.dispatch(&public_hop(2, "192.168.0.1")));
        assert!(dispatcher.dispatch(&public_hop(3, "8.8.4.4")));
        assert!(dispatcher.dispatch(&public_hop(4, "8.8.8.8")));
        assert_eq!(dispatcher.pending(), 2);

        let enriched = dispatcher.join(&CancellationToken::new()).await;
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].number, 3);
        assert_eq!(
            enriched[1].enrichment.as_ref().unwrap().as_name.as_deref(),
            Some("AS-8.8.8.8")
        );
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.name() == "hop info"));
    }

    #[tokio::test]
    async fn test_failed_lookup_does_not_block_others() {
        let mut lookup = StaticLookup::default();
        lookup.broken.insert("1.1.1.1".parse().unwrap());
        let lookup = Arc::new(lookup);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(lookup.clone(), Arc::new(tx));

        dispatcher.dispatch(&public_hop(1, "1.1.1.1"));
        dispatcher.dispatch(&public_hop(2, "9.9.9.9"));

        let enriched = dispatcher.join(&CancellationToken::new()).await;
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].number, 2);
        assert_eq!(lookup.completed.load(Ordering::SeqCst), 2);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.hop().number, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_waits_for_slow_lookups() {
        let lookup = Arc::new(StaticLookup {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(lookup.clone(), Arc::new(tx));
        for (number, addr) in [(1, "1.0.0.1"), (2, "1.0.0.2"), (3, "1.0.0.3")] {
            dispatcher.dispatch(&public_hop(number, addr));
        }

        let enriched = dispatcher.join(&CancellationToken::new()).await;
        assert_eq!(enriched.len(), 3);
        assert_eq!(lookup.completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_join_stops_on_cancel() {
        let lookup = Arc::new(StaticLookup {
            delay: Duration::from_secs(30),
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = Dispatcher::new(lookup.clone(), Arc::new(tx));
        dispatcher.dispatch(&public_hop(1, "1.0.0.1"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let enriched = dispatcher.join(&cancel).await;
        assert!(enriched.is_empty());
        assert_eq!(lookup.completed.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }
}
