//! The price feed: sources → reconciler → cache, and the read-only view
//! handed to presentation.

use crate::core::asset::{Asset, CandidateAsset, Provenance, Snapshot};
use crate::core::clock::{Clock, SystemClock};
use crate::core::feed_cache::FeedCache;
use crate::core::reconcile::{Reconciler, fallback_mode};
use crate::core::source::PriceSource;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct FeedService {
    /// In priority order: earlier sources win on duplicate ids.
    sources: Vec<Arc<dyn PriceSource>>,
    reconciler: Reconciler,
    cache: FeedCache,
    clock: Arc<dyn Clock>,
}

impl FeedService {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, cache: FeedCache) -> Self {
        Self {
            sources,
            reconciler: Reconciler::default(),
            cache,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current snapshot. Never fails: when every source is down
    /// the demonstration dataset is returned.
    ///
    /// Without `force_refresh` a fresh cached snapshot is served without
    /// touching the sources.
    pub async fn get_prices(&self, force_refresh: bool) -> Snapshot {
        let now = self.clock.now();

        if !force_refresh {
            if let Some(snapshot) = self.cache.load(now).await {
                debug!(assets = snapshot.len(), "Serving cached snapshot");
                return snapshot;
            }
        }

        info!("Fetching fresh prices");
        let lists = self.fetch_all().await;
        let (snapshot, stats) = self.reconciler.reconcile_with_stats(lists, now);

        // The demo dataset is a stand-in, never a cache entry
        if !stats.used_demo {
            self.cache.store(&snapshot).await;
        }
        snapshot
    }

    /// Runs every source concurrently. A source that panics contributes an
    /// empty list instead of failing the others.
    async fn fetch_all(&self) -> Vec<Vec<CandidateAsset>> {
        let handles = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let provenance = source.provenance();
            (
                provenance,
                tokio::spawn(async move { source.fetch_candidates().await }),
            )
        });
        let (provenances, handles): (Vec<_>, Vec<_>) = handles.unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(provenances)
            .map(|(result, provenance)| match result {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(source = %provenance, "Price source failed: {}", e);
                    Vec::new()
                }
            })
            .collect()
    }
}

/// What presentation renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub assets: Vec<Asset>,
    pub loading: bool,
    pub captured_at: Option<DateTime<Utc>>,
    pub fallback_mode: bool,
}

impl Default for FeedView {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            loading: true,
            captured_at: None,
            fallback_mode: false,
        }
    }
}

impl FeedView {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let fallback_mode = fallback_mode(&snapshot);
        Self {
            captured_at: Some(snapshot.captured_at),
            assets: snapshot.assets,
            loading: false,
            fallback_mode,
        }
    }

    fn is_live(&self) -> bool {
        self.assets
            .iter()
            .any(|a| a.provenance() != Provenance::Demo)
    }
}

/// Shared handle presentation consumers read the feed through.
pub struct MarketData {
    service: Arc<FeedService>,
    view: RwLock<FeedView>,
}

impl MarketData {
    pub fn new(service: Arc<FeedService>) -> Self {
        Self {
            service,
            view: RwLock::new(FeedView::default()),
        }
    }

    /// A copy of the current view.
    pub async fn view(&self) -> FeedView {
        self.view.read().await.clone()
    }

    /// Non-forced load, served from the cache when it is fresh.
    pub async fn load(&self) -> FeedView {
        self.view.write().await.loading = true;
        let snapshot = self.service.get_prices(false).await;

        let mut view = self.view.write().await;
        *view = FeedView::from_snapshot(snapshot);
        view.clone()
    }

    /// Forced reload. If the upstreams are down while live data is already
    /// displayed, the previous view is kept and an error is returned for the
    /// caller to notify about.
    pub async fn refresh(&self) -> Result<FeedView> {
        let snapshot = self.service.get_prices(true).await;

        let mut view = self.view.write().await;
        if snapshot.is_demo() && view.is_live() {
            return Err(anyhow!(
                "Failed to fetch fresh prices, keeping data from {}",
                view.captured_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "earlier".to_string())
            ));
        }

        *view = FeedView::from_snapshot(snapshot);
        Ok(view.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetCategory;
    use crate::core::demo::demo_snapshot;
    use crate::core::price::Price;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) struct MockSource {
        provenance: Provenance,
        candidates: Vec<CandidateAsset>,
        panics: bool,
        offline: AtomicBool,
        pub(crate) calls: AtomicUsize,
    }

    impl MockSource {
        pub(crate) fn new(provenance: Provenance, candidates: Vec<CandidateAsset>) -> Self {
            Self {
                provenance,
                candidates,
                panics: false,
                offline: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn panicking(provenance: Provenance) -> Self {
            Self {
                panics: true,
                ..Self::new(provenance, Vec::new())
            }
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        fn provenance(&self) -> Provenance {
            self.provenance
        }

        async fn fetch_candidates(&self) -> Vec<CandidateAsset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panics {
                panic!("upstream exploded");
            }
            if self.offline.load(Ordering::SeqCst) {
                return Vec::new();
            }
            self.candidates.clone()
        }
    }

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    pub(crate) fn crypto(id: &str, rial: u64) -> CandidateAsset {
        Asset::new(
            id,
            id.to_uppercase(),
            AssetCategory::Crypto,
            Price::from_minor(Decimal::from(rial)),
            Provenance::Nobitex,
        )
    }

    pub(crate) fn fiat(id: &str, toman: u64) -> CandidateAsset {
        Asset::new(
            id,
            id.to_uppercase(),
            AssetCategory::Fiat,
            Price::from_major(Decimal::from(toman)),
            Provenance::BrsApi,
        )
    }

    fn service(
        sources: Vec<Arc<dyn PriceSource>>,
    ) -> (FeedService, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let store = Arc::new(MemoryStore::new());
        let service = FeedService::new(sources, FeedCache::new(store.clone()))
            .with_clock(clock.clone());
        (service, clock, store)
    }

    #[tokio::test]
    async fn test_cache_freshness_window() {
        let crypto_source = Arc::new(MockSource::new(
            Provenance::Nobitex,
            vec![crypto("btc", 58_000_000_000)],
        ));
        let (service, clock, _) = service(vec![crypto_source.clone()]);

        let first = service.get_prices(false).await;
        assert_eq!(crypto_source.calls.load(Ordering::SeqCst), 1);

        clock.advance(90);
        let second = service.get_prices(false).await;
        assert_eq!(second, first);
        assert_eq!(crypto_source.calls.load(Ordering::SeqCst), 1);

        clock.advance(40);
        let third = service.get_prices(false).await;
        assert_eq!(crypto_source.calls.load(Ordering::SeqCst), 2);
        assert!(third.captured_at > first.captured_at);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let crypto_source = Arc::new(MockSource::new(
            Provenance::Nobitex,
            vec![crypto("btc", 58_000_000_000)],
        ));
        let (service, _, _) = service(vec![crypto_source.clone()]);

        service.get_prices(false).await;
        service.get_prices(true).await;
        assert_eq!(crypto_source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_priority_order_and_partial_failure() {
        let crypto_source: Arc<dyn PriceSource> =
            Arc::new(MockSource::panicking(Provenance::Nobitex));
        let fiat_source: Arc<dyn PriceSource> = Arc::new(MockSource::new(
            Provenance::BrsApi,
            vec![fiat("usd", 60_000), fiat("eur", 65_000)],
        ));
        let (service, _, _) = service(vec![crypto_source, fiat_source]);

        let snapshot = service.get_prices(false).await;
        let ids: Vec<&str> = snapshot.assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["usd", "eur"]);
        assert!(
            snapshot
                .assets
                .iter()
                .all(|a| a.provenance() == Provenance::BrsApi)
        );
        assert!(!fallback_mode(&snapshot));
    }

    #[tokio::test]
    async fn test_total_failure_serves_demo_and_skips_cache() {
        let (service, clock, store) = service(vec![
            Arc::new(MockSource::new(Provenance::Nobitex, Vec::new())),
            Arc::new(MockSource::new(Provenance::BrsApi, Vec::new())),
        ]);

        let snapshot = service.get_prices(false).await;
        assert_eq!(snapshot, demo_snapshot(clock.now()));
        assert!(fallback_mode(&snapshot));
        assert!(
            crate::core::cache::SnapshotStore::get(store.as_ref(), crate::core::feed_cache::CACHE_KEY)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_good_cache() {
        let crypto_source = Arc::new(MockSource::new(
            Provenance::Nobitex,
            vec![crypto("usdt", 610_000)],
        ));
        let (service, clock, _) = service(vec![crypto_source.clone()]);

        let good = service.get_prices(false).await;
        crypto_source.offline.store(true, Ordering::SeqCst);
        let forced = service.get_prices(true).await;
        assert!(forced.is_demo());

        clock.advance(30);
        assert_eq!(service.get_prices(false).await, good);
    }

    #[tokio::test]
    async fn test_market_data_view_and_refresh() {
        let crypto_source = Arc::new(MockSource::new(
            Provenance::Nobitex,
            vec![crypto("usdt", 610_000)],
        ));
        let (service, _, _) = service(vec![crypto_source.clone()]);
        let market = MarketData::new(Arc::new(service));

        let initial = market.view().await;
        assert!(initial.loading);
        assert!(initial.assets.is_empty());

        let view = market.load().await;
        assert!(!view.loading);
        // USD derived from USDT
        assert!(view.fallback_mode);
        assert_eq!(view.assets.len(), 2);

        crypto_source.offline.store(true, Ordering::SeqCst);
        let result = market.refresh().await;
        assert!(result.is_err());
        assert_eq!(market.view().await, view);
    }

    #[tokio::test]
    async fn test_refresh_without_live_data_shows_demo() {
        let (service, _, _) = service(vec![Arc::new(MockSource::new(
            Provenance::Nobitex,
            Vec::new(),
        ))]);
        let market = MarketData::new(Arc::new(service));

        let view = market.refresh().await.unwrap();
        assert!(view.fallback_mode);
        assert!(!view.assets.is_empty());
    }
}
