use crate::core::asset::Snapshot;
use crate::core::cache::SnapshotStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Store key for the feed snapshot. Bump the version whenever the `Asset`
/// shape changes so old records are never deserialized into the new shape.
pub const CACHE_KEY: &str = "nerkh_cache_v8";

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Time-boxed persisted copy of the last reconciled snapshot.
pub struct FeedCache {
    store: Arc<dyn SnapshotStore>,
    refresh_interval: Duration,
}

impl FeedCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// The stored snapshot, if it was captured less than the refresh
    /// interval before `now`.
    pub async fn load(&self, now: DateTime<Utc>) -> Option<Snapshot> {
        let record = self.store.get(CACHE_KEY).await?;

        let age = now.signed_duration_since(record.timestamp);
        let fresh = age
            .to_std()
            .map(|age| age < self.refresh_interval)
            // Captured in the future: clock went backwards, do not trust it
            .unwrap_or(false);
        if !fresh {
            debug!(age_secs = age.num_seconds(), "Cached snapshot is stale");
            return None;
        }

        match serde_json::from_slice::<Snapshot>(&record.value) {
            Ok(snapshot) if !snapshot.is_empty() => Some(snapshot),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring unreadable cached snapshot: {}", e);
                None
            }
        }
    }

    /// Writes `snapshot` unless it is empty. Returns whether it was written.
    pub async fn store(&self, snapshot: &Snapshot) -> bool {
        if snapshot.is_empty() {
            debug!("Refusing to cache an empty snapshot");
            return false;
        }

        match serde_json::to_vec(snapshot) {
            Ok(value) => {
                self.store
                    .set(CACHE_KEY, value, snapshot.captured_at)
                    .await;
                true
            }
            Err(e) => {
                debug!("Failed to serialize snapshot: {}", e);
                false
            }
        }
    }
}
