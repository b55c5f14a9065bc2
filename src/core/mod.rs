//! Core feed logic: the asset model, unit normalization, reconciliation and
//! caching.

pub mod asset;
pub mod cache;
pub mod clock;
pub mod config;
pub mod demo;
pub mod feed;
pub mod feed_cache;
pub mod log;
pub mod normalize;
pub mod price;
pub mod reconcile;
pub mod scheduler;
pub mod source;

// Re-export main types for cleaner imports
pub use asset::{Asset, AssetCategory, CandidateAsset, Provenance, Snapshot};
pub use cache::{SnapshotStore, StoredRecord};
pub use feed::{FeedService, FeedView, MarketData};
pub use normalize::{ThresholdNormalizer, UnitNormalizer};
pub use price::Price;
pub use reconcile::{Reconciler, fallback_mode};
pub use source::PriceSource;
