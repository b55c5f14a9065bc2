//! Upstream quote sources

use crate::core::asset::{CandidateAsset, Provenance};
use async_trait::async_trait;

/// A provider of candidate assets.
///
/// Implementations never fail: transport, parse and shape errors are logged
/// and reported as an empty list so one broken upstream cannot take the feed
/// down.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn provenance(&self) -> Provenance;

    async fn fetch_candidates(&self) -> Vec<CandidateAsset>;
}
