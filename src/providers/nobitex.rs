use crate::core::asset::{Asset, AssetCategory, CandidateAsset, Provenance};
use crate::core::price::Price;
use crate::core::source::PriceSource;
use crate::providers::util::{Numeric, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Trading pairs we read, with the asset each one maps to:
/// (pair key, id, Persian name, English name).
const PAIRS: &[(&str, &str, &str, &str)] = &[
    ("btc-rls", "btc", "بیت‌کوین", "Bitcoin"),
    ("eth-rls", "eth", "اتریوم", "Ethereum"),
    ("usdt-rls", "usdt", "تتر", "Tether"),
    ("trx-rls", "trx", "ترون", "Tron"),
    ("ton-rls", "ton", "تون‌کوین", "Toncoin"),
    ("doge-rls", "doge", "دوج‌کوین", "Dogecoin"),
];

/// Crypto quotes from the Nobitex market stats endpoint. Prices arrive in
/// Rial.
pub struct NobitexProvider {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
}

impl NobitexProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        NobitexProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retries: 2,
        }
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub async fn fetch(&self) -> Result<Vec<CandidateAsset>> {
        let url = format!("{}/market/stats", self.base_url);
        debug!("Requesting crypto stats from {}", url);

        let response = with_retry(|| async { self.client.get(&url).send().await }, self.retries, 500)
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} from {}", response.status(), url));
        }

        let text = response.text().await?;
        let data: StatsResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse Nobitex response: {}", e))?;

        Ok(parse_pairs(data.into_pairs()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsResponse {
    /// `{"status": "ok", "stats": {"btc-rls": {...}}}`
    Nested {
        stats: HashMap<String, serde_json::Value>,
    },
    /// `{"btc-rls": {...}}`
    Flat(HashMap<String, serde_json::Value>),
}

impl StatsResponse {
    fn into_pairs(self) -> HashMap<String, serde_json::Value> {
        match self {
            StatsResponse::Nested { stats } => stats,
            StatsResponse::Flat(pairs) => pairs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PairStats {
    latest: Option<Numeric>,
    #[serde(rename = "dayChange")]
    day_change: Option<Numeric>,
}

fn parse_pairs(mut pairs: HashMap<String, serde_json::Value>) -> Vec<CandidateAsset> {
    let now = Utc::now();
    let mut dropped = 0;

    let candidates: Vec<CandidateAsset> = PAIRS
        .iter()
        .filter_map(|(key, id, local, global)| {
            let value = pairs.remove(*key)?;
            let stats: PairStats = match serde_json::from_value(value) {
                Ok(stats) => stats,
                Err(e) => {
                    debug!(pair = key, "Malformed pair stats: {}", e);
                    dropped += 1;
                    return None;
                }
            };

            let rial = stats
                .latest
                .as_ref()
                .and_then(Numeric::to_decimal)
                .filter(|p| *p > Decimal::ZERO);
            let Some(rial) = rial else {
                debug!(pair = key, "Pair has no usable latest price");
                dropped += 1;
                return None;
            };
            let change = stats
                .day_change
                .as_ref()
                .and_then(Numeric::to_f64)
                .unwrap_or(0.0);

            Some(
                Asset::new(
                    *id,
                    id.to_uppercase(),
                    AssetCategory::Crypto,
                    Price::from_minor(rial),
                    Provenance::Nobitex,
                )
                .with_names(*local, *global)
                .with_change(change)
                .observed(now),
            )
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "Dropped malformed Nobitex pairs");
    }
    candidates
}

#[async_trait]
impl PriceSource for NobitexProvider {
    fn provenance(&self) -> Provenance {
        Provenance::Nobitex
    }

    #[instrument(name = "NobitexFetch", skip(self))]
    async fn fetch_candidates(&self) -> Vec<CandidateAsset> {
        match self.fetch().await {
            Ok(candidates) => {
                debug!(count = candidates.len(), "Fetched Nobitex candidates");
                candidates
            }
            Err(e) => {
                warn!("Nobitex unavailable: {:#}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::build_client;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(mock_response: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/market/stats"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(base_url: &str) -> NobitexProvider {
        let client = build_client(Duration::from_secs(5)).unwrap();
        NobitexProvider::new(base_url, client).with_retries(0)
    }

    #[tokio::test]
    async fn test_successful_stats_fetch() {
        let mock_response = r#"{
            "status": "ok",
            "stats": {
                "btc-rls": {"latest": "58000000000", "dayChange": "2.35"},
                "usdt-rls": {"latest": "610500", "dayChange": "-0.4"},
                "shib-rls": {"latest": "10", "dayChange": "1"}
            }
        }"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri()).fetch().await.unwrap();

        // Fixed pair order, unknown pairs ignored, missing pairs skipped
        assert_eq!(candidates.len(), 2);
        let btc = &candidates[0];
        assert_eq!(btc.id, "btc");
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.name_global, "Bitcoin");
        assert_eq!(btc.category(), AssetCategory::Crypto);
        assert_eq!(btc.price.minor(), Decimal::from(58_000_000_000u64));
        assert_eq!(btc.price.major(), Decimal::from(5_800_000_000u64));
        assert_eq!(btc.change_24h(), 2.35);

        let usdt = &candidates[1];
        assert_eq!(usdt.id, "usdt");
        assert_eq!(usdt.price.major(), Decimal::from(61_050));
        assert_eq!(usdt.change_24h(), -0.4);
    }

    #[tokio::test]
    async fn test_flat_response_shape() {
        let mock_response = r#"{"eth-rls": {"latest": "2200000000", "dayChange": "1.5"}}"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri()).fetch().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "eth");
    }

    #[tokio::test]
    async fn test_unusable_pairs_are_dropped() {
        let mock_response = r#"{"stats": {
            "btc-rls": {"latest": "not-a-number", "dayChange": "1"},
            "trx-rls": {"dayChange": "1"},
            "ton-rls": {"latest": "1500000", "dayChange": "NaN"}
        }}"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri()).fetch().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "ton");
        assert_eq!(candidates[0].change_24h(), 0.0);
    }

    #[tokio::test]
    async fn test_api_error_degrades_to_empty() {
        let mock_server = create_mock_server("Server Error", 500).await;
        let provider = provider(&mock_server.uri());

        let result = provider.fetch().await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            format!(
                "HTTP error: 500 Internal Server Error from {}/market/stats",
                mock_server.uri()
            )
        );

        assert!(provider.fetch_candidates().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_degrades_to_empty() {
        let mock_server = create_mock_server("[1, 2, 3]", 200).await;
        let provider = provider(&mock_server.uri());

        let result = provider.fetch().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse Nobitex response")
        );
        assert!(provider.fetch_candidates().await.is_empty());
    }
}
