use crate::core::asset::{Asset, AssetCategory, CandidateAsset, Provenance};
use crate::core::normalize::{PriceClass, ThresholdNormalizer, UnitNormalizer};
use crate::core::source::PriceSource;
use crate::providers::util::{Numeric, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const ENDPOINT: &str = "/Api/Market/Gold_Currency.php";

/// Provider slugs with a canonical id of their own. Anything else keeps its
/// lowercased slug as id.
const ID_ALIASES: &[(&str, &str)] = &[
    ("usd", "usd"),
    ("eur", "eur"),
    ("gbp", "gbp"),
    ("aed", "aed"),
    ("gold_18k", "gold_18k"),
    ("coin_emami", "coin_emami"),
    ("coin_bahar", "coin_bahar"),
    ("coin_half", "coin_half"),
    ("coin_quarter", "coin_quarter"),
    ("coin_gram", "coin_gram"),
];

/// Name fragments ("gold", "coin") marking a metal quote in the flat shape.
const METAL_NAME_MARKERS: &[&str] = &["طلا", "سکه"];

/// Currency and gold quotes from the BrsApi aggregator.
pub struct BrsApiProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    normalizer: Arc<dyn UnitNormalizer>,
    retries: usize,
}

impl BrsApiProvider {
    pub fn new(base_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        BrsApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            normalizer: Arc::new(ThresholdNormalizer::default()),
            retries: 2,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn UnitNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Without an API key there is nothing to fetch; that is not an error.
    pub async fn fetch(&self) -> Result<Vec<CandidateAsset>> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No BrsApi key configured, skipping fiat/gold quotes");
            return Ok(Vec::new());
        };

        let endpoint = format!("{}{}", self.base_url, ENDPOINT);
        let url = Url::parse_with_params(&endpoint, &[("key", api_key)])
            .with_context(|| format!("Invalid BrsApi URL: {endpoint}"))?;
        // The key is a credential, keep it out of the logs
        debug!("Requesting fiat/gold quotes from {}", endpoint);

        // reqwest errors carry the request URL, key included
        let response = with_retry(
            || async {
                self.client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(reqwest::Error::without_url)
            },
            self.retries,
            500,
        )
        .await
        .with_context(|| format!("Failed to send request to {endpoint}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} from {}",
                response.status(),
                endpoint
            ));
        }

        let text = response.text().await.map_err(reqwest::Error::without_url)?;
        let payload: Payload = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse BrsApi response: {}", e))?;

        Ok(self.parse_payload(payload, Utc::now()))
    }

    fn parse_payload(&self, payload: Payload, now: DateTime<Utc>) -> Vec<CandidateAsset> {
        let items: Vec<(serde_json::Value, Option<AssetCategory>)> = match payload {
            Payload::Flat(items) => items.into_iter().map(|i| (i, None)).collect(),
            Payload::Grouped { gold, currency } => {
                let gold = array_items(gold).map(|i| (i, Some(AssetCategory::PreciousMetal)));
                let currency = array_items(currency).map(|i| (i, Some(AssetCategory::Fiat)));
                gold.chain(currency).collect()
            }
        };

        let total = items.len();
        let candidates: Vec<CandidateAsset> = items
            .into_iter()
            .filter_map(|(value, category)| {
                let item: Item = serde_json::from_value(value)
                    .map_err(|e| debug!("Malformed BrsApi item: {}", e))
                    .ok()?;
                self.parse_item(item, category, now)
            })
            .collect();

        let dropped = total - candidates.len();
        if dropped > 0 {
            debug!(dropped, total, "Dropped malformed BrsApi items");
        }
        candidates
    }

    /// `category` is `None` for the flat shape, where it is inferred from the
    /// localized name.
    fn parse_item(
        &self,
        item: Item,
        category: Option<AssetCategory>,
        now: DateTime<Utc>,
    ) -> Option<CandidateAsset> {
        let name = non_empty(item.name)?;
        let raw = item
            .price
            .as_ref()
            .and_then(Numeric::to_decimal)
            .filter(|p| *p > Decimal::ZERO)?;

        let slug = non_empty(item.slug);
        let category = category.unwrap_or_else(|| infer_category(&name));
        let class = match category {
            AssetCategory::PreciousMetal => {
                PriceClass::classify_metal(&name, slug.as_deref().unwrap_or_default())
            }
            _ => PriceClass::Fiat,
        };
        let price = self.normalizer.normalize(raw, class);

        let raw_slug = slug
            .clone()
            .or_else(|| item.id.map(|id| id.to_string()))
            .unwrap_or_else(|| name.clone());
        let safe_slug = raw_slug.to_lowercase();
        let id = ID_ALIASES
            .iter()
            .find(|(slug, _)| *slug == safe_slug)
            .map_or(safe_slug.clone(), |(_, id)| id.to_string());

        let symbol = non_empty(item.symbol).unwrap_or(raw_slug).to_uppercase();
        // A zero or blank change_percent defers to percent
        let change = [item.change_percent, item.percent]
            .iter()
            .flatten()
            .filter_map(Numeric::to_f64)
            .find(|c| *c != 0.0)
            .unwrap_or(0.0);
        let global_name = slug.unwrap_or_else(|| name.clone());

        Some(
            Asset::new(id, symbol, category, price, Provenance::BrsApi)
                .with_names(name, global_name)
                .with_change(change)
                .observed(now),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Flat(Vec<serde_json::Value>),
    Grouped {
        #[serde(default)]
        gold: Option<serde_json::Value>,
        #[serde(default)]
        currency: Option<serde_json::Value>,
    },
}

#[derive(Debug, Deserialize)]
struct Item {
    name: Option<String>,
    slug: Option<String>,
    id: Option<Numeric>,
    symbol: Option<String>,
    price: Option<Numeric>,
    change_percent: Option<Numeric>,
    percent: Option<Numeric>,
}

fn array_items(value: Option<serde_json::Value>) -> impl Iterator<Item = serde_json::Value> {
    match value {
        Some(serde_json::Value::Array(items)) => items.into_iter(),
        _ => Vec::new().into_iter(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn infer_category(name: &str) -> AssetCategory {
    if METAL_NAME_MARKERS.iter().any(|m| name.contains(m)) {
        AssetCategory::PreciousMetal
    } else {
        AssetCategory::Fiat
    }
}

#[async_trait]
impl PriceSource for BrsApiProvider {
    fn provenance(&self) -> Provenance {
        Provenance::BrsApi
    }

    #[instrument(name = "BrsApiFetch", skip(self))]
    async fn fetch_candidates(&self) -> Vec<CandidateAsset> {
        match self.fetch().await {
            Ok(candidates) => {
                debug!(count = candidates.len(), "Fetched BrsApi candidates");
                candidates
            }
            Err(e) => {
                warn!("BrsApi unavailable: {:#}", e);
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
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(mock_response: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(ENDPOINT))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(base_url: &str, api_key: Option<&str>) -> BrsApiProvider {
        let client = build_client(Duration::from_secs(5)).unwrap();
        BrsApiProvider::new(base_url, api_key.map(str::to_string), client).with_retries(0)
    }

    #[tokio::test]
    async fn test_grouped_response() {
        let mock_response = r#"{
            "gold": [
                {"name": "طلای 18 عیار", "slug": "gold_18k", "symbol": "GOLD18", "price": "5,250,000", "change_percent": 1.2},
                {"name": "سکه امامی", "slug": "coin_emami", "price": 620000000, "change_percent": "0.8"}
            ],
            "currency": [
                {"name": "دلار", "slug": "USD", "symbol": "USD", "price": 850000, "change_percent": -0.3},
                {"name": "یورو", "slug": "eur", "price": "65000"}
            ]
        }"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri(), Some("test-key"))
            .fetch()
            .await
            .unwrap();
        assert_eq!(candidates.len(), 4);

        let gold = &candidates[0];
        assert_eq!(gold.id, "gold_18k");
        assert_eq!(gold.category(), AssetCategory::PreciousMetal);
        // Gram quote under 50M is already Toman
        assert_eq!(gold.price.major(), Decimal::from(5_250_000));
        assert_eq!(gold.change_24h(), 1.2);

        let coin = &candidates[1];
        assert_eq!(coin.id, "coin_emami");
        assert_eq!(coin.symbol, "COIN_EMAMI");
        // Coin over 500M is Rial
        assert_eq!(coin.price.major(), Decimal::from(62_000_000));

        let usd = &candidates[2];
        assert_eq!(usd.id, "usd");
        assert_eq!(usd.category(), AssetCategory::Fiat);
        assert_eq!(usd.price.minor(), Decimal::from(850_000));
        assert_eq!(usd.price.major(), Decimal::from(85_000));
        assert_eq!(usd.name_local, "دلار");
        assert_eq!(usd.name_global, "USD");

        let eur = &candidates[3];
        assert_eq!(eur.symbol, "EUR");
        assert_eq!(eur.price.minor(), Decimal::from(650_000));
        assert_eq!(eur.change_24h(), 0.0);
    }

    #[tokio::test]
    async fn test_flat_response_infers_category() {
        let mock_response = r#"[
            {"name": "سکه بهار آزادی", "slug": "coin_bahar", "price": 42000000, "percent": "0.5"},
            {"name": "درهم امارات", "slug": "aed", "price": 16300},
            {"name": "Unnamed price", "price": 0},
            {"slug": "gbp", "price": 76000}
        ]"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri(), Some("test-key"))
            .fetch()
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].id, "coin_bahar");
        assert_eq!(candidates[0].category(), AssetCategory::PreciousMetal);
        assert_eq!(candidates[0].price.major(), Decimal::from(42_000_000));
        assert_eq!(candidates[0].change_24h(), 0.5);

        assert_eq!(candidates[1].id, "aed");
        assert_eq!(candidates[1].category(), AssetCategory::Fiat);
    }

    #[tokio::test]
    async fn test_id_falls_back_to_provider_id_then_name() {
        let mock_response = r#"{"currency": [
            {"name": "Turkish Lira", "id": 1042, "price": 1800},
            {"name": "CNY", "price": 8300}
        ]}"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri(), Some("test-key"))
            .fetch()
            .await
            .unwrap();
        assert_eq!(candidates[0].id, "1042");
        assert_eq!(candidates[0].symbol, "1042");
        assert_eq!(candidates[1].id, "cny");
        assert_eq!(candidates[1].symbol, "CNY");
    }

    #[tokio::test]
    async fn test_change_falls_back_to_percent() {
        let mock_response = r#"[
            {"name": "دلار", "slug": "usd", "price": 61000, "change_percent": "", "percent": "1.2"},
            {"name": "یورو", "slug": "eur", "price": 65000, "change_percent": 0, "percent": -0.7},
            {"name": "پوند", "slug": "gbp", "price": 76000, "change_percent": "0.4", "percent": "9"}
        ]"#;
        let mock_server = create_mock_server(mock_response, 200).await;

        let candidates = provider(&mock_server.uri(), Some("test-key"))
            .fetch()
            .await
            .unwrap();
        assert_eq!(candidates[0].change_24h(), 1.2);
        assert_eq!(candidates[1].change_24h(), -0.7);
        assert_eq!(candidates[2].change_24h(), 0.4);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let provider = provider("http://127.0.0.1:1", Some("SECRET-KEY"));

        let err = provider.fetch().await.unwrap_err();
        let logged = format!("BrsApi unavailable: {:#}", err);
        assert!(logged.contains("Failed to send request"));
        assert!(!logged.contains("SECRET-KEY"), "{logged}");
        assert!(!format!("{:?}", err).contains("SECRET-KEY"));
    }

    #[tokio::test]
    async fn test_missing_key_skips_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let candidates = provider(&mock_server.uri(), None).fetch_candidates().await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_api_error_degrades_to_empty() {
        let mock_server = create_mock_server("Server Error", 500).await;
        let provider = provider(&mock_server.uri(), Some("test-key"));

        let result = provider.fetch().await;
        assert!(result.unwrap_err().to_string().starts_with("HTTP error: 500"));
        assert!(provider.fetch_candidates().await.is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_payload_degrades_to_empty() {
        let mock_server = create_mock_server(r#""maintenance""#, 200).await;
        let provider = provider(&mock_server.uri(), Some("test-key"));

        assert!(
            provider
                .fetch()
                .await
                .unwrap_err()
                .to_string()
                .contains("Failed to parse BrsApi response")
        );
        assert!(provider.fetch_candidates().await.is_empty());
    }
}
