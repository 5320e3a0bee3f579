use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, trace};

use super::{Coin, Currency, MarketDataGateway, PricePoint};
use crate::error::{Error, Result};
use async_trait::async_trait;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const TOP_COINS_PER_PAGE: u32 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// CoinGecko market data gateway.
///
/// Works unauthenticated against the free tier; an API key, when configured,
/// is sent as a bearer token.
pub struct CoinGecko {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGecko {
    /// Create a gateway using the default production API URL.
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(BASE_URL, api_key)
    }

    /// Create a gateway with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("cointrack/0.1.0")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| Error::InvalidRequest(format!("{}: {}", path, e)))
    }

    async fn fetch_body(&self, url: Url) -> Result<String> {
        debug!(url = %url, "fetching from CoinGecko");

        let mut request = self.client.get(url).header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(map_transport_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(map_transport_error)?;

        debug!(status = %status, body_len = body.len(), "CoinGecko response");
        trace!(body = %body, "CoinGecko response body");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }

        if !status.is_success() {
            return Err(Error::Api(format!(
                "CoinGecko returned {}: {}",
                status, body
            )));
        }

        Ok(body)
    }
}

impl Default for CoinGecko {
    fn default() -> Self {
        Self::new(None)
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(err)
    }
}

/// CoinGecko `/coins/{id}/market_chart` response shape. Each entry is a
/// `[timestamp_ms, price]` pair, but the values are kept loose so one
/// malformed entry does not fail the whole series.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<serde_json::Value>,
}

/// CoinGecko `/search` response shape.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
struct SearchCoin {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    large: String,
}

#[async_trait]
impl MarketDataGateway for CoinGecko {
    async fn top_coins(&self, currency: Currency) -> Result<Vec<Coin>> {
        let mut url = self.endpoint("coins/markets")?;
        url.query_pairs_mut()
            .append_pair("vs_currency", currency.as_str())
            .append_pair("order", "market_cap_desc")
            .append_pair("per_page", &TOP_COINS_PER_PAGE.to_string())
            .append_pair("page", "1");

        let body = self.fetch_body(url).await?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(format!("CoinGecko markets JSON: {}", e)))
    }

    async fn coin_details(&self, ids: &[String], currency: Currency) -> Result<Vec<Coin>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.endpoint("coins/markets")?;
        url.query_pairs_mut()
            .append_pair("vs_currency", currency.as_str())
            .append_pair("ids", &ids.join(","));

        let body = self.fetch_body(url).await?;
        let mut coins: Vec<Coin> = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("CoinGecko markets JSON: {}", e)))?;

        // The provider should already be id-unique, but the contract is at
        // most one record per requested id.
        let mut seen = HashSet::new();
        coins.retain(|c| seen.insert(c.id.clone()));

        Ok(coins)
    }

    async fn historical_prices(
        &self,
        id: &str,
        currency: Currency,
        days: u32,
    ) -> Result<Vec<PricePoint>> {
        let mut url = self.endpoint(&format!("coins/{}/market_chart", id))?;
        url.query_pairs_mut()
            .append_pair("vs_currency", currency.as_str())
            .append_pair("days", &days.to_string())
            .append_pair("interval", "daily");

        let body = self.fetch_body(url).await?;
        let payload: MarketChartResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("CoinGecko market chart JSON: {}", e)))?;

        let mut points = Vec::new();
        for entry in payload.prices {
            let Some(pair) = entry.as_array() else {
                continue;
            };
            let Some(ts_ms) = pair.first().and_then(|v| v.as_f64()) else {
                continue;
            };
            let Some(price) = pair.get(1).and_then(|v| v.as_f64()) else {
                continue;
            };

            if !price.is_finite() {
                continue;
            }

            if let Some(timestamp) =
                chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ts_ms as i64)
            {
                points.push(PricePoint { timestamp, price });
            }
        }

        Ok(points)
    }

    async fn search_coins(&self, query: &str) -> Result<Vec<Coin>> {
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut().append_pair("query", query);

        let body = self.fetch_body(url).await?;
        let payload: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("CoinGecko search JSON: {}", e)))?;

        Ok(payload
            .coins
            .into_iter()
            .map(|c| Coin::placeholder(c.id, c.symbol, c.name, c.large))
            .collect())
    }
}
