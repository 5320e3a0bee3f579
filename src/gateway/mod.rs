pub mod coingecko;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fiat currency a coin collection is quoted in.
///
/// The tracked views hold one independent collection per variant; toggling
/// between them is a pure in-memory switch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Usd, Currency::Eur];

    /// Render the currency as the API-facing lowercase code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
        }
    }
}

/// Return-on-investment sub-record some market rows carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Roi {
    pub times: f64,
    pub currency: String,
    pub percentage: f64,
}

/// One coin's market snapshot as returned by the provider.
///
/// Field names mirror the provider's `coins/markets` JSON. The provider may
/// omit most numeric fields for thinly traded coins, hence the `Option`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: String,
    pub current_price: f64,
    pub market_cap: f64,
    pub market_cap_rank: Option<u32>,
    pub fully_diluted_valuation: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: f64,
    pub market_cap_change_24h: Option<f64>,
    pub market_cap_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub ath_date: Option<String>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub atl_date: Option<String>,
    pub roi: Option<Roi>,
    pub last_updated: Option<String>,
}

impl Coin {
    /// Build a search-result stub carrying identity fields only.
    ///
    /// The search endpoint returns no market data, so every numeric field is
    /// a zero-valued placeholder. Callers must not treat these as quotes.
    pub fn placeholder(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image: image.into(),
            current_price: 0.0,
            market_cap: 0.0,
            market_cap_rank: None,
            fully_diluted_valuation: None,
            total_volume: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            price_change_percentage_24h: 0.0,
            market_cap_change_24h: None,
            market_cap_change_percentage_24h: None,
            circulating_supply: None,
            total_supply: None,
            max_supply: None,
            ath: None,
            ath_change_percentage: None,
            ath_date: None,
            atl: None,
            atl_change_percentage: None,
            atl_date: None,
            roi: None,
            last_updated: None,
        }
    }
}

// Equality and deduplication are by identifier only; two snapshots of the
// same coin in different currencies compare equal.
impl PartialEq for Coin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Coin {}

impl std::hash::Hash for Coin {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A single historical price sample for a coin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub price: f64,
}

impl PricePoint {
    /// Short day/month label used when charting a series.
    pub fn date_label(&self) -> String {
        self.timestamp.format("%d/%m").to_string()
    }
}

/// Trait implemented by market data gateways.
///
/// Production code talks to the HTTP provider through this interface; tests
/// inject in-memory fakes. No caching happens behind it -- every call is a
/// fresh request.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Fetch the top coins by market capitalization, descending, page 1.
    async fn top_coins(&self, currency: Currency) -> Result<Vec<Coin>>;

    /// Fetch current market data for the given coin ids in one batched call.
    ///
    /// An empty id list resolves to an empty result without network I/O.
    /// The result carries at most one record per distinct requested id.
    async fn coin_details(&self, ids: &[String], currency: Currency) -> Result<Vec<Coin>>;

    /// Fetch a daily price series over the given day window.
    ///
    /// Entries with a missing or malformed timestamp or price are dropped;
    /// the surviving points keep their order.
    async fn historical_prices(
        &self,
        id: &str,
        currency: Currency,
        days: u32,
    ) -> Result<Vec<PricePoint>>;

    /// Search coins by name or symbol. Results are identity-only stubs.
    async fn search_coins(&self, query: &str) -> Result<Vec<Coin>>;
}
