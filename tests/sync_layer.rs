use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cointrack::error::{Error, Result};
use cointrack::favorites::Favorites;
use cointrack::gateway::{Coin, Currency, MarketDataGateway, PricePoint};
use cointrack::list::CoinList;
use cointrack::store::CoinStore;

fn market_coin(id: &str, name: &str) -> Coin {
    let mut coin = Coin::placeholder(id, id, name, "");
    coin.current_price = 100.0;
    coin.market_cap = 1_000_000.0;
    coin
}

/// In-memory gateway double counting the calls that would hit the network.
#[derive(Default)]
struct FakeGateway {
    top_usd: Vec<Coin>,
    top_eur: Vec<Coin>,
    rate_limit_top_usd: bool,
    top_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

#[async_trait]
impl MarketDataGateway for FakeGateway {
    async fn top_coins(&self, currency: Currency) -> Result<Vec<Coin>> {
        self.top_calls.fetch_add(1, Ordering::SeqCst);

        if currency == Currency::Usd && self.rate_limit_top_usd {
            return Err(Error::RateLimited);
        }

        Ok(match currency {
            Currency::Usd => self.top_usd.clone(),
            Currency::Eur => self.top_eur.clone(),
        })
    }

    async fn coin_details(&self, ids: &[String], currency: Currency) -> Result<Vec<Coin>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.detail_calls.fetch_add(1, Ordering::SeqCst);

        let mut seen = std::collections::HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| market_coin(id, &format!("{} ({} detail)", id, currency.as_str())))
            .collect())
    }

    async fn historical_prices(
        &self,
        _id: &str,
        _currency: Currency,
        _days: u32,
    ) -> Result<Vec<PricePoint>> {
        Ok(Vec::new())
    }

    async fn search_coins(&self, query: &str) -> Result<Vec<Coin>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Coin::placeholder(
            format!("{}-result", query),
            query,
            format!("{} result", query),
            "",
        )])
    }
}

fn fixture() -> (Arc<FakeGateway>, Arc<CoinStore>) {
    let gateway = Arc::new(FakeGateway {
        top_usd: vec![
            market_coin("bitcoin", "Bitcoin (top usd)"),
            market_coin("ethereum", "Ethereum (top usd)"),
        ],
        top_eur: vec![
            market_coin("bitcoin", "Bitcoin (top eur)"),
            market_coin("ethereum", "Ethereum (top eur)"),
        ],
        ..FakeGateway::default()
    });
    let store = Arc::new(CoinStore::open_in_memory().unwrap());
    (gateway, store)
}

#[tokio::test]
async fn initial_load_merges_top_and_tracked_for_both_currencies() {
    let (gateway, store) = fixture();
    store.add_tracked("cardano").unwrap();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    assert!(list.is_loaded().await);
    assert!(list.last_error().await.is_none());

    let visible: Vec<String> = list.visible().await.iter().map(|c| c.id.clone()).collect();
    assert_eq!(visible, vec!["bitcoin", "ethereum", "cardano"]);

    list.set_currency(Currency::Eur).await;
    let visible: Vec<String> = list.visible().await.iter().map(|c| c.id.clone()).collect();
    assert_eq!(visible, vec!["bitcoin", "ethereum", "cardano"]);
}

#[tokio::test]
async fn merge_prefers_top_entry_over_tracked_duplicate() {
    let (gateway, store) = fixture();
    store.add_tracked("bitcoin").unwrap();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    let visible = list.visible().await;
    let bitcoins: Vec<&Coin> = visible.iter().filter(|c| c.id == "bitcoin").collect();
    assert_eq!(bitcoins.len(), 1);
    assert_eq!(bitcoins[0].name, "Bitcoin (top usd)");
}

#[tokio::test]
async fn currency_toggle_does_not_refetch() {
    let (gateway, store) = fixture();
    store.add_tracked("cardano").unwrap();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    let top_calls = gateway.top_calls.load(Ordering::SeqCst);
    let detail_calls = gateway.detail_calls.load(Ordering::SeqCst);
    assert_eq!(top_calls, 2);
    assert_eq!(detail_calls, 2);

    list.set_currency(Currency::Eur).await;
    let _ = list.visible().await;
    list.set_currency(Currency::Usd).await;
    let _ = list.visible().await;

    assert_eq!(gateway.top_calls.load(Ordering::SeqCst), top_calls);
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), detail_calls);
}

#[tokio::test]
async fn add_then_remove_restores_tracked_set() {
    let (gateway, store) = fixture();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;
    assert!(store.tracked_ids().unwrap().is_empty());

    list.add_coin("solana").await;
    assert_eq!(store.tracked_ids().unwrap(), vec!["solana"]);

    let visible = list.visible().await;
    let position = visible
        .iter()
        .position(|c| c.id == "solana")
        .expect("added coin is visible");

    list.remove_at(position).await;
    assert!(store.tracked_ids().unwrap().is_empty());
    assert!(list.visible().await.iter().all(|c| c.id != "solana"));
}

#[tokio::test]
async fn adding_a_tracked_coin_twice_is_a_no_op() {
    let (gateway, store) = fixture();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    list.add_coin("solana").await;
    let detail_calls = gateway.detail_calls.load(Ordering::SeqCst);

    list.add_coin("solana").await;
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), detail_calls);
    assert_eq!(store.tracked_ids().unwrap(), vec!["solana"]);

    let visible = list.visible().await;
    assert_eq!(visible.iter().filter(|c| c.id == "solana").count(), 1);
}

#[tokio::test]
async fn rate_limited_usd_branch_does_not_affect_eur() {
    let gateway = Arc::new(FakeGateway {
        top_eur: vec![
            market_coin("bitcoin", "Bitcoin (top eur)"),
            market_coin("ethereum", "Ethereum (top eur)"),
        ],
        rate_limit_top_usd: true,
        ..FakeGateway::default()
    });
    let store = Arc::new(CoinStore::open_in_memory().unwrap());

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    assert!(list.is_loaded().await);
    assert!(list.visible().await.is_empty());

    let message = list.last_error().await.expect("error message recorded");
    assert!(message.contains("Rate limit"));

    list.set_currency(Currency::Eur).await;
    let visible: Vec<String> = list.visible().await.iter().map(|c| c.id.clone()).collect();
    assert_eq!(visible, vec!["bitcoin", "ethereum"]);
}

#[tokio::test]
async fn remove_at_out_of_range_records_an_error() {
    let (gateway, store) = fixture();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.load().await;

    list.remove_at(99).await;
    let message = list.take_error().await.expect("error message recorded");
    assert!(message.contains("position"));
}

#[tokio::test]
async fn search_publishes_results() {
    let (gateway, store) = fixture();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    list.search("sol").await;

    let results = list.search_results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "sol-result");
    assert_eq!(gateway.search_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn state_changes_bump_the_watch_version() {
    let (gateway, store) = fixture();

    let list = CoinList::new(gateway.clone(), store.clone(), Currency::Usd);
    let rx = list.subscribe();
    let before = *rx.borrow();

    list.load().await;
    assert!(*rx.borrow() > before);
}

#[tokio::test]
async fn favorite_toggle_is_idempotent_in_persisted_state() {
    let (gateway, store) = fixture();
    let favorites = Favorites::new(gateway.clone(), store.clone(), Currency::Eur);

    let current = vec![market_coin("bitcoin", "Bitcoin")];

    favorites.toggle(&current[0], &current).await;
    assert_eq!(store.favorite_ids().unwrap(), vec!["bitcoin"]);
    assert!(favorites.is_favorite("bitcoin").await);

    favorites.toggle(&current[0], &current).await;
    assert!(store.favorite_ids().unwrap().is_empty());
    assert!(!favorites.is_favorite("bitcoin").await);
}

#[tokio::test]
async fn loading_favorites_with_empty_set_skips_network() {
    let (gateway, store) = fixture();
    let favorites = Favorites::new(gateway.clone(), store.clone(), Currency::Eur);

    favorites.load().await;

    assert!(favorites.coins().await.is_empty());
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn loading_favorites_batch_fetches_all_ids() {
    let (gateway, store) = fixture();
    store.add_favorite("bitcoin").unwrap();
    store.add_favorite("cardano").unwrap();

    let favorites = Favorites::new(gateway.clone(), store.clone(), Currency::Eur);
    favorites.load().await;

    let ids: Vec<String> = favorites.coins().await.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["bitcoin", "cardano"]);
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn toggle_fetches_details_when_coin_missing_from_current() {
    let (gateway, store) = fixture();
    let favorites = Favorites::new(gateway.clone(), store.clone(), Currency::Eur);

    let stub = Coin::placeholder("cardano", "ada", "Cardano", "");
    favorites.toggle(&stub, &[]).await;

    assert_eq!(store.favorite_ids().unwrap(), vec!["cardano"]);
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), 1);

    let coins = favorites.coins().await;
    assert_eq!(coins.len(), 1);
    assert_eq!(coins[0].name, "cardano (eur detail)");
}

#[tokio::test]
async fn refresh_from_filters_by_persisted_ids() {
    let (gateway, store) = fixture();
    store.add_favorite("ethereum").unwrap();

    let favorites = Favorites::new(gateway.clone(), store.clone(), Currency::Usd);
    let current = vec![
        market_coin("bitcoin", "Bitcoin"),
        market_coin("ethereum", "Ethereum"),
    ];
    favorites.refresh_from(&current).await;

    let ids: Vec<String> = favorites.coins().await.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["ethereum"]);
    assert_eq!(gateway.detail_calls.load(Ordering::SeqCst), 0);
}
