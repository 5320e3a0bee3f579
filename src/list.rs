use futures::future;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use crate::error::Error;
use crate::gateway::{Coin, Currency, MarketDataGateway};
use crate::store::CoinStore;

/// One value per supported currency.
#[derive(Debug, Default)]
struct PerCurrency<T> {
    usd: T,
    eur: T,
}

impl<T> PerCurrency<T> {
    fn get(&self, currency: Currency) -> &T {
        match currency {
            Currency::Usd => &self.usd,
            Currency::Eur => &self.eur,
        }
    }

    fn get_mut(&mut self, currency: Currency) -> &mut T {
        match currency {
            Currency::Usd => &mut self.usd,
            Currency::Eur => &mut self.eur,
        }
    }
}

#[derive(Debug)]
struct ListState {
    top: PerCurrency<Vec<Coin>>,
    tracked: PerCurrency<Vec<Coin>>,
    active: Currency,
    search_results: Vec<Coin>,
    error: Option<String>,
    loaded: bool,
}

/// The coin collection the UI displays, per currency.
///
/// Combines the provider's top list with the user's manually tracked coins,
/// keeping one precomputed collection per currency so toggling the active
/// currency never refetches. Observers either poll the getters or watch the
/// version channel returned by [`subscribe`](CoinList::subscribe).
pub struct CoinList {
    gateway: Arc<dyn MarketDataGateway>,
    store: Arc<CoinStore>,
    state: RwLock<ListState>,
    version: watch::Sender<u64>,
}

impl CoinList {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        store: Arc<CoinStore>,
        currency: Currency,
    ) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            gateway,
            store,
            state: RwLock::new(ListState {
                top: PerCurrency::default(),
                tracked: PerCurrency::default(),
                active: currency,
                search_results: Vec::new(),
                error: None,
                loaded: false,
            }),
            version,
        }
    }

    /// Watch for state changes. The value bumps on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Load everything the merged views need: the top list and the tracked
    /// coin details, for both currencies, concurrently.
    ///
    /// All four fetches complete before state is written; a failed branch
    /// contributes an empty collection and a recorded error message instead
    /// of cancelling its siblings.
    pub async fn load(&self) {
        let tracked_ids = match self.store.tracked_ids() {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to read tracked ids");
                self.state.write().await.error = Some(err.to_string());
                Vec::new()
            }
        };

        let (top_usd, top_eur, detail_usd, detail_eur) = tokio::join!(
            self.gateway.top_coins(Currency::Usd),
            self.gateway.top_coins(Currency::Eur),
            self.gateway.coin_details(&tracked_ids, Currency::Usd),
            self.gateway.coin_details(&tracked_ids, Currency::Eur),
        );

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.top.usd = collect_branch(&mut state.error, top_usd, "top coins (usd)");
        state.top.eur = collect_branch(&mut state.error, top_eur, "top coins (eur)");
        state.tracked.usd = collect_branch(&mut state.error, detail_usd, "tracked coins (usd)");
        state.tracked.eur = collect_branch(&mut state.error, detail_eur, "tracked coins (eur)");
        state.loaded = true;
        drop(guard);

        self.notify();
    }

    /// The merged collection for the active currency.
    ///
    /// Top-list entries take priority over tracked-detail entries when both
    /// carry the same id; each id appears at most once.
    pub async fn visible(&self) -> Vec<Coin> {
        let state = self.state.read().await;
        merge_by_id(state.top.get(state.active), state.tracked.get(state.active))
    }

    /// Switch the active currency. Pure in-memory toggle, never refetches.
    pub async fn set_currency(&self, currency: Currency) {
        let mut state = self.state.write().await;
        if state.active != currency {
            state.active = currency;
            drop(state);
            self.notify();
        }
    }

    pub async fn currency(&self) -> Currency {
        self.state.read().await.active
    }

    /// Start tracking a coin: persist its id, then fetch its details in both
    /// currencies and fold them into the tracked collections.
    ///
    /// A coin already present in either currency's tracked collection is a
    /// no-op -- no duplicate network calls, no duplicate persistence.
    pub async fn add_coin(&self, id: &str) {
        {
            let state = self.state.read().await;
            let already_tracked = Currency::ALL
                .iter()
                .any(|c| state.tracked.get(*c).iter().any(|coin| coin.id == id));
            if already_tracked {
                debug!(id = %id, "coin already tracked, skipping add");
                return;
            }
        }

        if let Err(err) = self.store.add_tracked(id) {
            self.record_error(format!("failed to save tracked coin '{}': {}", id, err))
                .await;
            return;
        }

        let ids = vec![id.to_string()];
        let (usd, eur) = future::join(
            self.gateway.coin_details(&ids, Currency::Usd),
            self.gateway.coin_details(&ids, Currency::Eur),
        )
        .await;

        let mut state = self.state.write().await;
        for (currency, result) in [(Currency::Usd, usd), (Currency::Eur, eur)] {
            match result {
                Ok(coins) if !coins.is_empty() => {
                    let slot = state.tracked.get_mut(currency);
                    for coin in coins {
                        if !slot.iter().any(|c| c.id == coin.id) {
                            slot.push(coin);
                        }
                    }
                }
                Ok(_) => {
                    debug!(id = %id, currency = currency.as_str(), "no details returned for added coin");
                }
                Err(err) => {
                    warn!(id = %id, currency = currency.as_str(), error = %err, "detail fetch failed for added coin");
                    state.error = Some(format!(
                        "failed to load details for '{}' ({}): {}",
                        id,
                        currency.as_str(),
                        err
                    ));
                }
            }
        }
        drop(state);

        self.notify();
    }

    /// Stop tracking the coin at the given position in the visible list.
    ///
    /// The position is resolved to an identifier against the current visible
    /// collection at call time, so later reordering cannot remove the wrong
    /// coin.
    pub async fn remove_at(&self, position: usize) {
        let id = {
            let state = self.state.read().await;
            let visible =
                merge_by_id(state.top.get(state.active), state.tracked.get(state.active));
            match visible.get(position) {
                Some(coin) => coin.id.clone(),
                None => {
                    drop(state);
                    self.record_error(format!("no coin at position {}", position))
                        .await;
                    return;
                }
            }
        };

        self.remove_coin(&id).await;
    }

    /// Stop tracking a coin by id: delete the persisted record first, then
    /// drop the id from every in-memory collection.
    pub async fn remove_coin(&self, id: &str) {
        if let Err(err) = self.store.remove_tracked(id) {
            self.record_error(format!("failed to remove tracked coin '{}': {}", id, err))
                .await;
            return;
        }

        let mut state = self.state.write().await;
        for currency in Currency::ALL {
            state.top.get_mut(currency).retain(|c| c.id != id);
            state.tracked.get_mut(currency).retain(|c| c.id != id);
        }
        drop(state);

        self.notify();
    }

    /// Run a name/symbol search and publish the results.
    pub async fn search(&self, query: &str) {
        match self.gateway.search_coins(query).await {
            Ok(results) => {
                let mut state = self.state.write().await;
                state.search_results = results;
            }
            Err(err) => {
                warn!(query = %query, error = %err, "coin search failed");
                let mut state = self.state.write().await;
                state.search_results.clear();
                state.error = Some(format!("search failed: {}", err));
            }
        }

        self.notify();
    }

    pub async fn search_results(&self) -> Vec<Coin> {
        self.state.read().await.search_results.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    /// The current user-visible error message, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Dismiss and return the current error message.
    pub async fn take_error(&self) -> Option<String> {
        let message = self.state.write().await.error.take();
        if message.is_some() {
            self.notify();
        }
        message
    }

    async fn record_error(&self, message: String) {
        warn!(message = %message);
        self.state.write().await.error = Some(message);
        self.notify();
    }
}

fn collect_branch(
    error_slot: &mut Option<String>,
    result: Result<Vec<Coin>, Error>,
    what: &str,
) -> Vec<Coin> {
    match result {
        Ok(coins) => coins,
        Err(err) => {
            warn!(what = %what, error = %err, "fetch failed");
            *error_slot = Some(format!("failed to load {}: {}", what, err));
            Vec::new()
        }
    }
}

/// Concatenate and deduplicate by id, first occurrence wins.
fn merge_by_id(top: &[Coin], tracked: &[Coin]) -> Vec<Coin> {
    let mut seen = HashSet::with_capacity(top.len() + tracked.len());
    top.iter()
        .chain(tracked.iter())
        .filter(|coin| seen.insert(coin.id.clone()))
        .cloned()
        .collect()
}
