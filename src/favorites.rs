use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use crate::gateway::{Coin, Currency, MarketDataGateway};
use crate::store::CoinStore;

#[derive(Debug)]
struct FavoritesState {
    coins: Vec<Coin>,
    currency: Currency,
    error: Option<String>,
}

/// The user's favorite coins: a persisted id set plus the in-memory
/// collection the UI observes.
///
/// Favorite status is independent of tracked status; the two sets share the
/// store but nothing else.
pub struct Favorites {
    gateway: Arc<dyn MarketDataGateway>,
    store: Arc<CoinStore>,
    state: RwLock<FavoritesState>,
    version: watch::Sender<u64>,
}

impl Favorites {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        store: Arc<CoinStore>,
        currency: Currency,
    ) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            gateway,
            store,
            state: RwLock::new(FavoritesState {
                coins: Vec::new(),
                currency,
                error: None,
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

    /// Flip a coin's favorite status.
    ///
    /// Removal drops the persisted record and the in-memory entry. Addition
    /// persists the id, then appends the matching coin from the supplied
    /// collection -- or, when the coin is not in it, fetches its details so
    /// the new favorite is visible without waiting for the next full load.
    pub async fn toggle(&self, coin: &Coin, current: &[Coin]) {
        let persisted = match self.store.contains_favorite(&coin.id) {
            Ok(persisted) => persisted,
            Err(err) => {
                self.record_error(format!("failed to read favorites: {}", err))
                    .await;
                return;
            }
        };

        if persisted {
            if let Err(err) = self.store.remove_favorite(&coin.id) {
                self.record_error(format!(
                    "failed to remove favorite '{}': {}",
                    coin.id, err
                ))
                .await;
                return;
            }

            self.state
                .write()
                .await
                .coins
                .retain(|c| c.id != coin.id);
            debug!(id = %coin.id, "removed from favorites");
            self.notify();
            return;
        }

        if let Err(err) = self.store.add_favorite(&coin.id) {
            self.record_error(format!("failed to save favorite '{}': {}", coin.id, err))
                .await;
            return;
        }

        let resolved = match current.iter().find(|c| c.id == coin.id) {
            Some(found) => Some(found.clone()),
            None => {
                debug!(id = %coin.id, "favorite not in supplied collection, fetching details");
                let currency = self.state.read().await.currency;
                match self
                    .gateway
                    .coin_details(&[coin.id.clone()], currency)
                    .await
                {
                    Ok(mut coins) if !coins.is_empty() => Some(coins.remove(0)),
                    Ok(_) => {
                        warn!(id = %coin.id, "no market data returned for favorite");
                        self.record_error(format!(
                            "no market data available for favorite '{}'",
                            coin.id
                        ))
                        .await;
                        None
                    }
                    Err(err) => {
                        self.record_error(format!(
                            "failed to load details for favorite '{}': {}",
                            coin.id, err
                        ))
                        .await;
                        None
                    }
                }
            }
        };

        if let Some(resolved) = resolved {
            let mut state = self.state.write().await;
            if !state.coins.iter().any(|c| c.id == resolved.id) {
                state.coins.push(resolved);
            }
            drop(state);
            debug!(id = %coin.id, "added to favorites");
            self.notify();
        }
    }

    /// Load the favorite collection from the persisted id set.
    ///
    /// An empty set clears the collection without network I/O; otherwise all
    /// favorite ids are fetched in one batched call.
    pub async fn load(&self) {
        let ids = match self.store.favorite_ids() {
            Ok(ids) => ids,
            Err(err) => {
                self.record_error(format!("failed to read favorites: {}", err))
                    .await;
                return;
            }
        };

        if ids.is_empty() {
            self.state.write().await.coins.clear();
            self.notify();
            return;
        }

        let currency = self.state.read().await.currency;
        match self.gateway.coin_details(&ids, currency).await {
            Ok(coins) => {
                self.state.write().await.coins = coins;
                self.notify();
            }
            Err(err) => {
                self.record_error(format!("failed to load favorites: {}", err))
                    .await;
            }
        }
    }

    /// Recompute the favorite collection by filtering the supplied coins
    /// against the persisted id set. No network I/O.
    pub async fn refresh_from(&self, current: &[Coin]) {
        let ids = match self.store.favorite_ids() {
            Ok(ids) => ids,
            Err(err) => {
                self.record_error(format!("failed to read favorites: {}", err))
                    .await;
                return;
            }
        };

        let ids: HashSet<String> = ids.into_iter().collect();
        let refreshed: Vec<Coin> = current
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();

        self.state.write().await.coins = refreshed;
        self.notify();
    }

    /// Persist a favorite and append it to the collection.
    pub async fn add(&self, coin: &Coin) {
        if let Err(err) = self.store.add_favorite(&coin.id) {
            self.record_error(format!("failed to save favorite '{}': {}", coin.id, err))
                .await;
            return;
        }

        let mut state = self.state.write().await;
        if !state.coins.iter().any(|c| c.id == coin.id) {
            state.coins.push(coin.clone());
        }
        drop(state);

        debug!(id = %coin.id, "added to favorites");
        self.notify();
    }

    /// Remove a favorite from the store and the collection.
    pub async fn remove(&self, coin: &Coin) {
        if let Err(err) = self.store.remove_favorite(&coin.id) {
            self.record_error(format!(
                "failed to remove favorite '{}': {}",
                coin.id, err
            ))
            .await;
            return;
        }

        self.state
            .write()
            .await
            .coins
            .retain(|c| c.id != coin.id);
        debug!(id = %coin.id, "removed from favorites");
        self.notify();
    }

    /// Whether the id is in the in-memory favorite collection.
    pub async fn is_favorite(&self, id: &str) -> bool {
        self.state.read().await.coins.iter().any(|c| c.id == id)
    }

    pub async fn coins(&self) -> Vec<Coin> {
        self.state.read().await.coins.clone()
    }

    pub async fn set_currency(&self, currency: Currency) {
        self.state.write().await.currency = currency;
    }

    pub async fn currency(&self) -> Currency {
        self.state.read().await.currency
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
