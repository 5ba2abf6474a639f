// ============================================================================
// Polling d'un flux
// ============================================================================
// Un timer par flux. À chaque tick :
// 1. Si la session est morte, le timer s'arrête
// 2. Si le flux est en cooldown, le tick est ignoré
// 3. Sinon une tâche de fetch indépendante est lancée (un fetch lent ne
//    retarde pas le tick suivant)
//
// Toute écriture dans l'état passe par `commit`, qui relit le drapeau de vie
// de la session sous le verrou du channel watch : une réponse arrivée après
// un changement de cible ou un teardown est jetée.
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::transform;
use crate::api::{MarketSource, Query};
use crate::models::{LiveInterval, PoolId, WatchTarget};
use crate::sync::feed::Feed;
use crate::sync::{PollConfig, SessionState};

/// Période minimale d'un timer (tokio refuse un intervalle nul)
const MIN_PERIOD: Duration = Duration::from_millis(100);

/// Tout ce dont un timer a besoin, partagé par ses tâches de fetch
///
/// CONCEPT RUST : Clone manuel
/// - #[derive(Clone)] exigerait S: Clone alors qu'on ne clone que l'Arc
pub(crate) struct FeedContext<S: MarketSource + 'static> {
    pub source: Arc<S>,
    pub state: Arc<watch::Sender<SessionState>>,
    pub target: WatchTarget,
    pub config: PollConfig,
    pub alive: Arc<AtomicBool>,
}

impl<S: MarketSource + 'static> Clone for FeedContext<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            target: self.target.clone(),
            config: self.config.clone(),
            alive: Arc::clone(&self.alive),
        }
    }
}

impl<S: MarketSource + 'static> FeedContext<S> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Lance le timer d'un flux ; le premier tick part immédiatement
    pub fn spawn_timer(&self, feed: Feed) -> JoinHandle<()> {
        let ctx = self.clone();
        let period = self.config.period(feed).max(MIN_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !ctx.is_alive() {
                    break;
                }
                if !ctx.admit(feed) {
                    debug!(feed = feed.label(), "Tick skipped, feed is cooling down");
                    continue;
                }

                let cycle = ctx.clone();
                tokio::spawn(async move { cycle.run_cycle(feed).await });
            }

            debug!(feed = feed.label(), "Feed timer stopped");
        })
    }

    /// Demande à la phase du flux si le tick peut partir
    fn admit(&self, feed: Feed) -> bool {
        let now = Instant::now();
        let alive = &self.alive;
        let mut admitted = false;
        self.state.send_if_modified(|state| {
            if !alive.load(Ordering::SeqCst) {
                return false;
            }
            let phase = state.feeds.get_mut(feed);
            let before = *phase;
            admitted = phase.admit(now);
            *phase != before
        });
        admitted
    }

    /// Applique `apply` à l'état si la session est toujours vivante
    ///
    /// Retourne false si la mise à jour a été jetée.
    fn commit<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        let alive = &self.alive;
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if !alive.load(Ordering::SeqCst) {
                return false;
            }
            apply(state);
            applied = true;
            true
        });
        applied
    }

    /// Un cycle : requête, transformation, fusion
    async fn run_cycle(&self, feed: Feed) {
        match feed {
            Feed::Price => self.poll_price().await,
            Feed::Candle => self.poll_candle().await,
            Feed::Trades => self.poll_trades().await,
        }
    }

    /// GET via la source ; gère le 429 et journalise les autres erreurs
    async fn fetch(&self, feed: Feed, endpoint: &str, query: &Query) -> Option<Value> {
        match self.source.fetch_json(endpoint, query, 0).await {
            Ok(value) => Some(value),
            Err(e) if e.is_rate_limited() => {
                let cooldown = self.config.rate_limit_cooldown;
                let now = Instant::now();
                if self.commit(|state| {
                    state.feeds.get_mut(feed).rate_limit(now, cooldown);
                }) {
                    warn!(
                        feed = feed.label(),
                        cooldown_secs = cooldown.as_secs(),
                        "Rate limited, pausing feed"
                    );
                }
                None
            }
            Err(e) => {
                warn!(
                    feed = feed.label(),
                    endpoint = %endpoint,
                    status = ?e.status(),
                    error = %e,
                    "Poll failed"
                );
                None
            }
        }
    }

    /// Pool de la cible, parsé à chaque cycle
    fn pool(&self, feed: Feed) -> Option<PoolId> {
        let raw = self.target.pool_id()?;
        match PoolId::parse(raw) {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(feed = feed.label(), error = %e, "Skipping on-chain poll");
                None
            }
        }
    }

    async fn poll_price(&self) {
        let coin_id = self.target.coin_id.as_str();
        let query = price_query(coin_id);

        let Some(payload) = self.fetch(Feed::Price, "simple/price", &query).await else {
            return;
        };

        let Some(snapshot) = transform::price_snapshot(coin_id, &payload, Utc::now().timestamp_millis())
        else {
            debug!(coin = %coin_id, "Coin missing from price payload");
            return;
        };

        let price = snapshot.price;
        let mut first = false;
        if self.commit(|state| {
            first = !state.is_connected;
            state.apply_price(snapshot);
        }) {
            if first {
                info!(coin = %coin_id, price, "Session connected");
            } else {
                debug!(coin = %coin_id, price, "Price updated");
            }
        }
    }

    async fn poll_candle(&self) {
        let Some(pool) = self.pool(Feed::Candle) else {
            return;
        };
        let interval = self.target.live_interval.unwrap_or(LiveInterval::OneMinute);
        let (timeframe, aggregate) = interval.ohlcv_params();
        let endpoint = format!("{}/ohlcv/{}", pool.endpoint(), timeframe);
        let query = Query::new()
            .param("aggregate", aggregate)
            .param("currency", "usd")
            .param("limit", 1);

        let Some(payload) = self.fetch(Feed::Candle, &endpoint, &query).await else {
            return;
        };
        let Some(candle) = transform::latest_candle(&payload) else {
            debug!(pool = %pool, "No candle in payload");
            return;
        };

        if self.commit(|state| state.apply_candle(candle)) {
            debug!(pool = %pool, close = candle.close, "Candle updated");
        }
    }

    async fn poll_trades(&self) {
        let Some(pool) = self.pool(Feed::Trades) else {
            return;
        };
        let endpoint = format!("{}/trades", pool.endpoint());
        let query = Query::new().param("trade_volume_in_usd_greater_than", 0);

        let Some(payload) = self.fetch(Feed::Trades, &endpoint, &query).await else {
            return;
        };
        let trades = transform::recent_trades(&payload);
        let count = trades.len();

        let mut replaced = false;
        if self.commit(|state| replaced = state.apply_trades(trades)) && replaced {
            debug!(pool = %pool, count, "Trades updated");
        }
    }
}

/// Query de /simple/price pour un coin
pub(crate) fn price_query(coin_id: &str) -> Query {
    Query::new()
        .param("ids", coin_id)
        .param("vs_currencies", "usd")
        .param("include_24hr_change", "true")
        .param("include_market_cap", "true")
        .param("include_24hr_vol", "true")
        .param("include_last_updated_at", "true")
}
