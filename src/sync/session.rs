// ============================================================================
// SyncCore : contrôleur de session de synchronisation
// ============================================================================
// Possède la session courante (timers + état) et la remplace quand la cible
// observée change.
//
// CONCEPTS RUST :
// 1. tokio::sync::watch : un seul écrivain logique (les tâches de fetch via
//    send_if_modified), des lecteurs qui voient toujours la dernière valeur
// 2. Drop : abandonner une session coupe ses timers, sans appel explicite
// 3. Arc<AtomicBool> : drapeau de vie partagé avec les fetchs en vol
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::MarketSource;
use crate::models::{Candle, PriceSnapshot, Trade, WatchTarget};
use crate::sync::feed::{Feed, FeedPhase};
use crate::sync::poll::FeedContext;
use crate::sync::SessionState;

/// Cadence par défaut de chaque flux
pub const DEFAULT_POLL_EVERY: Duration = Duration::from_secs(60);

/// Durée par défaut de la pause après un 429
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration du polling
// ============================================================================

/// Cadences de polling et cooldown de rate limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub price_every: Duration,
    pub candle_every: Duration,
    pub trades_every: Duration,
    /// Pause d'un flux après un HTTP 429
    pub rate_limit_cooldown: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            price_every: DEFAULT_POLL_EVERY,
            candle_every: DEFAULT_POLL_EVERY,
            trades_every: DEFAULT_POLL_EVERY,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

impl PollConfig {
    /// Même cadence pour les trois flux
    pub fn every(period: Duration) -> Self {
        Self {
            price_every: period,
            candle_every: period,
            trades_every: period,
            ..Self::default()
        }
    }

    /// Cadence d'un flux
    pub fn period(&self, feed: Feed) -> Duration {
        match feed {
            Feed::Price => self.price_every,
            Feed::Candle => self.candle_every,
            Feed::Trades => self.trades_every,
        }
    }
}

// ============================================================================
// Session en cours
// ============================================================================

/// Timers d'une session active
///
/// Le drop coupe la session : le drapeau de vie passe à false (les fetchs en
/// vol ne pourront plus écrire) puis les timers sont annulés.
struct RunningSession {
    alive: Arc<AtomicBool>,
    timers: Vec<JoinHandle<()>>,
}

impl Drop for RunningSession {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        for timer in &self.timers {
            timer.abort();
        }
    }
}

// ============================================================================
// SyncCore
// ============================================================================

/// Contrôleur de synchronisation temps réel
pub struct SyncCore<S: MarketSource + 'static> {
    source: Arc<S>,
    config: PollConfig,
    state: Arc<watch::Sender<SessionState>>,
    observed: Option<WatchTarget>,
    running: Option<RunningSession>,
}

impl<S: MarketSource + 'static> SyncCore<S> {
    pub fn new(source: Arc<S>, config: PollConfig) -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self {
            source,
            config,
            state: Arc::new(tx),
            observed: None,
            running: None,
        }
    }

    /// Observe `target` et retourne un handle sur l'état de la session
    ///
    /// - Même cible qu'avant : rien ne change (pas de timers en double)
    /// - Même coin et même pool, autre intervalle : timers relancés, état conservé
    /// - Autre cible : teardown, état remis à zéro, nouvelle session
    ///
    /// Un coin vide laisse la session inactive.
    pub fn observe(&mut self, target: WatchTarget) -> SessionHandle {
        match &self.observed {
            Some(current) if *current == target => {
                debug!(coin = %target.coin_id, "Target unchanged, keeping session");
            }
            Some(current) if current.same_subject(&target) => {
                info!(
                    coin = %target.coin_id,
                    interval = target.live_interval.map(|i| i.label()).unwrap_or("default"),
                    "Live interval changed, restarting timers"
                );
                self.running = None;
                self.start(target);
            }
            _ => {
                self.teardown();
                info!(
                    coin = %target.coin_id,
                    pool = target.pool_id().unwrap_or("-"),
                    "Observing new target"
                );
                self.start(target);
            }
        }

        self.handle()
    }

    /// Arrête la session : timers coupés, état remis à zéro
    pub fn stop(&mut self) {
        if self.running.is_some() || self.observed.is_some() {
            info!("Stopping sync session");
        }
        self.teardown();
    }

    /// Nouveau handle sur l'état courant
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.state.subscribe(),
        }
    }

    /// Vrai si des timers tournent
    pub fn is_polling(&self) -> bool {
        self.running.is_some()
    }

    /// Nombre de timers actifs
    pub fn timer_count(&self) -> usize {
        self.running.as_ref().map(|r| r.timers.len()).unwrap_or(0)
    }

    fn teardown(&mut self) {
        // Drop de la session avant le reset : plus aucun fetch ne peut écrire
        self.running = None;
        self.observed = None;
        self.state.send_modify(SessionState::reset);
    }

    fn start(&mut self, target: WatchTarget) {
        self.observed = Some(target.clone());

        if !target.is_active() {
            debug!("Empty coin id, session stays idle");
            self.state.send_modify(|state| state.target = Some(target));
            return;
        }

        let feeds: Vec<Feed> = Feed::ALL
            .into_iter()
            .filter(|feed| !feed.needs_pool() || target.pool_id().is_some())
            .collect();

        self.state.send_modify(|state| {
            state.target = Some(target.clone());
            for feed in Feed::ALL {
                let phase = state.feeds.get_mut(feed);
                if feeds.contains(&feed) {
                    phase.start();
                } else {
                    phase.stop();
                }
            }
        });

        let alive = Arc::new(AtomicBool::new(true));
        let ctx = FeedContext {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            target,
            config: self.config.clone(),
            alive: Arc::clone(&alive),
        };
        let timers = feeds.iter().map(|feed| ctx.spawn_timer(*feed)).collect();

        self.running = Some(RunningSession { alive, timers });
    }
}

// ============================================================================
// SessionHandle : vue lecture seule de l'état
// ============================================================================

/// Accès en lecture à l'état de la session
///
/// Clonable à volonté ; reste valide après un changement de cible (il voit
/// simplement le nouvel état).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Copie de l'état courant
    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Copie de l'état courant, marqué comme vu
    pub fn latest(&mut self) -> SessionState {
        self.rx.borrow_and_update().clone()
    }

    pub fn price(&self) -> Option<PriceSnapshot> {
        self.rx.borrow().price.clone()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.rx.borrow().trades.clone()
    }

    pub fn ohlcv(&self) -> Option<Candle> {
        self.rx.borrow().ohlcv
    }

    pub fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected
    }

    pub fn phase(&self, feed: Feed) -> FeedPhase {
        self.rx.borrow().feeds.get(feed)
    }

    /// Vrai si l'état a changé depuis le dernier `latest`
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Attend le prochain changement ; false si le SyncCore a disparu
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
// Horloge tokio en pause : les timers avancent instantanément et de façon
// déterministe. La source est un mock scripté par flux.
// ============================================================================
