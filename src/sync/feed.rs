// ============================================================================
// Feeds et machine à états
// ============================================================================
// Trois flux indépendants sont pollés : prix, chandelle, trades.
// Chaque flux a sa propre phase :
//
//   Idle ──start──▶ Polling ──429──▶ RateLimited { until }
//    ▲                 ▲                    │
//    │                 └──tick après until──┘
//    └────────────── stop (changement de cible / teardown)
//
// CONCEPT RUST : Enum pour state machine
// - Les transitions autorisées sont des méthodes, pas des booléens épars
// - Le cooldown est porté par la phase elle-même (deadline)
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

/// Flux de données pollé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// /simple/price
    Price,
    /// OHLCV on-chain du pool
    Candle,
    /// Trades on-chain du pool
    Trades,
}

impl Feed {
    pub const ALL: [Feed; 3] = [Feed::Price, Feed::Candle, Feed::Trades];

    pub fn label(&self) -> &'static str {
        match self {
            Feed::Price => "price",
            Feed::Candle => "candle",
            Feed::Trades => "trades",
        }
    }

    /// Vrai si le flux a besoin d'un pool
    pub fn needs_pool(&self) -> bool {
        !matches!(self, Feed::Price)
    }
}

/// Phase d'un flux
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedPhase {
    /// Aucun timer actif
    #[default]
    Idle,
    /// Timer actif, les ticks déclenchent des requêtes
    Polling,
    /// 429 reçu : les ticks sont ignorés jusqu'à `until`
    RateLimited { until: Instant },
}

impl FeedPhase {
    /// Idle -> Polling (un cooldown en cours est conservé)
    pub fn start(&mut self) {
        if *self == FeedPhase::Idle {
            *self = FeedPhase::Polling;
        }
    }

    /// Retour à Idle
    pub fn stop(&mut self) {
        *self = FeedPhase::Idle;
    }

    /// 429 : cooldown jusqu'à `now + cooldown`
    ///
    /// Sans effet sur un flux Idle. Retourne true si la phase a changé.
    pub fn rate_limit(&mut self, now: Instant, cooldown: Duration) -> bool {
        if *self == FeedPhase::Idle {
            return false;
        }
        *self = FeedPhase::RateLimited {
            until: now + cooldown,
        };
        true
    }

    /// Un tick peut-il lancer une requête ?
    ///
    /// Un cooldown expiré repasse en Polling et autorise la requête.
    pub fn admit(&mut self, now: Instant) -> bool {
        match *self {
            FeedPhase::Idle => false,
            FeedPhase::Polling => true,
            FeedPhase::RateLimited { until } if now >= until => {
                *self = FeedPhase::Polling;
                true
            }
            FeedPhase::RateLimited { .. } => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedPhase::RateLimited { .. })
    }

    /// Temps de cooldown restant
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            FeedPhase::RateLimited { until } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedPhase::Idle => "idle",
            FeedPhase::Polling => "polling",
            FeedPhase::RateLimited { .. } => "rate-limited",
        }
    }
}

/// Phases des trois flux d'une session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedPhases {
    pub price: FeedPhase,
    pub candle: FeedPhase,
    pub trades: FeedPhase,
}

impl FeedPhases {
    pub fn get(&self, feed: Feed) -> FeedPhase {
        match feed {
            Feed::Price => self.price,
            Feed::Candle => self.candle,
            Feed::Trades => self.trades,
        }
    }

    pub fn get_mut(&mut self, feed: Feed) -> &mut FeedPhase {
        match feed {
            Feed::Price => &mut self.price,
            Feed::Candle => &mut self.candle,
            Feed::Trades => &mut self.trades,
        }
    }

    /// Vrai si au moins un flux est en cooldown
    pub fn any_rate_limited(&self) -> bool {
        Feed::ALL.iter().any(|feed| self.get(*feed).is_rate_limited())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn test_idle_never_admits() {
        let mut phase = FeedPhase::Idle;
        assert!(!phase.admit(Instant::now()));
        assert!(!phase.rate_limit(Instant::now(), COOLDOWN));
        assert_eq!(phase, FeedPhase::Idle);
    }

    #[test]
    fn test_cooldown_cycle() {
        let t0 = Instant::now();
        let mut phase = FeedPhase::Idle;
        phase.start();
        assert!(phase.admit(t0));

        assert!(phase.rate_limit(t0, COOLDOWN));
        assert!(phase.is_rate_limited());
        assert!(!phase.admit(t0 + Duration::from_secs(30)));
        assert!(!phase.admit(t0 + Duration::from_secs(59)));
        assert_eq!(
            phase.cooldown_remaining(t0 + Duration::from_secs(45)),
            Some(Duration::from_secs(15))
        );

        // Deadline atteinte : retour en Polling
        assert!(phase.admit(t0 + COOLDOWN));
        assert_eq!(phase, FeedPhase::Polling);
    }

    #[test]
    fn test_start_keeps_running_cooldown() {
        let t0 = Instant::now();
        let mut phase = FeedPhase::Polling;
        phase.rate_limit(t0, COOLDOWN);
        phase.start();
        assert!(phase.is_rate_limited());

        phase.stop();
        assert_eq!(phase, FeedPhase::Idle);
    }

    #[test]
    fn test_phases_are_independent() {
        let mut phases = FeedPhases::default();
        for feed in Feed::ALL {
            phases.get_mut(feed).start();
        }
        phases.get_mut(Feed::Candle).rate_limit(Instant::now(), COOLDOWN);

        assert!(phases.any_rate_limited());
        assert_eq!(phases.get(Feed::Price), FeedPhase::Polling);
        assert_eq!(phases.get(Feed::Trades), FeedPhase::Polling);
        assert!(phases.candle.is_rate_limited());
    }
}
