// ============================================================================
// Structure : WatchTarget
// ============================================================================
// Identifie ce qu'une session de synchronisation observe : un coin, et
// optionnellement un pool on-chain pour les chandelles et les trades.
//
// CONCEPTS RUST :
// 1. Option<String> : le pool est facultatif
// 2. PartialEq/Eq : comparer deux cibles pour éviter les timers en double
// ============================================================================

use serde::{Deserialize, Serialize};

/// Granularité "live" demandée par l'interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveInterval {
    /// Une seconde
    #[serde(rename = "1s")]
    OneSecond,
    /// Une minute
    #[serde(rename = "1m")]
    OneMinute,
}

impl LiveInterval {
    /// Label court pour l'affichage
    pub fn label(&self) -> &'static str {
        match self {
            LiveInterval::OneSecond => "1s",
            LiveInterval::OneMinute => "1m",
        }
    }

    /// Paramètres (timeframe, aggregate) de l'endpoint OHLCV on-chain
    ///
    /// L'API démo ne sert pas de granularité à la seconde : la minute est le
    /// minimum disponible, donc les deux intervalles donnent ("minute", 1).
    pub fn ohlcv_params(&self) -> (&'static str, u32) {
        match self {
            LiveInterval::OneSecond | LiveInterval::OneMinute => ("minute", 1),
        }
    }
}

/// Cible observée par une session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Identifiant CoinGecko du coin (ex: "bitcoin")
    pub coin_id: String,

    /// Pool au format "network:address" ou "network_address"
    pub pool_id: Option<String>,

    /// Granularité live (None = valeur par défaut de l'API)
    pub live_interval: Option<LiveInterval>,
}

impl WatchTarget {
    /// Cible sans pool : seul le prix sera suivi
    pub fn coin(coin_id: impl Into<String>) -> Self {
        Self {
            coin_id: coin_id.into(),
            pool_id: None,
            live_interval: None,
        }
    }

    /// Cible avec pool : prix, chandelle et trades
    pub fn with_pool(coin_id: impl Into<String>, pool_id: impl Into<String>) -> Self {
        Self {
            coin_id: coin_id.into(),
            pool_id: Some(pool_id.into()),
            live_interval: None,
        }
    }

    /// Builder : fixe l'intervalle live
    pub fn live(mut self, interval: LiveInterval) -> Self {
        self.live_interval = Some(interval);
        self
    }

    /// Retourne le pool s'il est renseigné (une chaîne vide compte comme absent)
    pub fn pool_id(&self) -> Option<&str> {
        self.pool_id.as_deref().filter(|p| !p.is_empty())
    }

    /// Vrai si la cible a un coin à suivre
    pub fn is_active(&self) -> bool {
        !self.coin_id.is_empty()
    }

    /// Même sujet observé (coin + pool) : seul l'intervalle peut différer
    ///
    /// Un changement de sujet impose un reset complet de l'état, un changement
    /// d'intervalle seul ne fait que relancer les timers.
    pub fn same_subject(&self, other: &WatchTarget) -> bool {
        self.coin_id == other.coin_id && self.pool_id() == other.pool_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_counts_as_absent() {
        let target = WatchTarget::with_pool("bitcoin", "");
        assert_eq!(target.pool_id(), None);
        assert!(target.same_subject(&WatchTarget::coin("bitcoin")));
    }

    #[test]
    fn test_same_subject_ignores_interval() {
        let a = WatchTarget::with_pool("bitcoin", "eth:0xabc");
        let b = a.clone().live(LiveInterval::OneSecond);
        assert!(a.same_subject(&b));
        assert_ne!(a, b);
        assert!(!a.same_subject(&WatchTarget::with_pool("ethereum", "eth:0xabc")));
    }

    #[test]
    fn test_ohlcv_params_fall_back_to_minute() {
        assert_eq!(LiveInterval::OneSecond.ohlcv_params(), ("minute", 1));
        assert_eq!(LiveInterval::OneMinute.ohlcv_params(), ("minute", 1));
    }
}
