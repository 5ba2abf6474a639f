// ============================================================================
// SessionState : état fusionné d'une session
// ============================================================================
// Contient la dernière valeur connue de chaque flux. Politique de fusion :
// last-write-wins, chaque réponse remplace la valeur précédente.
// ============================================================================

use crate::models::{Candle, PriceSnapshot, Trade, WatchTarget, MAX_TRADES};
use crate::sync::feed::FeedPhases;

/// État observable d'une session de synchronisation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Cible observée (None avant le premier observe)
    pub target: Option<WatchTarget>,

    /// Dernier prix reçu
    pub price: Option<PriceSnapshot>,

    /// Derniers trades (0..=7), le plus récent d'abord
    pub trades: Vec<Trade>,

    /// Dernière chandelle
    pub ohlcv: Option<Candle>,

    /// Vrai dès le premier prix reçu, jusqu'au prochain reset
    pub is_connected: bool,

    /// Phase de chaque flux (dont cooldown de rate limit)
    pub feeds: FeedPhases,
}

impl SessionState {
    /// Vide toutes les données et repasse les flux en Idle
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }

    /// Nouveau prix ; le premier passe la session en "connectée"
    pub fn apply_price(&mut self, snapshot: PriceSnapshot) {
        self.price = Some(snapshot);
        self.is_connected = true;
    }

    pub fn apply_candle(&mut self, candle: Candle) {
        self.ohlcv = Some(candle);
    }

    /// Remplace la liste de trades par le nouveau lot
    ///
    /// Un lot vide ne remplace rien : les derniers trades connus restent
    /// affichés. Retourne true si la liste a changé.
    pub fn apply_trades(&mut self, mut trades: Vec<Trade>) -> bool {
        if trades.is_empty() {
            return false;
        }
        trades.truncate(MAX_TRADES);
        self.trades = trades;
        true
    }

    /// Vrai si aucune donnée n'a encore été reçue
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.ohlcv.is_none() && self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeKind;
    use crate::sync::feed::FeedPhase;

    fn trade(amount: f64) -> Trade {
        Trade {
            price: 1.0,
            value: amount,
            timestamp: 0,
            kind: TradeKind::Buy,
            amount,
        }
    }

    #[test]
    fn test_trades_are_replaced() {
        let mut state = SessionState::default();
        assert!(state.apply_trades(vec![trade(1.0), trade(2.0), trade(3.0)]));
        assert!(state.apply_trades(vec![trade(9.0)]));
        assert_eq!(state.trades, vec![trade(9.0)]);

        // Lot vide : on garde l'existant
        assert!(!state.apply_trades(Vec::new()));
        assert_eq!(state.trades.len(), 1);

        // Jamais plus de 7
        assert!(state.apply_trades((0..12).map(|i| trade(i as f64)).collect()));
        assert_eq!(state.trades.len(), MAX_TRADES);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SessionState::default();
        state.apply_price(PriceSnapshot {
            coin: "bitcoin".to_string(),
            price: 65000.0,
            change_24h: Some(2.3),
            market_cap: None,
            volume_24h: None,
            timestamp: 0,
        });
        state.apply_candle(Candle::new(0, 1.0, 2.0, 0.5, 1.5));
        state.feeds.price.start();
        assert!(state.is_connected);

        state.reset();
        assert!(state.is_empty());
        assert!(!state.is_connected);
        assert_eq!(state.feeds.price, FeedPhase::Idle);
    }
}
