// ============================================================================
// Structure : Trade
// ============================================================================
// Un trade DEX issu de l'endpoint on-chain /pools/{address}/trades
// ============================================================================

use serde::{Deserialize, Serialize};

/// Nombre maximum de trades conservés par session
pub const MAX_TRADES: usize = 7;

/// Sens du trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
}

impl TradeKind {
    pub fn label(&self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
        }
    }
}

/// Trade exécuté sur un pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Prix unitaire en USD
    pub price: f64,
    /// Valeur totale en USD
    pub value: f64,
    /// Horodatage du bloc (epoch en millisecondes)
    pub timestamp: i64,
    /// Achat ou vente
    #[serde(rename = "type")]
    pub kind: TradeKind,
    /// Quantité de tokens échangés
    pub amount: f64,
}
