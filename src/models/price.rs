// ============================================================================
// Structure : PriceSnapshot
// ============================================================================
// Dernier prix connu d'un coin, tel que renvoyé par /simple/price
// ============================================================================

use serde::{Deserialize, Serialize};

/// Instantané de prix d'un coin (en USD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Identifiant du coin (ex: "bitcoin")
    pub coin: String,

    /// Prix actuel en USD
    pub price: f64,

    /// Variation sur 24h en pourcentage
    pub change_24h: Option<f64>,

    /// Capitalisation en USD
    pub market_cap: Option<f64>,

    /// Volume 24h en USD
    pub volume_24h: Option<f64>,

    /// Date de mise à jour (epoch en millisecondes)
    pub timestamp: i64,
}

impl PriceSnapshot {
    /// Vrai si le coin est en hausse sur 24h
    pub fn is_positive(&self) -> bool {
        self.change_24h.map(|c| c >= 0.0).unwrap_or(false)
    }

    /// Formatte la variation avec flèche, ex: "▲ +2.30%"
    pub fn change_label(&self) -> String {
        match self.change_24h {
            Some(change) => {
                let arrow = if change >= 0.0 { "▲" } else { "▼" };
                format!("{} {:+.2}%", arrow, change)
            }
            None => String::new(),
        }
    }
}
