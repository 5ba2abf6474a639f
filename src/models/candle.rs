// ============================================================================
// Structure : Candle
// ============================================================================
// Une chandelle OHLC : [timestamp_ms, open, high, low, close]
//
// Le volume renvoyé par l'API on-chain est volontairement ignoré : il ne fait
// pas partie du contrat exposé à l'interface.
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chandelle japonaise (sans volume)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 5]", into = "[f64; 5]")]
pub struct Candle {
    /// Début de la période (epoch en millisecondes)
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp_ms,
            open,
            high,
            low,
            close,
        }
    }

    /// Représentation tuple fixe à 5 éléments
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.timestamp_ms as f64,
            self.open,
            self.high,
            self.low,
            self.close,
        ]
    }

    /// Timestamp converti en DateTime (None si hors plage)
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Vérifie si la chandelle est haussière
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Variation en pourcentage depuis l'ouverture
    pub fn change_percent(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            ((self.close - self.open) / self.open) * 100.0
        }
    }
}

impl From<[f64; 5]> for Candle {
    fn from(raw: [f64; 5]) -> Self {
        Candle::new(raw[0] as i64, raw[1], raw[2], raw[3], raw[4])
    }
}

impl From<Candle> for [f64; 5] {
    fn from(candle: Candle) -> Self {
        candle.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_five_tuple() {
        let candle = Candle::new(1_700_000_000_000, 100.0, 110.0, 95.0, 105.0);
        let json = serde_json::to_value(candle).unwrap();
        assert_eq!(json, serde_json::json!([1_700_000_000_000.0, 100.0, 110.0, 95.0, 105.0]));
    }

    #[test]
    fn test_change_percent() {
        let candle = Candle::new(0, 100.0, 110.0, 95.0, 105.0);
        assert!(candle.is_bullish());
        assert_eq!(candle.change_percent(), 5.0);
        assert_eq!(Candle::new(0, 0.0, 1.0, 0.0, 1.0).change_percent(), 0.0);
    }
}
