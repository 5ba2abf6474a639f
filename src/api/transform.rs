// ============================================================================
// Transformers : JSON de l'API -> structures internes
// ============================================================================
// Fonctions pures (pas de réseau, pas d'effet de bord) et totales : une
// réponse inattendue donne None ou une liste vide, jamais une erreur.
//
// CONCEPT RUST : structures "wire" privées
// - Les structs Deserialize collent exactement au JSON de l'API
// - #[serde(default)] tolère les champs absents
// - Les conversions vers les modèles publics se font ici, une seule fois
// ============================================================================

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Candle, PriceSnapshot, Trade, TradeKind, MAX_TRADES};

// ============================================================================
// /simple/price
// ============================================================================

/// Entrée d'un coin dans la réponse /simple/price
#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
    /// Epoch en secondes, parfois envoyé en flottant
    last_updated_at: Option<f64>,
}

/// Convertit une réponse /simple/price en PriceSnapshot pour `coin_id`
///
/// Retourne None si le coin est absent de la réponse ou si elle est illisible.
/// `now_ms` sert d'horodatage quand l'API ne fournit pas `last_updated_at`.
pub fn price_snapshot(coin_id: &str, payload: &Value, now_ms: i64) -> Option<PriceSnapshot> {
    let entry = payload.get(coin_id)?;
    let entry: SimplePriceEntry = serde_json::from_value(entry.clone()).ok()?;

    Some(PriceSnapshot {
        coin: coin_id.to_string(),
        price: entry.usd.unwrap_or(0.0),
        change_24h: Some(entry.usd_24h_change.unwrap_or(0.0)),
        market_cap: entry.usd_market_cap,
        volume_24h: entry.usd_24h_vol,
        timestamp: entry
            .last_updated_at
            .filter(|secs| secs.is_finite())
            .map(|secs| (secs * 1000.0) as i64)
            .unwrap_or(now_ms),
    })
}

// ============================================================================
// /onchain/networks/{network}/pools/{address}/ohlcv/{timeframe}
// ============================================================================

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    /// [timestamp (s), open, high, low, close, volume]
    #[serde(default)]
    ohlcv_list: Vec<Vec<f64>>,
}

/// Extrait la chandelle la plus récente d'une réponse OHLCV on-chain
///
/// Le timestamp amont est en secondes, converti en millisecondes.
/// Le volume (6e valeur) est ignoré.
pub fn latest_candle(payload: &Value) -> Option<Candle> {
    let response: OhlcvResponse = serde_json::from_value(payload.clone()).ok()?;
    let latest = response.data.attributes.ohlcv_list.into_iter().next()?;

    match latest.as_slice() {
        [ts, open, high, low, close, ..] => {
            // Timestamp hors plage : chandelle ignorée
            let timestamp = (*ts as i64).checked_mul(1000)?;
            Some(Candle::new(timestamp, *open, *high, *low, *close))
        }
        _ => None,
    }
}

// ============================================================================
// /onchain/networks/{network}/pools/{address}/trades
// ============================================================================

#[derive(Debug, Deserialize)]
struct TradesResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TradeEntry {
    attributes: TradeAttributes,
}

/// Les montants arrivent sous forme de chaînes décimales
#[derive(Debug, Deserialize)]
struct TradeAttributes {
    #[serde(default)]
    from_token_amount: Option<String>,
    #[serde(default)]
    price_from_in_usd: Option<String>,
    #[serde(default)]
    volume_in_usd: Option<String>,
    #[serde(default)]
    block_timestamp: Option<String>,
    kind: TradeKind,
}

fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn parse_timestamp_ms(raw: Option<&str>) -> i64 {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .unwrap_or(0)
}

/// Convertit une réponse trades on-chain en au plus MAX_TRADES trades
///
/// L'ordre de l'API (le plus récent d'abord) est conservé.
///
/// CONCEPT RUST : décodage entrée par entrée
/// - Chaque trade est décodé seul avec filter_map
/// - Une entrée illisible (sens absent ou inconnu) est sautée, les autres restent
pub fn recent_trades(payload: &Value) -> Vec<Trade> {
    let Ok(response) = serde_json::from_value::<TradesResponse>(payload.clone()) else {
        return Vec::new();
    };

    response
        .data
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<TradeEntry>(entry).ok())
        .take(MAX_TRADES)
        .map(|entry| {
            let attrs = entry.attributes;
            Trade {
                price: parse_amount(attrs.price_from_in_usd.as_deref()),
                value: parse_amount(attrs.volume_in_usd.as_deref()),
                timestamp: parse_timestamp_ms(attrs.block_timestamp.as_deref()),
                kind: attrs.kind,
                amount: parse_amount(attrs.from_token_amount.as_deref()),
            }
        })
        .collect()
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_123_456;

    #[test]
    fn test_price_snapshot_defaults_timestamp_to_now() {
        let payload = json!({"bitcoin": {"usd": 65000, "usd_24h_change": 2.3}});
        let snapshot = price_snapshot("bitcoin", &payload, NOW).unwrap();

        assert_eq!(snapshot.coin, "bitcoin");
        assert_eq!(snapshot.price, 65000.0);
        assert_eq!(snapshot.change_24h, Some(2.3));
        assert_eq!(snapshot.market_cap, None);
        assert_eq!(snapshot.timestamp, NOW);
    }

    #[test]
    fn test_price_snapshot_full_payload() {
        let payload = json!({
            "ethereum": {
                "usd": 3200.5,
                "usd_market_cap": 385000000000.0,
                "usd_24h_vol": 12000000000.0,
                "last_updated_at": 1700000000
            }
        });
        let snapshot = price_snapshot("ethereum", &payload, NOW).unwrap();

        // Variation absente : 0 par défaut
        assert_eq!(snapshot.change_24h, Some(0.0));
        assert_eq!(snapshot.volume_24h, Some(12000000000.0));
        assert_eq!(snapshot.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_price_snapshot_missing_coin() {
        let payload = json!({"bitcoin": {"usd": 65000}});
        assert!(price_snapshot("ethereum", &payload, NOW).is_none());
        assert!(price_snapshot("bitcoin", &json!([]), NOW).is_none());
        assert!(price_snapshot("bitcoin", &json!({"bitcoin": "oops"}), NOW).is_none());
    }

    #[test]
    fn test_latest_candle_converts_seconds_and_drops_volume() {
        let payload = json!({
            "data": {
                "id": "x",
                "type": "ohlcv_request_response",
                "attributes": {"ohlcv_list": [[1700000000, 100, 110, 95, 105, 999]]}
            },
            "meta": {}
        });
        let candle = latest_candle(&payload).unwrap();
        assert_eq!(candle.to_array(), [1_700_000_000_000.0, 100.0, 110.0, 95.0, 105.0]);
    }

    #[test]
    fn test_latest_candle_empty_or_malformed() {
        let empty = json!({"data": {"attributes": {"ohlcv_list": []}}});
        assert!(latest_candle(&empty).is_none());

        let short = json!({"data": {"attributes": {"ohlcv_list": [[1700000000, 100]]}}});
        assert!(latest_candle(&short).is_none());

        assert!(latest_candle(&json!({"errors": []})).is_none());
    }

    #[test]
    fn test_latest_candle_out_of_range_timestamp() {
        let payload = json!({"data": {"attributes": {"ohlcv_list": [[1e17, 100, 110, 95, 105]]}}});
        assert!(latest_candle(&payload).is_none());
    }

    #[test]
    fn test_price_snapshot_float_timestamp() {
        let payload = json!({"bitcoin": {"usd": 65000, "last_updated_at": 1700000000.5}});
        let snapshot = price_snapshot("bitcoin", &payload, NOW).unwrap();
        assert_eq!(snapshot.timestamp, 1_700_000_000_500);
    }

    fn trade_json(i: usize, kind: &str) -> Value {
        json!({
            "id": format!("t{i}"),
            "type": "trade",
            "attributes": {
                "block_number": 100 + i,
                "tx_hash": format!("0x{i}"),
                "from_token_amount": format!("{}.5", i),
                "to_token_amount": "1",
                "price_from_in_usd": "65000.25",
                "price_to_in_usd": "1",
                "block_timestamp": "2024-01-01T00:00:00Z",
                "kind": kind,
                "volume_in_usd": "1200"
            }
        })
    }

    #[test]
    fn test_recent_trades_caps_and_preserves_order() {
        let data: Vec<Value> = (0..10)
            .map(|i| trade_json(i, if i % 2 == 0 { "buy" } else { "sell" }))
            .collect();
        let trades = recent_trades(&json!({ "data": data }));

        assert_eq!(trades.len(), MAX_TRADES);
        assert_eq!(trades[0].amount, 0.5);
        assert_eq!(trades[6].amount, 6.5);
        assert_eq!(trades[0].kind, TradeKind::Buy);
        assert_eq!(trades[1].kind, TradeKind::Sell);
        assert_eq!(trades[0].price, 65000.25);
        assert_eq!(trades[0].value, 1200.0);
        assert_eq!(trades[0].timestamp, 1_704_067_200_000);
    }

    #[test]
    fn test_recent_trades_tolerates_bad_numbers() {
        let payload = json!({"data": [{
            "attributes": {
                "from_token_amount": "n/a",
                "block_timestamp": "yesterday",
                "kind": "sell"
            }
        }]});
        let trades = recent_trades(&payload);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].amount, 0.0);
        assert_eq!(trades[0].price, 0.0);
        assert_eq!(trades[0].timestamp, 0);
        assert!(recent_trades(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn test_recent_trades_skips_unreadable_entry() {
        let mut no_kind = trade_json(2, "buy");
        no_kind["attributes"]
            .as_object_mut()
            .unwrap()
            .remove("kind");
        let payload = json!({"data": [
            trade_json(0, "buy"),
            no_kind,
            trade_json(1, "sell"),
            trade_json(3, "swap"),
        ]});

        let trades = recent_trades(&payload);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].kind, TradeKind::Buy);
        assert_eq!(trades[1].kind, TradeKind::Sell);
        assert_eq!(trades[1].amount, 1.5);
    }

    #[test]
    fn test_recent_trades_cap_counts_readable_entries() {
        let mut data = vec![json!({"attributes": {}})];
        data.extend((0..MAX_TRADES).map(|i| trade_json(i, "buy")));
        let trades = recent_trades(&json!({ "data": data }));
        assert_eq!(trades.len(), MAX_TRADES);
        assert_eq!(trades[0].amount, 0.5);
    }
}
