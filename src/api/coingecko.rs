// ============================================================================
// Actions "serveur" : vue d'ensemble, tendances, recherche, pools
// ============================================================================
// Appels ponctuels (non pollés) utilisés par l'écran d'accueil.
//
// Politique d'erreur :
// - Les données indispensables (détails, OHLC) propagent l'erreur (anyhow)
// - Les listes (tendances, recherche) et le pool retombent sur une valeur
//   vide en loggant l'échec, l'écran reste utilisable
// ============================================================================

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::api::fetcher::{fetch_as, MarketSource, Query};
use crate::models::{Candle, CoinDetails, PoolData, SearchCoin, TrendingCoin};

/// Cache par défaut des appels serveur (secondes)
pub const DEFAULT_REVALIDATE: u64 = 60;

/// Cache des tendances (secondes)
pub const TRENDING_REVALIDATE: u64 = 300;

/// Nombre de résultats de recherche enrichis
pub const SEARCH_LIMIT: usize = 10;

// ============================================================================
// Structures wire
// ============================================================================

#[derive(Debug, Deserialize)]
struct CoinDetailsWire {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    image: Option<ImageWire>,
    #[serde(default)]
    market_data: Option<MarketDataWire>,
}

#[derive(Debug, Deserialize)]
struct ImageWire {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketDataWire {
    #[serde(default)]
    current_price: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct CoinsEnvelope {
    #[serde(default)]
    coins: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TrendingItemWire {
    id: String,
    name: String,
    symbol: String,
    thumb: Option<String>,
    #[serde(default)]
    data: Option<TrendingDataWire>,
}

#[derive(Debug, Deserialize)]
struct TrendingDataWire {
    price: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SearchHitWire {
    id: String,
    name: String,
    symbol: String,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketRowWire {
    id: String,
    image: Option<String>,
    price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PoolsEnvelope {
    #[serde(default)]
    data: Vec<PoolWire>,
}

#[derive(Debug, Deserialize)]
struct PoolWire {
    id: String,
    #[serde(default)]
    attributes: Option<PoolAttributesWire>,
}

#[derive(Debug, Deserialize)]
struct PoolAttributesWire {
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: String,
}

// ============================================================================
// Coin : détails et OHLC
// ============================================================================

/// Détails d'un coin (nom, symbole, image, prix actuel)
#[instrument(skip(source))]
pub async fn get_coin_details<S>(source: &S, id: &str) -> Result<CoinDetails>
where
    S: MarketSource + ?Sized,
{
    let query = Query::new().param("dex_pair_format", "symbol");
    let wire: CoinDetailsWire = fetch_as(source, &format!("coins/{}", id), &query, DEFAULT_REVALIDATE)
        .await
        .with_context(|| format!("Échec du chargement des détails de {}", id))?;

    Ok(CoinDetails {
        id: wire.id,
        name: wire.name,
        symbol: wire.symbol.to_uppercase(),
        image: wire.image.and_then(|i| i.large),
        current_price: wire
            .market_data
            .and_then(|m| m.current_price.get("usd").copied()),
    })
}

/// Chandelles OHLC d'un coin sur `days` jours (timestamps déjà en ms)
#[instrument(skip(source))]
pub async fn get_coin_ohlc<S>(source: &S, id: &str, days: u32) -> Result<Vec<Candle>>
where
    S: MarketSource + ?Sized,
{
    let query = Query::new()
        .param("vs_currency", "usd")
        .param("days", days)
        .param("precision", "full");
    let rows: Vec<[f64; 5]> = fetch_as(source, &format!("coins/{}/ohlc", id), &query, DEFAULT_REVALIDATE)
        .await
        .with_context(|| format!("Échec du chargement OHLC de {}", id))?;

    debug!(candles = rows.len(), "Coin OHLC loaded");
    Ok(rows.into_iter().map(Candle::from).collect())
}

// ============================================================================
// Tendances
// ============================================================================

/// Coins tendance (liste vide en cas d'échec)
#[instrument(skip(source))]
pub async fn get_trending_coins<S>(source: &S) -> Vec<TrendingCoin>
where
    S: MarketSource + ?Sized,
{
    let envelope: CoinsEnvelope =
        match fetch_as(source, "search/trending", &Query::new(), TRENDING_REVALIDATE).await {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Trending coins error");
                return Vec::new();
            }
        };

    let coins: Vec<TrendingCoin> = envelope
        .coins
        .into_iter()
        .filter_map(|coin| {
            // Selon les versions de l'API, l'item est imbriqué ou non
            let item = coin.get("item").cloned().unwrap_or(coin);
            serde_json::from_value::<TrendingItemWire>(item).ok()
        })
        .map(|item| {
            let data = item.data;
            TrendingCoin {
                id: item.id,
                name: item.name,
                symbol: item.symbol.to_uppercase(),
                thumb: item.thumb,
                price: data.as_ref().and_then(|d| d.price),
                change_24h: data
                    .as_ref()
                    .and_then(|d| d.price_change_percentage_24h.get("usd").copied())
                    .unwrap_or(0.0),
            }
        })
        .collect();

    info!(count = coins.len(), "Trending coins loaded");
    coins
}

// ============================================================================
// Recherche
// ============================================================================

/// Recherche de coins enrichie avec la variation 24h
///
/// Deux appels : `search` pour les identifiants, puis `coins/markets` pour les
/// données de marché des 10 premiers, fusionnées par id.
#[instrument(skip(source))]
pub async fn search_coins<S>(source: &S, text: &str) -> Vec<SearchCoin>
where
    S: MarketSource + ?Sized,
{
    match try_search_coins(source, text).await {
        Ok(coins) => coins,
        Err(e) => {
            error!(error = %e, "Search error");
            Vec::new()
        }
    }
}

async fn try_search_coins<S>(source: &S, text: &str) -> Result<Vec<SearchCoin>>
where
    S: MarketSource + ?Sized,
{
    let envelope: CoinsEnvelope = fetch_as(
        source,
        "search",
        &Query::new().param("query", text),
        DEFAULT_REVALIDATE,
    )
    .await?;

    let hits: Vec<SearchHitWire> = envelope
        .coins
        .into_iter()
        .filter_map(|c| serde_json::from_value(c).ok())
        .take(SEARCH_LIMIT)
        .collect();

    if hits.is_empty() {
        debug!("No search hits");
        return Ok(Vec::new());
    }

    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    let query = Query::new()
        .param("vs_currency", "usd")
        .param("ids", ids.join(","))
        .param("order", "market_cap_desc")
        .param("per_page", 250)
        .param("page", 1)
        .param("sparkline", false);
    let markets: Vec<MarketRowWire> = fetch_as(source, "coins/markets", &query, DEFAULT_REVALIDATE).await?;

    let by_id: HashMap<String, MarketRowWire> =
        markets.into_iter().map(|row| (row.id.clone(), row)).collect();

    Ok(hits
        .into_iter()
        .map(|hit| {
            let market = by_id.get(&hit.id);
            SearchCoin {
                change_24h: market
                    .and_then(|m| m.price_change_percentage_24h)
                    .unwrap_or(0.0),
                thumb: hit.thumb.or_else(|| market.and_then(|m| m.image.clone())),
                symbol: hit.symbol.to_uppercase(),
                id: hit.id,
                name: hit.name,
            }
        })
        .collect())
}

// ============================================================================
// Pools
// ============================================================================

/// Pool principal d'un coin
///
/// Avec réseau + adresse de contrat : pools du token ; sinon recherche par id.
/// Retourne un PoolData vide en cas d'échec.
#[instrument(skip(source))]
pub async fn get_pools<S>(
    source: &S,
    id: &str,
    network: Option<&str>,
    contract_address: Option<&str>,
) -> PoolData
where
    S: MarketSource + ?Sized,
{
    let (endpoint, query) = match (network, contract_address) {
        (Some(network), Some(address)) if !network.is_empty() && !address.is_empty() => (
            format!("onchain/networks/{}/tokens/{}/pools", network, address),
            Query::new(),
        ),
        _ => (
            "onchain/search/pools".to_string(),
            Query::new().param("query", id),
        ),
    };

    let envelope: PoolsEnvelope = match fetch_as(source, &endpoint, &query, DEFAULT_REVALIDATE).await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Pool lookup failed");
            return PoolData::default();
        }
    };

    let Some(pool) = envelope.data.into_iter().next() else {
        debug!("No pool found");
        return PoolData::default();
    };

    let attributes = pool.attributes.unwrap_or(PoolAttributesWire {
        address: String::new(),
        name: String::new(),
    });
    let network = pool
        .id
        .split_once('_')
        .map(|(network, _)| network.to_string())
        .unwrap_or_default();

    PoolData {
        id: pool.id,
        address: attributes.address,
        name: attributes.name,
        network,
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Source figée : une réponse par endpoint, journal des appels
    struct FixedSource {
        routes: HashMap<String, Value>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FixedSource {
        fn new(routes: &[(&str, Value)]) -> Self {
            Self {
                routes: routes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn query_of(&self, endpoint: &str) -> Option<Vec<(String, String)>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(e, _)| e == endpoint)
                .map(|(_, q)| q.clone())
        }
    }

    #[async_trait]
    impl MarketSource for FixedSource {
        async fn fetch_json(
            &self,
            endpoint: &str,
            query: &Query,
            _revalidate_secs: u64,
        ) -> Result<Value, FetchError> {
            let pairs = query
                .pairs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.calls.lock().unwrap().push((endpoint.to_string(), pairs));
            self.routes.get(endpoint).cloned().ok_or(FetchError::Status {
                status: 404,
                message: "Not Found".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_coin_details() {
        let source = FixedSource::new(&[(
            "coins/bitcoin",
            json!({
                "id": "bitcoin", "name": "Bitcoin", "symbol": "btc",
                "image": {"large": "https://img/btc.png"},
                "market_data": {"current_price": {"usd": 65000.0, "eur": 60000.0}}
            }),
        )]);

        let details = get_coin_details(&source, "bitcoin").await.unwrap();
        assert_eq!(details.symbol, "BTC");
        assert_eq!(details.current_price, Some(65000.0));
        assert_eq!(details.image.as_deref(), Some("https://img/btc.png"));

        assert!(get_coin_details(&source, "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_coin_ohlc() {
        let source = FixedSource::new(&[(
            "coins/bitcoin/ohlc",
            json!([[1700000000000u64, 1.0, 2.0, 0.5, 1.5], [1700001800000u64, 1.5, 2.5, 1.0, 2.0]]),
        )]);

        let candles = get_coin_ohlc(&source, "bitcoin", 1).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].timestamp_ms, 1_700_001_800_000);

        let query = source.query_of("coins/bitcoin/ohlc").unwrap();
        assert!(query.contains(&("days".to_string(), "1".to_string())));
        assert!(query.contains(&("precision".to_string(), "full".to_string())));
    }

    #[tokio::test]
    async fn test_trending_coins_mapping() {
        let source = FixedSource::new(&[(
            "search/trending",
            json!({"coins": [
                {"item": {"id": "pepe", "name": "Pepe", "symbol": "pepe", "thumb": "t",
                          "data": {"price": 0.00001, "price_change_percentage_24h": {"usd": 12.5}}}},
                {"item": {"id": "sui", "name": "Sui", "symbol": "sui", "thumb": null}},
                {"id": "flat", "name": "Flat", "symbol": "flt"}
            ]}),
        )]);

        let coins = get_trending_coins(&source).await;
        assert_eq!(coins.len(), 3);
        assert_eq!(coins[0].change_24h, 12.5);
        assert_eq!(coins[0].symbol, "PEPE");
        assert_eq!(coins[1].change_24h, 0.0);
        assert_eq!(coins[2].id, "flat");
    }

    #[tokio::test]
    async fn test_trending_failure_returns_empty() {
        let source = FixedSource::new(&[]);
        assert!(get_trending_coins(&source).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_merges_market_data() {
        let source = FixedSource::new(&[
            (
                "search",
                json!({"coins": [
                    {"id": "bitcoin", "name": "Bitcoin", "symbol": "btc", "thumb": "btc.png"},
                    {"id": "wrapped-bitcoin", "name": "Wrapped Bitcoin", "symbol": "wbtc", "thumb": null}
                ]}),
            ),
            (
                "coins/markets",
                json!([
                    {"id": "wrapped-bitcoin", "image": "wbtc.png", "price_change_percentage_24h": -1.25},
                    {"id": "bitcoin", "image": "btc-large.png", "price_change_percentage_24h": 2.5}
                ]),
            ),
        ]);

        let coins = search_coins(&source, "bitcoin").await;
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[0].change_24h, 2.5);
        assert_eq!(coins[0].thumb.as_deref(), Some("btc.png"));
        assert_eq!(coins[1].change_24h, -1.25);
        assert_eq!(coins[1].thumb.as_deref(), Some("wbtc.png"));

        let query = source.query_of("coins/markets").unwrap();
        assert!(query.contains(&("ids".to_string(), "bitcoin,wrapped-bitcoin".to_string())));
        assert!(query.contains(&("sparkline".to_string(), "false".to_string())));
    }

    #[tokio::test]
    async fn test_search_without_hits_skips_markets() {
        let source = FixedSource::new(&[("search", json!({"coins": []}))]);
        assert!(search_coins(&source, "zzz").await.is_empty());
        assert!(source.query_of("coins/markets").is_none());
    }

    #[tokio::test]
    async fn test_get_pools_routes() {
        let pools = json!({"data": [{
            "id": "eth_0x88e6",
            "type": "pool",
            "attributes": {"address": "0x88e6", "name": "WETH / USDC 0.05%"}
        }]});
        let source = FixedSource::new(&[
            ("onchain/search/pools", pools.clone()),
            ("onchain/networks/eth/tokens/0xc02a/pools", pools),
        ]);

        let searched = get_pools(&source, "weth", None, None).await;
        assert_eq!(searched.id, "eth_0x88e6");
        assert_eq!(searched.network, "eth");
        assert_eq!(searched.address, "0x88e6");
        assert_eq!(
            source.query_of("onchain/search/pools").unwrap(),
            vec![("query".to_string(), "weth".to_string())]
        );

        let by_token = get_pools(&source, "weth", Some("eth"), Some("0xc02a")).await;
        assert_eq!(by_token.name, "WETH / USDC 0.05%");

        let missing = get_pools(&source, "x", Some("sol"), Some("abc")).await;
        assert!(missing.is_empty());
    }
}
