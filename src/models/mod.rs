// ============================================================================
// Module : models
// ============================================================================
// Structures de données partagées par l'API, le coeur de synchronisation
// et l'interface
// ============================================================================

pub mod candle;  // Chandelle OHLC (sans volume)
pub mod coin;    // Coins, tendances, recherche, pools
pub mod pool;    // Parsing des identifiants de pool
pub mod price;   // Instantané de prix
pub mod trade;   // Trades DEX
pub mod watch;   // Cible observée par une session

// Re-export des structures principales
pub use candle::Candle;
pub use coin::{CoinDetails, CoinRow, PoolData, SearchCoin, TrendingCoin};
pub use pool::{PoolId, PoolIdError};
pub use price::PriceSnapshot;
pub use trade::{Trade, TradeKind, MAX_TRADES};
pub use watch::{LiveInterval, WatchTarget};
