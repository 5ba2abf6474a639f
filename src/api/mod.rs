// ============================================================================
// Module : api
// ============================================================================
// Accès à l'API de marché (CoinGecko ou compatible) :
// - fetcher : transport HTTP, query string, cache, trait MarketSource
// - transform : JSON -> PriceSnapshot / Candle / Trade
// - coingecko : actions ponctuelles de l'écran d'accueil
// ============================================================================

pub mod coingecko;  // Détails, OHLC, tendances, recherche, pools
pub mod error;      // FetchError
pub mod fetcher;    // Client HTTP + trait MarketSource
pub mod transform;  // Transformers purs

// Re-export des éléments principaux
pub use error::FetchError;
pub use fetcher::{Fetcher, MarketSource, Query};
