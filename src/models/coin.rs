// ============================================================================
// Structures : coins et pools (données "serveur")
// ============================================================================
// Modèles affichés par l'écran d'accueil : vue d'ensemble d'un coin,
// coins tendance, résultats de recherche et pool principal d'un token.
// ============================================================================

use serde::{Deserialize, Serialize};

/// Vue d'ensemble d'un coin (endpoint coins/{id})
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetails {
    pub id: String,
    pub name: String,
    pub symbol: String,
    /// URL de l'image (grande taille)
    pub image: Option<String>,
    /// Prix actuel en USD
    pub current_price: Option<f64>,
}

/// Coin tendance (endpoint search/trending)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub thumb: Option<String>,
    /// Prix en USD si fourni par l'API
    pub price: Option<f64>,
    /// Variation 24h en pourcentage (0 si absente)
    pub change_24h: f64,
}

/// Résultat de recherche enrichi avec les données de marché
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub thumb: Option<String>,
    /// Variation 24h en pourcentage (0 si absente)
    pub change_24h: f64,
}

/// Pool on-chain principal d'un token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolData {
    /// Identifiant au format "network_address" (ex: "eth_0x88e6...")
    pub id: String,
    pub address: String,
    pub name: String,
    pub network: String,
}

impl PoolData {
    /// Vrai pour le pool "vide" renvoyé en cas d'échec
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Ligne affichable dans la liste de l'écran d'accueil
///
/// CONCEPT RUST : Trait commun
/// - Trending et Search ont les mêmes colonnes à l'écran
/// - Le trait évite de dupliquer le rendu
pub trait CoinRow {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn symbol(&self) -> &str;
    fn change_24h(&self) -> f64;
}

impl CoinRow for TrendingCoin {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn change_24h(&self) -> f64 {
        self.change_24h
    }
}

impl CoinRow for SearchCoin {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn symbol(&self) -> &str {
        &self.symbol
    }
    fn change_24h(&self) -> f64 {
        self.change_24h
    }
}
