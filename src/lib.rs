// ============================================================================
// CoinPulse - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests
// ============================================================================

pub mod api;       // API de marché (fetcher, transformers, actions)
pub mod app;       // État de l'application
pub mod config;    // Configuration (variables d'environnement)
pub mod models;    // Structures de données
pub mod sync;      // Coeur de synchronisation (polling simulant un flux live)
pub mod ui;        // Interface utilisateur
