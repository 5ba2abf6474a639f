// ============================================================================
// Erreurs de la couche HTTP
// ============================================================================
// CONCEPT RUST : thiserror
// - Une erreur typée (enum) au lieu d'un anyhow::Error opaque
// - Le coeur de synchronisation doit reconnaître un 429 pour entrer en
//   cooldown, d'où un variant dédié
// - Les variants convertissent en anyhow::Error via `?` côté application
// ============================================================================

use thiserror::Error;

/// Échec d'un appel à l'API de marché
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 429 : le quota de l'API est dépassé
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// Tout autre statut non-2xx
    #[error("API Error: {status}: {message}")]
    Status { status: u16, message: String },

    /// Réseau injoignable, connexion coupée, etc.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Corps de réponse illisible ou de forme inattendue
    #[error("invalid JSON payload: {0}")]
    Decode(String),

    /// Endpoint ou paramètres impossibles à assembler en URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Vrai pour un 429
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }

    /// Statut HTTP s'il y en a un
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RateLimited => Some(429),
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_rate_limit() {
        assert!(FetchError::RateLimited.is_rate_limited());
        assert_eq!(FetchError::RateLimited.status(), Some(429));

        let err = FetchError::Status {
            status: 404,
            message: "coin not found".to_string(),
        };
        assert!(!err.is_rate_limited());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "API Error: 404: coin not found");
    }
}
