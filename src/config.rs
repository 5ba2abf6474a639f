// ============================================================================
// Configuration
// ============================================================================
// Lue depuis l'environnement (éventuellement depuis un fichier .env chargé
// par dotenvy dans main).
//
// COINGECKO_BASE_URL et COINGECKO_API_KEY sont obligatoires : leur absence
// est une erreur fatale au démarrage, pas une erreur du coeur de synchro.
// ============================================================================

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::sync::PollConfig;

pub const ENV_BASE_URL: &str = "COINGECKO_BASE_URL";
pub const ENV_API_KEY: &str = "COINGECKO_API_KEY";
pub const ENV_COIN: &str = "COINPULSE_COIN";
pub const ENV_POLL_SECS: &str = "COINPULSE_POLL_SECS";
pub const ENV_COOLDOWN_SECS: &str = "COINPULSE_COOLDOWN_SECS";

/// Coin affiché par défaut dans la vue d'ensemble
pub const DEFAULT_COIN: &str = "bitcoin";

/// Configuration de l'application
#[derive(Debug, Clone)]
pub struct Config {
    /// URL de base de l'API (ex: https://api.coingecko.com/api/v3)
    pub base_url: String,

    /// Clé d'API envoyée dans le header x-cg-demo-api-key
    pub api_key: String,

    /// Coin de la vue d'ensemble
    pub overview_coin: String,

    /// Cadence de polling et cooldown
    pub poll: PollConfig,
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Charge la configuration depuis une fonction de lookup
    ///
    /// CONCEPT RUST : Injection par closure
    /// - from_env() passe std::env::var
    /// - Les tests passent une HashMap, sans toucher à l'environnement global
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            match lookup(key).map(|v| v.trim().to_string()) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => bail!("Variable d'environnement manquante : {}", key),
            }
        };

        let base_url = required(ENV_BASE_URL).context("Impossible de lire l'URL de base de l'API")?;
        let api_key = required(ENV_API_KEY).context("Impossible de lire la clé d'API")?;

        let overview_coin = lookup(ENV_COIN)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COIN.to_string());

        let mut poll = PollConfig::default();
        if let Some(secs) = parse_secs(&lookup, ENV_POLL_SECS)? {
            let every = Duration::from_secs(secs);
            poll.price_every = every;
            poll.candle_every = every;
            poll.trades_every = every;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_COOLDOWN_SECS)? {
            poll.rate_limit_cooldown = Duration::from_secs(secs);
        }

        Ok(Self {
            base_url,
            api_key,
            overview_coin,
            poll,
        })
    }
}

/// Lit un nombre de secondes strictement positif
fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };

    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} doit être un nombre de secondes (reçu {:?})", key, raw))?;
    if secs == 0 {
        bail!("{} doit être supérieur à 0", key);
    }
    Ok(Some(secs))
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://api.coingecko.com/api/v3"),
            (ENV_API_KEY, "demo"),
        ]))
        .unwrap();

        assert_eq!(config.overview_coin, "bitcoin");
        assert_eq!(config.poll.price_every, Duration::from_secs(60));
        assert_eq!(config.poll.rate_limit_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[(ENV_BASE_URL, "https://x")])).unwrap_err();
        assert!(format!("{:#}", err).contains(ENV_API_KEY));

        let blank = Config::from_lookup(lookup(&[(ENV_BASE_URL, "https://x"), (ENV_API_KEY, "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn test_missing_base_url_is_fatal() {
        assert!(Config::from_lookup(lookup(&[(ENV_API_KEY, "demo")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_BASE_URL, "https://x"),
            (ENV_API_KEY, "demo"),
            (ENV_COIN, "ethereum"),
            (ENV_POLL_SECS, "30"),
            (ENV_COOLDOWN_SECS, "120"),
        ]))
        .unwrap();

        assert_eq!(config.overview_coin, "ethereum");
        assert_eq!(config.poll.trades_every, Duration::from_secs(30));
        assert_eq!(config.poll.rate_limit_cooldown, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_poll_secs() {
        let vars = [(ENV_BASE_URL, "https://x"), (ENV_API_KEY, "demo"), (ENV_POLL_SECS, "0")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let vars = [(ENV_BASE_URL, "https://x"), (ENV_API_KEY, "demo"), (ENV_POLL_SECS, "soon")];
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
