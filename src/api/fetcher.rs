// ============================================================================
// Fetcher : client HTTP de l'API de marché
// ============================================================================
// Appelle l'API CoinGecko (ou compatible) en GET et retourne le JSON parsé.
//
// CONCEPTS RUST :
// 1. async-trait : trait MarketSource dont les futures sont Send
//    (indispensable pour les lancer dans des tâches tokio)
// 2. Mutex<HashMap> : cache partagé entre tâches concurrentes
// 3. Builder pattern : Query construit les paramètres de requête
// ============================================================================

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::api::FetchError;
use crate::config::Config;

/// Header portant la clé d'API
pub const API_KEY_HEADER: &str = "x-cg-demo-api-key";

// ============================================================================
// Query : paramètres de requête
// ============================================================================
// Les valeurs absentes (None) et les chaînes vides ne sont jamais envoyées.
// L'ordre d'insertion est conservé (URLs stables pour le cache).
// ============================================================================

/// Paramètres de query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pairs: Vec<(String, Option<String>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un paramètre
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.pairs.push((key.to_string(), Some(value.to_string())));
        self
    }

    /// Ajoute un paramètre optionnel (ignoré à la sérialisation si None)
    pub fn opt_param<V: ToString>(mut self, key: &str, value: Option<V>) -> Self {
        self.pairs.push((key.to_string(), value.map(|v| v.to_string())));
        self
    }

    /// Paires effectivement envoyées
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some((key.as_str(), v)),
                _ => None,
            })
            .collect()
    }

    /// Valeur envoyée pour une clé
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

// ============================================================================
// Trait MarketSource
// ============================================================================
// Point de jonction entre le transport HTTP et le reste du crate : le coeur
// de synchronisation et les actions ne connaissent que ce trait.
// ============================================================================

/// Source de données de marché capable de retourner du JSON
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// GET `endpoint` avec `query`
    ///
    /// `revalidate_secs` : durée de vie en cache de la réponse (0 = pas de cache)
    async fn fetch_json(
        &self,
        endpoint: &str,
        query: &Query,
        revalidate_secs: u64,
    ) -> Result<Value, FetchError>;
}

/// Appelle la source et désérialise la réponse vers `T`
pub async fn fetch_as<T, S>(
    source: &S,
    endpoint: &str,
    query: &Query,
    revalidate_secs: u64,
) -> Result<T, FetchError>
where
    T: DeserializeOwned,
    S: MarketSource + ?Sized,
{
    let value = source.fetch_json(endpoint, query, revalidate_secs).await?;
    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

// ============================================================================
// Fetcher HTTP
// ============================================================================

/// Corps d'erreur renvoyé par l'API
///
/// Deux formes existent : {"error": "..."} et {"status": {"error_message": "..."}}
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    status: Option<ErrorStatus>,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    error_message: Option<String>,
}

/// Réponse conservée en cache
#[derive(Debug, Clone)]
struct CachedResponse {
    stored_at: Instant,
    ttl: Duration,
    body: Value,
}

impl CachedResponse {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Client HTTP de l'API de marché
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, CachedResponse>>,
}

impl Fetcher {
    /// Crée un fetcher pour `base_url`, avec la clé d'API si fournie
    pub fn new(base_url: impl Into<String>, api_key: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value =
                HeaderValue::from_str(key).context("Clé d'API invalide pour un header HTTP")?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("coinpulse/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Crée un fetcher depuis la configuration chargée au démarrage
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url, Some(&config.api_key))
    }

    /// Assemble l'URL complète : base + endpoint + query string
    pub fn build_url(&self, endpoint: &str, query: &Query) -> Result<Url, FetchError> {
        let raw = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;

        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, CachedResponse>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let mut cache = self.cache();
        match cache.get(key) {
            Some(entry) if entry.is_fresh(Instant::now()) => Some(entry.body.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, body: Value, ttl: Duration) {
        self.cache().insert(
            key,
            CachedResponse {
                stored_at: Instant::now(),
                ttl,
                body,
            },
        );
    }
}

#[async_trait]
impl MarketSource for Fetcher {
    #[instrument(skip(self, query), fields(endpoint = %endpoint))]
    async fn fetch_json(
        &self,
        endpoint: &str,
        query: &Query,
        revalidate_secs: u64,
    ) -> Result<Value, FetchError> {
        let url = self.build_url(endpoint, query)?;
        let key = url.to_string();

        if revalidate_secs > 0 {
            if let Some(body) = self.cached(&key) {
                debug!("Serving response from cache");
                return Ok(body);
            }
        }

        debug!(url = %url, "Sending HTTP request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.as_u16() == 429 {
            warn!("Upstream rate limit hit");
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|body| body.error.or_else(|| body.status.and_then(|s| s.error_message)))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            warn!(status = %status, message = %message, "Upstream returned error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        if revalidate_secs > 0 {
            self.store(key, body.clone(), Duration::from_secs(revalidate_secs));
        }

        Ok(body)
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetcher() -> Fetcher {
        Fetcher::new("https://api.example.com/api/v3/", Some("demo-key")).unwrap()
    }

    #[test]
    fn test_query_skips_empty_and_absent() {
        let query = Query::new()
            .param("ids", "bitcoin")
            .param("vs_currencies", "")
            .opt_param::<String>("category", None)
            .opt_param("page", Some(1));

        assert_eq!(query.pairs(), vec![("ids", "bitcoin"), ("page", "1")]);
        assert_eq!(query.get("page"), Some("1"));
        assert_eq!(query.get("vs_currencies"), None);
        assert!(Query::new().param("q", "").is_empty());
    }

    #[test]
    fn test_build_url_joins_paths() {
        let fetcher = fetcher();

        let url = fetcher
            .build_url("/search/trending", &Query::new())
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/v3/search/trending");

        let url = fetcher
            .build_url("simple/price", &Query::new().param("ids", "bitcoin").param("x", ""))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v3/simple/price?ids=bitcoin"
        );
    }

    #[test]
    fn test_build_url_encodes_values() {
        let url = fetcher()
            .build_url("search", &Query::new().param("query", "shiba inu"))
            .unwrap();
        assert_eq!(url.query(), Some("query=shiba+inu"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires() {
        let fetcher = fetcher();
        let key = "https://api.example.com/api/v3/search/trending".to_string();

        fetcher.store(key.clone(), json!({"coins": []}), Duration::from_secs(300));
        assert_eq!(fetcher.cached(&key), Some(json!({"coins": []})));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(fetcher.cached(&key).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(fetcher.cached(&key).is_none());
    }
}
