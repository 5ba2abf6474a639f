// ============================================================================
// Parsing : identifiant de pool
// ============================================================================
// Format externe : "<network><sep><poolAddress>" avec sep ∈ {':', '_'}
// Le ':' est prioritaire s'il est présent, sinon '_'.
// Exactement deux parties non vides sont exigées.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identifiant de pool on-chain décomposé
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolId {
    /// Réseau (ex: "eth", "solana")
    pub network: String,
    /// Adresse du pool sur ce réseau
    pub address: String,
}

/// Format d'identifiant invalide
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identifiant de pool invalide : {0:?}")]
pub struct PoolIdError(pub String);

impl PoolId {
    /// Parse "eth:0x123" ou "eth_0x123"
    pub fn parse(raw: &str) -> Result<Self, PoolIdError> {
        let separator = if raw.contains(':') { ':' } else { '_' };
        let parts: Vec<&str> = raw.split(separator).collect();

        match parts.as_slice() {
            [network, address] if !network.is_empty() && !address.is_empty() => Ok(Self {
                network: network.to_string(),
                address: address.to_string(),
            }),
            _ => Err(PoolIdError(raw.to_string())),
        }
    }

    /// Chemin de base des endpoints on-chain pour ce pool
    pub fn endpoint(&self) -> String {
        format!("onchain/networks/{}/pools/{}", self.network, self.address)
    }
}

impl FromStr for PoolId {
    type Err = PoolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolId::parse(s)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_separators() {
        let colon = PoolId::parse("eth:0xabc").unwrap();
        assert_eq!(colon.network, "eth");
        assert_eq!(colon.address, "0xabc");

        let underscore: PoolId = "solana_7xKXtg".parse().unwrap();
        assert_eq!(underscore.network, "solana");
        assert_eq!(underscore.address, "7xKXtg");
    }

    #[test]
    fn test_colon_takes_priority() {
        // Avec ':' présent, le '_' fait partie de l'adresse
        let pool = PoolId::parse("base:pool_1").unwrap();
        assert_eq!(pool.network, "base");
        assert_eq!(pool.address, "pool_1");
    }

    #[test]
    fn test_invalid_formats() {
        for raw in ["", "eth", "eth_", "_0xabc", ":0xabc", "eth:", "eth_0x_abc", "a:b:c"] {
            assert!(PoolId::parse(raw).is_err(), "{raw:?} devrait être rejeté");
        }
    }

    #[test]
    fn test_endpoint() {
        let pool = PoolId::parse("eth_0xabc").unwrap();
        assert_eq!(pool.endpoint(), "onchain/networks/eth/pools/0xabc");
        assert_eq!(pool.to_string(), "eth:0xabc");
    }
}
