use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server settings, loadable from a TOML file.
///
/// Every field has a default, so a file only needs the keys it overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// sqlx SQLite URL of the mirror database.
    pub database_url: String,
    /// Entries returned by `/v1/ledger/chain` when no `limit` is given.
    pub chain_limit_default: usize,
    /// Mirror rows included in `/v1/ledger/stats`.
    pub recent_blocks: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5000)),
            database_url: "sqlite://rollbook.db".to_string(),
            chain_limit_default: 50,
            recent_blocks: 10,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> ServerResult<Self> {
        toml::from_str(source).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.chain_limit_default, 50);
        assert_eq!(c.recent_blocks, 10);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:8080"
            database_url = "sqlite:///var/lib/rollbook/ledger.db"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.database_url, "sqlite:///var/lib/rollbook/ledger.db");
        assert_eq!(c.chain_limit_default, 50);
    }

    #[test]
    fn bad_address_is_config_error() {
        let err = ServerConfig::from_toml_str(r#"bind_addr = "nowhere""#).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollbook.toml");
        std::fs::write(&path, "recent_blocks = 3\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().recent_blocks, 3);
        assert!(ServerConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
