//! Client and server configuration.
//!
//! Both configs deserialize from JSON with camelCase keys. Missing keys take
//! their defaults, so `{}` is a valid config.
//!
//! ```
//! use wirepool::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(
//!     r#"{"poolSize": 8, "serverAddress": "10.0.0.5:3000"}"#,
//! ).unwrap();
//! assert_eq!(config.pool_size, 8);
//! assert!(config.io_timeout().is_none());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default server address for both ends.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3000";

/// Default cap on concurrently served connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Milliseconds in `d`, clamped to `u64::MAX`.
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Connection pool and call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Number of connections opened eagerly and kept in the pool.
    pub pool_size: usize,
    /// `host:port` of the server.
    pub server_address: String,
    /// Deadline for each frame write and each frame read, in milliseconds.
    pub io_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            server_address: DEFAULT_ADDRESS.to_string(),
            io_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Create a config for `pool_size` connections to `server_address`.
    pub fn new(pool_size: usize, server_address: impl Into<String>) -> Self {
        Self {
            pool_size,
            server_address: server_address.into(),
            io_timeout_ms: None,
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RpcError::Decode(format!("client config: {}", e)))
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the server address.
    pub fn server_address(mut self, addr: impl Into<String>) -> Self {
        self.server_address = addr.into();
        self
    }

    /// Set the per-read/per-write deadline.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout_ms = Some(saturating_millis(timeout));
        self
    }

    /// Per-read/per-write deadline, if any.
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }

    /// Check the values a pool can be built from.
    ///
    /// # Errors
    ///
    /// [`RpcError::PoolInit`] if the pool size is zero or the address is empty.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(RpcError::PoolInit("pool size must be at least 1".to_string()));
        }
        if self.server_address.is_empty() {
            return Err(RpcError::PoolInit("server address is empty".to_string()));
        }
        Ok(())
    }
}

/// Listener and connection-handling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// `host:port` to bind.
    pub listen_address: String,
    /// Close a connection that sends nothing for this many milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Connections beyond this count are closed as soon as they are accepted.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_ADDRESS.to_string(),
            read_timeout_ms: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RpcError::Decode(format!("server config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Set the listen address.
    pub fn listen_address(mut self, addr: impl Into<String>) -> Self {
        self.listen_address = addr.into();
        self
    }

    /// Set the idle read deadline.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(saturating_millis(timeout));
        self
    }

    /// Set the connection cap.
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.max_connections = limit;
        self
    }

    /// Idle read deadline, if any.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Check the values a server can run with.
    ///
    /// # Errors
    ///
    /// [`RpcError::Config`] if the connection cap is zero or the listen
    /// address is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(RpcError::Config("max connections must be at least 1".to_string()));
        }
        if self.listen_address.is_empty() {
            return Err(RpcError::Config("listen address is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.server_address, "127.0.0.1:3000");
        assert!(config.io_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_from_json() {
        let config = ClientConfig::from_json_str(
            r#"{"poolSize": 2, "serverAddress": "db:4000", "ioTimeoutMs": 1500}"#,
        )
        .unwrap();

        assert_eq!(config.pool_size, 2);
        assert_eq!(config.server_address, "db:4000");
        assert_eq!(config.io_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_client_partial_json_uses_defaults() {
        let config = ClientConfig::from_json_str(r#"{"poolSize": 10}"#).unwrap();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.server_address, DEFAULT_ADDRESS);
    }

    #[test]
    fn test_client_bad_json() {
        let result = ClientConfig::from_json_str(r#"{"poolSize": "many"}"#);
        assert!(matches!(result, Err(RpcError::Decode(_))));
    }

    #[test]
    fn test_client_zero_pool_rejected() {
        let config = ClientConfig::default().pool_size(0);
        assert!(matches!(config.validate(), Err(RpcError::PoolInit(_))));
    }

    #[test]
    fn test_client_setters() {
        let config = ClientConfig::new(3, "a:1")
            .server_address("b:2")
            .with_io_timeout(Duration::from_secs(2));

        assert_eq!(config.pool_size, 3);
        assert_eq!(config.server_address, "b:2");
        assert_eq!(config.io_timeout_ms, Some(2000));
    }

    #[test]
    fn test_server_from_json() {
        let config = ServerConfig::from_json_str(
            r#"{"listenAddress": "0.0.0.0:3000", "maxConnections": 16}"#,
        )
        .unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:3000");
        assert_eq!(config.max_connections, 16);
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_server_defaults_from_empty_object() {
        let config = ServerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_config_file_missing() {
        let result = ServerConfig::from_json_file("/nonexistent/wirepool.json");
        assert!(matches!(result, Err(RpcError::Io(_))));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("wirepool-config-{}.json", std::process::id()));
        let config = ClientConfig::new(6, "127.0.0.1:9000");
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = ClientConfig::from_json_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = ClientConfig::default().with_io_timeout(Duration::MAX);
        assert_eq!(config.io_timeout_ms, Some(u64::MAX));

        let config = ServerConfig::default().with_read_timeout(Duration::MAX);
        assert_eq!(config.read_timeout_ms, Some(u64::MAX));
    }

    #[test]
    fn test_server_zero_connections_rejected() {
        assert!(matches!(
            ServerConfig::default().max_connections(0).validate(),
            Err(RpcError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"maxConnections": 0}"#),
            Err(RpcError::Config(_))
        ));
        assert!(ServerConfig::default().validate().is_ok());
    }
}
