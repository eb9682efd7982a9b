//! # Server Configuration
//!
//! Settings come from four layers, weakest first: compiled defaults, an
//! optional TOML file, `CAJAL_*` environment variables, then CLI flags.
//! Unknown keys in the file are ignored; an unreadable or unparsable file
//! falls back to defaults with a warning rather than refusing to start.
//!
//! ## Configuration (cajal.toml)
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8200
//! tick_rate = 60
//!
//! [network]
//! max_message_bytes = 67108864
//!
//! [scene]
//! preload_cache = "scene.cajal"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub network: NetworkSettings,
    pub scene: SceneSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Main-loop frequency in Hz.
    pub tick_rate: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8200,
            tick_rate: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Upper bound on a single WebSocket frame; oversized frames close the
    /// connection at the transport layer.
    pub max_message_bytes: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            // large enough for binary model uploads in one frame
            max_message_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Binary scene cache to load before accepting connections.
    pub preload_cache: Option<PathBuf>,
}

// ============================================================================
// Loading
// ============================================================================

impl ServerConfig {
    /// Read `path`, falling back to defaults (with a warning) when the file
    /// is missing or malformed.
    pub fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not readable, using defaults");
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config not parsable, using defaults");
                Self::default()
            }
        }
    }

    /// Overlay `CAJAL_*` environment variables onto the current values.
    /// Unparsable numeric values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("CAJAL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CAJAL_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(rate) = var("CAJAL_TICK_RATE").and_then(|v| v.parse().ok()) {
            self.server.tick_rate = rate;
        }
        if let Some(bytes) = var("CAJAL_MAX_MESSAGE_BYTES").and_then(|v| v.parse().ok()) {
            self.network.max_message_bytes = bytes;
        }
        if let Some(path) = var("CAJAL_PRELOAD_CACHE") {
            self.scene.preload_cache = Some(PathBuf::from(path));
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.server.host, self.server.port))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8200);
        assert_eq!(config.server.tick_rate, 60);
        assert!(config.scene.preload_cache.is_none());
        assert_eq!(config.bind_addr().unwrap().port(), 8200);
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000\n\n[scene]\npreload_cache = \"a.cajal\"").unwrap();

        let config = ServerConfig::from_file(file.path());
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.tick_rate, 60);
        assert_eq!(config.scene.preload_cache, Some(PathBuf::from("a.cajal")));
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = not a number").unwrap();
        let config = ServerConfig::from_file(file.path());
        assert_eq!(config.server.port, 8200);

        let missing = ServerConfig::from_file(Path::new("/nonexistent/cajal.toml"));
        assert_eq!(missing.server.port, 8200);
    }

    #[test]
    fn test_env_overlay_applies_and_ignores_junk() {
        let mut config = ServerConfig::default();
        config.apply_env_from(|name| match name {
            "CAJAL_PORT" => Some("9100".to_string()),
            "CAJAL_TICK_RATE" => Some("not a number".to_string()),
            "CAJAL_PRELOAD_CACHE" => Some("warm.cajal".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.tick_rate, 60);
        assert_eq!(config.scene.preload_cache, Some(PathBuf::from("warm.cajal")));
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_bad_host_is_an_error() {
        let mut config = ServerConfig::default();
        config.server.host = "not a host".to_string();
        assert!(config.bind_addr().is_err());
    }
}
