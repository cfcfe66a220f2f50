//! Diana Configuration Management
//!
//! Loads proxy and client settings from a `key = value` options file.
//!
//! ```text
//! # diana.cfg
//! listenhost = 0.0.0.0
//! listenport = 2010
//! serverhost = 10.0.0.5
//! serverport = 2010
//! blocksize = 1024
//! loglevel = debug
//! track = true
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use diana_core::{DianaError, Result};

/// Options file read by [`ProxyConfig::load_default`]
pub const DEFAULT_CONFIG_FILE: &str = "diana.cfg";

/// Artemis servers listen here unless told otherwise
pub const DEFAULT_PORT: u16 = 2010;

/// Settings for the proxy and stream tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Address the proxy accepts clients on (from "listenhost")
    pub listen_host: String,
    /// Port the proxy accepts clients on (from "listenport", default: 2010)
    pub listen_port: u16,
    /// Upstream server host (from "serverhost")
    pub server_host: String,
    /// Upstream server port (from "serverport", default: 2010)
    pub server_port: u16,
    /// Socket read size in bytes (from "blocksize")
    pub block_size: usize,
    /// Default log filter when RUST_LOG is unset (from "loglevel")
    pub log_level: String,
    /// Keep a live object table of server traffic (from "track")
    pub track: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".into(),
            listen_port: DEFAULT_PORT,
            server_host: "127.0.0.1".into(),
            server_port: DEFAULT_PORT,
            block_size: 1024,
            log_level: "info".into(),
            track: true,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from an options file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DianaError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Load `diana.cfg` from the working directory, or defaults if it is absent
    pub fn load_default() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::load_from_file(DEFAULT_CONFIG_FILE)
        } else {
            tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            Ok(Self::default())
        }
    }

    /// Parse options file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(DianaError::Config(format!(
                    "Line {}: expected key = value, found {:?}",
                    number + 1,
                    line
                )));
            };
            config.parse_option(key.trim(), value.trim())?;
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "listenhost" => self.listen_host = value.into(),
            "listenport" => self.listen_port = parse_value(key, value)?,
            "serverhost" => self.server_host = value.into(),
            "serverport" => self.server_port = parse_value(key, value)?,
            "blocksize" => {
                self.block_size = parse_value(key, value)?;
                if self.block_size == 0 {
                    return Err(DianaError::Config("blocksize must be positive".into()));
                }
            }
            "loglevel" => self.log_level = value.into(),
            "track" => self.track = parse_value(key, value)?,
            _ => tracing::debug!("Ignoring unknown option {:?}", key),
        }
        Ok(())
    }

    /// Where the proxy listens for clients
    pub fn listen_address(&self) -> Result<SocketAddr> {
        socket_address(&self.listen_host, self.listen_port)
    }

    /// Where the upstream server is
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Log the effective configuration
    pub fn display(&self) {
        tracing::info!("Configuration:");
        tracing::info!("  Listen: {}:{}", self.listen_host, self.listen_port);
        tracing::info!("  Server: {}", self.server_address());
        tracing::info!("  Block size: {} bytes", self.block_size);
        tracing::info!("  Log level: {}", self.log_level);
        tracing::info!("  Object tracking: {}", self.track);
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| DianaError::Config(format!("Invalid value for {}: {:?}", key, value)))
}

fn socket_address(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|_| DianaError::Config(format!("Invalid listen address {}:{}", host, port)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_port, 2010);
        assert_eq!(config.server_address(), "127.0.0.1:2010");
        assert!(config.track);
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# proxy for the bridge crew
listenhost = 0.0.0.0
listenport = 2011
serverhost = artemis.local
blocksize = 4096
track = false
colour = blue
"#;
        let config = ProxyConfig::parse(config_text).unwrap();
        assert_eq!(config.listen_address().unwrap(), "0.0.0.0:2011".parse().unwrap());
        assert_eq!(config.server_address(), "artemis.local:2010");
        assert_eq!(config.block_size, 4096);
        assert!(!config.track);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(ProxyConfig::parse("listenport = lots").is_err());
        assert!(ProxyConfig::parse("blocksize = 0").is_err());
        assert!(ProxyConfig::parse("just some words").is_err());

        let config = ProxyConfig::parse("listenhost = not a host").unwrap();
        assert!(config.listen_address().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "serverhost = 192.168.1.20").unwrap();
        writeln!(file, "serverport = 2012").unwrap();

        let config = ProxyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server_address(), "192.168.1.20:2012");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProxyConfig::load_from_file(dir.path().join("absent.cfg"));
        assert!(matches!(result, Err(DianaError::Config(_))));
    }
}
