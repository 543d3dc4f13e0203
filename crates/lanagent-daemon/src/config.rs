//! Configuration loading and validation

use anyhow::Result;
use lanagent_discovery::{ScannerConfig, MAX_SWEEP_HOSTS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the HTTP server; port 0 picks a free port
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Seconds between scan starts
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Interface to scan (first eligible interface when unset)
    #[serde(default)]
    pub interface: Option<String>,
    /// Per-host ping timeout
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Pings in flight at once
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    /// Neighbor-table command timeout
    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_secs: u64,
    /// Cap on swept addresses for subnets wider than a /24
    #[serde(default = "default_max_hosts")]
    pub max_hosts: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            interface: None,
            probe_timeout_ms: default_probe_timeout(),
            probe_concurrency: default_probe_concurrency(),
            dump_timeout_secs: default_dump_timeout(),
            max_hosts: default_max_hosts(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_probe_concurrency() -> usize {
    50
}

fn default_dump_timeout() -> u64 {
    5
}

fn default_max_hosts() -> Option<usize> {
    Some(MAX_SWEEP_HOSTS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Advertise the API over mDNS
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_type: default_service_type(),
            description: default_description(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_service_type() -> String {
    "_lanagent._tcp.local.".to_string()
}

fn default_description() -> String {
    "LAN Agent network scanner with JSON API".to_string()
}

impl Config {
    /// Convert to ScannerConfig
    pub fn to_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            interval_secs: self.discovery.interval_secs,
            interface: self.discovery.interface.clone(),
            probe_timeout_ms: self.discovery.probe_timeout_ms,
            probe_concurrency: self.discovery.probe_concurrency,
            dump_timeout_secs: self.discovery.dump_timeout_secs,
            max_hosts: self.discovery.max_hosts,
        }
    }

    /// Parsed bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.daemon
            .bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", self.daemon.bind, e))
    }

    /// Replace the port of the bind address
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        let mut addr = self.bind_addr()?;
        addr.set_port(port);
        self.daemon.bind = addr.to_string();
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.discovery.interval_secs == 0 {
            anyhow::bail!("discovery.interval_secs must be at least 1");
        }
        if self.discovery.probe_concurrency == 0 {
            anyhow::bail!("discovery.probe_concurrency must be at least 1");
        }
        if self.discovery.dump_timeout_secs == 0 {
            anyhow::bail!("discovery.dump_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.discovery.interval_secs, 60);
        assert_eq!(config.announce.service_type, "_lanagent._tcp.local.");
        assert_eq!(config.to_scanner_config().max_hosts, Some(254));
    }

    #[test]
    fn test_discovery_section_without_max_hosts_keeps_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lanagent.toml");
        std::fs::write(&path, "[discovery]
interval_secs = 30
").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.discovery.interval_secs, 30);
        assert_eq!(config.discovery.max_hosts, Some(254));
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lanagent.toml");
        std::fs::write(
            &path,
            r#"
[daemon]
bind = "127.0.0.1:8080"

[discovery]
interface = "en0"
max_hosts = 1024
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
        assert_eq!(config.discovery.interface.as_deref(), Some("en0"));
        assert_eq!(config.discovery.probe_concurrency, 50);

        let scanner = config.to_scanner_config();
        assert_eq!(scanner.max_hosts, Some(1024));
        assert_eq!(scanner.interface.as_deref(), Some("en0"));
        assert!(config.announce.enabled);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lanagent.toml");
        std::fs::write(&path, "[discovery]\ninterval_secs = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_bad_bind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lanagent.toml");
        std::fs::write(&path, "[daemon]\nbind = \"not-an-address\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_set_port() {
        let mut config = Config::default();
        config.set_port(9000).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_default_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lanagent.toml");
        save_default_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), Config::default());
    }
}
