//! Configuration module
//!
//! Node configuration is read from a TOML file, by default
//! `~/.config/wwcp/config.toml`. The `WWCP_CONFIG` environment variable
//! points at a different file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::IdError;
use crate::domain::ids::{
    ChargingPoolId, ChargingStationId, ChargingStationOperatorId, EMobilityProviderId, EvseId,
    RoamingNetworkId,
};
use crate::overlay::NetworkingNodeId;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "WWCP_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid {field}: {source}")]
    InvalidId {
        field: String,
        source: IdError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Default config location under the user's config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wwcp")
        .join("config.toml")
}

/// `WWCP_CONFIG` if set, otherwise [`default_config_path`].
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub node: NodeConfig,
    pub roaming_network: RoamingNetworkConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `wwcp=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Networking node id of this node
    pub id: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Seconds to wait for cleanup on shutdown
    pub shutdown_timeout: u64,
    /// Neighbour used when no link or route matches
    pub default_route: Option<String>,
    pub routes: Vec<RouteConfig>,
    pub uplink: Option<UplinkConfig>,
}

impl NodeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "wwcp-node".to_string(),
            host: "0.0.0.0".to_string(),
            port: 9920,
            request_timeout_secs: 30,
            shutdown_timeout: 30,
            default_route: None,
            routes: Vec::new(),
            uplink: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub destination: String,
    pub via: String,
}

/// Node this node connects to itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkConfig {
    /// Base URL, e.g. `ws://hub.example.org:9920`; the local node id is appended.
    pub url: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoamingNetworkConfig {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub operators: Vec<OperatorConfig>,
    pub providers: Vec<ProviderConfig>,
    /// Overlay nodes receiving EVSE status pushes
    pub partners: Vec<PartnerConfig>,
}

impl Default for RoamingNetworkConfig {
    fn default() -> Self {
        Self {
            id: "Prod".to_string(),
            name: "Production".to_string(),
            description: None,
            operators: Vec::new(),
            providers: Vec::new(),
            partners: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stations: Vec<StationConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    #[serde(default)]
    pub evses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerConfig {
    pub id: String,
    pub node_id: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }

    /// Check that every id in the config parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        node_id("node.id", &self.node.id)?;
        if let Some(via) = &self.node.default_route {
            node_id("node.default_route", via)?;
        }
        for route in &self.node.routes {
            node_id("node.routes.destination", &route.destination)?;
            node_id("node.routes.via", &route.via)?;
        }
        if let Some(uplink) = &self.node.uplink {
            node_id("node.uplink.node_id", &uplink.node_id)?;
            if !uplink.url.starts_with("ws://") && !uplink.url.starts_with("wss://") {
                return Err(ConfigError::Invalid(format!(
                    "uplink url '{}' must start with ws:// or wss://",
                    uplink.url
                )));
            }
        }
        if self.node.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "node.request_timeout_secs must be positive".to_string(),
            ));
        }

        let rn = &self.roaming_network;
        parse_id("roaming_network.id", &rn.id, RoamingNetworkId::parse)?;
        for operator in &rn.operators {
            parse_id("operator id", &operator.id, ChargingStationOperatorId::parse)?;
            for pool in &operator.pools {
                parse_id("pool id", &pool.id, ChargingPoolId::parse)?;
                for station in &pool.stations {
                    parse_id("station id", &station.id, ChargingStationId::parse)?;
                    for evse in &station.evses {
                        parse_id("EVSE id", evse, EvseId::parse)?;
                    }
                }
            }
        }
        for provider in &rn.providers {
            parse_id("provider id", &provider.id, EMobilityProviderId::parse)?;
        }
        for partner in &rn.partners {
            node_id("roaming_network.partners.node_id", &partner.node_id)?;
        }
        Ok(())
    }
}

pub(crate) fn parse_id<T>(
    field: &str,
    text: &str,
    parse: impl FnOnce(&str) -> Result<T, IdError>,
) -> Result<T, ConfigError> {
    parse(text).map_err(|source| ConfigError::InvalidId {
        field: format!("{} '{}'", field, text),
        source,
    })
}

pub(crate) fn node_id(field: &str, text: &str) -> Result<NetworkingNodeId, ConfigError> {
    parse_id(field, text, NetworkingNodeId::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[logging]
level = "debug"
format = "json"

[node]
id = "CSMS-1"
port = 9000
default_route = "HUB"

[node.uplink]
url = "ws://hub.example.org:9920"
node_id = "HUB"

[roaming_network]
id = "Test"
name = "Test network"

[[roaming_network.operators]]
id = "DE*GEF"
name = "GraphDefined"

[[roaming_network.operators.pools]]
id = "DE*GEF*P1"

[[roaming_network.operators.pools.stations]]
id = "DE*GEF*S1"
evses = ["DE*GEF*E1*1", "DE*GEF*E1*2"]

[[roaming_network.providers]]
id = "DE*ICE"
name = "Provider"
"#;

    #[test]
    fn parses_sample() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.node.address(), "0.0.0.0:9000");
        assert_eq!(config.node.request_timeout_secs, 30);
        assert_eq!(config.roaming_network.operators[0].pools[0].stations[0].evses.len(), 2);
        assert_eq!(config.node.uplink.as_ref().map(|u| u.node_id.as_str()), Some("HUB"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_bad_ids() {
        let err = AppConfig::from_toml("[node]\nid = \"a b\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidId { .. }));

        let err = AppConfig::from_toml(
            "[[roaming_network.operators]]\nid = \"nonsense\"\nname = \"x\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidId { .. }));

        let err = AppConfig::from_toml("[node.uplink]\nurl = \"http://x\"\nnode_id = \"HUB\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AppConfig::from_toml(SAMPLE).unwrap();

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
