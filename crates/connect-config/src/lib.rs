use connect_core::{ConnectError, NodeId, Result};
use connect_mcp::McpServerConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod env_substitution;

pub use env_substitution::substitute_env_vars;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "connect.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub components: ComponentSettings,
    #[serde(default)]
    pub watch: WatchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root of the on-disk cache (`components/`, `frames/`, `requests/`)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Root the local component sources are resolved against
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "port_from_any")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_client_frameworks")]
    pub client_frameworks: String,
    #[serde(default = "default_client_languages")]
    pub client_languages: String,
    /// Design-tool MCP server; `null` runs without a bridge
    #[serde(default = "default_bridge_server")]
    pub server: Option<McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSettings {
    /// Node id to component name, consulted before the mapping
    #[serde(default = "default_known_components")]
    pub known: HashMap<String, String>,
    #[serde(default = "default_component_name")]
    pub default_name: String,
    /// Directories under `project_root` searched for `<name>.tsx` / `<name>.ts`
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Delay between a marker appearing and reading it
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl AppConfig {
    /// Load `path`, or `connect.yaml` if it exists, or built-in defaults.
    /// Environment overrides apply in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.normalize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::read_file(path.as_ref())?;
        config.normalize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config = Self::parse(yaml)?;
        config.normalize()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConnectError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::parse(&content)
    }

    fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut value: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| ConnectError::Config(format!("Failed to parse YAML: {}", e)))?;
        if value.is_null() {
            return Ok(Self::default());
        }

        substitute_env_vars(&mut value)?;
        serde_json::from_value(value)
            .map_err(|e| ConnectError::Config(format!("Invalid configuration: {}", e)))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = env::var("CONNECT_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(root) = env::var("CONNECT_PROJECT_ROOT") {
            self.paths.project_root = PathBuf::from(root);
        }
        if let Ok(port) = env::var("CONNECT_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConnectError::Config(format!("CONNECT_PORT is not a port: {}", port)))?;
        }
        Ok(())
    }

    /// Rewrite known-component keys into canonical `a:b` form
    fn normalize(&mut self) -> Result<()> {
        let known = std::mem::take(&mut self.components.known);
        for (key, name) in known {
            let node_id = NodeId::parse(&key).map_err(|_| {
                ConnectError::Config(format!("components.known has an invalid node id: {}", key))
            })?;
            self.components.known.insert(node_id.to_string(), name);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConnectError::Config("server.port cannot be 0".into()));
        }
        if self.components.default_name.trim().is_empty() {
            return Err(ConnectError::Config(
                "components.default_name cannot be empty".into(),
            ));
        }
        if self.components.source_dirs.is_empty() {
            return Err(ConnectError::Config(
                "components.source_dirs needs at least one directory".into(),
            ));
        }
        if self.paths.data_dir.as_os_str().is_empty() {
            return Err(ConnectError::Config("paths.data_dir cannot be empty".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            project_root: default_project_root(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            client_frameworks: default_client_frameworks(),
            client_languages: default_client_languages(),
            server: default_bridge_server(),
        }
    }
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            known: default_known_components(),
            default_name: default_component_name(),
            source_dirs: default_source_dirs(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf { PathBuf::from("./mcp-data") }
fn default_project_root() -> PathBuf { PathBuf::from(".") }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_client_name() -> String { "codeconnect-bridge".to_string() }
fn default_client_frameworks() -> String { "react".to_string() }
fn default_client_languages() -> String { "typescript".to_string() }
fn default_bridge_server() -> Option<McpServerConfig> { Some(McpServerConfig::figma_dev_mode()) }
fn default_component_name() -> String { "button".to_string() }
fn default_settle_ms() -> u64 { 100 }

fn default_known_components() -> HashMap<String, String> {
    [
        ("28:1289", "button"),
        ("12:65", "button"),
        ("12:272", "input"),
        ("12:301", "input"),
    ]
    .into_iter()
    .map(|(id, name)| (id.to_string(), name.to_string()))
    .collect()
}

fn default_source_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("registry/new-york-v4/ui"),
        PathBuf::from("components/ui"),
    ]
}

// Substituted values arrive as strings, so accept "3000" as well as 3000
fn port_from_any<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", text))),
    }
}
