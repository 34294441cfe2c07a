//! Configuration management.
//!
//! flowtoll configuration can come from:
//! - Config file (~/.config/flowtoll/config.toml, or an explicit path)
//! - Environment variables (FLOWTOLL_*), applied last

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "FLOWTOLL_";
const SERVER_ENV_PREFIX: &str = "FLOWTOLL_SERVER_";

/// flowtoll configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Text-generation collaborator used by AI decision steps
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool-call defaults
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Tool server name -> base endpoint
    #[serde(default = "default_servers")]
    pub servers: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            servers: default_servers(),
        }
    }
}

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed wait between retry attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Whole-run deadline (seconds); unset means no deadline
    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            run_timeout_seconds: None,
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Text-generation endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,

    /// Model used when a step gives no hint
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_agent_timeout")]
    pub timeout_seconds: u64,

    /// Flat charge recorded for every AI decision
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_agent_endpoint(),
            model: None,
            timeout_seconds: default_agent_timeout(),
            cost_per_call: default_cost_per_call(),
        }
    }
}

fn default_agent_endpoint() -> String {
    "http://localhost:3000/api/chat".to_string()
}

fn default_agent_timeout() -> u64 {
    30
}

fn default_cost_per_call() -> f64 {
    0.005
}

/// Tool-call configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-request timeout (seconds)
    #[serde(default = "default_tool_timeout")]
    pub timeout_seconds: u64,

    /// Charge used when neither the response nor the step gives one
    #[serde(default = "default_tool_cost")]
    pub default_cost: f64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_tool_timeout(),
            default_cost: default_tool_cost(),
        }
    }
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_tool_cost() -> f64 {
    0.01
}

fn default_servers() -> BTreeMap<String, String> {
    [
        ("lead-search", "http://localhost:3001"),
        ("geocoding", "http://localhost:3002"),
        ("weather", "http://localhost:3003"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

impl Config {
    /// Load configuration from the default location plus environment.
    ///
    /// A missing or unreadable default file falls back to defaults.
    pub fn load() -> Self {
        let mut config = Self::default();

        let path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&path) {
            config.apply_partial(partial);
        }

        config.apply_overrides(std::env::vars());
        config
    }

    /// Load configuration from an explicit file plus environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::default();

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let partial: PartialConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.apply_partial(partial);

        config.apply_overrides(std::env::vars());
        Ok(config)
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("flowtoll"))
            .unwrap_or_else(|| PathBuf::from(".flowtoll"))
    }

    /// Apply `FLOWTOLL_*` overrides from an environment snapshot.
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(server) = key.strip_prefix(SERVER_ENV_PREFIX) {
                if !server.is_empty() {
                    let name = server.to_ascii_lowercase().replace('_', "-");
                    self.servers.insert(name, value);
                }
                continue;
            }

            let Some(setting) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match setting {
                "AGENT_ENDPOINT" => self.agent.endpoint = value,
                "AGENT_MODEL" => self.agent.model = Some(value),
                "AGENT_TIMEOUT_SECONDS" => {
                    if let Ok(parsed) = value.parse() {
                        self.agent.timeout_seconds = parsed;
                    }
                }
                "RETRY_DELAY_MS" => {
                    if let Ok(parsed) = value.parse() {
                        self.engine.retry_delay_ms = parsed;
                    }
                }
                "RUN_TIMEOUT_SECONDS" => {
                    if let Ok(parsed) = value.parse() {
                        self.engine.run_timeout_seconds = Some(parsed);
                    }
                }
                "TOOL_TIMEOUT_SECONDS" => {
                    if let Ok(parsed) = value.parse() {
                        self.tools.timeout_seconds = parsed;
                    }
                }
                _ => {}
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(engine) = partial.engine {
            self.engine = engine;
        }
        if let Some(agent) = partial.agent {
            self.agent = agent;
        }
        if let Some(tools) = partial.tools {
            self.tools = tools;
        }
        if let Some(servers) = partial.servers {
            self.servers.extend(servers);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    engine: Option<EngineConfig>,
    agent: Option<AgentConfig>,
    tools: Option<ToolsConfig>,
    servers: Option<BTreeMap<String, String>>,
}
