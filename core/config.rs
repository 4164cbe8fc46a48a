use serde::Deserialize;
use std::time::Duration;

use crate::policy::Policy;

#[derive(Debug, Deserialize)]
pub struct GenConfig {
    pub sources: Vec<String>,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Deserialize)]
pub struct PolicyConfig {
    pub server_override: Option<String>,
    #[serde(default)]
    pub require_websocket: bool,
    pub allowed_ports: Option<Vec<u16>>,
    pub require_region_tags: Option<Vec<String>>,
    #[serde(default)]
    pub require_liveness: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    pub name_strip: Option<String>,
    pub relay_tag: Option<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            server_override: None,
            require_websocket: false,
            allowed_ports: None,
            require_region_tags: None,
            require_liveness: false,
            probe_timeout_ms: default_probe_timeout_ms(),
            name_strip: None,
            relay_tag: None,
        }
    }
}

fn default_output() -> String {
    "proxies.yaml".to_string()
}

fn default_interval() -> u64 {
    3600
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_probe_timeout_ms() -> u64 {
    1500
}

#[derive(Debug)]
pub enum ConfigError {
    Yaml(String),
    Invalid(String),
}

pub fn parse_config(yaml: &str) -> Result<GenConfig, ConfigError> {
    let config: GenConfig =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &GenConfig) -> Result<(), ConfigError> {
    if config.sources.is_empty() {
        return Err(ConfigError::Invalid(
            "sources must not be empty".to_string(),
        ));
    }
    for source in &config.sources {
        if source.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sources must not contain empty entries".to_string(),
            ));
        }
    }
    if config.output.trim().is_empty() {
        return Err(ConfigError::Invalid("output must not be empty".to_string()));
    }
    if config.interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "interval_secs must be > 0".to_string(),
        ));
    }
    if config.fetch_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "fetch_timeout_secs must be > 0".to_string(),
        ));
    }
    validate_policy(&config.policy)
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    if let Some(ref ports) = policy.allowed_ports {
        if ports.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_ports must not be empty".to_string(),
            ));
        }
        if ports.contains(&0) {
            return Err(ConfigError::Invalid(
                "allowed_ports must not contain 0".to_string(),
            ));
        }
    }
    if let Some(ref tags) = policy.require_region_tags {
        if tags.is_empty() || tags.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "require_region_tags must contain non-empty tags".to_string(),
            ));
        }
    }
    if policy.probe_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "probe_timeout_ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Policy {
        Policy {
            server_override: self.server_override.clone(),
            require_websocket: self.require_websocket,
            allowed_ports: self
                .allowed_ports
                .as_ref()
                .map(|ports| ports.iter().copied().collect()),
            require_region_tags: self.require_region_tags.clone(),
            require_liveness: self.require_liveness,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            name_strip: self.name_strip.clone(),
            relay_tag: self.relay_tag.clone(),
        }
    }
}

impl GenConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
