//! FleetWatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main FleetWatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level override (CLI flag takes precedence)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Cloud platform configuration
    pub cloud: CloudConfig,

    /// Fleet sizing and provisioning pacing
    pub fleet: FleetConfig,

    /// Priority queue tuning
    pub queue: QueueConfig,

    /// Worker pool tuning
    pub pool: PoolConfig,

    /// Storage locations
    pub storage: StorageConfig,

    /// Watched target groups
    pub watch: WatchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.cloud.api_token_env).is_err() {
            return Err(eyre::eyre!(
                "Cloud API token not found. Set the {} environment variable.",
                self.cloud.api_token_env
            ));
        }
        if self.fleet.regions.is_empty() {
            return Err(eyre::eyre!("Fleet region list is empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .fleetwatch.yml
        let local_config = PathBuf::from(".fleetwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/fleetwatch/fleetwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fleetwatch").join("fleetwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Path of the persisted fleet state file
    pub fn fleet_state_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("fleet.json")
    }

    /// Directory of the observation store
    pub fn observations_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("observations")
    }
}

/// Cloud platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Provisioning API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API token
    #[serde(rename = "api-token-env")]
    pub api_token_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Port the proxy container listens on
    #[serde(rename = "proxy-port")]
    pub proxy_port: u16,

    /// Well-known cluster name, one per region
    #[serde(rename = "cluster-name")]
    pub cluster_name: String,

    /// Well-known network-access rule name, one per region
    #[serde(rename = "network-rule-name")]
    pub network_rule_name: String,

    /// Well-known task template name, one per region
    #[serde(rename = "task-template-name")]
    pub task_template_name: String,

    /// Well-known execution identity name, shared across regions
    #[serde(rename = "execution-identity-name")]
    pub execution_identity_name: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4566".to_string(),
            api_token_env: "FLEETWATCH_CLOUD_TOKEN".to_string(),
            timeout_ms: 30_000,
            proxy_port: 3128,
            cluster_name: "fleetwatch".to_string(),
            network_rule_name: "fleetwatch-egress".to_string(),
            task_template_name: "fleetwatch-proxy".to_string(),
            execution_identity_name: "fleetwatch-exec".to_string(),
        }
    }
}

/// Fleet sizing and provisioning pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Regions provisioning round-robins over
    pub regions: Vec<String>,

    /// Desired fleet size for `run`
    pub size: usize,

    /// Concurrent create-service submissions per chunk
    #[serde(rename = "submit-concurrency")]
    pub submit_concurrency: usize,

    /// Delay between submission chunks in milliseconds
    #[serde(rename = "chunk-delay-ms")]
    pub chunk_delay_ms: u64,

    /// Readiness deadline per unit in seconds
    #[serde(rename = "readiness-timeout-secs")]
    pub readiness_timeout_secs: u64,

    /// Interval between readiness polls in seconds
    #[serde(rename = "readiness-poll-secs")]
    pub readiness_poll_secs: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            regions: vec![
                "us-east-1".to_string(),
                "us-west-2".to_string(),
                "eu-west-1".to_string(),
            ],
            size: 2,
            submit_concurrency: 5,
            chunk_delay_ms: 1000,
            readiness_timeout_secs: 300,
            readiness_poll_secs: 5,
        }
    }
}

/// Priority queue tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Base line-cutting distance; tier limits scale from this
    #[serde(rename = "base-limit")]
    pub base_limit: usize,

    /// Minimum seconds between priority re-checks of one target
    #[serde(rename = "throttle-secs")]
    pub throttle_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_limit: 5,
            throttle_secs: 30,
        }
    }
}

/// Worker pool tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Delay between items on one worker in milliseconds
    #[serde(rename = "item-delay-ms")]
    pub item_delay_ms: u64,

    /// Sleep when the queue is momentarily empty in milliseconds
    #[serde(rename = "idle-delay-ms")]
    pub idle_delay_ms: u64,

    /// Page executor timeout in milliseconds
    #[serde(rename = "executor-timeout-ms")]
    pub executor_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: 500,
            idle_delay_ms: 1000,
            executor_timeout_ms: 30_000,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for fleet state, observations, and logs
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/fleetwatch on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("fleetwatch"))
            .unwrap_or_else(|| PathBuf::from(".fleetwatch"))
            .to_string_lossy()
            .into_owned();

        Self { data_dir }
    }
}

/// Watched target groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Target groups, interleaved fairly into the base rotation
    pub groups: Vec<WatchGroup>,
}

/// One source of targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchGroup {
    /// Grouping key, also the observation file name
    pub name: String,

    /// Target URLs in this group
    pub targets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.fleet.submit_concurrency, 5);
        assert_eq!(config.fleet.readiness_timeout_secs, 300);
        assert_eq!(config.queue.base_limit, 5);
        assert_eq!(config.queue.throttle_secs, 30);
        assert_eq!(config.pool.item_delay_ms, 500);
        assert_eq!(config.pool.executor_timeout_ms, 30_000);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
cloud:
  base-url: https://compute.example.com
  api-token-env: MY_TOKEN
  proxy-port: 8888

fleet:
  regions: [eu-central-1]
  size: 4
  submit-concurrency: 3

queue:
  base-limit: 8
  throttle-secs: 60

watch:
  groups:
    - name: widgets
      targets:
        - https://shop.example.com/widget-a
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.cloud.base_url, "https://compute.example.com");
        assert_eq!(config.cloud.api_token_env, "MY_TOKEN");
        assert_eq!(config.cloud.proxy_port, 8888);
        assert_eq!(config.fleet.regions, vec!["eu-central-1"]);
        assert_eq!(config.fleet.size, 4);
        assert_eq!(config.fleet.submit_concurrency, 3);
        assert_eq!(config.queue.base_limit, 8);
        assert_eq!(config.watch.groups.len(), 1);
        assert_eq!(config.watch.groups[0].targets.len(), 1);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
fleet:
  size: 10
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.fleet.size, 10);

        // Defaults for unspecified
        assert_eq!(config.fleet.submit_concurrency, 5);
        assert_eq!(config.cloud.api_token_env, "FLEETWATCH_CLOUD_TOKEN");
        assert_eq!(config.pool.item_delay_ms, 500);
    }

    #[test]
    #[serial]
    fn test_validation_missing_token() {
        let mut config = Config::default();
        config.cloud.api_token_env = "NONEXISTENT_FLEETWATCH_TOKEN_12345".to_string();

        let result = config.validate();

        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("NONEXISTENT_FLEETWATCH_TOKEN_12345"));
    }

    #[test]
    #[serial]
    fn test_validation_empty_regions() {
        // SAFETY: serialized test, no concurrent env access
        unsafe {
            std::env::set_var("FLEETWATCH_CLOUD_TOKEN", "test-token");
        }

        let mut config = Config::default();
        config.fleet.regions.clear();
        let result = config.validate();

        // SAFETY: serialized test, no concurrent env access
        unsafe {
            std::env::remove_var("FLEETWATCH_CLOUD_TOKEN");
        }

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("region list"));
    }
}
