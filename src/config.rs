//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::network::NetworkPolicy;
use crate::wallet::PRIMARY_PROVIDER_URL;

/// Name under which the primary provider is offered and cached
pub const PRIMARY_PROVIDER_NAME: &str = "injected";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Chain the session negotiates towards; must be in the supported set
    #[serde(default = "default_chain_id")]
    pub default_chain_id: u64,
    /// Per-chain RPC URL overrides keyed by decimal or hex chain id
    #[serde(default)]
    pub rpc_overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Marker reported by the provider handle
    #[serde(default = "default_connection_url")]
    pub connection_url: String,
    /// Extra named providers offered alongside the primary one (name -> RPC URL)
    #[serde(default)]
    pub additional: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    #[serde(default = "default_true")]
    pub auto_restore: bool,
    #[serde(default = "default_true")]
    pub interactive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_assets_base_url")]
    pub base_url: String,
    /// Read assets from this directory instead of `base_url`
    #[serde(default)]
    pub local_dir: Option<String>,
    #[serde(default = "default_assets_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SessionConfig {
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_path)
    }
}

impl AssetsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_chain_id: default_chain_id(),
            rpc_overrides: HashMap::new(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_provider_timeout_ms(),
            connection_url: default_connection_url(),
            additional: HashMap::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            auto_restore: true,
            interactive: true,
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_url: default_assets_base_url(),
            local_dir: None,
            timeout_ms: default_assets_timeout_ms(),
        }
    }
}

// Default value functions
fn default_chain_id() -> u64 {
    5
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

fn default_connection_url() -> String {
    PRIMARY_PROVIDER_URL.to_string()
}

fn default_cache_path() -> String {
    ".battlezips/provider.json".to_string()
}

fn default_assets_base_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_assets_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("network.default_chain_id", default_chain_id() as i64)?
            .set_default("provider.rpc_url", default_rpc_url())?
            .set_default("provider.poll_interval_ms", default_poll_interval_ms() as i64)?
            .set_default("provider.timeout_ms", default_provider_timeout_ms() as i64)?
            .set_default("assets.base_url", default_assets_base_url())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix BATTLEZIPS_)
            .add_source(
                config::Environment::with_prefix("BATTLEZIPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.network_policy()
            .context("Invalid network configuration")?;

        if self.provider.poll_interval_ms == 0 {
            anyhow::bail!("provider.poll_interval_ms must be positive");
        }

        if self.provider.timeout_ms == 0 {
            anyhow::bail!("provider.timeout_ms must be positive");
        }

        if self.assets.timeout_ms == 0 {
            anyhow::bail!("assets.timeout_ms must be positive");
        }

        url::Url::parse(&self.provider.rpc_url)
            .with_context(|| format!("Invalid provider.rpc_url: {}", self.provider.rpc_url))?;

        for (name, rpc_url) in &self.provider.additional {
            if name == PRIMARY_PROVIDER_NAME {
                anyhow::bail!("provider.additional cannot redefine '{}'", PRIMARY_PROVIDER_NAME);
            }
            url::Url::parse(rpc_url)
                .with_context(|| format!("Invalid RPC URL for provider '{}': {}", name, rpc_url))?;
        }

        if self.assets.local_dir.is_none() {
            url::Url::parse(&self.assets.base_url)
                .with_context(|| format!("Invalid assets.base_url: {}", self.assets.base_url))?;
        }

        if self.session.cache_path.is_empty() {
            anyhow::bail!("session.cache_path cannot be empty");
        }

        Ok(())
    }

    /// Network policy for the configured default chain and overrides
    pub fn network_policy(&self) -> crate::Result<NetworkPolicy> {
        NetworkPolicy::with_overrides(self.network.default_chain_id, &self.network.rpc_overrides)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let mut overrides: Vec<_> = self
            .network
            .rpc_overrides
            .iter()
            .map(|(chain, url)| format!("{}={}", chain, mask_url(url)))
            .collect();
        overrides.sort();

        let mut additional: Vec<_> = self
            .provider
            .additional
            .iter()
            .map(|(name, url)| format!("{}={}", name, mask_url(url)))
            .collect();
        additional.sort();

        format!(
            r#"Configuration:
  Network:
    default_chain_id: {}
    rpc_overrides: {:?}
  Provider:
    rpc_url: {}
    poll_interval: {}ms
    timeout: {}ms
    connection_url: {}
    additional: {:?}
  Session:
    cache_path: {}
    auto_restore: {}
    interactive: {}
  Assets:
    base_url: {}
    local_dir: {}
    timeout: {}ms
"#,
            self.network.default_chain_id,
            overrides,
            mask_url(&self.provider.rpc_url),
            self.provider.poll_interval_ms,
            self.provider.timeout_ms,
            self.provider.connection_url,
            additional,
            self.session.cache_path,
            self.session.auto_restore,
            self.session.interactive,
            mask_url(&self.assets.base_url),
            self.assets.local_dir.as_deref().unwrap_or("(not set)"),
            self.assets.timeout_ms,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            provider: ProviderConfig::default(),
            session: SessionConfig::default(),
            assets: AssetsConfig::default(),
        }
    }
}
