//! Provider chooser - picks which wallet provider a session connects through
//!
//! The chooser remembers the last selection on disk so a restarted client
//! can restore its session without prompting again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dialoguer::Select;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::provider::WalletProvider;

/// Collaborator handing out provider handles
#[async_trait]
pub trait ProviderChooser: Send + Sync {
    /// Obtain a provider, prompting the user if needed
    ///
    /// May suspend indefinitely while a prompt is open.
    async fn connect(&self) -> Result<Arc<dyn WalletProvider>>;

    /// Forget the remembered selection
    fn clear_cached_selection(&self);

    /// Whether a previous selection is remembered
    fn has_cached_selection(&self) -> bool;
}

/// Something that can open a provider connection
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// Stable name used for prompts and the selection cache
    fn name(&self) -> &str;

    async fn open(&self) -> Result<Arc<dyn WalletProvider>>;
}

/// Remembered provider selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSelection {
    pub provider: String,
    pub selected_at: DateTime<Utc>,
}

/// JSON file holding the remembered selection
#[derive(Debug, Clone)]
pub struct SelectionCache {
    path: PathBuf,
}

impl SelectionCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached selection
    ///
    /// A missing or unreadable cache counts as no selection.
    pub fn load(&self) -> Option<CachedSelection> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(selection) => Some(selection),
            Err(e) => {
                warn!("Ignoring corrupt provider cache {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn store(&self, provider: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let selection = CachedSelection {
            provider: provider.to_string(),
            selected_at: Utc::now(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&selection)?)?;
        debug!("Cached provider selection {} at {:?}", provider, self.path);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Chooser over a fixed list of connectors
///
/// Resolution order: cached selection, sole connector, interactive prompt.
pub struct ConfiguredChooser {
    connectors: Vec<Arc<dyn ProviderConnector>>,
    cache: SelectionCache,
    interactive: bool,
}

impl ConfiguredChooser {
    pub fn new(
        connectors: Vec<Arc<dyn ProviderConnector>>,
        cache: SelectionCache,
        interactive: bool,
    ) -> Self {
        Self {
            connectors,
            cache,
            interactive,
        }
    }

    fn find(&self, name: &str) -> Option<Arc<dyn ProviderConnector>> {
        self.connectors.iter().find(|c| c.name() == name).cloned()
    }

    async fn select(&self) -> Result<Arc<dyn ProviderConnector>> {
        if let Some(cached) = self.cache.load() {
            match self.find(&cached.provider) {
                Some(connector) => {
                    debug!("Using cached provider selection {}", cached.provider);
                    return Ok(connector);
                }
                None => warn!(
                    "Cached provider {} is no longer configured",
                    cached.provider
                ),
            }
        }

        match self.connectors.len() {
            0 => Err(Error::ConnectionAborted(
                "no wallet providers configured".to_string(),
            )),
            1 => Ok(self.connectors[0].clone()),
            _ if self.interactive => self.prompt().await,
            _ => Err(Error::ConnectionAborted(
                "multiple wallet providers configured and prompting is disabled".to_string(),
            )),
        }
    }

    async fn prompt(&self) -> Result<Arc<dyn ProviderConnector>> {
        let names: Vec<String> = self.connectors.iter().map(|c| c.name().to_string()).collect();

        let choice = tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt("Select a wallet provider")
                .items(&names)
                .default(0)
                .interact_opt()
        })
        .await
        .map_err(|e| Error::ConnectionAborted(format!("provider prompt failed: {}", e)))?
        .map_err(|e| Error::ConnectionAborted(format!("provider prompt failed: {}", e)))?;

        match choice {
            Some(index) => Ok(self.connectors[index].clone()),
            None => Err(Error::ConnectionAborted(
                "provider selection dismissed".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ProviderChooser for ConfiguredChooser {
    async fn connect(&self) -> Result<Arc<dyn WalletProvider>> {
        let connector = self.select().await?;
        info!("Connecting through provider {}", connector.name());

        let provider = connector.open().await.map_err(|e| match e {
            Error::ConnectionAborted(_) => e,
            other => Error::ConnectionAborted(other.to_string()),
        })?;

        if let Err(e) = self.cache.store(connector.name()) {
            warn!("Failed to cache provider selection: {}", e);
        }
        Ok(provider)
    }

    fn clear_cached_selection(&self) {
        if let Err(e) = self.cache.clear() {
            warn!("Failed to clear provider cache {:?}: {}", self.cache.path(), e);
        }
    }

    fn has_cached_selection(&self) -> bool {
        self.cache.load().is_some()
    }
}
