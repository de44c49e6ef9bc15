//! Circuit asset fetching

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::config::AssetsConfig;
use crate::error::{Error, Result};

use super::kind::ProofKind;

/// Source of raw asset bytes
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch one asset by file name
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

fn fetch_error(locator: &str, reason: impl ToString) -> Error {
    Error::AssetFetch {
        locator: locator.to_string(),
        reason: reason.to_string(),
    }
}

/// Fetches assets relative to a base URL
pub struct HttpAssetFetcher {
    client: Client,
    base: Url,
}

impl HttpAssetFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid asset base URL {}: {}", base_url, e)))?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn resolve(&self, locator: &str) -> Result<Url> {
        self.base
            .join(locator)
            .map_err(|e| fetch_error(locator, e))
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let url = self.resolve(locator)?;
        debug!("Fetching asset {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(locator, format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| fetch_error(locator, e))?;
        Ok(body.to_vec())
    }
}

/// Reads assets from a local directory
pub struct FsAssetFetcher {
    dir: PathBuf,
}

impl FsAssetFetcher {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AssetFetcher for FsAssetFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(locator);
        debug!("Reading asset {}", path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| fetch_error(locator, e))
    }
}

/// Pick the fetcher the asset configuration describes
pub fn fetcher_from_config(config: &AssetsConfig) -> Result<Arc<dyn AssetFetcher>> {
    match &config.local_dir {
        Some(dir) => Ok(Arc::new(FsAssetFetcher::new(dir))),
        None => Ok(Arc::new(HttpAssetFetcher::new(
            &config.base_url,
            config.timeout(),
        )?)),
    }
}

/// Both assets for one proof kind
#[derive(Clone)]
pub struct ProofAssets {
    pub kind: ProofKind,
    pub circuit: Vec<u8>,
    pub representation: Vec<u8>,
}

impl ProofAssets {
    /// SHA-256 over circuit then representation, lowercase hex
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.circuit);
        hasher.update(&self.representation);
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for ProofAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofAssets")
            .field("kind", &self.kind)
            .field("circuit_bytes", &self.circuit.len())
            .field("representation_bytes", &self.representation.len())
            .finish()
    }
}

/// Loads the asset pair for a proof kind
#[derive(Clone)]
pub struct ProofAssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
}

impl ProofAssetLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch both assets concurrently; either failing fails the load
    pub async fn load(&self, kind: ProofKind) -> Result<ProofAssets> {
        let files = kind.assets();
        let (circuit, representation) = tokio::try_join!(
            self.fetcher.fetch(files.circuit),
            self.fetcher.fetch(files.representation),
        )?;

        let assets = ProofAssets {
            kind,
            circuit,
            representation,
        };
        debug!(
            "Loaded {} assets ({} + {} bytes, sha256 {})",
            kind,
            assets.circuit.len(),
            assets.representation.len(),
            assets.digest()
        );
        Ok(assets)
    }
}
