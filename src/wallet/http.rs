//! JSON-RPC over HTTP wallet provider
//!
//! Forwards EIP-1193 requests to an HTTP endpoint (a node with unlocked
//! accounts, or a wallet bridge). HTTP has no push channel, so a polling
//! watcher compares `eth_chainId` / `eth_accounts` between ticks and
//! publishes the differences as provider events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::network::hex_chain_id;

use super::chooser::ProviderConnector;
use super::ens;
use super::provider::{ProviderError, ProviderEvent, WalletProvider};

/// Event channel capacity per provider
const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Wallet provider backed by a JSON-RPC HTTP endpoint
pub struct HttpProvider {
    client: Client,
    endpoint: String,
    connection_url: String,
    next_id: AtomicU64,
    events: broadcast::Sender<ProviderEvent>,
}

impl HttpProvider {
    pub fn new(endpoint: &str, connection_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            connection_url: connection_url.to_string(),
            next_id: AtomicU64::new(1),
            events,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start polling for chain and account changes
    ///
    /// The watcher holds only a weak reference and stops once the provider
    /// is dropped.
    pub fn watch(self: &Arc<Self>, poll_interval: Duration) -> JoinHandle<()> {
        let provider: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            let mut last: Option<(u64, Vec<String>)> = None;

            loop {
                ticker.tick().await;

                let Some(strong) = provider.upgrade() else {
                    debug!("Provider dropped, stopping watcher");
                    break;
                };

                let observed = match (strong.chain_id().await, strong.accounts().await) {
                    (Ok(chain_id), Ok(accounts)) => (chain_id, accounts),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Provider poll failed: {}", e);
                        continue;
                    }
                };

                if let Some((chain_id, accounts)) = &last {
                    if *chain_id != observed.0 {
                        strong.publish(ProviderEvent::ChainChanged(hex_chain_id(observed.0)));
                    }
                    if *accounts != observed.1 {
                        strong.publish(ProviderEvent::AccountsChanged(observed.1.clone()));
                    }
                }
                last = Some(observed);
            }
        })
    }

    fn publish(&self, event: ProviderEvent) {
        debug!("Provider event: {:?}", event);
        // No receivers just means nobody is connected through us
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let payload: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        match payload {
            JsonRpcResponse {
                error: Some(error), ..
            } => Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            }),
            JsonRpcResponse { result, .. } => Ok(result.unwrap_or(Value::Null)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    fn connection_url(&self) -> &str {
        &self.connection_url
    }

    async fn lookup_address(&self, address: &str) -> std::result::Result<Option<String>, ProviderError> {
        ens::reverse_lookup(self, address).await
    }
}

/// Connector opening an [`HttpProvider`] with a running watcher
pub struct HttpConnector {
    name: String,
    endpoint: String,
    connection_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl HttpConnector {
    pub fn new(
        name: &str,
        endpoint: &str,
        connection_url: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            connection_url: connection_url.to_string(),
            timeout,
            poll_interval,
        }
    }
}

#[async_trait]
impl ProviderConnector for HttpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<Arc<dyn WalletProvider>> {
        let provider = Arc::new(HttpProvider::new(
            &self.endpoint,
            &self.connection_url,
            self.timeout,
        )?);
        // Fail fast on unreachable endpoints instead of mid-connect
        provider.chain_id().await?;
        provider.watch(self.poll_interval);

        info!("Opened HTTP provider at {}", self.endpoint);
        Ok(provider)
    }
}
