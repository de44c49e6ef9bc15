//! Wallet provider capability surface
//!
//! Anything able to answer EIP-1193 style `request(method, params)` calls and
//! publish `accountsChanged` / `chainChanged` events can back a session.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::network::parse_chain_id;

/// Connection-url marker carried by the primary (injected) provider kind
pub const PRIMARY_PROVIDER_URL: &str = "metamask";

/// Provider error code for a chain the provider does not know about
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Provider error code for a request the user rejected
pub const USER_REJECTED_CODE: i64 = 4001;

/// Errors reported by a wallet provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Provider error code, if the provider answered with one
    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(UNRECOGNIZED_CHAIN_CODE)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
    }
}

/// Push-style notifications emitted by a connected provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New account list (may be empty when the wallet locked)
    AccountsChanged(Vec<String>),
    /// New chain id as reported by the provider (usually hex)
    ChainChanged(String),
}

/// A connected signing provider
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Forward a raw request to the provider
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to provider events, delivered in emission order
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Marker identifying the provider kind
    fn connection_url(&self) -> &str;

    /// Chain the provider is currently on
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        let chain_id = match &value {
            Value::String(raw) => parse_chain_id(raw),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        chain_id
            .ok_or_else(|| ProviderError::InvalidResponse(format!("eth_chainId returned {}", value)))
    }

    /// Accounts exposed to this client
    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        let value = self.request("eth_accounts", json!([])).await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("eth_accounts: {}", e)))
    }

    /// Reverse name lookup for an address
    ///
    /// Providers without name resolution report no name.
    async fn lookup_address(&self, _address: &str) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}
