//! Wallet session state and read model

use std::fmt;
use std::sync::Arc;

use super::provider::{WalletProvider, PRIMARY_PROVIDER_URL};

/// Connection phase of a wallet session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Mutable state owned by a wallet session
#[derive(Clone, Default)]
pub struct WalletSessionState {
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub chain_id: Option<u64>,
    /// Lowercase hex address
    pub address: Option<String>,
    /// Reverse-resolved name, if any
    pub name: Option<String>,
    pub connecting: bool,
}

impl WalletSessionState {
    pub fn is_connected(&self) -> bool {
        self.provider.is_some() && self.address.is_some() && self.chain_id.is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.connecting {
            SessionStatus::Connecting
        } else if self.is_connected() {
            SessionStatus::Connected
        } else {
            SessionStatus::Idle
        }
    }

    /// Drop everything except the connecting flag
    pub fn clear(&mut self) {
        let connecting = self.connecting;
        *self = Self {
            connecting,
            ..Self::default()
        };
    }
}

impl fmt::Debug for WalletSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSessionState")
            .field(
                "provider",
                &self.provider.as_ref().map(|p| p.connection_url().to_string()),
            )
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .field("name", &self.name)
            .field("connecting", &self.connecting)
            .finish()
    }
}

/// Read-only view of a session handed to callers
#[derive(Clone)]
pub struct SessionSnapshot {
    pub provider: Option<Arc<dyn WalletProvider>>,
    pub chain_id: Option<u64>,
    pub address: Option<String>,
    pub name: Option<String>,
    pub connected: bool,
    pub connecting: bool,
    /// Provider carries the primary (injected) provider marker
    pub is_primary_provider_kind: bool,
}

impl From<&WalletSessionState> for SessionSnapshot {
    fn from(state: &WalletSessionState) -> Self {
        Self {
            provider: state.provider.clone(),
            chain_id: state.chain_id,
            address: state.address.clone(),
            name: state.name.clone(),
            connected: state.is_connected(),
            connecting: state.connecting,
            is_primary_provider_kind: state
                .provider
                .as_ref()
                .map(|p| p.connection_url() == PRIMARY_PROVIDER_URL)
                .unwrap_or(false),
        }
    }
}

impl SessionSnapshot {
    /// Name if resolved, otherwise the shortened address
    pub fn display_name(&self) -> String {
        format_address(self.address.as_deref(), self.name.as_deref(), 4)
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .field("name", &self.name)
            .field("connected", &self.connected)
            .field("connecting", &self.connecting)
            .field("is_primary_provider_kind", &self.is_primary_provider_kind)
            .finish()
    }
}

/// Shorten an address for display, preferring a resolved name
///
/// Keeps `chars` hex digits on each side: `0x1234...abcd`.
pub fn format_address(address: Option<&str>, name: Option<&str>, chars: usize) -> String {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let Some(address) = address else {
        return String::new();
    };

    // Count in chars so provider-supplied strings never split a code point
    let len = address.chars().count();
    if len > 2 * chars + 2 {
        let head: String = address.chars().take(chars + 2).collect();
        let tail: String = address.chars().skip(len - chars).collect();
        format!("{}...{}", head.to_lowercase(), tail)
    } else {
        address.to_lowercase()
    }
}
