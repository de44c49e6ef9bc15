//! Wallet module - provider connection and session management
//!
//! # Architecture
//!
//! ```text
//! ProviderChooser → WalletSession → NetworkPolicy
//!        ↑               ↑
//! ProviderConnector   ProviderEvent (accountsChanged / chainChanged)
//!        ↑               ↑
//!   HttpConnector ── HttpProvider (polling watcher)
//! ```
//!
//! Exactly one provider connection is live at a time. Any failure while
//! connecting, and any account change or move off the default network,
//! drops the session back to idle.

pub mod chooser;
pub mod ens;
pub mod http;
pub mod provider;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chooser::{CachedSelection, ConfiguredChooser, ProviderChooser, ProviderConnector, SelectionCache};
pub use http::{HttpConnector, HttpProvider};
pub use provider::{ProviderError, ProviderEvent, WalletProvider, PRIMARY_PROVIDER_URL};
pub use session::WalletSession;
pub use types::{format_address, SessionSnapshot, SessionStatus, WalletSessionState};
