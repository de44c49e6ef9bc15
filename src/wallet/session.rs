//! Wallet session - the single authenticated provider connection
//!
//! The session is the only writer of [`WalletSessionState`]. Explicit calls
//! (`connect`, `disconnect`) and provider events (consumed by one listener
//! task per connected provider) all go through the same locked transitions.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::network::{parse_chain_id, NetworkPolicy};

use super::chooser::ProviderChooser;
use super::provider::{ProviderEvent, WalletProvider};
use super::types::{SessionSnapshot, SessionStatus, WalletSessionState};

/// State plus bookkeeping for the active provider's listener
struct SessionInner {
    wallet: WalletSessionState,
    /// Bumped on every connect and reset; listeners from older epochs are inert
    epoch: u64,
    listener: Option<JoinHandle<()>>,
}

/// Shared between the session handle and its provider listener
struct SessionCore {
    inner: RwLock<SessionInner>,
    chooser: Arc<dyn ProviderChooser>,
}

impl SessionCore {
    async fn disconnect(&self) {
        let listener = {
            let mut inner = self.inner.write().await;
            self.reset(&mut inner)
        };
        if let Some(listener) = listener {
            listener.abort();
        }
        self.forget_selection().await;
    }

    /// Back to idle; hands back the listener of the provider being dropped
    fn reset(&self, inner: &mut SessionInner) -> Option<JoinHandle<()>> {
        inner.wallet.clear();
        inner.epoch += 1;
        inner.listener.take()
    }

    /// Clear the remembered provider outside the state lock
    ///
    /// The chooser may hit the filesystem, so this runs on the blocking pool.
    async fn forget_selection(&self) {
        let chooser = Arc::clone(&self.chooser);
        if let Err(e) = tokio::task::spawn_blocking(move || chooser.clear_cached_selection()).await {
            warn!("Failed to clear cached provider selection: {}", e);
        }
    }

    /// Apply one provider event; returns whether the listener should continue
    ///
    /// Runs on the listener itself, so a reset here lets the listener return
    /// instead of aborting it.
    async fn handle_event(&self, epoch: u64, default_chain_id: u64, event: ProviderEvent) -> bool {
        let keep_listening = {
            let mut inner = self.inner.write().await;
            if inner.epoch != epoch {
                debug!("Ignoring event from a replaced provider: {:?}", event);
                return false;
            }

            match event {
                ProviderEvent::AccountsChanged(accounts) => {
                    info!(
                        "Provider accounts changed ({} exposed), disconnecting",
                        accounts.len()
                    );
                    self.reset(&mut inner);
                    false
                }
                ProviderEvent::ChainChanged(raw) => match parse_chain_id(&raw) {
                    Some(chain_id) if chain_id == default_chain_id => {
                        debug!("Provider chain changed to default network {}", chain_id);
                        true
                    }
                    _ => {
                        info!("Provider chain changed to {}, disconnecting", raw);
                        self.reset(&mut inner);
                        false
                    }
                },
            }
        };

        if !keep_listening {
            self.forget_selection().await;
        }
        keep_listening
    }

    /// Events were dropped; the session can no longer vouch for its state
    async fn handle_lag(&self, epoch: u64, skipped: u64) {
        let stale = {
            let mut inner = self.inner.write().await;
            if inner.epoch == epoch {
                warn!("Missed {} provider events, disconnecting", skipped);
                self.reset(&mut inner);
                true
            } else {
                false
            }
        };
        if stale {
            self.forget_selection().await;
        }
    }
}

async fn listen(
    core: Arc<SessionCore>,
    mut events: broadcast::Receiver<ProviderEvent>,
    epoch: u64,
    default_chain_id: u64,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if !core.handle_event(epoch, default_chain_id, event).await {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                core.handle_lag(epoch, skipped).await;
                break;
            }
            Err(RecvError::Closed) => {
                debug!("Provider event stream closed");
                break;
            }
        }
    }
}

/// Manager for the single wallet connection
pub struct WalletSession {
    policy: Arc<NetworkPolicy>,
    core: Arc<SessionCore>,
    /// Serializes overlapping `connect` calls
    connect_lock: Mutex<()>,
}

impl WalletSession {
    pub fn new(policy: Arc<NetworkPolicy>, chooser: Arc<dyn ProviderChooser>) -> Self {
        Self {
            policy,
            core: Arc::new(SessionCore {
                inner: RwLock::new(SessionInner {
                    wallet: WalletSessionState::default(),
                    epoch: 0,
                    listener: None,
                }),
                chooser,
            }),
            connect_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    /// Reconnect through a remembered provider selection, if any
    pub async fn restore(&self) -> Result<Option<SessionSnapshot>> {
        if self.core.chooser.has_cached_selection() {
            info!("Restoring cached wallet provider");
            self.connect().await.map(Some)
        } else {
            self.core.inner.write().await.wallet.connecting = false;
            Ok(None)
        }
    }

    /// Connect through the chooser and validate the provider's network
    ///
    /// On any failure the session is reset to idle and the error returned.
    pub async fn connect(&self) -> Result<SessionSnapshot> {
        let _guard = self.connect_lock.lock().await;
        self.core.inner.write().await.wallet.connecting = true;

        let outcome = self.establish().await;
        if let Err(e) = &outcome {
            error!("Wallet connection failed: {}", e);
            self.core.disconnect().await;
        }

        let mut inner = self.core.inner.write().await;
        inner.wallet.connecting = false;
        outcome.map(|()| SessionSnapshot::from(&inner.wallet))
    }

    async fn establish(&self) -> Result<()> {
        let provider = self.core.chooser.connect().await.map_err(|e| match e {
            Error::ConnectionAborted(_) => e,
            other => Error::ConnectionAborted(other.to_string()),
        })?;

        let mut chain_id = provider.chain_id().await?;
        if !self.policy.is_supported(chain_id) {
            let target = self.policy.default_chain_id();
            warn!(
                "Provider is on unsupported chain {}, negotiating switch to {}",
                chain_id,
                self.policy.network_name(target)
            );
            if !self.policy.negotiate(provider.as_ref(), target).await {
                return Err(self.policy.mismatch_error());
            }

            chain_id = provider.chain_id().await?;
            if !self.policy.is_supported(chain_id) {
                return Err(self.policy.mismatch_error());
            }
        }

        let address = provider
            .accounts()
            .await?
            .into_iter()
            .next()
            .map(|a| a.to_lowercase())
            .ok_or_else(|| Error::ConnectionAborted("provider exposed no accounts".to_string()))?;

        let name = if self.policy.supports_name_resolution(chain_id) {
            match provider.lookup_address(&address).await {
                Ok(name) => name.filter(|n| !n.is_empty()),
                Err(e) => {
                    warn!("Signer name lookup failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.install(provider, chain_id, address, name).await;
        Ok(())
    }

    async fn install(
        &self,
        provider: Arc<dyn WalletProvider>,
        chain_id: u64,
        address: String,
        name: Option<String>,
    ) {
        let events = provider.subscribe();
        let mut inner = self.core.inner.write().await;

        if let Some(previous) = inner.listener.take() {
            previous.abort();
        }
        inner.epoch += 1;
        let epoch = inner.epoch;

        info!(
            "Wallet connected: {} on {}",
            address,
            self.policy.network_name(chain_id)
        );
        inner.wallet = WalletSessionState {
            provider: Some(provider),
            chain_id: Some(chain_id),
            address: Some(address),
            name,
            connecting: true,
        };
        inner.listener = Some(tokio::spawn(listen(
            self.core.clone(),
            events,
            epoch,
            self.policy.default_chain_id(),
        )));
    }

    /// Forget the provider and return to idle
    ///
    /// Safe to call in any state.
    pub async fn disconnect(&self) {
        info!("Disconnecting wallet");
        self.core.disconnect().await;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&self.core.inner.read().await.wallet)
    }

    pub async fn status(&self) -> SessionStatus {
        self.core.inner.read().await.wallet.status()
    }

    pub async fn is_connected(&self) -> bool {
        self.core.inner.read().await.wallet.is_connected()
    }
}
