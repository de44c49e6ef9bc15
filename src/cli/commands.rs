//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, PRIMARY_PROVIDER_NAME};
use crate::proof::{fetcher_from_config, ProofAssetLoader, ProofKind};
use crate::wallet::{
    ConfiguredChooser, HttpConnector, ProviderConnector, SelectionCache, SessionSnapshot,
    SessionStatus, WalletSession,
};

/// Connectors for the primary provider plus any additional ones, sorted by name
pub fn connectors(config: &Config) -> Vec<Arc<dyn ProviderConnector>> {
    let provider = &config.provider;
    let mut connectors: Vec<Arc<dyn ProviderConnector>> = vec![Arc::new(HttpConnector::new(
        PRIMARY_PROVIDER_NAME,
        &provider.rpc_url,
        &provider.connection_url,
        provider.timeout(),
        provider.poll_interval(),
    ))];

    let mut additional: Vec<_> = provider.additional.iter().collect();
    additional.sort();
    for (name, rpc_url) in additional {
        connectors.push(Arc::new(HttpConnector::new(
            name,
            rpc_url,
            rpc_url,
            provider.timeout(),
            provider.poll_interval(),
        )));
    }

    connectors
}

/// Build a wallet session wired to the configured providers
pub fn build_session(config: &Config) -> Result<WalletSession> {
    let policy = Arc::new(config.network_policy()?);
    let chooser = ConfiguredChooser::new(
        connectors(config),
        SelectionCache::new(config.session.cache_path()),
        config.session.interactive,
    );
    Ok(WalletSession::new(policy, Arc::new(chooser)))
}

/// List known networks and how the client treats them
pub fn networks(config: &Config) -> Result<()> {
    let policy = config.network_policy()?;

    println!("\n=== NETWORKS ===\n");
    println!(
        "{:<8} {:<24} {:<8} {:<10} {:<9} {}",
        "CHAIN", "NAME", "SYMBOL", "SUPPORTED", "TESTNET", "RPC"
    );
    println!("{}", "-".repeat(90));

    for network in policy.networks() {
        let marker = if network.chain_id == policy.default_chain_id() {
            " (default)"
        } else {
            ""
        };
        println!(
            "{:<8} {:<24} {:<8} {:<10} {:<9} {}{}",
            network.chain_id,
            network.display_name,
            network.currency_symbol,
            if network.supported { "yes" } else { "no" },
            if network.is_testnet { "yes" } else { "no" },
            if network.rpc_url.is_empty() {
                "-"
            } else {
                network.rpc_url.as_str()
            },
            marker
        );
    }

    println!();
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Connect a wallet session, optionally staying attached to report changes
pub async fn connect(config: &Config, watch: bool) -> Result<()> {
    let session = build_session(config)?;

    let restored = if config.session.auto_restore {
        session.restore().await?
    } else {
        None
    };

    let snapshot = match restored {
        Some(snapshot) => {
            info!("Restored cached wallet session");
            snapshot
        }
        None => session.connect().await.context("Wallet connection failed")?,
    };

    print_session(&session, &snapshot);

    if watch {
        watch_session(&session, config.provider.poll_interval()).await;
    }

    Ok(())
}

/// Forget the remembered provider selection
pub fn disconnect(config: &Config) -> Result<()> {
    let cache = SelectionCache::new(config.session.cache_path());
    let had_selection = cache.load().is_some();
    cache
        .clear()
        .with_context(|| format!("Failed to clear {}", cache.path().display()))?;

    if had_selection {
        println!("Cleared cached provider selection ({})", cache.path().display());
    } else {
        println!("No cached provider selection");
    }
    Ok(())
}

/// Fetch the asset pair for a proof kind and report sizes and digest
pub async fn assets(config: &Config, kind: &str) -> Result<()> {
    let kind: ProofKind = kind.parse()?;
    let loader = ProofAssetLoader::new(fetcher_from_config(&config.assets)?);

    let assets = loader
        .load(kind)
        .await
        .with_context(|| format!("Failed to load {} assets", kind))?;
    let files = kind.assets();

    println!("\n=== {} ASSETS ===\n", kind.as_str().to_uppercase());
    println!("Circuit size: {}", kind.circuit_size());
    println!("{:<20} {} bytes", files.circuit, assets.circuit.len());
    println!("{:<20} {} bytes", files.representation, assets.representation.len());
    println!("SHA-256: {}", assets.digest());
    println!();
    Ok(())
}

fn print_session(session: &WalletSession, snapshot: &SessionSnapshot) {
    let policy = session.policy();

    println!("\n=== WALLET SESSION ===\n");
    println!("Status: {}", if snapshot.connected { "connected" } else { "idle" });
    if let Some(chain_id) = snapshot.chain_id {
        println!("Network: {} ({})", policy.network_name(chain_id), chain_id);
    }
    if let Some(address) = &snapshot.address {
        println!("Address: {}", address);
    }
    println!("Display: {}", snapshot.display_name());
    if let Some(provider) = &snapshot.provider {
        println!("Provider: {}", provider.connection_url());
    }
    println!("Primary provider: {}", snapshot.is_primary_provider_kind);
    println!();
}

/// Report session changes until it drops or the user interrupts
async fn watch_session(session: &WalletSession, interval: Duration) {
    info!("Watching wallet session (Ctrl+C to stop)");
    let mut ticker = tokio::time::interval(interval);
    let mut last = session.snapshot().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = session.snapshot().await;
                if current.chain_id != last.chain_id || current.address != last.address {
                    info!(
                        "Session changed: chain {:?} -> {:?}, address {:?} -> {:?}",
                        last.chain_id, current.chain_id, last.address, current.address
                    );
                }
                if session.status().await == SessionStatus::Idle {
                    warn!("Wallet session ended");
                    break;
                }
                last = current;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }
}
