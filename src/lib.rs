//! BattleZips client core
//!
//! Wallet session management with supported-network negotiation, and an
//! off-thread zero-knowledge proof pipeline.

pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod proof;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use network::NetworkPolicy;
pub use proof::{ProofKind, ProofPipeline, ProofTask};
pub use wallet::{SessionSnapshot, SessionStatus, WalletSession};
