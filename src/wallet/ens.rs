//! Reverse name resolution through the ENS registry
//!
//! `<addr>.addr.reverse` is hashed into a registry node, the node's resolver
//! is asked for `name(node)`, and the returned name is only accepted when it
//! resolves forward to the same address.

use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use tracing::debug;

use super::provider::{ProviderError, WalletProvider};

/// Registry address shared by mainnet and the public test networks
pub const ENS_REGISTRY: &str = "0x00000000000c2e074ec69a0bfb2cfa2d0d99fedc1e";

/// `resolver(bytes32)`
pub(crate) const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];
/// `name(bytes32)`
pub(crate) const NAME_SELECTOR: [u8; 4] = [0x69, 0x1f, 0x34, 0x31];
/// `addr(bytes32)`
pub(crate) const ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

const WORD: usize = 32;

/// EIP-137 namehash
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(Keccak256::digest(label.as_bytes()));
        node = hasher.finalize().into();
    }
    node
}

/// `<hex>.addr.reverse` for a 20-byte hex address
pub fn reverse_name(address: &str) -> Option<String> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{}.addr.reverse", digits.to_ascii_lowercase()))
}

/// ABI call data for a single-`bytes32` method
pub fn call_data(selector: [u8; 4], node: &[u8; 32]) -> String {
    format!("0x{}{}", hex::encode(selector), hex::encode(node))
}

/// Primary name of `address`, verified by forward resolution
pub async fn reverse_lookup(
    provider: &dyn WalletProvider,
    address: &str,
) -> Result<Option<String>, ProviderError> {
    let Some(reverse) = reverse_name(address) else {
        return Ok(None);
    };
    let reverse_node = namehash(&reverse);

    let Some(resolver) = resolver_of(provider, &reverse_node).await? else {
        debug!("No reverse record for {}", address);
        return Ok(None);
    };
    let name = decode_string(&eth_call(provider, &resolver, NAME_SELECTOR, &reverse_node).await?)?;
    if name.is_empty() {
        return Ok(None);
    }

    let forward_node = namehash(&name);
    let Some(forward_resolver) = resolver_of(provider, &forward_node).await? else {
        return Ok(None);
    };
    let resolved =
        decode_address(&eth_call(provider, &forward_resolver, ADDR_SELECTOR, &forward_node).await?);

    if resolved.as_deref() == Some(address.to_ascii_lowercase().as_str()) {
        Ok(Some(name))
    } else {
        debug!("Reverse record {} does not resolve back to {}", name, address);
        Ok(None)
    }
}

async fn resolver_of(
    provider: &dyn WalletProvider,
    node: &[u8; 32],
) -> Result<Option<String>, ProviderError> {
    let output = eth_call(provider, ENS_REGISTRY, RESOLVER_SELECTOR, node).await?;
    Ok(decode_address(&output))
}

async fn eth_call(
    provider: &dyn WalletProvider,
    to: &str,
    selector: [u8; 4],
    node: &[u8; 32],
) -> Result<Vec<u8>, ProviderError> {
    let value = provider
        .request(
            "eth_call",
            json!([{ "to": to, "data": call_data(selector, node) }, "latest"]),
        )
        .await?;

    let Value::String(raw) = &value else {
        return Err(ProviderError::InvalidResponse(format!("eth_call returned {}", value)));
    };
    hex::decode(raw.trim_start_matches("0x"))
        .map_err(|e| ProviderError::InvalidResponse(format!("eth_call output: {}", e)))
}

/// Address in the first return word; empty output and the zero address mean none
fn decode_address(output: &[u8]) -> Option<String> {
    let word = output.get(..WORD)?;
    let address = &word[12..];
    if address.iter().all(|b| *b == 0) {
        return None;
    }
    Some(format!("0x{}", hex::encode(address)))
}

fn decode_string(output: &[u8]) -> Result<String, ProviderError> {
    let invalid = || ProviderError::InvalidResponse("malformed string return".to_string());

    let offset = read_usize(output, 0).ok_or_else(invalid)?;
    let len = read_usize(output, offset).ok_or_else(invalid)?;
    let start = offset.checked_add(WORD).ok_or_else(invalid)?;
    let end = start.checked_add(len).ok_or_else(invalid)?;
    let bytes = output.get(start..end).ok_or_else(invalid)?;

    String::from_utf8(bytes.to_vec()).map_err(|_| invalid())
}

fn read_usize(output: &[u8], at: usize) -> Option<usize> {
    let word = output.get(at..at.checked_add(WORD)?)?;
    // Anything above 64 bits cannot index into the output anyway
    if word[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(tail)).ok()
}
