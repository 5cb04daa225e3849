//! Known blockchain networks and network-identifier normalization.
//!
//! V1 challenges name networks (`base-sepolia`), V2 challenges usually send a
//! CAIP-2 id (`eip155:84532`). Everything downstream of the normalizer compares
//! networks by their canonical name, so [`normalize_network`] maps known CAIP-2
//! ids to names through the static [`KNOWN_NETWORKS`] table.
//!
//! Unknown ids pass through unchanged. A signer filtering on `base` will then
//! not match `eip155:424242`; that is accepted as best effort.
//!
//! ```
//! use x402_types::networks::normalize_network;
//!
//! assert_eq!(normalize_network("eip155:8453"), "base");
//! assert_eq!(normalize_network("base"), "base");
//! assert_eq!(normalize_network("eip155:424242"), "eip155:424242");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

/// A known network with its canonical name and CAIP-2 parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Canonical network name (e.g., "base-sepolia", "solana")
    pub name: &'static str,
    /// CAIP-2 namespace (e.g., "eip155", "solana")
    pub namespace: &'static str,
    /// Chain reference (e.g., "84532" for Base Sepolia)
    pub reference: &'static str,
}

impl NetworkInfo {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Networks with a canonical x402 name, EVM first, then Solana.
pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
    },
    NetworkInfo {
        name: "polygon-amoy",
        namespace: "eip155",
        reference: "80002",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
    },
    NetworkInfo {
        name: "avalanche-fuji",
        namespace: "eip155",
        reference: "43113",
    },
    NetworkInfo {
        name: "sei",
        namespace: "eip155",
        reference: "1329",
    },
    NetworkInfo {
        name: "sei-testnet",
        namespace: "eip155",
        reference: "1328",
    },
    NetworkInfo {
        name: "xdc",
        namespace: "eip155",
        reference: "50",
    },
    NetworkInfo {
        name: "xrpl-evm",
        namespace: "eip155",
        reference: "1440000",
    },
    NetworkInfo {
        name: "peaq",
        namespace: "eip155",
        reference: "3338",
    },
    NetworkInfo {
        name: "iotex",
        namespace: "eip155",
        reference: "4689",
    },
    NetworkInfo {
        name: "celo",
        namespace: "eip155",
        reference: "42220",
    },
    NetworkInfo {
        name: "celo-sepolia",
        namespace: "eip155",
        reference: "11142220",
    },
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

/// Canonical name to [`ChainId`], built once from [`KNOWN_NETWORKS`].
pub static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, ChainId>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.name, n.chain_id()))
        .collect()
});

/// [`ChainId`] to canonical name, built once from [`KNOWN_NETWORKS`].
pub static CHAIN_ID_TO_NAME: LazyLock<HashMap<ChainId, &'static str>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.chain_id(), n.name))
        .collect()
});

/// Case-sensitive lookup of a canonical network name.
pub fn chain_id_by_network_name(name: &str) -> Option<&ChainId> {
    NAME_TO_CHAIN_ID.get(name)
}

pub fn network_name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    CHAIN_ID_TO_NAME.get(chain_id).copied()
}

/// Maps a wire network identifier to its canonical name.
///
/// CAIP-2 ids found in [`KNOWN_NETWORKS`] become their name. Everything else,
/// including already-canonical names and unknown chain ids, is returned as-is,
/// which makes the function idempotent.
pub fn normalize_network(network: &str) -> String {
    network
        .parse::<ChainId>()
        .ok()
        .and_then(|chain_id| network_name_by_chain_id(&chain_id))
        .map(str::to_string)
        .unwrap_or_else(|| network.to_string())
}
