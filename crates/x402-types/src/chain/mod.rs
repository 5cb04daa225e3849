//! Blockchain identifiers used by x402 challenges.
//!
//! - [`ChainId`] - A CAIP-2 chain identifier (e.g., `eip155:8453` for Base)

mod chain_id;

pub use chain_id::*;
