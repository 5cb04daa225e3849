//! The "exact" payment scheme on EVM chains.
//!
//! A payment is an ERC-3009 `transferWithAuthorization` for exactly the
//! required amount, signed off-chain by the payer and submitted on-chain by
//! the facilitator, who pays the gas.

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;
