//! EIP-155 (EVM) payment signing for x402 clients.
//!
//! [`Eip155ExactSigner`] implements
//! [`PaymentSigner`](x402_types::proto::client::PaymentSigner) for the
//! "exact" scheme: it signs an ERC-3009 `transferWithAuthorization` as
//! EIP-712 typed data with any [`SignerLike`] wallet.
//!
//! ```ignore
//! use x402_chain_eip155::Eip155ExactSigner;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let signer = Eip155ExactSigner::new(PrivateKeySigner::random()).with_network("base");
//! ```
//!
//! # Feature Flags
//!
//! - `telemetry` - Tracing spans around signing

pub mod chain;
pub mod exact;

pub use exact::{Eip155ExactSigner, SignerLike};
