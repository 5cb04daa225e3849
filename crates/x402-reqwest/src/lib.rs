#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Reqwest integration for paying [x402](https://www.x402.org) challenges.
//!
//! [`X402Client`] turns a `402 Payment Required` response into a signed
//! payment proof and retries the request exactly once. It can be driven
//! directly through [`X402Client::fetch_with_payment`] or installed as
//! `reqwest-middleware`:
//!
//! ```rust,ignore
//! use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//! use x402_chain_eip155::Eip155ExactSigner;
//! use alloy_signer_local::PrivateKeySigner;
//! use alloy_primitives::U256;
//! use reqwest::Client;
//!
//! let signer = Eip155ExactSigner::new("PRIVATE_KEY".parse::<PrivateKeySigner>()?);
//! let http_client = Client::new()
//!     .with_payments(X402Client::new(signer).with_max_value(U256::from(50_000)))
//!     .build();
//!
//! let response = http_client
//!     .get("https://api.example.com/protected")
//!     .send()
//!     .await?;
//! ```
//!
//! ## Payment selection
//!
//! Among the requirements that pass validation, the signer's network and the
//! `exact` scheme, a [`PaymentSelector`](x402_types::proto::client::PaymentSelector)
//! picks one. [`FirstMatch`](x402_types::proto::client::FirstMatch) is the default.
//!
//! ## Discovery
//!
//! [`FacilitatorClient::list_all`] enumerates a facilitator's paid resources,
//! following pagination and backing off when rate limited.

mod builder;
mod challenge;
mod client;
mod http_transport;
mod lister;

pub use builder::*;
pub use challenge::*;
pub use client::*;
pub use http_transport::*;
pub use lister::*;
