#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Client-side types for the x402 payment protocol.
//!
//! A server that wants to be paid answers with `402 Payment Required` and a
//! *challenge*: a list of acceptable ways to pay. Two incompatible wire formats
//! exist in the wild:
//!
//! - **V1** ([`proto::v1`]): challenge in the JSON body, each requirement carrying
//!   its own resource metadata, amount under `maxAmountRequired`, networks by name.
//! - **V2** ([`proto::v2`]): challenge base64-encoded in the `Payment-Required`
//!   header, resource metadata hoisted to the top level, amount under `amount`,
//!   networks usually as CAIP-2 ids (`eip155:8453`).
//!
//! This crate decodes both into [`proto::PaymentChallenge`], normalizes every
//! requirement into one [`proto::UnifiedRequirement`] shape, and defines the
//! [`proto::client::PaymentSigner`] capability a wallet implements to pay.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain identifiers
//! - [`config`] - Environment-resolving configuration values
//! - [`networks`] - Registry of well-known networks and network-name normalization
//! - [`proto`] - Wire formats, normalization, proofs, selection and signing traits
//! - [`timestamp`] - Unix timestamps for authorization windows
//! - [`util`] - Base64 and human-readable money amounts
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod chain;
pub mod config;
pub mod networks;
pub mod proto;
pub mod timestamp;
pub mod util;
