//! Wire types for the EIP-155 "exact" scheme.
//!
//! The payload is an ERC-3009 `transferWithAuthorization` signed as EIP-712
//! typed data over the token contract's domain.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};
use x402_types::timestamp::UnixTimestamp;

use crate::chain::decimal_u256;

/// Signature plus the authorization it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmPayloadAuthorization,
}

/// Who may move how much of the token, and when.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: Address,
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

/// EIP-712 domain parameters a seller puts in `extra`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsExtra {
    pub name: String,
    pub version: String,
}

sol!(
    /// The EIP-712 struct for ERC-3009 `transferWithAuthorization`.
    ///
    /// Field values must match [`ExactEvmPayloadAuthorization`] exactly;
    /// the facilitator rebuilds this struct from the authorization to verify
    /// the signature.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);
