//! Protocol version 1 (V1) types for x402.
//!
//! V1 challenges travel in the JSON body of the 402 response. Networks are
//! named (`"base-sepolia"`), the price is `maxAmountRequired`, and every
//! requirement repeats the resource metadata (URL, description, MIME type).
//!
//! V1 is also the shape the signer produces: [`PaymentPayload`] is the signed
//! artifact that V2 proofs re-wrap.

use serde::{Deserialize, Serialize};

use crate::proto::{OriginalJson, x402_version_marker};

x402_version_marker!(
    /// Version marker for x402 protocol version 1; serializes as `1`.
    X402Version1,
    1
);

/// A signed payment authorization, sent back as the `X-PAYMENT` header.
///
/// # Type Parameters
///
/// - `TPayload` - The scheme-specific payload type (default: raw JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload = serde_json::Value> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

/// Payment terms set by the seller.
///
/// Resource metadata is part of every requirement in V1. Servers in the wild
/// leave some of it out, so those fields default to empty.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// Price in token base units, as a decimal string.
    pub max_amount_required: String,
    /// The resource URL being paid for.
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset address.
    pub asset: String,
    /// Scheme-specific extra data, e.g. the EIP-712 domain `name` and `version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl TryFrom<&OriginalJson> for PaymentRequirements {
    type Error = serde_json::Error;

    fn try_from(value: &OriginalJson) -> Result<Self, Self::Error> {
        serde_json::from_str(value.as_str())
    }
}

/// HTTP 402 Payment Required response body for V1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired<TAccepts = PaymentRequirements> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<TAccepts>,
    /// Optional error message from the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirements_tolerate_missing_metadata() {
        let requirements: PaymentRequirements = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        }))
        .unwrap();
        assert_eq!(requirements.resource, "");
        assert_eq!(requirements.extra, None);
    }

    #[test]
    fn test_version_marker_rejects_other_versions() {
        assert!(serde_json::from_str::<X402Version1>("1").is_ok());
        assert!(serde_json::from_str::<X402Version1>("2").is_err());
        assert_eq!(serde_json::to_string(&X402Version1).unwrap(), "1");
    }
}
