//! Protocol version 2 (V2) types for x402.
//!
//! V2 challenges travel base64-encoded in the `Payment-Required` header.
//! Compared to V1:
//!
//! - Networks are usually CAIP-2 chain ids (`"eip155:8453"`)
//! - The price is `amount` rather than `maxAmountRequired`
//! - Resource metadata is hoisted into one top-level [`Resource`], echoed
//!   back in the proof exactly as received
//! - An opaque `extensions` object may accompany the challenge and must be
//!   echoed back untouched
//! - The proof ([`PaymentPayload`]) embeds the accepted requirement exactly
//!   as it was received

use serde::{Deserialize, Serialize};

use crate::proto::{OriginalJson, x402_version_marker};

x402_version_marker!(
    /// Version marker for x402 protocol version 2; serializes as `2`.
    X402Version2,
    2
);

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

/// The challenge's top-level `resource` object.
///
/// Keeps the object as received, which is what goes back in the proof, next
/// to its typed [`ResourceInfo`] view. Fields the view does not know about
/// survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    original: OriginalJson,
    info: ResourceInfo,
}

impl Resource {
    pub fn info(&self) -> &ResourceInfo {
        &self.info
    }

    pub fn original(&self) -> &OriginalJson {
        &self.original
    }
}

impl TryFrom<OriginalJson> for Resource {
    type Error = serde_json::Error;

    fn try_from(original: OriginalJson) -> Result<Self, Self::Error> {
        let info = serde_json::from_str(original.as_str())?;
        Ok(Self { original, info })
    }
}

impl Serialize for Resource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.original.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let original = OriginalJson::deserialize(deserializer)?;
        Resource::try_from(original).map_err(serde::de::Error::custom)
    }
}

/// Payment terms set by the seller (V2 format).
///
/// The resource metadata fields are normally absent here and taken from the
/// challenge's top-level [`Resource`]; some servers still repeat them.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: String,
    /// CAIP-2 chain id (e.g., "eip155:8453") or a network name.
    pub network: String,
    /// Price in token base units, as a decimal string.
    pub amount: String,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset address.
    pub asset: String,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

impl TryFrom<&OriginalJson> for PaymentRequirements {
    type Error = serde_json::Error;

    fn try_from(value: &OriginalJson) -> Result<Self, Self::Error> {
        serde_json::from_str(value.as_str())
    }
}

/// Decoded `Payment-Required` header for V2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired<TAccepts = PaymentRequirements> {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,
    /// Optional error message from the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Information about the resource being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    /// List of acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<TAccepts>,
    /// Protocol extensions, echoed back in the proof untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<OriginalJson>,
}

/// A signed payment, sent back as the `PAYMENT-SIGNATURE` header.
///
/// `accepted` is the selected requirement exactly as the server sent it:
/// servers may compare it byte-for-byte with what they offered. `resource`
/// and `extensions` are echoed the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TAccepted = OriginalJson, TPayload = serde_json::Value> {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,
    /// The challenge's resource object, as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OriginalJson>,
    /// The payment requirement the buyer accepted.
    pub accepted: TAccepted,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<OriginalJson>,
}
