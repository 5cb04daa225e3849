//! Protocol types for x402 payment messages, as seen by a paying client.
//!
//! # Protocol Versions
//!
//! - **V1** ([`v1`]): challenge in the 402 body, proof in `X-PAYMENT`
//! - **V2** ([`v2`]): challenge in the `Payment-Required` header, proof in
//!   `PAYMENT-SIGNATURE`
//!
//! # Key Types
//!
//! - [`PaymentChallenge`] - A decoded 402 challenge of either version
//! - [`PaymentRequirement`] - One accept, shaped V1 or V2
//! - [`UnifiedRequirement`] - The version-independent view of an accept
//! - [`PaymentProof`] - The signed artifact attached to the paid retry
//! - [`client::PaymentSigner`] / [`client::PaymentSelector`] - Client-side capabilities
//! - [`discovery`] - Facilitator resource listing pages
//!
//! Field presence is only inspected here, at the parse boundary. Everything
//! downstream works on [`PaymentChallenge`] variants and [`UnifiedRequirement`].

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::util::Base64Bytes;

pub mod client;
pub mod discovery;
mod unified;
pub mod v1;
pub mod v2;

pub use unified::*;

/// Header carrying a base64-encoded V2 challenge.
pub const PAYMENT_REQUIRED_HEADER: &str = "Payment-Required";
/// Header carrying a V1 payment proof.
pub const V1_PAYMENT_HEADER: &str = "X-PAYMENT";
/// Header carrying a V2 payment proof.
pub const V2_PAYMENT_HEADER: &str = "PAYMENT-SIGNATURE";
/// Every header name that marks a request as already paid.
pub const PAYMENT_HEADERS: [&str; 2] = [V1_PAYMENT_HEADER, V2_PAYMENT_HEADER];

/// Defines a unit struct that (de)serializes as a fixed `x402Version` number.
macro_rules! x402_version_marker {
    ($(#[$meta:meta])* $name:ident, $value:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            pub const VALUE: u8 = $value;
        }

        impl From<$name> for u8 {
            fn from(_: $name) -> Self {
                $name::VALUE
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(Self::VALUE)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let num = <u8 as serde::Deserialize>::deserialize(deserializer)?;
                if num == Self::VALUE {
                    Ok($name)
                } else {
                    Err(serde::de::Error::custom(format!(
                        "expected version {}, got {}",
                        Self::VALUE,
                        num
                    )))
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", Self::VALUE)
            }
        }
    };
}
pub(crate) use x402_version_marker;

/// Trait for types that have both V1 and V2 protocol variants.
pub trait ProtocolV {
    type V1;
    type V2;
}

/// A versioned protocol type that can be either V1 or V2.
pub enum ProtocolVersioned<T>
where
    T: ProtocolV,
{
    V1(T::V1),
    V2(T::V2),
}

impl<T> Clone for ProtocolVersioned<T>
where
    T: ProtocolV,
    T::V1: Clone,
    T::V2: Clone,
{
    fn clone(&self) -> Self {
        match self {
            ProtocolVersioned::V1(v1) => ProtocolVersioned::V1(v1.clone()),
            ProtocolVersioned::V2(v2) => ProtocolVersioned::V2(v2.clone()),
        }
    }
}

impl<T> fmt::Debug for ProtocolVersioned<T>
where
    T: ProtocolV,
    T::V1: fmt::Debug,
    T::V2: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersioned::V1(v1) => f.debug_tuple("V1").field(v1).finish(),
            ProtocolVersioned::V2(v2) => f.debug_tuple("V2").field(v2).finish(),
        }
    }
}

/// Verbatim JSON, kept byte-for-byte as received.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OriginalJson(pub Box<serde_json::value::RawValue>);

impl OriginalJson {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let raw = serde_json::value::RawValue::from_string(json.to_owned())?;
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for OriginalJson {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Where a challenge was read from. Decides which decode error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeSource {
    Header,
    Body,
}

/// Why a 402 response could not be turned into a [`PaymentChallenge`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The `Payment-Required` header is not base64 of a JSON challenge.
    #[error("Failed to decode Payment-Required header: {0}")]
    HeaderDecodeFailed(String),
    /// The 402 body is not a JSON challenge.
    #[error("Failed to decode 402 response body: {0}")]
    BodyDecodeFailed(String),
    /// The challenge has no `accepts`, or an empty one.
    #[error("Challenge carries no payment requirements")]
    NoRequirements,
    #[error("Unsupported x402 version {0}")]
    UnsupportedVersion(u64),
}

/// Protocol version marker for [`PaymentChallenge`].
pub struct PaymentChallengeV;

impl ProtocolV for PaymentChallengeV {
    type V1 = v1::PaymentRequired<OriginalJson>;
    type V2 = v2::PaymentRequired<OriginalJson>;
}

/// A 402 challenge of either version, with every accept kept verbatim.
pub type PaymentChallenge = ProtocolVersioned<PaymentChallengeV>;

/// Loose shape shared by both versions; the version is decided afterwards.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeWire {
    #[serde(default)]
    x402_version: Option<u64>,
    #[serde(default)]
    accepts: Option<Vec<OriginalJson>>,
    #[serde(default)]
    resource: Option<OriginalJson>,
    #[serde(default)]
    extensions: Option<OriginalJson>,
    #[serde(default)]
    error: Option<String>,
}

impl PaymentChallenge {
    /// Decodes a challenge from JSON bytes.
    ///
    /// `x402Version` defaults to 1 when absent. A missing or empty `accepts`
    /// is [`ParseError::NoRequirements`]; decode failures are reported
    /// against `source`.
    pub fn from_json_bytes(bytes: &[u8], source: ChallengeSource) -> Result<Self, ParseError> {
        let decode_error = |message: String| match source {
            ChallengeSource::Header => ParseError::HeaderDecodeFailed(message),
            ChallengeSource::Body => ParseError::BodyDecodeFailed(message),
        };
        let wire: ChallengeWire =
            serde_json::from_slice(bytes).map_err(|e| decode_error(e.to_string()))?;

        let version = wire.x402_version.unwrap_or(v1::X402Version1::VALUE as u64);
        if version != v1::X402Version1::VALUE as u64 && version != v2::X402Version2::VALUE as u64 {
            return Err(ParseError::UnsupportedVersion(version));
        }
        let accepts = wire.accepts.unwrap_or_default();
        if accepts.is_empty() {
            return Err(ParseError::NoRequirements);
        }
        #[cfg(feature = "telemetry")]
        tracing::debug!(version, ?source, accepts = accepts.len(), "Decoded payment challenge");

        if version == v1::X402Version1::VALUE as u64 {
            return Ok(PaymentChallenge::V1(v1::PaymentRequired {
                x402_version: v1::X402Version1,
                accepts,
                error: wire.error,
            }));
        }
        let resource = wire
            .resource
            .map(v2::Resource::try_from)
            .transpose()
            .map_err(|e| decode_error(format!("invalid resource: {e}")))?;
        Ok(PaymentChallenge::V2(v2::PaymentRequired {
            x402_version: v2::X402Version2,
            error: wire.error,
            resource,
            accepts,
            extensions: wire.extensions,
        }))
    }

    /// Decodes a `Payment-Required` header value: base64, then JSON.
    pub fn from_header(value: &[u8]) -> Result<Self, ParseError> {
        let json = Base64Bytes::from(value)
            .decode()
            .map_err(|e| ParseError::HeaderDecodeFailed(e.to_string()))?;
        Self::from_json_bytes(&json, ChallengeSource::Header)
    }

    /// Decodes a V1-style challenge from a 402 response body.
    pub fn from_body(body: &[u8]) -> Result<Self, ParseError> {
        Self::from_json_bytes(body, ChallengeSource::Body)
    }

    pub fn x402_version(&self) -> u8 {
        match self {
            PaymentChallenge::V1(_) => v1::X402Version1::VALUE,
            PaymentChallenge::V2(_) => v2::X402Version2::VALUE,
        }
    }

    /// Accepts in the order the server listed them.
    pub fn accepts(&self) -> &[OriginalJson] {
        match self {
            PaymentChallenge::V1(challenge) => &challenge.accepts,
            PaymentChallenge::V2(challenge) => &challenge.accepts,
        }
    }

    /// Top-level resource metadata. Always `None` for V1.
    pub fn resource(&self) -> Option<&v2::ResourceInfo> {
        match self {
            PaymentChallenge::V1(_) => None,
            PaymentChallenge::V2(challenge) => {
                challenge.resource.as_ref().map(v2::Resource::info)
            }
        }
    }

    pub fn extensions(&self) -> Option<&OriginalJson> {
        match self {
            PaymentChallenge::V1(_) => None,
            PaymentChallenge::V2(challenge) => challenge.extensions.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PaymentChallenge::V1(challenge) => challenge.error.as_deref(),
            PaymentChallenge::V2(challenge) => challenge.error.as_deref(),
        }
    }

    /// Turns the signer's V1-style payload into the proof for this challenge.
    ///
    /// V1 proofs are the payload itself. V2 proofs re-wrap it with the
    /// challenge's resource object, the `accepted` requirement and the
    /// challenge's extensions, all as originally received.
    pub fn wrap_proof(&self, signed: v1::PaymentPayload, accepted: &OriginalJson) -> PaymentProof {
        match self {
            PaymentChallenge::V1(_) => PaymentProof::V1(signed),
            PaymentChallenge::V2(challenge) => PaymentProof::V2(v2::PaymentPayload {
                x402_version: v2::X402Version2,
                resource: challenge.resource.as_ref().map(|r| r.original().clone()),
                accepted: accepted.clone(),
                payload: signed.payload,
                extensions: challenge.extensions.clone(),
            }),
        }
    }
}

/// Protocol version marker for [`PaymentProof`].
pub struct PaymentProofV;

impl ProtocolV for PaymentProofV {
    type V1 = v1::PaymentPayload;
    type V2 = v2::PaymentPayload;
}

/// The signed artifact attached to the paid retry.
pub type PaymentProof = ProtocolVersioned<PaymentProofV>;

impl PaymentProof {
    /// Header the proof travels in; the two versions use different names.
    pub fn header_name(&self) -> &'static str {
        match self {
            PaymentProof::V1(_) => V1_PAYMENT_HEADER,
            PaymentProof::V2(_) => V2_PAYMENT_HEADER,
        }
    }

    /// Base64 of the proof's JSON, ready to be used as a header value.
    pub fn to_header_value(&self) -> Result<String, serde_json::Error> {
        let json = match self {
            PaymentProof::V1(payload) => serde_json::to_vec(payload)?,
            PaymentProof::V2(payload) => serde_json::to_vec(payload)?,
        };
        Ok(Base64Bytes::encode(json).to_string())
    }

    pub fn x402_version(&self) -> u8 {
        match self {
            PaymentProof::V1(_) => v1::X402Version1::VALUE,
            PaymentProof::V2(_) => v2::X402Version2::VALUE,
        }
    }
}

/// One accept, in whichever wire shape the server used.
///
/// The shape is decided by the price field: `amount` means V2,
/// `maxAmountRequired` means V1. When both are present `amount` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PaymentRequirement {
    V1(v1::PaymentRequirements),
    V2(v2::PaymentRequirements),
}

impl<'de> Deserialize<'de> for PaymentRequirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if value.get("amount").is_some() {
            serde_json::from_value(value)
                .map(PaymentRequirement::V2)
                .map_err(serde::de::Error::custom)
        } else if value.get("maxAmountRequired").is_some() {
            serde_json::from_value(value)
                .map(PaymentRequirement::V1)
                .map_err(serde::de::Error::custom)
        } else {
            Err(serde::de::Error::custom(
                "requirement has neither `amount` nor `maxAmountRequired`",
            ))
        }
    }
}

impl TryFrom<&OriginalJson> for PaymentRequirement {
    type Error = serde_json::Error;

    fn try_from(value: &OriginalJson) -> Result<Self, Self::Error> {
        serde_json::from_str(value.as_str())
    }
}
