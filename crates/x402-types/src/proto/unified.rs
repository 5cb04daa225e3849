//! Version-independent view of payment requirements.
//!
//! V1 and V2 accepts price and describe a resource differently. [`normalize`]
//! folds both into one [`UnifiedRequirement`], [`validate`] checks it can be
//! paid, and [`PaymentChallenge::candidates`] splits a challenge's accepts into
//! payable candidates and rejections with reasons.

use alloy_primitives::U256;
use serde::Serialize;

use crate::networks::normalize_network;
use crate::proto::{OriginalJson, PaymentChallenge, PaymentRequirement, v2};

/// The only scheme this client knows how to pay.
pub const EXACT_SCHEME: &str = "exact";

/// A payment requirement with the V1/V2 differences reconciled.
///
/// Built by [`normalize`]. The amount is unified, the network mapped to its
/// canonical name where known, and resource metadata taken from the
/// requirement or else from the challenge's top-level resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRequirement {
    pub scheme: String,
    pub network: String,
    pub amount: String,
    pub pay_to: String,
    pub asset: String,
    pub max_timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

impl UnifiedRequirement {
    /// Price in token base units, whichever field it came from.
    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// The price as an integer, if it is a valid base-10 `uint256`.
    pub fn amount_value(&self) -> Option<U256> {
        parse_amount(&self.amount)
    }
}

fn parse_amount(amount: &str) -> Option<U256> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(amount, 10).ok()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Maps a requirement of either version into the unified shape.
///
/// `top_level` is the challenge's resource descriptor (V2 only); it fills in
/// metadata the requirement itself does not carry. Never fails.
pub fn normalize(
    requirement: &PaymentRequirement,
    top_level: Option<&v2::ResourceInfo>,
) -> UnifiedRequirement {
    match requirement {
        PaymentRequirement::V1(req) => UnifiedRequirement {
            scheme: req.scheme.clone(),
            network: normalize_network(&req.network),
            amount: req.max_amount_required.clone(),
            pay_to: req.pay_to.clone(),
            asset: req.asset.clone(),
            max_timeout_seconds: req.max_timeout_seconds,
            extra: req.extra.clone(),
            resource: non_empty(&req.resource).or_else(|| top_level.and_then(|r| non_empty(&r.url))),
            description: non_empty(&req.description)
                .or_else(|| top_level.and_then(|r| r.description.clone())),
            mime_type: non_empty(&req.mime_type)
                .or_else(|| top_level.and_then(|r| r.mime_type.clone())),
            output_schema: req
                .output_schema
                .clone()
                .or_else(|| top_level.and_then(|r| r.output_schema.clone())),
        },
        PaymentRequirement::V2(req) => UnifiedRequirement {
            scheme: req.scheme.clone(),
            network: normalize_network(&req.network),
            amount: req.amount.clone(),
            pay_to: req.pay_to.clone(),
            asset: req.asset.clone(),
            max_timeout_seconds: req.max_timeout_seconds,
            extra: req.extra.clone(),
            resource: req
                .resource
                .as_deref()
                .and_then(non_empty)
                .or_else(|| top_level.and_then(|r| non_empty(&r.url))),
            description: req
                .description
                .clone()
                .or_else(|| top_level.and_then(|r| r.description.clone())),
            mime_type: req
                .mime_type
                .clone()
                .or_else(|| top_level.and_then(|r| r.mime_type.clone())),
            output_schema: req
                .output_schema
                .clone()
                .or_else(|| top_level.and_then(|r| r.output_schema.clone())),
        },
    }
}

/// Why a single requirement was dropped from consideration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementRejection {
    /// The accept is not a decodable V1 or V2 requirement.
    #[error("Malformed requirement: {0}")]
    Malformed(String),
    #[error("Unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    /// The amount is not a non-negative base-10 integer fitting 256 bits.
    #[error("Invalid amount {0:?}")]
    InvalidAmount(String),
}

/// Checks a normalized requirement and returns its amount.
pub fn validate(requirement: &UnifiedRequirement) -> Result<U256, RequirementRejection> {
    if requirement.scheme != EXACT_SCHEME {
        return Err(RequirementRejection::UnsupportedScheme(
            requirement.scheme.clone(),
        ));
    }
    requirement
        .amount_value()
        .ok_or_else(|| RequirementRejection::InvalidAmount(requirement.amount.clone()))
}

/// A requirement that survived normalization and validation.
#[derive(Debug, Clone)]
pub struct PaymentCandidate {
    /// Position in the challenge's `accepts`.
    pub index: usize,
    pub requirement: UnifiedRequirement,
    pub amount: U256,
    /// The accept exactly as received.
    pub original: OriginalJson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRequirement {
    pub index: usize,
    pub reason: RequirementRejection,
}

/// Every accept of a challenge, sorted into payable and dropped.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub accepted: Vec<PaymentCandidate>,
    pub rejected: Vec<RejectedRequirement>,
}

impl PaymentChallenge {
    /// Decodes, normalizes and validates every accept, in received order.
    pub fn candidates(&self) -> Candidates {
        let mut candidates = Candidates::default();
        let top_level = self.resource();
        for (index, original) in self.accepts().iter().enumerate() {
            let requirement = match PaymentRequirement::try_from(original) {
                Ok(requirement) => requirement,
                Err(e) => {
                    candidates.rejected.push(RejectedRequirement {
                        index,
                        reason: RequirementRejection::Malformed(e.to_string()),
                    });
                    continue;
                }
            };
            let requirement = normalize(&requirement, top_level);
            match validate(&requirement) {
                Ok(amount) => candidates.accepted.push(PaymentCandidate {
                    index,
                    requirement,
                    amount,
                    original: original.clone(),
                }),
                Err(reason) => candidates
                    .rejected
                    .push(RejectedRequirement { index, reason }),
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::ChallengeSource;
    use serde_json::json;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

    #[test]
    fn test_v1_and_v2_normalize_identically() {
        let v1: PaymentRequirement = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/weather",
            "description": "Weather report",
            "mimeType": "application/json",
            "payTo": PAY_TO,
            "maxTimeoutSeconds": 60,
            "asset": USDC,
            "extra": {"name": "USDC", "version": "2"}
        }))
        .unwrap();
        let v2: PaymentRequirement = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "eip155:84532",
            "amount": "10000",
            "payTo": PAY_TO,
            "maxTimeoutSeconds": 60,
            "asset": USDC,
            "extra": {"name": "USDC", "version": "2"}
        }))
        .unwrap();
        let resource = v2::ResourceInfo {
            url: "https://api.example.com/weather".into(),
            description: Some("Weather report".into()),
            mime_type: Some("application/json".into()),
            output_schema: None,
        };

        let from_v1 = normalize(&v1, None);
        let from_v2 = normalize(&v2, Some(&resource));
        assert_eq!(from_v1, from_v2);
        assert_eq!(from_v1.network, "base-sepolia");
        assert_eq!(from_v1.amount(), "10000");
    }

    #[test]
    fn test_v2_without_resource_leaves_metadata_empty() {
        let v2: PaymentRequirement = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "eip155:999999",
            "amount": "1",
            "payTo": PAY_TO,
            "maxTimeoutSeconds": 60,
            "asset": USDC
        }))
        .unwrap();
        let unified = normalize(&v2, None);
        assert_eq!(unified.network, "eip155:999999");
        assert_eq!(unified.resource, None);
        assert_eq!(unified.description, None);
    }

    #[test]
    fn test_validate() {
        let base = UnifiedRequirement {
            scheme: "exact".into(),
            network: "base".into(),
            amount: "115792089237316195423570985008687907853269984665640564039457584007913129639935"
                .into(),
            pay_to: PAY_TO.into(),
            asset: USDC.into(),
            max_timeout_seconds: 60,
            extra: None,
            resource: None,
            description: None,
            mime_type: None,
            output_schema: None,
        };
        assert_eq!(validate(&base), Ok(U256::MAX));

        let upto = UnifiedRequirement {
            scheme: "upto".into(),
            ..base.clone()
        };
        assert_eq!(
            validate(&upto),
            Err(RequirementRejection::UnsupportedScheme("upto".into()))
        );

        for amount in ["", "-1", "1.5", "0x10", " 10"] {
            let bad = UnifiedRequirement {
                amount: amount.into(),
                ..base.clone()
            };
            assert!(matches!(
                validate(&bad),
                Err(RequirementRejection::InvalidAmount(_))
            ));
        }
        let overflow = UnifiedRequirement {
            amount: format!("{}0", base.amount),
            ..base.clone()
        };
        assert!(validate(&overflow).is_err());
    }

    #[test]
    fn test_candidates_keep_order_and_reasons() {
        let challenge = json!({
            "x402Version": 2,
            "resource": {"url": "https://api.example.com/premium"},
            "accepts": [
                {"scheme": "upto", "network": "eip155:8453", "amount": "5", "payTo": PAY_TO, "maxTimeoutSeconds": 60, "asset": USDC},
                {"scheme": "exact", "network": "eip155:8453"},
                {"scheme": "exact", "network": "eip155:8453", "amount": "20", "payTo": PAY_TO, "maxTimeoutSeconds": 60, "asset": USDC},
                {"scheme": "exact", "network": "eip155:84532", "amount": "10", "payTo": PAY_TO, "maxTimeoutSeconds": 60, "asset": USDC}
            ]
        });
        let challenge = PaymentChallenge::from_json_bytes(
            challenge.to_string().as_bytes(),
            ChallengeSource::Header,
        )
        .unwrap();
        let candidates = challenge.candidates();

        let indices: Vec<usize> = candidates.accepted.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(candidates.accepted[0].requirement.network, "base");
        assert_eq!(
            candidates.accepted[0].requirement.resource.as_deref(),
            Some("https://api.example.com/premium")
        );
        assert_eq!(candidates.accepted[1].amount, U256::from(10u64));

        assert_eq!(candidates.rejected.len(), 2);
        assert_eq!(
            candidates.rejected[0].reason,
            RequirementRejection::UnsupportedScheme("upto".into())
        );
        assert!(matches!(
            candidates.rejected[1].reason,
            RequirementRejection::Malformed(_)
        ));
    }
}
