//! Client-side capabilities: choosing a requirement and signing it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::networks::normalize_network;
use crate::proto::{PaymentCandidate, UnifiedRequirement, v1};

// ============================================================================
// PaymentSelector - Selection strategy
// ============================================================================

/// Picks one requirement among payable candidates.
///
/// Candidates arrive in the order the server listed them, already filtered
/// by scheme and by the signer's networks. Implementations must be
/// deterministic for identical input.
pub trait PaymentSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate>;
}

/// Default selector: the first candidate in received order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.first()
    }
}

/// The cheapest candidate; ties go to the earliest listed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestAmount;

impl PaymentSelector for LowestAmount {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        // min_by_key keeps the first of equal minima
        candidates.iter().min_by_key(|candidate| candidate.amount)
    }
}

// ============================================================================
// PaymentSigner - Wallet capability
// ============================================================================

/// Networks a signer can pay on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerNetworks {
    /// Exactly one network; requirements are filtered to it.
    Single(String),
    /// A fixed set, treated as "any network will do".
    Many(Vec<String>),
    /// The signer cannot tell. Nothing is filtered.
    Unknown,
}

impl SignerNetworks {
    /// The network filter this capability implies, if any.
    ///
    /// The network is normalized so `"eip155:8453"` and `"base"` compare equal.
    pub fn filter(&self) -> Option<String> {
        match self {
            SignerNetworks::Single(network) => Some(normalize_network(network)),
            SignerNetworks::Many(_) | SignerNetworks::Unknown => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Network {0} is not supported by this signer")]
    UnsupportedNetwork(String),
    #[error("Invalid requirement: {0}")]
    InvalidRequirement(String),
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// A wallet able to authorize payments.
///
/// `sign` produces a V1-style payload for the selected, normalized
/// requirement; re-wrapping for V2 is done by the caller. A signer may be
/// used by several negotiations at once; any serialization it needs (nonce
/// management, hardware wallets) is its own concern.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    fn networks(&self) -> SignerNetworks;

    async fn sign(
        &self,
        requirement: &UnifiedRequirement,
        x402_version: u8,
    ) -> Result<v1::PaymentPayload, SignerError>;
}

#[async_trait]
impl<T: PaymentSigner + ?Sized> PaymentSigner for Arc<T> {
    fn networks(&self) -> SignerNetworks {
        (**self).networks()
    }

    async fn sign(
        &self,
        requirement: &UnifiedRequirement,
        x402_version: u8,
    ) -> Result<v1::PaymentPayload, SignerError> {
        (**self).sign(requirement, x402_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::OriginalJson;
    use alloy_primitives::U256;

    fn candidate(index: usize, amount: u64) -> PaymentCandidate {
        PaymentCandidate {
            index,
            requirement: UnifiedRequirement {
                scheme: "exact".into(),
                network: "base".into(),
                amount: amount.to_string(),
                pay_to: "0x0".into(),
                asset: "0x0".into(),
                max_timeout_seconds: 60,
                extra: None,
                resource: None,
                description: None,
                mime_type: None,
                output_schema: None,
            },
            amount: U256::from(amount),
            original: OriginalJson::parse("{}").unwrap(),
        }
    }

    #[test]
    fn test_first_match_uses_received_order() {
        let candidates = vec![candidate(0, 30), candidate(1, 10)];
        assert_eq!(FirstMatch.select(&candidates).map(|c| c.index), Some(0));
        assert!(FirstMatch.select(&[]).is_none());
    }

    #[test]
    fn test_lowest_amount_ties_break_by_order() {
        let candidates = vec![candidate(0, 30), candidate(1, 10), candidate(2, 10)];
        assert_eq!(LowestAmount.select(&candidates).map(|c| c.index), Some(1));
    }

    #[test]
    fn test_network_filter() {
        assert_eq!(
            SignerNetworks::Single("eip155:8453".into()).filter(),
            Some("base".to_string())
        );
        assert_eq!(SignerNetworks::Many(vec!["base".into()]).filter(), None);
        assert_eq!(SignerNetworks::Unknown.filter(), None);
    }
}
