//! EVM chain identifiers and wire helpers.

use std::fmt::{Display, Formatter};
use x402_types::chain::ChainId;

/// The CAIP-2 namespace for EVM-compatible chains.
pub const EIP155_NAMESPACE: &str = "eip155";

/// Decimal-string serde for `U256`.
///
/// `alloy` serializes `U256` as `0x`-prefixed hex; x402 payloads carry
/// base-unit amounts as decimal strings.
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}

/// A numeric EVM chain id, e.g. `8453` for Base.
///
/// ```
/// use x402_chain_eip155::chain::Eip155ChainReference;
///
/// let base = Eip155ChainReference::from_network("base").unwrap();
/// assert_eq!(base.inner(), 8453);
/// assert_eq!(base.as_chain_id().to_string(), "eip155:8453");
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    pub fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }

    pub fn as_chain_id(&self) -> ChainId {
        ChainId::new(EIP155_NAMESPACE, self.0.to_string())
    }

    /// Resolves a wire network identifier, either a known name (`base-sepolia`)
    /// or a CAIP-2 id (`eip155:84532`).
    pub fn from_network(network: &str) -> Result<Self, Eip155ChainReferenceFormatError> {
        let chain_id = ChainId::resolve(network)
            .ok_or_else(|| Eip155ChainReferenceFormatError::UnknownNetwork(network.to_string()))?;
        Self::try_from(&chain_id)
    }
}

impl From<Eip155ChainReference> for ChainId {
    fn from(value: Eip155ChainReference) -> Self {
        value.as_chain_id()
    }
}

impl TryFrom<&ChainId> for Eip155ChainReference {
    type Error = Eip155ChainReferenceFormatError;

    fn try_from(value: &ChainId) -> Result<Self, Self::Error> {
        if value.namespace != EIP155_NAMESPACE {
            return Err(Eip155ChainReferenceFormatError::InvalidNamespace(
                value.namespace.clone(),
            ));
        }
        let chain_id: u64 = value.reference.parse().map_err(|_| {
            Eip155ChainReferenceFormatError::InvalidReference(value.reference.clone())
        })?;
        Ok(Eip155ChainReference(chain_id))
    }
}

/// Error returned when a network cannot be read as an EVM chain.
#[derive(Debug, thiserror::Error)]
pub enum Eip155ChainReferenceFormatError {
    #[error("Unknown network {0}")]
    UnknownNetwork(String),
    #[error("Invalid namespace {0}, expected eip155")]
    InvalidNamespace(String),
    #[error("Invalid eip155 chain reference {0}")]
    InvalidReference(String),
}

impl Display for Eip155ChainReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
