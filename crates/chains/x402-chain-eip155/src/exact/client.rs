//! Client-side signing for the EIP-155 "exact" scheme.
//!
//! ```ignore
//! use x402_chain_eip155::Eip155ExactSigner;
//! use alloy_signer_local::PrivateKeySigner;
//!
//! let signer = Eip155ExactSigner::new(PrivateKeySigner::random()).with_network("base-sepolia");
//! ```

use alloy_primitives::{Address, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain};
use async_trait::async_trait;
use rand::{Rng, rng};
use std::str::FromStr;
use std::sync::Arc;
use x402_types::networks::normalize_network;
use x402_types::proto::client::{PaymentSigner, SignerError, SignerNetworks};
use x402_types::proto::v1::{self, X402Version1};
use x402_types::proto::{EXACT_SCHEME, UnifiedRequirement};
use x402_types::timestamp::UnixTimestamp;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::chain::Eip155ChainReference;
use crate::exact::{
    ExactEvmPayload, ExactEvmPayloadAuthorization, PaymentRequirementsExtra,
    TransferWithAuthorization,
};

/// How far back `validAfter` is set, to tolerate clock skew.
const VALID_AFTER_SKEW_SECS: u64 = 10 * 60;

/// Signs ERC-3009 payments for the "exact" scheme on EVM chains.
///
/// Without configured networks the signer reports
/// [`SignerNetworks::Unknown`] and attempts any EVM requirement it is handed.
#[derive(Debug, Clone)]
pub struct Eip155ExactSigner<S> {
    signer: S,
    networks: Vec<String>,
}

impl<S> Eip155ExactSigner<S> {
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            networks: Vec::new(),
        }
    }

    /// Restricts the signer to `network`; may be called repeatedly.
    pub fn with_network(mut self, network: impl AsRef<str>) -> Self {
        self.networks.push(normalize_network(network.as_ref()));
        self
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }
}

#[async_trait]
impl<S> PaymentSigner for Eip155ExactSigner<S>
where
    S: SignerLike + Send + Sync,
{
    fn networks(&self) -> SignerNetworks {
        match self.networks.as_slice() {
            [] => SignerNetworks::Unknown,
            [single] => SignerNetworks::Single(single.clone()),
            many => SignerNetworks::Many(many.to_vec()),
        }
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.eip155.sign", skip_all, fields(network = %requirement.network), err)
    )]
    async fn sign(
        &self,
        requirement: &UnifiedRequirement,
        _x402_version: u8,
    ) -> Result<v1::PaymentPayload, SignerError> {
        if requirement.scheme != EXACT_SCHEME {
            return Err(SignerError::InvalidRequirement(format!(
                "scheme {} is not supported",
                requirement.scheme
            )));
        }
        let network = normalize_network(&requirement.network);
        if !self.networks.is_empty() && !self.networks.contains(&network) {
            return Err(SignerError::UnsupportedNetwork(requirement.network.clone()));
        }
        let chain_reference = Eip155ChainReference::from_network(&requirement.network)
            .map_err(|e| SignerError::UnsupportedNetwork(e.to_string()))?;
        let params = Eip3009SigningParams::try_from_requirement(chain_reference, requirement)?;

        let evm_payload = sign_erc3009_authorization(&self.signer, &params).await?;
        #[cfg(feature = "telemetry")]
        debug!(chain_id = params.chain_id, from = %evm_payload.authorization.from, "Signed ERC-3009 authorization");
        let payload = serde_json::to_value(&evm_payload)
            .map_err(|e| SignerError::Signing(format!("Failed to encode payload: {e}")))?;
        Ok(v1::PaymentPayload {
            x402_version: X402Version1,
            scheme: requirement.scheme.clone(),
            network: requirement.network.clone(),
            payload,
        })
    }
}

/// EIP-712 signing parameters for an ERC-3009 authorization.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// The EIP-155 chain ID (numeric)
    pub chain_id: u64,
    /// The token contract address (verifying contract for EIP-712)
    pub asset_address: Address,
    pub pay_to: Address,
    pub amount: U256,
    /// Width of the validity window, from now
    pub max_timeout_seconds: u64,
    /// EIP-712 domain name and version
    pub extra: Option<PaymentRequirementsExtra>,
}

impl Eip3009SigningParams {
    fn try_from_requirement(
        chain_reference: Eip155ChainReference,
        requirement: &UnifiedRequirement,
    ) -> Result<Self, SignerError> {
        let address = |field: &str, value: &str| {
            Address::from_str(value)
                .map_err(|e| SignerError::InvalidRequirement(format!("{field} {value}: {e}")))
        };
        let amount = requirement.amount_value().ok_or_else(|| {
            SignerError::InvalidRequirement(format!("amount {}", requirement.amount))
        })?;
        // A seller that omits the domain gets an empty one; the facilitator decides.
        let extra = requirement
            .extra
            .as_ref()
            .and_then(|extra| serde_json::from_value(extra.clone()).ok());
        Ok(Self {
            chain_id: chain_reference.inner(),
            asset_address: address("asset", &requirement.asset)?,
            pay_to: address("payTo", &requirement.pay_to)?,
            amount,
            max_timeout_seconds: requirement.max_timeout_seconds,
            extra,
        })
    }
}

/// Signs an ERC-3009 `TransferWithAuthorization` using EIP-712.
///
/// The window opens ten minutes in the past and closes
/// `max_timeout_seconds` from now. The nonce is 32 random bytes.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, SignerError> {
    let (name, version) = match &params.extra {
        None => (String::new(), String::new()),
        Some(extra) => (extra.name.clone(), extra.version.clone()),
    };

    let domain = eip712_domain! {
        name: name,
        version: version,
        chain_id: params.chain_id,
        verifying_contract: params.asset_address,
    };

    let now = UnixTimestamp::now();
    let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECS);
    let valid_before = now + params.max_timeout_seconds;
    let nonce: [u8; 32] = rng().random();
    let nonce = FixedBytes(nonce);

    let authorization = ExactEvmPayloadAuthorization {
        from: signer.address(),
        to: params.pay_to,
        value: params.amount,
        valid_after,
        valid_before,
        nonce,
    };

    let transfer_with_authorization = TransferWithAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value,
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
    };

    let eip712_hash = transfer_with_authorization.eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&eip712_hash)
        .await
        .map_err(|e| SignerError::Signing(format!("{e:?}")))?;

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Abstracts over owned and `Arc`-shared signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is commonly shared between clients.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}
