//! Client-side x402 payment negotiation for reqwest.
//!
//! A negotiation has two steps and never more: *probing* (send the request
//! as-is) and, on a 402, *paying* (select a requirement, sign it, send the
//! request again with the proof attached).

use alloy_primitives::U256;
use http::{Extensions, HeaderName, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use x402_types::proto::client::{
    FirstMatch, PaymentSelector, PaymentSigner, SignerError, SignerNetworks,
};
use x402_types::proto::{
    Candidates, EXACT_SCHEME, PAYMENT_HEADERS, ParseError, PaymentCandidate, PaymentProof,
    RejectedRequirement,
};

use crate::challenge::{ChallengeResponse, parse_payment_required};
use crate::http_transport::{HttpTransport, NextTransport};

#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace, warn};

/// Why a negotiation did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// The 402 challenge could not be decoded.
    #[error("Invalid payment challenge: {0}")]
    InvalidChallenge(#[source] ParseError),
    #[error("Payment challenge lists no requirements")]
    NoRequirements,
    /// Every requirement was dropped; the reasons are attached.
    #[error("No valid payment requirement ({} dropped)", .0.len())]
    NoValidRequirements(Vec<RejectedRequirement>),
    #[error("No payment requirement matches the signer ({0:?})")]
    NoMatchingRequirement(SignerNetworks),
    #[error("Required amount {amount} exceeds the limit of {max_value}")]
    AmountExceedsLimit { amount: U256, max_value: U256 },
    #[error("Failed to sign payment: {0}")]
    SigningFailed(#[source] SignerError),
    /// The request already carries a payment header.
    #[error("Payment was already attempted for this request")]
    PaymentAlreadyAttempted,
    /// The request body is a stream, so the request cannot be sent twice.
    #[error("Request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
    #[error("Failed to encode payment proof: {0}")]
    ProofEncoding(String),
    #[error(transparent)]
    Transport(rqm::Error),
    #[error("Payment negotiation was cancelled")]
    Cancelled,
}

/// A failed negotiation, together with the unpaid response if there was one.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct NegotiationFailure {
    #[source]
    error: NegotiationError,
    response: Option<ChallengeResponse>,
}

impl NegotiationFailure {
    fn new(error: NegotiationError) -> Self {
        Self {
            error,
            response: None,
        }
    }

    fn with_response(error: NegotiationError, response: ChallengeResponse) -> Self {
        Self {
            error,
            response: Some(response),
        }
    }

    pub fn error(&self) -> &NegotiationError {
        &self.error
    }

    /// The buffered unpaid response, when the first request got that far.
    pub fn response(&self) -> Option<&ChallengeResponse> {
        self.response.as_ref()
    }

    pub fn into_parts(self) -> (NegotiationError, Option<ChallengeResponse>) {
        (self.error, self.response)
    }
}

impl From<NegotiationError> for NegotiationFailure {
    fn from(error: NegotiationError) -> Self {
        NegotiationFailure::new(error)
    }
}

/// Result of a negotiation: the final response, and the proof when one was paid.
#[derive(Debug)]
pub struct Negotiated {
    pub response: Response,
    pub proof: Option<PaymentProof>,
}

/// Pays for HTTP 402 challenges with a [`PaymentSigner`].
///
/// ```rust,ignore
/// use x402_reqwest::X402Client;
///
/// let client = X402Client::new(signer).with_max_value(U256::from(50_000));
/// let http = reqwest::Client::new();
/// let request = http.get("https://api.example.com/weather").build()?;
/// let negotiated = client.fetch_with_payment(&http, request).await?;
/// ```
///
/// The same client is a `reqwest-middleware` layer; see
/// [`ReqwestWithPayments`](crate::ReqwestWithPayments).
#[derive(Debug, Clone)]
pub struct X402Client<S, TSelector = FirstMatch> {
    signer: S,
    selector: TSelector,
    max_value: U256,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl<S> X402Client<S, FirstMatch> {
    /// Creates a client with [`FirstMatch`] selection and the default spend ceiling.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            selector: FirstMatch,
            max_value: U256::from(Self::DEFAULT_MAX_VALUE),
            timeout: None,
            cancellation: None,
        }
    }
}

impl<S, TSelector> X402Client<S, TSelector> {
    /// 0.10 of a 6-decimals token such as USDC, in base units.
    pub const DEFAULT_MAX_VALUE: u64 = 100_000;

    /// Sets the largest amount, in token base units, that will be signed.
    pub fn with_max_value(mut self, max_value: U256) -> Self {
        self.max_value = max_value;
        self
    }

    /// Sets the strategy used when several requirements are payable.
    pub fn with_selector<P: PaymentSelector>(self, selector: P) -> X402Client<S, P> {
        X402Client {
            signer: self.signer,
            selector,
            max_value: self.max_value,
            timeout: self.timeout,
            cancellation: self.cancellation,
        }
    }

    /// Applies a timeout to requests that do not already carry one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Aborts in-flight requests when `token` is cancelled.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn max_value(&self) -> U256 {
        self.max_value
    }
}

impl<S, TSelector> X402Client<S, TSelector>
where
    S: PaymentSigner,
    TSelector: PaymentSelector,
{
    /// Sends `request`, paying once if the server answers 402.
    ///
    /// Non-402 responses are returned untouched and the signer is not used.
    /// After paying, the retried response is returned whatever its status; a
    /// second 402 is not paid again. Failures after the first response carry
    /// the buffered 402 response. A 402 whose body cannot be read in full is a
    /// transport error.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.reqwest.fetch_with_payment", skip_all, fields(url = %request.url()), err)
    )]
    pub async fn fetch_with_payment<T: HttpTransport>(
        &self,
        mut transport: T,
        mut request: Request,
    ) -> Result<Negotiated, NegotiationFailure> {
        if PAYMENT_HEADERS
            .iter()
            .any(|name| request.headers().contains_key(*name))
        {
            return Err(NegotiationError::PaymentAlreadyAttempted.into());
        }
        if let Some(timeout) = self.timeout {
            request.timeout_mut().get_or_insert(timeout);
        }

        let retry = request.try_clone();
        let response = self.send(&mut transport, request).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?response.status(), "No payment required, returning response");
            return Ok(Negotiated {
                response,
                proof: None,
            });
        }

        #[cfg(feature = "telemetry")]
        info!(url = %response.url(), "Received 402 Payment Required, processing payment");

        let unpaid = self
            .cancellable(ChallengeResponse::read(response))
            .await?
            .map_err(|e| NegotiationError::Transport(rqm::Error::Reqwest(e)))?;
        let proof = match self.make_payment_proof(&unpaid).await {
            Ok(proof) => proof,
            Err(error) => return Err(NegotiationFailure::with_response(error, unpaid)),
        };
        let mut retry = match retry {
            Some(retry) => retry,
            None => {
                return Err(NegotiationFailure::with_response(
                    NegotiationError::RequestNotCloneable,
                    unpaid,
                ));
            }
        };
        if let Err(error) = attach_proof(&mut retry, &proof) {
            return Err(NegotiationFailure::with_response(error, unpaid));
        }

        #[cfg(feature = "telemetry")]
        trace!(url = %retry.url(), header = proof.header_name(), "Retrying request with payment");

        match self.send(&mut transport, retry).await {
            Ok(response) => {
                #[cfg(feature = "telemetry")]
                debug!(status = ?response.status(), "Paid request completed");
                Ok(Negotiated {
                    response,
                    proof: Some(proof),
                })
            }
            Err(error) => Err(NegotiationFailure::with_response(error, unpaid)),
        }
    }

    /// Turns a buffered 402 response into a signed proof.
    ///
    /// Checks the spend ceiling before the signer is involved.
    pub async fn make_payment_proof(
        &self,
        unpaid: &ChallengeResponse,
    ) -> Result<PaymentProof, NegotiationError> {
        let challenge = parse_payment_required(unpaid).map_err(|e| match e {
            ParseError::NoRequirements => NegotiationError::NoRequirements,
            other => NegotiationError::InvalidChallenge(other),
        })?;

        let Candidates { accepted, rejected } = challenge.candidates();
        #[cfg(feature = "telemetry")]
        for dropped in rejected.iter() {
            debug!(index = dropped.index, reason = %dropped.reason, "Dropped payment requirement");
        }
        if accepted.is_empty() {
            return Err(NegotiationError::NoValidRequirements(rejected));
        }

        let networks = self.signer.networks();
        let filter = networks.filter();
        #[cfg(feature = "telemetry")]
        if networks == SignerNetworks::Unknown {
            warn!("Signer networks unknown, accepting a requirement on any network");
        }
        let matching = accepted
            .into_iter()
            .filter(|candidate| candidate.requirement.scheme == EXACT_SCHEME)
            .filter(|candidate| {
                filter
                    .as_ref()
                    .is_none_or(|network| *network == candidate.requirement.network)
            })
            .collect::<Vec<PaymentCandidate>>();
        let selected = self
            .selector
            .select(&matching)
            .ok_or(NegotiationError::NoMatchingRequirement(networks))?;

        #[cfg(feature = "telemetry")]
        debug!(
            index = selected.index,
            network = %selected.requirement.network,
            amount = %selected.amount,
            "Selected payment requirement"
        );

        if selected.amount > self.max_value {
            return Err(NegotiationError::AmountExceedsLimit {
                amount: selected.amount,
                max_value: self.max_value,
            });
        }

        let signed = self
            .signer
            .sign(&selected.requirement, challenge.x402_version())
            .await
            .map_err(NegotiationError::SigningFailed)?;
        Ok(challenge.wrap_proof(signed, &selected.original))
    }

    async fn send<T: HttpTransport>(
        &self,
        transport: &mut T,
        request: Request,
    ) -> Result<Response, NegotiationError> {
        self.cancellable(transport.send(request))
            .await?
            .map_err(NegotiationError::Transport)
    }

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output, NegotiationError> {
        match &self.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(NegotiationError::Cancelled),
                output = future => Ok(output),
            },
            None => Ok(future.await),
        }
    }
}

fn attach_proof(request: &mut Request, proof: &PaymentProof) -> Result<(), NegotiationError> {
    let name = HeaderName::from_bytes(proof.header_name().as_bytes())
        .map_err(|e| NegotiationError::ProofEncoding(e.to_string()))?;
    let value = proof
        .to_header_value()
        .map_err(|e| NegotiationError::ProofEncoding(e.to_string()))?;
    let value =
        HeaderValue::from_str(&value).map_err(|e| NegotiationError::ProofEncoding(e.to_string()))?;
    request.headers_mut().insert(name, value);
    Ok(())
}

#[async_trait::async_trait]
impl<S, TSelector> rqm::Middleware for X402Client<S, TSelector>
where
    S: PaymentSigner + 'static,
    TSelector: PaymentSelector + 'static,
{
    /// Handles a request, paying for 402 responses.
    ///
    /// The proof of a paid request is available from the response
    /// extensions as a [`PaymentProof`].
    #[cfg_attr(feature = "telemetry", instrument(name = "x402.reqwest.handle", skip_all, err))]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let transport = NextTransport::new(next, extensions);
        match self.fetch_with_payment(transport, req).await {
            Ok(Negotiated {
                mut response,
                proof,
            }) => {
                if let Some(proof) = proof {
                    response.extensions_mut().insert(proof);
                }
                Ok(response)
            }
            Err(failure) => match failure.into_parts() {
                (NegotiationError::Transport(error), _) => Err(error),
                (error, response) => Err(rqm::Error::Middleware(
                    NegotiationFailure { error, response }.into(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReqwestWithPayments, ReqwestWithPaymentsBuild};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{any, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_types::proto::client::LowestAmount;
    use x402_types::proto::{UnifiedRequirement, V1_PAYMENT_HEADER, V2_PAYMENT_HEADER, v1};
    use x402_types::util::Base64Bytes;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

    struct FakeSigner {
        networks: SignerNetworks,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeSigner {
        fn new(networks: SignerNetworks) -> Arc<Self> {
            Arc::new(Self {
                networks,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PaymentSigner for FakeSigner {
        fn networks(&self) -> SignerNetworks {
            self.networks.clone()
        }

        async fn sign(
            &self,
            requirement: &UnifiedRequirement,
            _x402_version: u8,
        ) -> Result<v1::PaymentPayload, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SignerError::Signing("wallet locked".into()));
            }
            Ok(v1::PaymentPayload {
                x402_version: v1::X402Version1,
                scheme: requirement.scheme.clone(),
                network: requirement.network.clone(),
                payload: json!({"signature": "0xfeed", "value": requirement.amount}),
            })
        }
    }

    fn base_sepolia() -> SignerNetworks {
        SignerNetworks::Single("base-sepolia".into())
    }

    fn v1_accept(amount: &str) -> serde_json::Value {
        json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": amount,
            "resource": "https://api.example.com/weather",
            "description": "Weather",
            "mimeType": "application/json",
            "payTo": PAY_TO,
            "maxTimeoutSeconds": 60,
            "asset": USDC_BASE_SEPOLIA,
            "extra": {"name": "USDC", "version": "2"}
        })
    }

    fn v1_challenge(accepts: Vec<serde_json::Value>) -> ResponseTemplate {
        ResponseTemplate::new(402).set_body_json(json!({"x402Version": 1, "accepts": accepts}))
    }

    async fn mount_paywall(server: &MockServer, challenge: ResponseTemplate, proof_header: &str) {
        Mock::given(method("GET"))
            .and(path("/paid"))
            .and(header_exists(proof_header))
            .respond_with(ResponseTemplate::new(200).set_body_string("paid content"))
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(challenge)
            .mount(server)
            .await;
    }

    async fn fetch<S: PaymentSigner, P: PaymentSelector>(
        client: &X402Client<S, P>,
        url: String,
    ) -> Result<Negotiated, NegotiationFailure> {
        let http = reqwest::Client::new();
        let request = http.get(url).build().unwrap();
        client.fetch_with_payment(&http, request).await
    }

    #[tokio::test]
    async fn test_free_resource_is_returned_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let negotiated = fetch(&client, format!("{}/free", server.uri())).await.unwrap();
        assert!(negotiated.proof.is_none());
        assert_eq!(negotiated.response.status(), StatusCode::OK);
        assert_eq!(negotiated.response.text().await.unwrap(), "hello");
        assert_eq!(signer.calls(), 0);
    }

    #[tokio::test]
    async fn test_v1_body_challenge_is_paid_once() {
        let server = MockServer::start().await;
        mount_paywall(&server, v1_challenge(vec![v1_accept("10000")]), V1_PAYMENT_HEADER).await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let negotiated = fetch(&client, format!("{}/paid", server.uri())).await.unwrap();
        assert_eq!(negotiated.response.status(), StatusCode::OK);
        assert_eq!(signer.calls(), 1);
        let proof = negotiated.proof.unwrap();
        assert!(matches!(proof, PaymentProof::V1(_)));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].headers.contains_key(V1_PAYMENT_HEADER));
        let sent = requests[1].headers.get(V1_PAYMENT_HEADER).unwrap();
        let sent = Base64Bytes::from(sent.as_bytes()).decode().unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&sent).unwrap();
        assert_eq!(sent["x402Version"], 1);
        assert_eq!(sent["network"], "base-sepolia");
        assert_eq!(sent["payload"]["value"], "10000");
    }

    #[tokio::test]
    async fn test_v2_header_challenge_echoes_original_accept() {
        let server = MockServer::start().await;
        let accept_text = format!(
            r#"{{"network":"eip155:84532","amount":"5000","scheme":"exact","payTo":"{PAY_TO}","maxTimeoutSeconds":300,"asset":"{USDC_BASE_SEPOLIA}","extra":{{"version":"2","name":"USDC"}}}}"#
        );
        let challenge = format!(
            r#"{{"x402Version":2,"resource":{{"url":"https://api.example.com/premium"}},"accepts":[{accept_text}],"extensions":{{"bazaar":{{"discoverable":true}}}}}}"#
        );
        let header = Base64Bytes::encode(&challenge).to_string();
        mount_paywall(
            &server,
            ResponseTemplate::new(402).insert_header("Payment-Required", header.as_str()),
            V2_PAYMENT_HEADER,
        )
        .await;
        let signer = FakeSigner::new(SignerNetworks::Single("eip155:84532".into()));
        let client = X402Client::new(signer.clone());

        let negotiated = fetch(&client, format!("{}/paid", server.uri())).await.unwrap();
        assert_eq!(negotiated.response.status(), StatusCode::OK);
        match negotiated.proof {
            Some(PaymentProof::V2(ref payload)) => {
                assert_eq!(payload.accepted.as_str(), accept_text);
                assert_eq!(
                    payload.resource.as_ref().map(|r| r.as_str()),
                    Some(r#"{"url":"https://api.example.com/premium"}"#)
                );
            }
            ref other => panic!("expected a V2 proof, got {other:?}"),
        }

        let requests = server.received_requests().await.unwrap();
        let sent = requests[1].headers.get(V2_PAYMENT_HEADER).unwrap();
        let sent = Base64Bytes::from(sent.as_bytes()).decode().unwrap();
        let sent = String::from_utf8(sent).unwrap();
        assert!(sent.contains(&accept_text));
        assert!(sent.contains(r#""extensions":{"bazaar":{"discoverable":true}}"#));
    }

    #[tokio::test]
    async fn test_amount_over_limit_never_signs() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(v1_challenge(vec![v1_accept("100001")]))
            .expect(1)
            .mount(&server)
            .await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let failure = fetch(&client, format!("{}/paid", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error(),
            NegotiationError::AmountExceedsLimit { amount, .. } if *amount == U256::from(100_001u64)
        ));
        assert_eq!(
            failure.response().map(|r| r.status()),
            Some(StatusCode::PAYMENT_REQUIRED)
        );
        assert_eq!(signer.calls(), 0);
    }

    #[tokio::test]
    async fn test_already_paid_request_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        for header in [V1_PAYMENT_HEADER, "payment-signature"] {
            let http = reqwest::Client::new();
            let request = http
                .get(format!("{}/paid", server.uri()))
                .header(header, "previous-proof")
                .build()
                .unwrap();
            let failure = client.fetch_with_payment(&http, request).await.unwrap_err();
            assert!(matches!(
                failure.error(),
                NegotiationError::PaymentAlreadyAttempted
            ));
            assert!(failure.response().is_none());
        }
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(signer.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_header_is_invalid_challenge() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(
                v1_challenge(vec![v1_accept("10")]).insert_header("Payment-Required", "@@@"),
            )
            .mount(&server)
            .await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let failure = fetch(&client, server.uri()).await.unwrap_err();
        assert!(matches!(
            failure.error(),
            NegotiationError::InvalidChallenge(ParseError::HeaderDecodeFailed(_))
        ));
        assert_eq!(signer.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_accepts_is_no_requirements() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(v1_challenge(vec![]))
            .mount(&server)
            .await;
        let client = X402Client::new(FakeSigner::new(base_sepolia()));

        let failure = fetch(&client, server.uri()).await.unwrap_err();
        assert!(matches!(failure.error(), NegotiationError::NoRequirements));
    }

    #[tokio::test]
    async fn test_all_requirements_invalid() {
        let server = MockServer::start().await;
        let mut upto = v1_accept("10");
        upto["scheme"] = json!("upto");
        let mut bad_amount = v1_accept("10");
        bad_amount["maxAmountRequired"] = json!("ten");
        Mock::given(any())
            .respond_with(v1_challenge(vec![upto, bad_amount]))
            .mount(&server)
            .await;
        let client = X402Client::new(FakeSigner::new(base_sepolia()));

        let failure = fetch(&client, server.uri()).await.unwrap_err();
        match failure.error() {
            NegotiationError::NoValidRequirements(rejected) => assert_eq!(rejected.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_filter_and_unknown_signer() {
        let server = MockServer::start().await;
        mount_paywall(&server, v1_challenge(vec![v1_accept("10")]), V1_PAYMENT_HEADER).await;
        let url = format!("{}/paid", server.uri());

        let polygon = FakeSigner::new(SignerNetworks::Single("polygon".into()));
        let failure = fetch(&X402Client::new(polygon.clone()), url.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error(),
            NegotiationError::NoMatchingRequirement(_)
        ));
        assert_eq!(polygon.calls(), 0);

        let unknown = FakeSigner::new(SignerNetworks::Unknown);
        let negotiated = fetch(&X402Client::new(unknown.clone()), url).await.unwrap();
        assert_eq!(negotiated.response.status(), StatusCode::OK);
        assert_eq!(unknown.calls(), 1);
    }

    #[tokio::test]
    async fn test_selector_decides_between_candidates() {
        let server = MockServer::start().await;
        mount_paywall(
            &server,
            v1_challenge(vec![v1_accept("300"), v1_accept("200"), v1_accept("200")]),
            V1_PAYMENT_HEADER,
        )
        .await;
        let client = X402Client::new(FakeSigner::new(base_sepolia())).with_selector(LowestAmount);

        let negotiated = fetch(&client, format!("{}/paid", server.uri())).await.unwrap();
        match negotiated.proof {
            Some(PaymentProof::V1(payload)) => assert_eq!(payload.payload["value"], "200"),
            other => panic!("expected a V1 proof, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_402_is_returned_not_retried() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(v1_challenge(vec![v1_accept("10")]))
            .expect(2)
            .mount(&server)
            .await;
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let negotiated = fetch(&client, server.uri()).await.unwrap();
        assert_eq!(negotiated.response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(negotiated.proof.is_some());
        assert_eq!(signer.calls(), 1);
    }

    #[tokio::test]
    async fn test_signing_failure() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(v1_challenge(vec![v1_accept("10")]))
            .expect(1)
            .mount(&server)
            .await;
        let signer = Arc::new(FakeSigner {
            networks: base_sepolia(),
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let client = X402Client::new(signer);

        let failure = fetch(&client, server.uri()).await.unwrap_err();
        assert!(matches!(failure.error(), NegotiationError::SigningFailed(_)));
    }

    #[tokio::test]
    async fn test_truncated_challenge_body_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 402 Payment Required\r\ncontent-length: 500\r\n\r\n{\"x402Versi",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        let signer = FakeSigner::new(base_sepolia());
        let client = X402Client::new(signer.clone());

        let failure = fetch(&client, format!("http://{addr}/paid")).await.unwrap_err();
        assert!(matches!(failure.error(), NegotiationError::Transport(_)));
        assert!(failure.response().is_none());
        assert_eq!(signer.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_first_request() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;
        let token = CancellationToken::new();
        let client =
            X402Client::new(FakeSigner::new(base_sepolia())).with_cancellation_token(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        let started = std::time::Instant::now();
        let failure = fetch(&client, server.uri()).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(failure.error(), NegotiationError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_middleware_exposes_proof() {
        let server = MockServer::start().await;
        mount_paywall(&server, v1_challenge(vec![v1_accept("10")]), V1_PAYMENT_HEADER).await;
        let http = reqwest::Client::new()
            .with_payments(X402Client::new(FakeSigner::new(base_sepolia())))
            .build();

        let response = http
            .get(format!("{}/paid", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<PaymentProof>().is_some());
    }
}
