//! Reading a 402 challenge off an HTTP response.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use reqwest::Response;
use std::borrow::Cow;
use url::Url;
use x402_types::proto::{PAYMENT_REQUIRED_HEADER, ParseError, PaymentChallenge};

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

/// A fully buffered response.
///
/// Parsing a challenge needs the body, but callers must still get the
/// unpaid response back when negotiation fails. The status, headers and
/// body are kept here; [`ChallengeResponse::into_response`] rebuilds an
/// unconsumed [`Response`].
#[derive(Debug, Clone)]
pub struct ChallengeResponse {
    status: StatusCode,
    version: Version,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl ChallengeResponse {
    /// Buffers `response`.
    ///
    /// Fails when the body cannot be read to the end, e.g. the connection
    /// drops before the declared `Content-Length` arrives.
    pub async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let version = response.version();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            version,
            url,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Rebuilds a response that can be consumed like the original.
    ///
    /// The URL is not carried over; use [`ChallengeResponse::url`] before
    /// converting if it matters.
    pub fn into_response(self) -> Response {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        Response::from(response)
    }
}

/// Extracts the payment challenge from a 402 response.
///
/// A `Payment-Required` header (any case) is authoritative: if present it is
/// decoded and the body is never looked at, even when decoding fails.
/// Otherwise the body is decoded as a V1 challenge.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "x402.reqwest.parse_payment_required", skip_all, err)
)]
pub fn parse_payment_required(response: &ChallengeResponse) -> Result<PaymentChallenge, ParseError> {
    match response.headers().get(PAYMENT_REQUIRED_HEADER) {
        Some(header) => {
            #[cfg(feature = "telemetry")]
            debug!("Parsing payment challenge from header");
            PaymentChallenge::from_header(header.as_bytes())
        }
        None => {
            #[cfg(feature = "telemetry")]
            debug!("Parsing payment challenge from body");
            PaymentChallenge::from_body(response.body())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_types::util::Base64Bytes;

    /// Serves one 402 whose body stops well short of its `Content-Length`.
    async fn truncated_402_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 402 Payment Required\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"x402Versi",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/paid")
    }

    async fn respond_with(template: ResponseTemplate) -> ChallengeResponse {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(template)
            .mount(&server)
            .await;
        let response = reqwest::get(server.uri()).await.unwrap();
        ChallengeResponse::read(response).await.unwrap()
    }

    fn v1_body() -> serde_json::Value {
        json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "10000",
                "resource": "https://api.example.com/weather",
                "description": "",
                "mimeType": "application/json",
                "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                "maxTimeoutSeconds": 60,
                "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
            }]
        })
    }

    #[tokio::test]
    async fn test_body_challenge() {
        let response = respond_with(ResponseTemplate::new(402).set_body_json(v1_body())).await;
        let challenge = parse_payment_required(&response).unwrap();
        assert_eq!(challenge.x402_version(), 1);
    }

    #[tokio::test]
    async fn test_header_is_case_insensitive() {
        let challenge = json!({
            "x402Version": 2,
            "accepts": [{"scheme": "exact", "network": "eip155:8453", "amount": "1"}]
        });
        let header = Base64Bytes::encode(challenge.to_string()).to_string();
        let response =
            respond_with(ResponseTemplate::new(402).insert_header("payment-required", header))
                .await;
        let challenge = parse_payment_required(&response).unwrap();
        assert_eq!(challenge.x402_version(), 2);
    }

    #[tokio::test]
    async fn test_malformed_header_never_falls_back_to_body() {
        let response = respond_with(
            ResponseTemplate::new(402)
                .insert_header("Payment-Required", "%%%not-base64%%%")
                .set_body_json(v1_body()),
        )
        .await;
        assert!(matches!(
            parse_payment_required(&response),
            Err(ParseError::HeaderDecodeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_accepts() {
        let response = respond_with(
            ResponseTemplate::new(402).set_body_json(json!({"x402Version": 1, "accepts": []})),
        )
        .await;
        assert!(matches!(
            parse_payment_required(&response),
            Err(ParseError::NoRequirements)
        ));
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_error() {
        let url = truncated_402_server().await;
        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(ChallengeResponse::read(response).await.is_err());
    }

    #[tokio::test]
    async fn test_response_survives_parsing() {
        let response = respond_with(ResponseTemplate::new(402).set_body_string("not json")).await;
        assert!(matches!(
            parse_payment_required(&response),
            Err(ParseError::BodyDecodeFailed(_))
        ));
        let response = response.into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(response.text().await.unwrap(), "not json");
    }
}
