use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::X402Client;

/// Wraps a reqwest [`Client`] or [`ClientBuilder`] with x402 payments.
///
/// ```rust,ignore
/// use x402_reqwest::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
///
/// let http = reqwest::Client::new()
///     .with_payments(X402Client::new(signer))
///     .build();
/// let response = http.get("https://api.example.com/weather").send().await?;
/// ```
pub trait ReqwestWithPayments<A> {
    fn with_payments<S, P>(self, x402_client: X402Client<S, P>) -> ReqwestWithPaymentsBuilder<A, S, P>;
}

impl ReqwestWithPayments<Client> for Client {
    fn with_payments<S, P>(
        self,
        x402_client: X402Client<S, P>,
    ) -> ReqwestWithPaymentsBuilder<Client, S, P> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

impl ReqwestWithPayments<ClientBuilder> for ClientBuilder {
    fn with_payments<S, P>(
        self,
        x402_client: X402Client<S, P>,
    ) -> ReqwestWithPaymentsBuilder<ClientBuilder, S, P> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

pub struct ReqwestWithPaymentsBuilder<A, S, P> {
    inner: A,
    x402_client: X402Client<S, P>,
}

pub trait ReqwestWithPaymentsBuild {
    type BuildResult;
    type BuilderResult;

    fn build(self) -> Self::BuildResult;
    /// The middleware builder, for stacking further layers (logging, retries).
    fn builder(self) -> Self::BuilderResult;
}

impl<S, P> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client, S, P>
where
    X402Client<S, P>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.x402_client)
    }
}

impl<S, P> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder, S, P>
where
    X402Client<S, P>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.x402_client))
    }
}
