//! The HTTP seam the negotiator sends requests through.
//!
//! Anything that can execute a [`Request`] works: a plain [`reqwest::Client`],
//! a [`reqwest_middleware::ClientWithMiddleware`] carrying logging or
//! analytics layers, or the rest of a middleware chain when the negotiator
//! itself runs as middleware. Decoration is composed by the caller; nothing
//! is patched globally.

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;

#[async_trait]
pub trait HttpTransport: Send {
    async fn send(&mut self, request: Request) -> rqm::Result<Response>;
}

#[async_trait]
impl HttpTransport for &reqwest::Client {
    async fn send(&mut self, request: Request) -> rqm::Result<Response> {
        self.execute(request).await.map_err(rqm::Error::Reqwest)
    }
}

#[async_trait]
impl HttpTransport for &rqm::ClientWithMiddleware {
    async fn send(&mut self, request: Request) -> rqm::Result<Response> {
        self.execute(request).await
    }
}

/// The remainder of a `reqwest-middleware` chain.
pub struct NextTransport<'a, 'e> {
    next: rqm::Next<'a>,
    extensions: &'e mut Extensions,
}

impl<'a, 'e> NextTransport<'a, 'e> {
    pub fn new(next: rqm::Next<'a>, extensions: &'e mut Extensions) -> Self {
        Self { next, extensions }
    }
}

#[async_trait]
impl HttpTransport for NextTransport<'_, '_> {
    async fn send(&mut self, request: Request) -> rqm::Result<Response> {
        self.next.clone().run(request, self.extensions).await
    }
}
