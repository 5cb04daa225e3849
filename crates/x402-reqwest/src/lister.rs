//! Enumerating payable resources from a remote facilitator.
//!
//! [`FacilitatorClient::list_all`] walks `GET /discovery/resources` page by
//! page until the server-declared total is covered. Rate-limited pages are
//! retried at the same offset after an exponential backoff; any other
//! failure aborts the whole listing.
//!
//! ```rust,ignore
//! use x402_reqwest::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://x402.org/facilitator")?;
//! let resources = facilitator.list_all().await?;
//! ```

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use x402_types::proto::discovery::{ListingPage, ResourceItem};

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument, warn};

/// Errors that can occur while talking to a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Listing was cancelled")]
    Cancelled,
}

impl FacilitatorClientError {
    /// Whether the facilitator asked us to slow down.
    ///
    /// Status 429 counts, as does an error status whose body says
    /// "rate limit" or "too many requests".
    pub fn is_rate_limit(&self) -> bool {
        match self {
            FacilitatorClientError::HttpStatus { status, body, .. } => {
                let body = body.to_ascii_lowercase();
                *status == StatusCode::TOO_MANY_REQUESTS
                    || body.contains("rate limit")
                    || body.contains("too many requests")
            }
            _ => false,
        }
    }
}

/// Outcome of a single page request.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    /// Worth retrying after a pause; `list_all` never returns this.
    #[error("Rate limited: {0}")]
    RateLimited(#[source] FacilitatorClientError),
    #[error(transparent)]
    Fatal(FacilitatorClientError),
}

impl From<FacilitatorClientError> for ListingError {
    fn from(error: FacilitatorClientError) -> Self {
        if error.is_rate_limit() {
            ListingError::RateLimited(error)
        } else {
            ListingError::Fatal(error)
        }
    }
}

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub const DEFAULT_INITIAL: Duration = Duration::from_millis(1_000);
    pub const DEFAULT_MAX: Duration = Duration::from_millis(32_000);

    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// The delay to wait now. Doubles the following one, up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Self::DEFAULT_INITIAL, Self::DEFAULT_MAX)
    }
}

#[derive(Debug)]
enum ListingState {
    Request { offset: u64 },
    Backoff { offset: u64, delay: Duration },
    Done,
}

/// A client for a remote facilitator's discovery listing.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator (e.g. `https://facilitator.example/`)
    base_url: Url,
    /// Full URL to `GET /discovery/resources`
    resources_url: Url,
    client: Client,
    /// Custom headers sent with each request
    headers: HeaderMap,
    timeout: Option<Duration>,
    page_limit: u64,
    backoff: Backoff,
    cancellation: Option<CancellationToken>,
}

impl FacilitatorClient {
    /// Page size requested from the server.
    pub const PAGE_LIMIT: u64 = 100;

    /// Constructs a client from a base URL, deriving `./discovery/resources`.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let resources_url = base_url.join("./discovery/resources").map_err(|e| {
            FacilitatorClientError::UrlParse {
                context: "Failed to construct ./discovery/resources URL",
                source: e,
            }
        })?;
        Ok(Self {
            base_url,
            resources_url,
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: None,
            page_limit: Self::PAGE_LIMIT,
            backoff: Backoff::default(),
            cancellation: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resources_url(&self) -> &Url {
        &self.resources_url
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(&self, headers: HeaderMap) -> Self {
        let mut this = self.clone();
        this.headers = headers;
        this
    }

    /// Sets a timeout for every page request.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    pub fn with_backoff(&self, backoff: Backoff) -> Self {
        let mut this = self.clone();
        this.backoff = backoff;
        this
    }

    /// Uses `client` instead of a default reqwest client.
    pub fn with_http_client(&self, client: Client) -> Self {
        let mut this = self.clone();
        this.client = client;
        this
    }

    /// Aborts requests and backoff sleeps once `token` is cancelled.
    pub fn with_cancellation_token(&self, token: CancellationToken) -> Self {
        let mut this = self.clone();
        this.cancellation = Some(token);
        this
    }

    /// Fetches every listed resource.
    ///
    /// Rate limiting is waited out without a retry cap. Any other error is
    /// returned at once and the items gathered so far are dropped.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.list_all", skip_all, fields(url = %self.resources_url), err)
    )]
    pub async fn list_all(&self) -> Result<Vec<ResourceItem>, FacilitatorClientError> {
        let mut items = Vec::new();
        let mut backoff = self.backoff;
        let mut state = ListingState::Request { offset: 0 };
        loop {
            state = match state {
                ListingState::Request { offset } => match self.fetch_page(offset).await {
                    Ok(page) => {
                        backoff.reset();
                        #[cfg(feature = "telemetry")]
                        debug!(
                            offset,
                            items = page.items.len(),
                            total = page.pagination.total,
                            "Fetched listing page"
                        );
                        items.extend(page.items);
                        let next = offset + self.page_limit;
                        if page.pagination.total > next {
                            ListingState::Request { offset: next }
                        } else {
                            ListingState::Done
                        }
                    }
                    Err(ListingError::RateLimited(_cause)) => {
                        let delay = backoff.next_delay();
                        #[cfg(feature = "telemetry")]
                        warn!(offset, delay_ms = delay.as_millis() as u64, error = %_cause, "Rate limited, backing off");
                        ListingState::Backoff { offset, delay }
                    }
                    Err(ListingError::Fatal(error)) => return Err(error),
                },
                ListingState::Backoff { offset, delay } => {
                    self.cancellable(tokio::time::sleep(delay)).await?;
                    ListingState::Request { offset }
                }
                ListingState::Done => return Ok(items),
            }
        }
    }

    /// Fetches the page starting at `offset`.
    pub async fn fetch_page(&self, offset: u64) -> Result<ListingPage, ListingError> {
        let mut url = self.resources_url.clone();
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &self.page_limit.to_string());
        let page = self.get_json(url, "GET /discovery/resources").await?;
        Ok(page)
    }

    async fn get_json<R>(&self, url: Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.get(url);
        for (key, value) in self.headers.iter() {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = self
            .cancellable(req.send())
            .await?
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let status = http_response.status();
        let body = self
            .cancellable(http_response.bytes())
            .await?
            .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
        if status != StatusCode::OK {
            return Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body)
            .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
    }

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output, FacilitatorClientError> {
        match &self.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(FacilitatorClientError::Cancelled),
                output = future => Ok(output),
            },
            None => Ok(future.await),
        }
    }
}

/// Converts a string URL into a `FacilitatorClient`, parsing the URL and calling `try_new`.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize: strip trailing slashes and add a single trailing slash
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}
