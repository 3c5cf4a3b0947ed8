//! HTTP client for a remote facilitator.
//!
//! [`FacilitatorClient`] talks to the facilitator's `/verify`, `/settle`,
//! `/supported` and `/health` endpoints.
//!
//! ## Base URL
//!
//! An explicit base URL set with [`FacilitatorClient::with_base_url`] wins;
//! otherwise each call uses the facilitator configured for the network of the
//! requirement it concerns. A `localhost` host is rewritten to `127.0.0.1`.
//!
//! ## Retries and timeouts
//!
//! `verify` and `settle` run through [`with_retry`] (three attempts by
//! default). Every request carries a timeout (30 seconds by default); a
//! timed-out request fails with [`FacilitatorClientError::Timeout`], which the
//! retry policy treats as `PaymentTimeout`.
//!
//! ## Signer discovery
//!
//! [`FacilitatorClient::discover_signer`] asks `/supported` which address the
//! facilitator signs with on a chain. The answer, including the absence of
//! one, is cached per base URL and chain address for the lifetime of the
//! client and never invalidated.

use std::borrow::Cow;
use std::fmt::Display;
use std::time::Duration;

use dashmap::DashMap;
use http::StatusCode;
use reqwest::Client;
use sbc402::networks::{self, UnknownNetworkError};
use sbc402::proto::{
    PaymentPayload, PaymentRequirement, SettleResult, SupportedResponse, VerifyResult,
    X402_VERSION,
};
use sbc402::retry::{RetryOptions, RetryableError, with_retry};
use serde::Serialize;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::constants::API_KEY_HEADER;

/// Environment variable holding an explicit facilitator base URL.
pub const FACILITATOR_URL_ENV: &str = "X402_FACILITATOR_URL";
/// Environment variable holding the facilitator API key.
pub const FACILITATOR_API_KEY_ENV: &str = "X402_FACILITATOR_API_KEY";
/// Environment variable holding the per-request timeout in milliseconds.
pub const FACILITATOR_TIMEOUT_ENV: &str = "X402_FACILITATOR_TIMEOUT_MS";

/// Errors from talking to a facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// A facilitator URL could not be built.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// What was being built.
        context: &'static str,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// No base URL override is set and the network is not registered.
    #[error(transparent)]
    UnknownNetwork(#[from] UnknownNetworkError),
    /// The request did not complete within the configured timeout.
    #[error("PaymentTimeout: {context} timed out after {timeout:?}")]
    Timeout {
        /// Which call timed out.
        context: &'static str,
        /// The configured timeout.
        timeout: Duration,
    },
    /// The request could not be sent.
    #[error("Transport error: {context}: {source}")]
    Http {
        /// Which call failed.
        context: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body was not the expected JSON.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Which call failed.
        context: &'static str,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator answered with a non-2xx status.
    #[error("Facilitator error: {context} returned {status}: {body}")]
    HttpStatus {
        /// Which call failed.
        context: &'static str,
        /// Response status.
        status: StatusCode,
        /// Response body, verbatim.
        body: String,
    },
    /// The response body could not be read.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Which call failed.
        context: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// An environment variable holds an unusable value.
    #[error("Invalid value '{value}' for {name}")]
    InvalidConfig {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

impl FacilitatorClientError {
    /// The HTTP status of a non-2xx facilitator answer.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl RetryableError for FacilitatorClientError {
    fn kind(&self) -> &str {
        match self {
            Self::UrlParse { .. } => "UrlParse",
            Self::UnknownNetwork(_) => "UnknownNetwork",
            Self::Timeout { .. } => "PaymentTimeout",
            Self::Http { source, .. } if source.is_connect() => "ECONNREFUSED",
            Self::Http { .. } => "Transport",
            Self::JsonDeserialization { .. } => "JsonDeserialization",
            Self::HttpStatus { .. } => "FacilitatorError",
            Self::ResponseBodyRead { .. } => "ResponseBodyRead",
            Self::InvalidConfig { .. } => "InvalidConfig",
        }
    }

    /// Only the status code of a non-2xx answer is classified, never its body.
    fn retry_message(&self) -> Cow<'_, str> {
        match self {
            Self::HttpStatus {
                context, status, ..
            } => Cow::Owned(format!("{context} returned {}", status.as_u16())),
            Self::Http { source, .. } => Cow::Owned(source.to_string()),
            _ => Cow::Borrowed(self.kind()),
        }
    }
}

/// Body of `POST /verify` and `POST /settle`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    x402_version: u8,
    payment_payload: &'a PaymentPayload,
    payment_requirements: serde_json::Value,
}

impl<'a> FacilitatorRequest<'a> {
    fn new(payload: &'a PaymentPayload, requirement: &PaymentRequirement) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirement.to_facilitator_json(),
        }
    }
}

/// A client for communicating with remote facilitators.
///
/// Clones get an independent copy of the signer cache.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Shared reqwest HTTP client
    client: Client,
    /// Explicit base URL, overriding the per-network facilitator
    base_url: Option<Url>,
    /// Value of the `X-API-Key` header on `/verify` and `/settle`
    api_key: Option<String>,
    /// Per-request timeout
    timeout: Duration,
    /// Retry policy for `/verify` and `/settle`
    retry: RetryOptions,
    /// Discovered signers keyed by (base URL, chain address)
    signers: DashMap<(String, String), Option<String>>,
}

impl Default for FacilitatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FacilitatorClient {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a client that uses each network's configured facilitator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
            api_key: None,
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryOptions::default(),
            signers: DashMap::new(),
        }
    }

    /// Creates a client configured from `X402_FACILITATOR_URL`,
    /// `X402_FACILITATOR_API_KEY` and `X402_FACILITATOR_TIMEOUT_MS`.
    ///
    /// Unset or empty variables keep the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the URL does not parse or the
    /// timeout is not a whole number of milliseconds.
    pub fn from_env() -> Result<Self, FacilitatorClientError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, FacilitatorClientError> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let mut client = Self::new();
        if let Some(url) = var(FACILITATOR_URL_ENV) {
            client = client.with_base_url(normalize_base_url(&url)?);
        }
        if let Some(key) = var(FACILITATOR_API_KEY_ENV) {
            client = client.with_api_key(key);
        }
        if let Some(ms) = var(FACILITATOR_TIMEOUT_ENV) {
            let millis = ms
                .trim()
                .parse::<u64>()
                .map_err(|_| FacilitatorClientError::InvalidConfig {
                    name: FACILITATOR_TIMEOUT_ENV,
                    value: ms.clone(),
                })?;
            client = client.with_timeout(Duration::from_millis(millis));
        }
        Ok(client)
    }

    /// Sends every call to `base_url` instead of the per-network facilitator.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Attaches `X-API-Key` to `/verify` and `/settle` requests.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy for `/verify` and `/settle`.
    #[must_use]
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Reuses an existing reqwest client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Explicit base URL, if one is set.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Effective base URL for `network` (a name or chain address).
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError::UnknownNetwork`] when no override is
    /// set and the network is not registered.
    pub fn base_url_for(&self, network: &str) -> Result<Url, FacilitatorClientError> {
        match &self.base_url {
            Some(url) => normalize_base_url(url.as_str()),
            None => {
                let config =
                    networks::lookup(network).ok_or_else(|| UnknownNetworkError::new(network))?;
                normalize_base_url(config.facilitator_url)
            }
        }
    }

    /// Sends `POST /verify` for `payload` against `requirement`.
    ///
    /// An `isValid: false` answer is a successful call; only transport
    /// faults and non-2xx statuses are errors.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] once retries are exhausted or on a
    /// non-retryable failure.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "sbc402.facilitator.verify",
            skip_all,
            fields(network = %requirement.network, otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
            err
        )
    )]
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> Result<VerifyResult, FacilitatorClientError> {
        let url = self.endpoint(&requirement.network, "./verify")?;
        let body = FacilitatorRequest::new(payload, requirement);
        with_retry(
            || self.post_json(&url, "POST /verify", &body),
            "facilitator.verify",
            &self.retry,
        )
        .await
    }

    /// Sends `POST /settle` for `payload` against `requirement`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] once retries are exhausted or on a
    /// non-retryable failure.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "sbc402.facilitator.settle",
            skip_all,
            fields(network = %requirement.network, otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
            err
        )
    )]
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirement: &PaymentRequirement,
    ) -> Result<SettleResult, FacilitatorClientError> {
        let url = self.endpoint(&requirement.network, "./settle")?;
        let body = FacilitatorRequest::new(payload, requirement);
        with_retry(
            || self.post_json(&url, "POST /settle", &body),
            "facilitator.settle",
            &self.retry,
        )
        .await
    }

    /// Looks up the address the facilitator signs with on `chain_address`.
    ///
    /// Tries the exact chain key, then `<namespace>:*`. Any failure yields
    /// `None`; callers fall back to a statically configured address.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "sbc402.facilitator.discover_signer",
            skip_all,
            fields(chain = chain_address, otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty)
        )
    )]
    pub async fn discover_signer(&self, chain_address: &str) -> Option<String> {
        let base = self.base_url_for(chain_address).ok()?;
        let key = (base.to_string(), chain_address.to_owned());
        if let Some(cached) = self.signers.get(&key).map(|entry| entry.value().clone()) {
            return cached;
        }

        let discovered = match base.join("./supported") {
            Ok(url) => self
                .get_json::<SupportedResponse>(&url, "GET /supported")
                .await
                .ok()
                .and_then(|supported| supported.signer_for(chain_address).map(str::to_owned)),
            Err(_) => None,
        };
        #[cfg(feature = "telemetry")]
        tracing::debug!(chain = chain_address, signer = ?discovered, "facilitator signer discovered");
        self.signers.insert(key, discovered.clone());
        discovered
    }

    /// Returns `true` if `GET /health` on the facilitator for `network`
    /// answers with a 2xx status.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "sbc402.facilitator.healthy", skip_all, fields(network))
    )]
    pub async fn healthy(&self, network: &str) -> bool {
        let Ok(url) = self.endpoint(network, "./health") else {
            return false;
        };
        self.client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    fn endpoint(&self, network: &str, path: &'static str) -> Result<Url, FacilitatorClientError> {
        self.base_url_for(network)?
            .join(path)
            .map_err(|e| FacilitatorClientError::UrlParse {
                context: "Failed to construct facilitator endpoint URL",
                source: e,
            })
    }

    fn map_send_error(&self, context: &'static str, source: reqwest::Error) -> FacilitatorClientError {
        if source.is_timeout() {
            self.timeout_error(context)
        } else {
            FacilitatorClientError::Http { context, source }
        }
    }

    /// POST helper that handles JSON serialization, error mapping, the API key
    /// and the timeout.
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self
            .client
            .post(url.clone())
            .json(payload)
            .timeout(self.timeout);
        if let Some(api_key) = &self.api_key {
            req = req.header(API_KEY_HEADER, api_key);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| self.map_send_error(context, e))?;
        let result = self.read_json(http_response, context).await;
        record_result_on_span(&result);
        result
    }

    /// GET helper with the same error mapping as [`Self::post_json`].
    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let http_response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(context, e))?;
        let result = self.read_json(http_response, context).await;
        record_result_on_span(&result);
        result
    }

    /// Reads a JSON answer, or the body of a non-2xx one. A body that stalls
    /// past the timeout is a [`FacilitatorClientError::Timeout`].
    async fn read_json<R>(
        &self,
        http_response: reqwest::Response,
        context: &'static str,
    ) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let status = http_response.status();
        if status.is_success() {
            return http_response.json::<R>().await.map_err(|e| {
                if e.is_timeout() {
                    self.timeout_error(context)
                } else {
                    FacilitatorClientError::JsonDeserialization { context, source: e }
                }
            });
        }
        let body = http_response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error(context)
            } else {
                FacilitatorClientError::ResponseBodyRead { context, source: e }
            }
        })?;
        Err(FacilitatorClientError::HttpStatus {
            context,
            status,
            body,
        })
    }

    const fn timeout_error(&self, context: &'static str) -> FacilitatorClientError {
        FacilitatorClientError::Timeout {
            context,
            timeout: self.timeout,
        }
    }
}

/// Parses a base URL, ensuring a single trailing slash so relative endpoint
/// joins keep any path prefix, and rewriting `localhost` to `127.0.0.1`.
fn normalize_base_url(value: &str) -> Result<Url, FacilitatorClientError> {
    let mut normalized = value.trim().trim_end_matches('/').to_owned();
    normalized.push('/');
    let mut url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
        context: "Failed to parse base url",
        source: e,
    })?;
    if url.host_str() == Some("localhost") {
        url.set_host(Some("127.0.0.1"))
            .map_err(|e| FacilitatorClientError::UrlParse {
                context: "Failed to rewrite localhost",
                source: e,
            })?;
    }
    Ok(url)
}

/// Converts a string URL into a `FacilitatorClient` with that base URL.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(Self::new().with_base_url(normalize_base_url(value)?))
    }
}

/// Converts a String URL into a `FacilitatorClient`.
impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
