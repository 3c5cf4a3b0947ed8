//! A reqwest client that pays for `402 Payment Required` resources.
//!
//! [`X402Client::send`] runs one request through the payment flow:
//!
//! 1. Send the request (retried on transport faults). Anything but a `402`
//!    is returned as-is.
//! 2. Read the offers from the base64 `PAYMENT-REQUIRED` header, or from the
//!    JSON body when the header is absent or unreadable.
//! 3. Keep the offers on registered networks this client has a signer for and
//!    pick one with [`select_requirement`].
//! 4. On EVM networks, check the payer's token balance unless disabled.
//! 5. Resolve the facilitator address (discovered, then the offer's hint,
//!    then the registry default) and sign an authorization.
//! 6. Resend the request with `PAYMENT-SIGNATURE` and `X-PAYMENT`.
//! 7. Report the outcome, taking the transaction id from `PAYMENT-RESPONSE`
//!    when the server sends one.
//!
//! Each step is a [`FlowState`] transition, logged under the `telemetry`
//! feature.

pub mod builder;
pub mod error;

use std::fmt;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, StatusCode};
use reqwest::{Client, Request, Response};
use sbc402::amount::parse_atomic;
use sbc402::networks::{self, NetworkConfig, NetworkOverrides, UnknownNetworkError};
use sbc402::proto::{PaymentRequirement, PaymentRequirementsResponse};
use sbc402::retry::{RetryOptions, with_retry};
use sbc402::selector::{SelectionPreferences, select_requirement};
use sbc402_evm::client::{DEFAULT_VALIDITY_SECS, parse_address};
use sbc402_evm::{EvmError, EvmSigner, RpcClient};
use sbc402_svm::SolanaSigner;
use serde::{Deserialize, Serialize};
use url::Url;

pub use builder::{PaymentContext, PayloadError, Signers, build_payment};
pub use error::X402Error;

use crate::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER};
use crate::facilitator::FacilitatorClient;
use crate::headers::{
    decode_payment_required, decode_payment_response, encode_payment_signature, payment_response,
};

/// Steps of the client payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing sent yet.
    Initial,
    /// A `402` challenge was parsed.
    RequirementsReceived,
    /// An offer was chosen.
    Selected,
    /// The payer can afford the offer (or the check was skipped).
    BalanceChecked,
    /// The authorization is signed.
    Signed,
    /// The paid request was answered.
    PaidRequestSent,
    /// The flow finished.
    Complete,
    /// The flow stopped with an error.
    Failed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::RequirementsReceived => "requirements_received",
            Self::Selected => "selected",
            Self::BalanceChecked => "balance_checked",
            Self::Signed => "signed",
            Self::PaidRequestSent => "paid_request_sent",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Client behaviour knobs.
///
/// Deserializable so applications can load it from their own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Network to pick when offered, by name or chain address.
    pub preferred_network: Option<String>,
    /// Largest price to pay, as a decimal USD string.
    pub max_usd: Option<String>,
    /// Skip the pre-payment `balanceOf` read.
    pub skip_balance_check: bool,
    /// Authorization lifetime in seconds.
    pub validity_secs: u64,
    /// JSON-RPC endpoint overriding the network default.
    pub rpc_url: Option<Url>,
    /// Facilitator base URL overriding the network default.
    pub facilitator_url: Option<Url>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            preferred_network: None,
            max_usd: None,
            skip_balance_check: false,
            validity_secs: DEFAULT_VALIDITY_SECS,
            rpc_url: None,
            facilitator_url: None,
            timeout_ms: 30_000,
        }
    }
}

impl ClientOptions {
    /// Offer selection preferences.
    #[must_use]
    pub fn preferences(&self) -> SelectionPreferences {
        SelectionPreferences {
            preferred_network: self.preferred_network.clone(),
            max_usd: self.max_usd.clone(),
        }
    }

    /// Endpoint overrides.
    #[must_use]
    pub fn overrides(&self) -> NetworkOverrides {
        NetworkOverrides {
            rpc_url: self.rpc_url.clone(),
            facilitator_url: self.facilitator_url.clone(),
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// What was paid for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Whether the paid request succeeded.
    pub success: bool,
    /// Settlement transaction, when the server confirmed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Network paid on.
    pub network: String,
    /// Amount paid, in atomic units.
    pub amount: String,
}

/// A response together with the payment made for it, if any.
#[derive(Debug)]
pub struct PaidResponse {
    /// The final response.
    pub response: Response,
    /// `None` when the resource did not ask for payment.
    pub payment: Option<PaymentResult>,
}

/// Builder for [`X402Client`].
#[derive(Debug, Default)]
pub struct X402ClientBuilder {
    http: Option<Client>,
    signers: Signers,
    facilitator: Option<FacilitatorClient>,
    options: ClientOptions,
    retry: RetryOptions,
}

impl X402ClientBuilder {
    /// Pays on EVM networks with `signer`.
    #[must_use]
    pub fn evm_signer(mut self, signer: impl EvmSigner + 'static) -> Self {
        self.signers.evm = Some(std::sync::Arc::new(signer));
        self
    }

    /// Pays on Solana networks with `signer`.
    #[must_use]
    pub fn solana_signer(mut self, signer: impl SolanaSigner + 'static) -> Self {
        self.signers.solana = Some(std::sync::Arc::new(signer));
        self
    }

    /// Replaces the client options.
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Reuses an existing reqwest client.
    #[must_use]
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Uses `facilitator` for signer discovery.
    #[must_use]
    pub fn facilitator(mut self, facilitator: FacilitatorClient) -> Self {
        self.facilitator = Some(facilitator);
        self
    }

    /// Sets the retry policy for the original and paid requests.
    #[must_use]
    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the client.
    ///
    /// A facilitator URL in the options overrides the facilitator's own.
    #[must_use]
    pub fn build(self) -> X402Client {
        let http = self.http.unwrap_or_default();
        let mut facilitator = self.facilitator.unwrap_or_else(|| {
            FacilitatorClient::new()
                .with_http_client(http.clone())
                .with_timeout(self.options.timeout())
        });
        if let Some(url) = &self.options.facilitator_url {
            facilitator = facilitator.with_base_url(url.clone());
        }
        X402Client {
            http,
            signers: self.signers,
            facilitator,
            options: self.options,
            retry: self.retry,
        }
    }
}

/// Sends requests and pays for the ones that answer `402`.
#[derive(Debug, Clone)]
pub struct X402Client {
    http: Client,
    signers: Signers,
    facilitator: FacilitatorClient,
    options: ClientOptions,
    retry: RetryOptions,
}

struct Flow<'a> {
    url: &'a str,
    state: FlowState,
}

impl Flow<'_> {
    fn advance(&mut self, next: FlowState) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(url = self.url, from = %self.state, to = %next, "payment flow transition");
        self.state = next;
    }
}

impl X402Client {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> X402ClientBuilder {
        X402ClientBuilder::default()
    }

    /// The client options.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends a `GET` to `url`, paying if asked to.
    ///
    /// # Errors
    ///
    /// See [`X402Client::send`].
    pub async fn get(&self, url: &str) -> Result<PaidResponse, X402Error> {
        let request = self.http.get(url).build().map_err(X402Error::Http)?;
        self.send(request).await
    }

    /// Sends `request`, paying for it if the server answers `402`.
    ///
    /// The request is sent at most twice per attempt budget (original and
    /// paid), so its body must be cloneable.
    ///
    /// # Errors
    ///
    /// Returns [`X402Error`] if the challenge is unusable, no offer is
    /// acceptable, the balance is short, signing fails, transport retries are
    /// exhausted, or the server rejects the payment.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "sbc402.client.send", skip_all, fields(url = %request.url()), err)
    )]
    pub async fn send(&self, request: Request) -> Result<PaidResponse, X402Error> {
        let url = request.url().to_string();
        let mut flow = Flow {
            url: &url,
            state: FlowState::Initial,
        };
        let result = self.run(&request, &mut flow).await;
        match &result {
            Ok(_) => flow.advance(FlowState::Complete),
            Err(_) => flow.advance(FlowState::Failed),
        }
        result
    }

    async fn run(&self, request: &Request, flow: &mut Flow<'_>) -> Result<PaidResponse, X402Error> {
        let url = flow.url;
        let response = self.execute(request, None, "x402.request").await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(PaidResponse {
                response,
                payment: None,
            });
        }

        let challenge = parse_challenge(url, response).await?;
        flow.advance(FlowState::RequirementsReceived);

        let payable: Vec<PaymentRequirement> = challenge
            .accepts
            .iter()
            .filter(|offer| {
                networks::lookup(&offer.network).is_some_and(|n| self.signers.supports(n.family))
            })
            .cloned()
            .collect();
        let selected = select_requirement(&payable, &self.options.preferences())
            .ok_or_else(|| X402Error::NoAcceptableOffer {
                offered: challenge.offered_networks(),
            })?;
        let network = networks::lookup(&selected.network)
            .ok_or_else(|| UnknownNetworkError::new(&selected.network))?;
        flow.advance(FlowState::Selected);

        self.check_balance(selected, network).await?;
        flow.advance(FlowState::BalanceChecked);

        let facilitator_address = self.facilitator_address(selected, network).await;
        let ctx = PaymentContext {
            requirement: selected,
            network,
            facilitator_address: &facilitator_address,
            validity_secs: self.options.validity_secs,
            rpc: self.rpc_client(network),
        };
        let payment = build_payment(&self.signers, &ctx).await?;
        flow.advance(FlowState::Signed);

        let header = HeaderValue::from_str(&encode_payment_signature(&payment)?)
            .map_err(|e| X402Error::Encoding(e.into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(PAYMENT_SIGNATURE_HEADER, header.clone());
        headers.insert(X_PAYMENT_HEADER, header);
        let paid = self.execute(request, Some(&headers), "x402.paid_request").await?;
        flow.advance(FlowState::PaidRequestSent);

        if paid.status() == StatusCode::PAYMENT_REQUIRED {
            return Err(X402Error::PaymentRequired {
                url: url.to_owned(),
                reason: rejection_reason(paid).await,
            });
        }

        let mut result = PaymentResult {
            success: paid.status().is_success(),
            tx_hash: None,
            network: selected.network.clone(),
            amount: selected.max_amount_required.clone(),
        };
        if let Some(confirmation) =
            payment_response(paid.headers()).and_then(|v| decode_payment_response(v).ok())
        {
            if let Some(tx) = confirmation.transaction_id() {
                result.tx_hash = Some(tx.to_owned());
            }
            if let Some(network) = confirmation.network {
                result.network = network;
            }
        }
        Ok(PaidResponse {
            response: paid,
            payment: Some(result),
        })
    }

    /// Sends a fresh clone of `template` with `extra` headers, retrying
    /// transport faults.
    async fn execute(
        &self,
        template: &Request,
        extra: Option<&HeaderMap>,
        label: &str,
    ) -> Result<Response, X402Error> {
        let timeout = self.options.timeout();
        with_retry(
            move || async move {
                let mut request = template.try_clone().ok_or(X402Error::RequestNotCloneable)?;
                if let Some(extra) = extra {
                    request.headers_mut().extend(extra.clone());
                }
                if request.timeout().is_none() {
                    *request.timeout_mut() = Some(timeout);
                }
                self.http
                    .execute(request)
                    .await
                    .map_err(|e| X402Error::from_transport(template.url().as_str(), e))
            },
            label,
            &self.retry,
        )
        .await
    }

    fn rpc_client(&self, network: &NetworkConfig) -> Option<RpcClient> {
        if !network.family.is_evm() {
            return None;
        }
        self.options
            .overrides()
            .rpc_url(network)
            .map(|url| RpcClient::with_http_client(self.http.clone(), url))
    }

    async fn check_balance(
        &self,
        requirement: &PaymentRequirement,
        network: &NetworkConfig,
    ) -> Result<(), X402Error> {
        if self.options.skip_balance_check {
            return Ok(());
        }
        let (Some(signer), Some(rpc)) = (&self.signers.evm, self.rpc_client(network)) else {
            return Ok(());
        };
        let token = parse_address("asset", &requirement.asset).map_err(X402Error::Rpc)?;
        let required = parse_atomic(&requirement.max_amount_required).map_err(|_| {
            X402Error::Rpc(EvmError::InvalidAmount(requirement.max_amount_required.clone()))
        })?;
        let available = rpc
            .balance_of(token, signer.address())
            .await
            .map_err(X402Error::Rpc)?;
        if available < required {
            return Err(X402Error::InsufficientBalance {
                network: network.name.to_owned(),
                required: required.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    async fn facilitator_address(
        &self,
        requirement: &PaymentRequirement,
        network: &NetworkConfig,
    ) -> String {
        match self.facilitator.discover_signer(&requirement.chain_address()).await {
            Some(address) => address,
            None => requirement
                .facilitator
                .clone()
                .unwrap_or_else(|| network.facilitator_address.to_owned()),
        }
    }
}

/// Reads the offers of a `402` response: the header when it decodes to a
/// non-empty offer list, the body otherwise.
async fn parse_challenge(
    url: &str,
    response: Response,
) -> Result<PaymentRequirementsResponse, X402Error> {
    let from_header = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| decode_payment_required(v).ok())
        .filter(|challenge| !challenge.accepts.is_empty());
    if let Some(challenge) = from_header {
        return Ok(challenge);
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| X402Error::from_transport(url, e))?;
    let challenge: PaymentRequirementsResponse =
        serde_json::from_slice(&body).map_err(|e| X402Error::Parse {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
    if challenge.accepts.is_empty() {
        return Err(X402Error::Parse {
            url: url.to_owned(),
            reason: "challenge lists no offers".to_owned(),
        });
    }
    Ok(challenge)
}

/// The server's reason for refusing a paid request, best effort.
async fn rejection_reason(response: Response) -> String {
    let from_header = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| decode_payment_required(v).ok())
        .and_then(|challenge| challenge.error);
    if let Some(reason) = from_header {
        return reason;
    }
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            ["details", "error"]
                .iter()
                .find_map(|key| body.get(*key).and_then(|v| v.as_str()).map(str::to_owned))
        })
        .unwrap_or_else(|| "payment was not accepted".to_owned())
}
