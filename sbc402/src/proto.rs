//! Wire format types.
//!
//! These are the JSON structures exchanged between the paying client, the
//! gated server and the facilitator. Field names are camelCase on the wire.
//!
//! - [`PaymentRequirement`] - one offer advertised in a challenge
//! - [`PaymentRequirementsResponse`] - the full `402` challenge body
//! - [`PaymentPayload`] - the signed authorization sent back by the client
//! - [`VerifyResult`] / [`SettleResult`] - facilitator verdicts
//! - [`SupportedResponse`] - facilitator signer discovery

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{VecSkipError, serde_as};

use crate::amount::{self, AmountError};
use crate::chain::ChainId;
use crate::networks::{self, UnknownNetworkError};

/// Protocol version written into every challenge and payload.
pub const X402_VERSION: u8 = 2;

const fn default_version() -> u8 {
    X402_VERSION
}

/// Payment scheme of an offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Pay exactly the advertised amount.
    #[default]
    Exact,
    /// Pay up to the advertised amount.
    Upto,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Upto => f.write_str("upto"),
        }
    }
}

/// Structured-signing domain hints attached to an offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementExtra {
    /// Token display name for the signing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token contract version for the signing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One acceptable way to pay for a resource.
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "base-sepolia",
///   "maxAmountRequired": "1000000",
///   "resource": "https://api.example.com/weather",
///   "payTo": "0x...",
///   "asset": "0xf9FB20B8E097904f0aB7d12e9DbeE88f2dcd0F16",
///   "maxTimeoutSeconds": 300
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// Payment scheme.
    #[serde(default)]
    pub scheme: Scheme,
    /// Network name (e.g., `"base"`) or canonical chain address.
    pub network: String,
    /// Amount in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// URL of the paid resource.
    pub resource: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Recipient address.
    pub pay_to: String,
    /// Token contract or mint.
    pub asset: String,
    /// Upper bound on the authorization lifetime.
    pub max_timeout_seconds: u64,
    /// Facilitator operating address hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilitator: Option<String>,
    /// Signing domain hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RequirementExtra>,
}

/// Errors from building an offer out of registry defaults.
#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    /// The network is not registered.
    #[error(transparent)]
    UnknownNetwork(#[from] UnknownNetworkError),
    /// The price could not be converted to atomic units.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl PaymentRequirement {
    /// Builds an `exact` offer on `network` using the registry's default asset,
    /// facilitator address and token name.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNetworkError`] if `network` is not registered.
    pub fn for_network(
        network: &str,
        pay_to: impl Into<String>,
        max_amount_required: impl Into<String>,
        resource: impl Into<String>,
    ) -> Result<Self, UnknownNetworkError> {
        let config = networks::resolve(network)?;
        Ok(Self {
            scheme: Scheme::Exact,
            network: config.name.to_owned(),
            max_amount_required: max_amount_required.into(),
            resource: resource.into(),
            description: None,
            mime_type: None,
            pay_to: pay_to.into(),
            asset: config.asset.to_owned(),
            max_timeout_seconds: 300,
            facilitator: Some(config.facilitator_address.to_owned()),
            extra: Some(RequirementExtra {
                name: Some(config.token_name.to_owned()),
                version: None,
            }),
        })
    }

    /// Like [`PaymentRequirement::for_network`], priced in USD and converted
    /// at the network's token precision.
    ///
    /// # Errors
    ///
    /// Returns [`RequirementError`] for an unknown network or a malformed price.
    pub fn with_price_usd(
        network: &str,
        pay_to: impl Into<String>,
        price_usd: &str,
        resource: impl Into<String>,
    ) -> Result<Self, RequirementError> {
        let config = networks::resolve(network)?;
        let atomic = amount::to_atomic_units(price_usd, config.decimals)?;
        Ok(Self::for_network(network, pay_to, atomic, resource)?)
    }

    /// Sets the resource description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the resource MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Sets the maximum authorization lifetime.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Sets the payment scheme.
    #[must_use]
    pub const fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Canonical chain address of this offer's network.
    ///
    /// Offers may name their network either way; an unknown name is returned
    /// unchanged.
    #[must_use]
    pub fn chain_address(&self) -> String {
        networks::lookup(&self.network)
            .map_or_else(|| self.network.clone(), |n| n.chain_address().to_string())
    }

    /// The shape facilitators expect: `network` rewritten to the chain
    /// address and `amount` mirroring `maxAmountRequired`.
    #[must_use]
    pub fn to_facilitator_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("network".into(), Value::String(self.chain_address()));
            map.insert(
                "amount".into(),
                Value::String(self.max_amount_required.clone()),
            );
        }
        value
    }
}

/// The body of a `402 Payment Required` challenge.
///
/// The version is written under both `protocolVersion` and `x402Version`;
/// either key is read, `protocolVersion` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ChallengeWire", into = "ChallengeWire")]
pub struct PaymentRequirementsResponse {
    /// Protocol version.
    pub x402_version: u8,
    /// Acceptable offers. Never empty on a valid challenge.
    pub accepts: Vec<PaymentRequirement>,
    /// Why the request was not authorized.
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protocol_version: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x402_version: Option<u8>,
    #[serde(default)]
    accepts: Vec<PaymentRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ChallengeWire> for PaymentRequirementsResponse {
    fn from(wire: ChallengeWire) -> Self {
        Self {
            x402_version: wire
                .protocol_version
                .or(wire.x402_version)
                .unwrap_or_else(default_version),
            accepts: wire.accepts,
            error: wire.error,
        }
    }
}

impl From<PaymentRequirementsResponse> for ChallengeWire {
    fn from(challenge: PaymentRequirementsResponse) -> Self {
        Self {
            protocol_version: Some(challenge.x402_version),
            x402_version: Some(challenge.x402_version),
            accepts: challenge.accepts,
            error: challenge.error,
        }
    }
}

impl PaymentRequirementsResponse {
    /// Creates a challenge listing `accepts`.
    #[must_use]
    pub const fn new(accepts: Vec<PaymentRequirement>, error: Option<String>) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts,
            error,
        }
    }

    /// Network names of every offer, for error messages.
    #[must_use]
    pub fn offered_networks(&self) -> Vec<String> {
        self.accepts.iter().map(|r| r.network.clone()).collect()
    }
}

/// Identifies which offer a payload answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRequirement {
    /// Canonical chain address.
    pub network: String,
    /// Payment scheme.
    pub scheme: Scheme,
}

/// A signed payment sent in the `PAYMENT-SIGNATURE` header.
///
/// The payload type is generic so the client can build it from a typed
/// authorization while the server and facilitator client carry it opaquely as
/// JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<P = Value> {
    /// Protocol version.
    #[serde(default = "default_version")]
    pub x402_version: u8,
    /// Which offer this pays for.
    pub accepted: AcceptedRequirement,
    /// Scheme-specific authorization.
    pub payload: P,
}

impl<P> PaymentPayload<P> {
    /// Wraps `payload` as an answer to `requirement`.
    pub fn new(requirement: &PaymentRequirement, payload: P) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepted: AcceptedRequirement {
                network: requirement.chain_address(),
                scheme: requirement.scheme,
            },
            payload,
        }
    }
}

/// Facilitator verdict on a payment's validity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    /// Whether the payment would settle.
    pub is_valid: bool,
    /// Reason when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Payer address recovered by the facilitator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Facilitator settlement outcome.
///
/// Facilitators name the transaction id either `transaction` or `txHash`;
/// both are accepted and [`SettleResult::transaction_id`] reads either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResult {
    /// Whether the transfer was executed.
    pub success: bool,
    /// Transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Transaction id under its alternate name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Network the transfer executed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Machine-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Free-form failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payer address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl SettleResult {
    /// The transaction id under whichever name the facilitator used.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction
            .as_deref()
            .or(self.tx_hash.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// The facilitator's stated failure reason, if any.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.error_reason.as_deref().or(self.error.as_deref())
    }
}

/// A payment kind a facilitator advertises.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    /// Protocol version.
    pub x402_version: u8,
    /// Scheme identifier.
    pub scheme: String,
    /// Chain address.
    pub network: String,
}

/// Response from a facilitator's `/supported` endpoint.
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// Supported payment kinds. Malformed entries are skipped.
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub kinds: Vec<SupportedPaymentKind>,
    /// Signer addresses keyed by chain address or `<namespace>:*` wildcard.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

impl SupportedResponse {
    /// First signer for `chain_address`, trying the exact key and then the
    /// namespace wildcard.
    #[must_use]
    pub fn signer_for(&self, chain_address: &str) -> Option<&str> {
        let first = |key: &str| {
            self.signers
                .get(key)
                .and_then(|v| v.first())
                .map(String::as_str)
        };
        first(chain_address).or_else(|| {
            let chain: ChainId = chain_address.parse().ok()?;
            first(&chain.wildcard())
        })
    }
}

/// Base64 text of encoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 text to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw bytes as base64 text.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl fmt::Display for Base64Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
