//! Errors surfaced by the paying client.

use std::borrow::Cow;

use sbc402::networks::UnknownNetworkError;
use sbc402::retry::RetryableError;
use sbc402_evm::EvmError;

use super::builder::PayloadError;
use crate::error::HttpError;
use crate::facilitator::FacilitatorClientError;

/// Everything that can stop a paid request.
///
/// Transport faults are retried by the client before they surface here; the
/// remaining variants are terminal.
#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    /// A network name is not in the registry.
    #[error(transparent)]
    UnknownNetwork(#[from] UnknownNetworkError),
    /// The payer holds less than the selected offer requires.
    #[error("Insufficient balance on {network}: required {required}, available {available}")]
    InsufficientBalance {
        /// Network checked.
        network: String,
        /// Required amount in atomic units.
        required: String,
        /// Balance in atomic units.
        available: String,
    },
    /// A facilitator call failed.
    #[error(transparent)]
    Facilitator(#[from] FacilitatorClientError),
    /// The resource server did not answer within the client timeout.
    #[error("PaymentTimeout: {url} did not answer in time")]
    PaymentTimeout {
        /// Requested URL.
        url: String,
    },
    /// The authorization could not be built or signed.
    #[error("Signing failed: {0}")]
    Signing(#[from] PayloadError),
    /// The server answered the paid request with another `402`.
    #[error("Payment required: {url} rejected the payment: {reason}")]
    PaymentRequired {
        /// Requested URL.
        url: String,
        /// The server's stated reason.
        reason: String,
    },
    /// The `402` challenge could not be understood.
    #[error("Could not parse payment requirements from {url}: {reason}")]
    Parse {
        /// Requested URL.
        url: String,
        /// What was wrong.
        reason: String,
    },
    /// No offer survived network, signer and budget filtering.
    #[error("No acceptable payment offer; offered networks: {}", .offered.join(", "))]
    NoAcceptableOffer {
        /// Networks the server offered.
        offered: Vec<String>,
    },
    /// The balance check could not read the chain.
    #[error("Balance check failed: {0}")]
    Rpc(#[source] EvmError),
    /// The payment header could not be encoded.
    #[error("Could not encode payment header: {0}")]
    Encoding(#[from] HttpError),
    /// The request body is a stream and cannot be sent twice.
    #[error("Request body cannot be cloned for a retry")]
    RequestNotCloneable,
    /// A transport error from the resource server.
    #[error(transparent)]
    Http(reqwest::Error),
}

impl X402Error {
    /// Maps a transport error for `url`, turning timeouts into
    /// [`X402Error::PaymentTimeout`].
    #[must_use]
    pub fn from_transport(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::PaymentTimeout {
                url: url.to_owned(),
            }
        } else {
            Self::Http(error)
        }
    }
}

impl RetryableError for X402Error {
    fn kind(&self) -> &str {
        match self {
            Self::UnknownNetwork(_) => "UnknownNetwork",
            Self::InsufficientBalance { .. } => "InsufficientBalance",
            Self::Facilitator(e) => e.kind(),
            Self::PaymentTimeout { .. } => "PaymentTimeout",
            Self::Signing(_) => "SigningError",
            Self::PaymentRequired { .. } => "PaymentRequiredError",
            Self::Parse { .. } => "ParseError",
            Self::NoAcceptableOffer { .. } => "NoAcceptableOffer",
            Self::Rpc(_) => "RpcError",
            Self::Encoding(_) => "EncodingError",
            Self::RequestNotCloneable => "RequestNotCloneable",
            Self::Http(e) if e.is_connect() => "ECONNREFUSED",
            Self::Http(e) if e.is_request() => "Transport",
            Self::Http(_) => "Http",
        }
    }

    /// URLs and server-stated reasons stay out of classification.
    fn retry_message(&self) -> Cow<'_, str> {
        match self {
            Self::Facilitator(e) => e.retry_message(),
            Self::Http(e) => Cow::Owned(e.to_string()),
            _ => Cow::Borrowed(self.kind()),
        }
    }
}
