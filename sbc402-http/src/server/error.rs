//! Error and state types for the payment gate.

use std::fmt;

use sbc402::networks::UnknownNetworkError;

/// States of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The request carries no payment header.
    NoHeader,
    /// The payment header does not decode.
    InvalidHeader,
    /// The payment names a network (or scheme) the gate does not offer.
    NetworkUnmatched,
    /// Waiting on the facilitator's verdict.
    Verifying,
    /// The facilitator judged the payment invalid, or could not be reached.
    VerifyFailed,
    /// Waiting on settlement.
    Settling,
    /// Settlement failed.
    SettleFailed,
    /// The request may proceed.
    Authorized,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoHeader => "no_header",
            Self::InvalidHeader => "invalid_header",
            Self::NetworkUnmatched => "network_unmatched",
            Self::Verifying => "verifying",
            Self::VerifyFailed => "verify_failed",
            Self::Settling => "settling",
            Self::SettleFailed => "settle_failed",
            Self::Authorized => "authorized",
        };
        f.write_str(s)
    }
}

/// Payment rejections that invite the client to pay again.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Required payment header is missing.
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    /// Payment header is present but malformed.
    #[error("Invalid or malformed payment header: {0}")]
    InvalidPaymentHeader(String),
    /// No offer matches the payment's network and scheme.
    #[error("No offer matches network '{0}'")]
    NetworkUnmatched(String),
    /// The payment was judged invalid.
    #[error("{0}")]
    VerificationFailed(String),
}

/// Why the gate refused a request.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// The payment is missing or invalid; answered with the offers.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The facilitator could not verify the payment.
    #[error("Verification failed: {0}")]
    Facilitator(String),
    /// On-chain settlement failed.
    #[error("Settlement failed: {0}")]
    Settlement(String),
}

impl PaygateError {
    /// The state the gate stopped in.
    #[must_use]
    pub const fn state(&self) -> GateState {
        match self {
            Self::Verification(VerificationError::PaymentHeaderRequired(_)) => GateState::NoHeader,
            Self::Verification(VerificationError::InvalidPaymentHeader(_)) => {
                GateState::InvalidHeader
            }
            Self::Verification(VerificationError::NetworkUnmatched(_)) => {
                GateState::NetworkUnmatched
            }
            Self::Verification(VerificationError::VerificationFailed(_)) | Self::Facilitator(_) => {
                GateState::VerifyFailed
            }
            Self::Settlement(_) => GateState::SettleFailed,
        }
    }
}

/// Errors from configuring a gate.
#[derive(Debug, thiserror::Error)]
pub enum PaygateSetupError {
    /// An offer names an unregistered network.
    #[error(transparent)]
    UnknownNetwork(#[from] UnknownNetworkError),
    /// The gate has nothing to offer.
    #[error("A payment gate needs at least one offer")]
    NoOffers,
}
