//! The closed set of scheme authorizations carried in a payment payload.

use sbc402::networks::NetworkFamily;
use sbc402_evm::types::{DirectPaymentPayload, Eip3009Payload, PermitPayload};
use sbc402_svm::SolanaPayload;
use serde::Serialize;
use serde_json::Value;

/// A signed authorization, one variant per signing scheme.
///
/// Serializes as the bare inner payload. The variants share field names
/// (a direct payment and a Solana message both have `from`, `to`, `amount`),
/// so decoding needs the network family; see [`SchemePayload::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SchemePayload {
    /// ERC-2612 permit for the facilitator.
    Permit(PermitPayload),
    /// Payment signed against the facilitator contract's domain.
    DirectPayment(DirectPaymentPayload),
    /// ERC-3009 transfer authorization.
    TransferWithAuthorization(Eip3009Payload),
    /// Signed canonical text message.
    Solana(SolanaPayload),
}

impl SchemePayload {
    /// Decodes a payload received on a network of `family`.
    ///
    /// The permit family accepts either a permit or a direct payment.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `value` does not match the family's shape.
    pub fn decode(family: NetworkFamily, value: Value) -> Result<Self, serde_json::Error> {
        match family {
            // Both permit-family schemes share one family. Their required
            // fields are disjoint (`owner`/`spender`/`value` against
            // `from`/`to`/`amount`), so at most one of them decodes.
            NetworkFamily::Permit => match serde_json::from_value(value.clone()) {
                Ok(permit) => Ok(Self::Permit(permit)),
                Err(_) => serde_json::from_value(value).map(Self::DirectPayment),
            },
            NetworkFamily::TransferWithAuthorization => {
                serde_json::from_value(value).map(Self::TransferWithAuthorization)
            }
            NetworkFamily::Solana => serde_json::from_value(value).map(Self::Solana),
        }
    }

    /// Short scheme name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Permit(_) => "permit",
            Self::DirectPayment(_) => "direct-payment",
            Self::TransferWithAuthorization(_) => "transfer-with-authorization",
            Self::Solana(_) => "solana-message",
        }
    }
}
