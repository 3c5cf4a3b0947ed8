//! Client-side construction of Solana signed-message authorizations.

use std::str::FromStr;

use sbc402::amount::parse_atomic;
use sbc402::networks::{NetworkConfig, NetworkFamily};
use sbc402::proto::PaymentRequirement;
use sbc402::timestamp::UnixTimestamp;
use solana_pubkey::Pubkey;

use crate::error::SolanaError;
use crate::signer::SolanaSigner;
use crate::types::{SolanaPayload, canonical_message};

/// Signs a payment for `requirement` on a Solana `network`.
///
/// The nonce is the current Unix timestamp; the deadline is `validity_secs`
/// later. The signer receives the UTF-8 bytes of the canonical message.
///
/// # Errors
///
/// Returns [`SolanaError`] for a non-Solana network, a malformed payee or
/// amount, or a signer failure.
#[cfg_attr(feature = "telemetry", tracing::instrument(name = "sbc402.svm.build_payment", skip_all, err))]
pub async fn build_solana_payment<S: SolanaSigner + ?Sized>(
    signer: &S,
    requirement: &PaymentRequirement,
    network: &NetworkConfig,
    validity_secs: u64,
) -> Result<SolanaPayload, SolanaError> {
    if network.family != NetworkFamily::Solana {
        return Err(SolanaError::NotSolana(network.name.to_owned()));
    }
    Pubkey::from_str(&requirement.pay_to).map_err(|_| SolanaError::InvalidAddress {
        field: "payTo",
        value: requirement.pay_to.clone(),
    })?;
    let amount = parse_atomic(&requirement.max_amount_required)
        .map_err(|_| SolanaError::InvalidAmount(requirement.max_amount_required.clone()))?
        .to_string();

    let from = signer.address();
    let now = UnixTimestamp::now();
    let nonce = now.to_string();
    let deadline = now + validity_secs;
    let message = canonical_message(&from, &requirement.pay_to, &amount, &nonce, deadline);
    let signature = signer.sign_message(message.as_bytes()).await?;

    Ok(SolanaPayload {
        from,
        to: requirement.pay_to.clone(),
        amount,
        nonce,
        deadline,
        signature: signature.to_string(),
    })
}
