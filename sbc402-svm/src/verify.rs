//! Local verification of Solana signed-message authorizations.

use solana_signature::Signature;

use crate::types::SolanaPayload;

/// Checks that `payload.signature` is `payload.from`'s signature over the
/// canonical message rebuilt from the payload fields.
///
/// Returns `false`, never an error, for malformed base-58, a wrong-length key
/// or signature, tampered fields or a signature by another key. Expiry is
/// not checked here.
#[must_use]
pub fn verify_solana_payload(payload: &SolanaPayload) -> bool {
    let Ok(public_key) = bs58::decode(&payload.from).into_vec() else {
        return false;
    };
    if public_key.len() != 32 {
        return false;
    }
    let Ok(signature_bytes) = bs58::decode(&payload.signature).into_vec() else {
        return false;
    };
    let Ok(signature) = Signature::try_from(signature_bytes.as_slice()) else {
        return false;
    };
    signature.verify(&public_key, payload.canonical_message().as_bytes())
}

/// [`verify_solana_payload`] plus a check that the deadline has not passed.
#[must_use]
pub fn verify_unexpired_solana_payload(payload: &SolanaPayload) -> bool {
    !payload.deadline.has_passed() && verify_solana_payload(payload)
}
