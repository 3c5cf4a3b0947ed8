//! Wire payload for Solana signed-message authorizations.

use sbc402::timestamp::UnixTimestamp;
use serde::{Deserialize, Serialize};

/// A payment authorization signed as a canonical text message.
///
/// The verifying party rebuilds the message from these fields with
/// [`SolanaPayload::canonical_message`] and checks `signature` against `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaPayload {
    /// Payer public key, base-58.
    pub from: String,
    /// Payee public key, base-58.
    pub to: String,
    /// Amount in atomic units, as a decimal string.
    pub amount: String,
    /// Unix timestamp at signing, as a decimal string.
    pub nonce: String,
    /// Expiry.
    pub deadline: UnixTimestamp,
    /// Detached ed25519 signature, base-58.
    pub signature: String,
}

impl SolanaPayload {
    /// The exact text that was signed.
    ///
    /// Field order and the `|` delimiter are shared with the facilitator and
    /// must not change.
    #[must_use]
    pub fn canonical_message(&self) -> String {
        canonical_message(&self.from, &self.to, &self.amount, &self.nonce, self.deadline)
    }
}

/// Formats `from:{from}|to:{to}|amount:{amount}|nonce:{nonce}|deadline:{deadline}`.
#[must_use]
pub fn canonical_message(
    from: &str,
    to: &str,
    amount: &str,
    nonce: &str,
    deadline: UnixTimestamp,
) -> String {
    format!("from:{from}|to:{to}|amount:{amount}|nonce:{nonce}|deadline:{deadline}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_message_layout() {
        let message = canonical_message("A", "B", "1000", "1700000000", UnixTimestamp::from_secs(1_700_000_300));
        assert_eq!(
            message,
            "from:A|to:B|amount:1000|nonce:1700000000|deadline:1700000300"
        );
    }

    #[test]
    fn deadline_travels_as_string() {
        let payload = SolanaPayload {
            from: "A".into(),
            to: "B".into(),
            amount: "5".into(),
            nonce: "1".into(),
            deadline: UnixTimestamp::from_secs(2),
            signature: "sig".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["deadline"], "2");
        assert_eq!(json["nonce"], "1");
    }
}
