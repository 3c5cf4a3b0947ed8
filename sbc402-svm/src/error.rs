//! Error types for Solana payment building.

/// Errors from building a Solana signed-message authorization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolanaError {
    /// A requirement field is not a base-58 public key.
    #[error("Invalid {field} public key '{value}'")]
    InvalidAddress {
        /// Which field failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// The required amount is not a decimal integer.
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
    /// The network is not a Solana cluster.
    #[error("Network '{0}' is not a Solana network")]
    NotSolana(String),
    /// The key holder declined to sign.
    #[error("Signature request rejected: {0}")]
    Rejected(String),
    /// Any other signing failure.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl SolanaError {
    /// Returns `true` if the key holder explicitly declined to sign.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
