//! Error types for EVM payment building.

/// Failure reported by an [`EvmSigner`](crate::signer::EvmSigner).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The key holder declined to sign. Never triggers a fallback scheme.
    #[error("Signature request rejected: {0}")]
    Rejected(String),
    /// The signer cannot sign this kind of request right now.
    #[error("Signer unavailable: {0}")]
    Unavailable(String),
    /// Any other signing failure.
    #[error("Signing failed: {0}")]
    Other(String),
}

impl From<alloy_signer::Error> for SignerError {
    fn from(value: alloy_signer::Error) -> Self {
        Self::Other(value.to_string())
    }
}

/// Errors from building an EVM authorization.
#[derive(Debug, thiserror::Error)]
pub enum EvmError {
    /// A requirement field is not a valid EVM address.
    #[error("Invalid {field} address '{value}'")]
    InvalidAddress {
        /// Which field failed to parse.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// The required amount is not a decimal integer.
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
    /// The network is not in the EVM families.
    #[error("Network '{0}' is not an EVM network")]
    NotEvm(String),
    /// The JSON-RPC endpoint could not be reached.
    #[error("RPC transport error: {0}")]
    RpcTransport(#[from] reqwest::Error),
    /// The JSON-RPC endpoint returned an error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// A contract call result could not be decoded.
    #[error("Could not decode contract call result '{0}'")]
    Decode(String),
    /// The signer failed.
    #[error(transparent)]
    Signing(#[from] SignerError),
}

impl EvmError {
    /// Returns `true` if the key holder explicitly declined to sign.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Signing(SignerError::Rejected(_)))
    }
}
