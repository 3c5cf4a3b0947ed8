//! The raw-message signing boundary for Solana.

use std::sync::Arc;

use async_trait::async_trait;
use solana_keypair::Keypair;
use solana_signature::Signature;
use solana_signer::Signer;

use crate::error::SolanaError;

/// Signs raw message bytes with an ed25519 key.
#[async_trait]
pub trait SolanaSigner: Send + Sync {
    /// Base-58 public key payments are drawn from.
    fn address(&self) -> String;

    /// Signs `message` as-is.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SolanaError>;
}

#[async_trait]
impl SolanaSigner for Keypair {
    fn address(&self) -> String {
        self.pubkey().to_string()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SolanaError> {
        self.try_sign_message(message)
            .map_err(|e| SolanaError::Signing(e.to_string()))
    }
}

#[async_trait]
impl<T: SolanaSigner + ?Sized> SolanaSigner for Arc<T> {
    fn address(&self) -> String {
        (**self).address()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SolanaError> {
        (**self).sign_message(message).await
    }
}
