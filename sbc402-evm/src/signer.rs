//! The EIP-712 signing boundary.
//!
//! The engine never touches key material. It hands a [`TypedDataRequest`]
//! to an [`EvmSigner`] and gets back a signature. Wallet backends implement
//! the trait; [`PrivateKeySigner`] is supported out of the box.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolStruct};
use async_trait::async_trait;

use crate::error::SignerError;
use crate::types::{Payment, Permit, TransferWithAuthorization};

/// The struct being signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedMessage {
    /// ERC-2612 permit.
    Permit(Permit),
    /// Facilitator-domain direct payment.
    Payment(Payment),
    /// ERC-3009 transfer authorization.
    TransferWithAuthorization(TransferWithAuthorization),
}

impl TypedMessage {
    /// EIP-712 primary type name.
    #[must_use]
    pub const fn primary_type(&self) -> &'static str {
        match self {
            Self::Permit(_) => "Permit",
            Self::Payment(_) => "Payment",
            Self::TransferWithAuthorization(_) => "TransferWithAuthorization",
        }
    }
}

/// A domain/type/message triple to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedDataRequest {
    /// Signing domain.
    pub domain: Eip712Domain,
    /// Message.
    pub message: TypedMessage,
}

impl TypedDataRequest {
    /// The EIP-712 digest a signer must sign.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        match &self.message {
            TypedMessage::Permit(m) => m.eip712_signing_hash(&self.domain),
            TypedMessage::Payment(m) => m.eip712_signing_hash(&self.domain),
            TypedMessage::TransferWithAuthorization(m) => m.eip712_signing_hash(&self.domain),
        }
    }

    /// Recovers the address that produced `signature` over this request.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Other`] if the signature is malformed.
    pub fn recover_signer(&self, signature: &[u8]) -> Result<Address, SignerError> {
        let signature =
            Signature::try_from(signature).map_err(|e| SignerError::Other(e.to_string()))?;
        signature
            .recover_address_from_prehash(&self.signing_hash())
            .map_err(|e| SignerError::Other(e.to_string()))
    }
}

/// Produces EIP-712 signatures for the engine.
#[async_trait]
pub trait EvmSigner: Send + Sync {
    /// The address payments are drawn from.
    fn address(&self) -> Address;

    /// Signs a typed-data request.
    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError>;
}

#[async_trait]
impl EvmSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError> {
        let hash = request.signing_hash();
        Ok(alloy_signer::Signer::sign_hash(self, &hash).await?)
    }
}

#[async_trait]
impl<T: EvmSigner + ?Sized> EvmSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError> {
        (**self).sign_typed_data(request).await
    }
}
