#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM payment authorizations for sbc402.
//!
//! Networks in the permit family sign an ERC-2612 [`Permit`](types::Permit)
//! and fall back to a facilitator-domain [`Payment`](types::Payment); the
//! remaining EVM networks sign an ERC-3009
//! [`TransferWithAuthorization`](types::TransferWithAuthorization).
//!
//! # Modules
//!
//! - [`client`] - Authorization builders
//! - [`error`] - Error types
//! - [`rpc`] - `eth_call` reads for permit nonces and balances
//! - [`signer`] - The [`EvmSigner`](signer::EvmSigner) boundary
//! - [`types`] - Wire payloads and EIP-712 structs
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod client;
pub mod error;
pub mod rpc;
pub mod signer;
pub mod types;

pub use client::{
    EvmPaymentParams, build_direct_payment, build_permit, build_transfer_with_authorization,
};
pub use error::{EvmError, SignerError};
pub use rpc::RpcClient;
pub use signer::{EvmSigner, TypedDataRequest, TypedMessage};
