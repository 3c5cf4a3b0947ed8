#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana payment authorizations for sbc402.
//!
//! Solana clusters do not use a structured-signing standard. The payer signs
//! a canonical pipe-delimited text message instead:
//!
//! ```text
//! from:{from}|to:{to}|amount:{amount}|nonce:{nonce}|deadline:{deadline}
//! ```
//!
//! and the facilitator (or [`verify_solana_payload`], locally) rebuilds the
//! message from the payload fields to check the detached ed25519 signature.
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod client;
pub mod error;
pub mod signer;
pub mod types;
pub mod verify;

pub use client::build_solana_payment;
pub use error::SolanaError;
pub use signer::SolanaSigner;
pub use types::SolanaPayload;
pub use verify::{verify_solana_payload, verify_unexpired_solana_payload};
