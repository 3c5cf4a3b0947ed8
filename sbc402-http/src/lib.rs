#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP side of the sbc402 payment engine.
//!
//! Both ends of a payment-gated request live here: the paying client that
//! answers `402 Payment Required` challenges, and the server gate that
//! verifies and settles payments before releasing a resource. Both talk to a
//! facilitator through [`FacilitatorClient`].
//!
//! # Modules
//!
//! - [`constants`] - HTTP header names
//! - [`headers`] - Base64 encoding/decoding for x402 HTTP headers
//! - [`error`] - Header codec errors
//! - [`facilitator`] - HTTP facilitator client with retry and signer discovery
//! - [`scheme`] - The closed set of signed authorizations
//! - [`client`] - Paying client flow (feature: `client`)
//! - [`server`] - Payment gate and tower layer (feature: `server`)
//!
//! # Feature Flags
//!
//! - `client` - Paying client (default)
//! - `server` - Payment gate and tower layer (default)
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod constants;
pub mod error;
pub mod facilitator;
pub mod headers;
pub mod scheme;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub use client::{ClientOptions, PaidResponse, PaymentResult, X402Client, X402Error};
pub use facilitator::{FacilitatorClient, FacilitatorClientError};
pub use scheme::SchemePayload;
#[cfg(feature = "server")]
pub use server::{GateState, Paygate, PaygateError, X402Layer};
