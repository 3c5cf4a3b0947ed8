#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the sbc402 payment-gated HTTP engine.
//!
//! A server answers a request for a paid resource with `402 Payment Required`
//! and a list of acceptable offers. The client picks one, signs a payment
//! authorization and retries; the server has a facilitator verify and settle
//! the authorization before releasing the resource.
//!
//! This crate holds the chain-agnostic pieces shared by both sides. Chain
//! specific signing lives in `sbc402-evm` and `sbc402-svm`; the HTTP client
//! flow, the facilitator client and the server gate live in `sbc402-http`.
//!
//! # Modules
//!
//! - [`amount`] - Decimal-to-atomic unit conversion and atomic comparisons
//! - [`chain`] - CAIP-2 chain identifiers
//! - [`networks`] - Static registry of supported networks
//! - [`proto`] - Wire format types and base64 helpers
//! - [`retry`] - Bounded retry with exponential back-off
//! - [`selector`] - Choosing one offer from a challenge
//! - [`timestamp`] - Unix timestamps for authorization windows
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod chain;
pub mod networks;
pub mod proto;
pub mod retry;
pub mod selector;
pub mod timestamp;
