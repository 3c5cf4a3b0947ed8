//! Server-side payment gate and its tower middleware.
//!
//! A [`Paygate`] holds the offers for one protected resource and a
//! [`FacilitatorClient`](crate::facilitator::FacilitatorClient). For each
//! request it walks the states of [`GateState`]:
//!
//! - no payment header, an undecodable one, or one naming a network that is
//!   not offered: `402` with the offers as a JSON body and a base64
//!   `PAYMENT-REQUIRED` header
//! - the facilitator judges the payment invalid: the same challenge, with
//!   the facilitator's reason as its `error`
//! - settlement fails, or the facilitator cannot be reached: `402` with a
//!   JSON error and no offers
//! - otherwise the wrapped service runs, and a base64 `PAYMENT-RESPONSE`
//!   header confirms the settlement transaction
//!
//! Settlement happens before the wrapped service runs, so a failed
//! settlement never releases the resource. [`Paygate::verify_only`] skips it.
//!
//! [`X402Layer`] adapts a gate to axum or any tower stack.

pub mod error;
pub mod layer;
pub mod paygate;

pub use error::{GateState, PaygateError, PaygateSetupError, VerificationError};
pub use layer::{X402Layer, X402Service};
pub use paygate::{Authorization, Paygate};
