//! Header names of the payment protocol.

/// Payment authorization sent by the client.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Base64 challenge sent alongside a `402` body.
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Base64 settlement confirmation attached to the released resource.
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Legacy alias of [`PAYMENT_SIGNATURE_HEADER`]. Clients send both with
/// identical values.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Legacy alias of [`PAYMENT_RESPONSE_HEADER`].
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Optional facilitator API key header, sent on `/verify` and `/settle`.
pub const API_KEY_HEADER: &str = "X-API-Key";
