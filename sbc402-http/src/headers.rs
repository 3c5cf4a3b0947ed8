//! Base64 JSON codecs for the payment headers.
//!
//! Every payment header carries standard-alphabet base64 of a JSON document:
//! the payment payload in `PAYMENT-SIGNATURE` (and its legacy alias
//! `X-PAYMENT`), the challenge in `PAYMENT-REQUIRED`, and the settlement
//! confirmation in `PAYMENT-RESPONSE` (and `X-PAYMENT-RESPONSE`).

use base64::prelude::*;
use http::HeaderMap;
use sbc402::proto::{PaymentPayload, PaymentRequirementsResponse, SettleResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::constants::{
    PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
};
use crate::error::HttpError;

/// Serializes `value` to JSON and base64-encodes it.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_header<T: Serialize + ?Sized>(value: &T) -> Result<String, HttpError> {
    let json = serde_json::to_vec(value)?;
    Ok(BASE64_STANDARD.encode(&json))
}

/// Base64-decodes `header_value` and parses the JSON inside.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON decode failure.
pub fn decode_header<T: DeserializeOwned>(header_value: &str) -> Result<T, HttpError> {
    let bytes = BASE64_STANDARD.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encodes a payment for the `PAYMENT-SIGNATURE` and `X-PAYMENT` headers.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_signature<P: Serialize>(
    payload: &PaymentPayload<P>,
) -> Result<String, HttpError> {
    encode_header(payload)
}

/// Decodes a `PAYMENT-SIGNATURE` (or `X-PAYMENT`) header value, keeping the
/// scheme payload as opaque JSON.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON decode failure.
pub fn decode_payment_payload(header_value: &str) -> Result<PaymentPayload, HttpError> {
    decode_header(header_value)
}

/// Encodes a challenge for the `PAYMENT-REQUIRED` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_required(
    required: &PaymentRequirementsResponse,
) -> Result<String, HttpError> {
    encode_header(required)
}

/// Decodes a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON decode failure.
pub fn decode_payment_required(
    header_value: &str,
) -> Result<PaymentRequirementsResponse, HttpError> {
    decode_header(header_value)
}

/// Encodes a settlement confirmation for the `PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_response(response: &SettleResult) -> Result<String, HttpError> {
    encode_header(response)
}

/// Decodes a `PAYMENT-RESPONSE` (or `X-PAYMENT-RESPONSE`) header value.
///
/// Either transaction field name is accepted.
///
/// # Errors
///
/// Returns [`HttpError`] on base64 or JSON decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResult, HttpError> {
    decode_header(header_value)
}

/// The payment header of a request, preferring `PAYMENT-SIGNATURE` over the
/// legacy `X-PAYMENT`.
#[must_use]
pub fn payment_signature(headers: &HeaderMap) -> Option<&str> {
    first_header(headers, &[PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER])
}

/// The confirmation header of a response, preferring `PAYMENT-RESPONSE` over
/// the legacy `X-PAYMENT-RESPONSE`.
#[must_use]
pub fn payment_response(headers: &HeaderMap) -> Option<&str> {
    first_header(headers, &[PAYMENT_RESPONSE_HEADER, X_PAYMENT_RESPONSE_HEADER])
}

fn first_header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use sbc402::proto::PaymentRequirement;
    use serde_json::json;

    #[test]
    fn challenge_header_matches_body_json() {
        let offer = PaymentRequirement::for_network(
            "base-sepolia",
            "0x3333333333333333333333333333333333333333",
            "1000000",
            "https://api.example.com/data",
        )
        .unwrap();
        let challenge = PaymentRequirementsResponse::new(vec![offer], Some("payment required".into()));
        let header = encode_payment_required(&challenge).unwrap();

        let raw = BASE64_STANDARD.decode(&header).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(body, serde_json::to_value(&challenge).unwrap());
        assert_eq!(decode_payment_required(&header).unwrap(), challenge);
    }

    #[test]
    fn confirmation_accepts_tx_hash_alias() {
        let header = BASE64_STANDARD.encode(
            json!({"success": true, "txHash": "0xabc", "network": "base"}).to_string(),
        );
        let decoded = decode_payment_response(&format!(" {header} ")).unwrap();
        assert_eq!(decoded.transaction_id(), Some("0xabc"));
        assert_eq!(decoded.network.as_deref(), Some("base"));
    }

    #[test]
    fn malformed_headers_are_errors() {
        assert!(matches!(
            decode_payment_payload("not base64!"),
            Err(HttpError::Base64(_))
        ));
        let not_json = BASE64_STANDARD.encode("hello");
        assert!(matches!(
            decode_payment_payload(&not_json),
            Err(HttpError::Serialize(_))
        ));
    }

    #[test]
    fn primary_header_wins_over_legacy() {
        let mut headers = HeaderMap::new();
        headers.insert(X_PAYMENT_HEADER, HeaderValue::from_static("legacy"));
        assert_eq!(payment_signature(&headers), Some("legacy"));
        headers.insert(PAYMENT_SIGNATURE_HEADER, HeaderValue::from_static("primary"));
        assert_eq!(payment_signature(&headers), Some("primary"));

        headers.insert(X_PAYMENT_RESPONSE_HEADER, HeaderValue::from_static("r"));
        assert_eq!(payment_response(&headers), Some("r"));
    }
}
