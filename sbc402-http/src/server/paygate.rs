//! Core payment gate logic.
//!
//! The [`Paygate`] struct runs one request through the gate: it extracts the
//! payment header, matches it to an offer, has the facilitator verify and
//! settle it, and answers `402 Payment Required` when the request may not
//! proceed.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::sync::Arc;

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use sbc402::amount::compare_atomic;
use sbc402::networks::{self, NetworkFamily, UnknownNetworkError};
use sbc402::proto::{PaymentPayload, PaymentRequirement, PaymentRequirementsResponse, SettleResult};
use sbc402_svm::{SolanaPayload, verify_unexpired_solana_payload};
use serde_json::json;
use tower::{Service, ServiceExt};

#[cfg(feature = "telemetry")]
use tracing::Instrument;

use super::error::{GateState, PaygateError, PaygateSetupError, VerificationError};
use crate::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER};
use crate::facilitator::FacilitatorClient;
use crate::headers::{decode_payment_payload, encode_payment_required, encode_payment_response, payment_signature};
use crate::scheme::SchemePayload;

/// Payment gate for one protected resource.
///
/// Cheap to clone; the offers and the facilitator client are shared.
#[derive(Debug, Clone)]
pub struct Paygate {
    facilitator: Arc<FacilitatorClient>,
    accepts: Arc<Vec<PaymentRequirement>>,
    settle: bool,
    verify_solana_locally: bool,
}

/// A payment the gate accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// The offer the payment answered.
    pub requirement: PaymentRequirement,
    /// Settlement outcome; `None` in verify-only mode.
    pub settlement: Option<SettleResult>,
}

impl Authorization {
    /// The confirmation to attach to the downstream response, if a
    /// transaction id was obtained.
    #[must_use]
    pub fn confirmation(&self) -> Option<SettleResult> {
        let settlement = self.settlement.as_ref()?;
        let transaction = settlement.transaction_id()?;
        Some(SettleResult {
            success: true,
            transaction: Some(transaction.to_owned()),
            network: Some(
                settlement
                    .network
                    .clone()
                    .unwrap_or_else(|| self.requirement.network.clone()),
            ),
            ..SettleResult::default()
        })
    }
}

impl Paygate {
    /// Creates a gate offering `accepts`, verified and settled through
    /// `facilitator`.
    ///
    /// # Errors
    ///
    /// Returns [`PaygateSetupError`] if `accepts` is empty or names a network
    /// outside the registry.
    pub fn try_new(
        accepts: Vec<PaymentRequirement>,
        facilitator: FacilitatorClient,
    ) -> Result<Self, PaygateSetupError> {
        if accepts.is_empty() {
            return Err(PaygateSetupError::NoOffers);
        }
        for offer in &accepts {
            networks::lookup(&offer.network).ok_or_else(|| UnknownNetworkError::new(&offer.network))?;
        }
        Ok(Self {
            facilitator: Arc::new(facilitator),
            accepts: Arc::new(accepts),
            settle: true,
            verify_solana_locally: false,
        })
    }

    /// Skips settlement: a verified payment is enough to proceed.
    #[must_use]
    pub const fn verify_only(mut self) -> Self {
        self.settle = false;
        self
    }

    /// Checks Solana signatures, recipient, amount and deadline before asking
    /// the facilitator.
    #[must_use]
    pub const fn with_local_solana_verification(mut self) -> Self {
        self.verify_solana_locally = true;
        self
    }

    /// The offers this gate advertises.
    #[must_use]
    pub fn accepts(&self) -> &[PaymentRequirement] {
        &self.accepts
    }

    /// The facilitator client in use.
    #[must_use]
    pub fn facilitator(&self) -> &FacilitatorClient {
        &self.facilitator
    }

    /// Handles an incoming request, calling `inner` only once the payment is
    /// authorized.
    ///
    /// Every refusal becomes a `402` response; nothing here panics or
    /// answers `500`.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(name = "sbc402.paygate.handle_request", skip_all)
    )]
    pub async fn handle_request<S>(&self, inner: S, req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        match self.authorize(req.headers()).await {
            Ok(authorization) => {
                let mut response = Self::call_inner(inner, req).await;
                if let Some(confirmation) = authorization.confirmation() {
                    attach_confirmation(&mut response, &confirmation);
                }
                response
            }
            Err(err) => self.error_into_response(err),
        }
    }

    /// Runs the gate over request `headers` without calling downstream.
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] naming why the request may not proceed; see
    /// [`PaygateError::state`].
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<Authorization, PaygateError> {
        let result = self.authorize_inner(headers).await;
        match &result {
            Ok(_) => enter(GateState::Authorized),
            Err(err) => enter(err.state()),
        }
        result
    }

    async fn authorize_inner(&self, headers: &HeaderMap) -> Result<Authorization, PaygateError> {
        let header = payment_signature(headers)
            .ok_or(VerificationError::PaymentHeaderRequired(PAYMENT_SIGNATURE_HEADER))?;
        let payload = decode_payment_payload(header)
            .map_err(|e| VerificationError::InvalidPaymentHeader(e.to_string()))?;
        let requirement = self.matching_offer(&payload)?.clone();

        if self.verify_solana_locally {
            check_solana_locally(&payload, &requirement)?;
        }

        enter(GateState::Verifying);
        let verdict = self
            .facilitator
            .verify(&payload, &requirement)
            .await
            .map_err(|e| PaygateError::Facilitator(e.to_string()))?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "Payment verification failed".to_owned());
            return Err(VerificationError::VerificationFailed(reason).into());
        }

        if !self.settle {
            return Ok(Authorization {
                requirement,
                settlement: None,
            });
        }

        enter(GateState::Settling);
        let settlement = self
            .facilitator
            .settle(&payload, &requirement)
            .await
            .map_err(|e| PaygateError::Settlement(e.to_string()))?;
        if !settlement.success {
            let reason = settlement
                .failure_reason()
                .unwrap_or("facilitator reported failure")
                .to_owned();
            return Err(PaygateError::Settlement(reason));
        }

        Ok(Authorization {
            requirement,
            settlement: Some(settlement),
        })
    }

    /// Finds the offer whose canonical chain address and scheme match the
    /// payload's.
    fn matching_offer(&self, payload: &PaymentPayload) -> Result<&PaymentRequirement, VerificationError> {
        let declared = &payload.accepted.network;
        let chain_address = networks::lookup(declared)
            .map_or_else(|| declared.clone(), |config| config.chain_address().to_string());
        self.accepts
            .iter()
            .find(|offer| {
                offer.chain_address() == chain_address && offer.scheme == payload.accepted.scheme
            })
            .ok_or_else(|| VerificationError::NetworkUnmatched(declared.clone()))
    }

    /// The `402` challenge listing every offer.
    #[must_use]
    pub fn challenge(&self, error: impl Into<String>) -> Response {
        let challenge = PaymentRequirementsResponse::new(self.accepts.to_vec(), Some(error.into()));
        let body = serde_json::to_vec(&challenge).unwrap_or_default();
        let mut response = json_response(body);
        if let Some(value) = encode_payment_required(&challenge)
            .ok()
            .and_then(|encoded| HeaderValue::from_str(&encoded).ok())
        {
            let headers = response.headers_mut();
            headers.insert(PAYMENT_REQUIRED_HEADER, value);
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(PAYMENT_REQUIRED_HEADER),
            );
        }
        response
    }

    /// Converts a [`PaygateError`] into a `402` response.
    ///
    /// Rejections of the payment itself carry the offers; facilitator and
    /// settlement faults carry only the error.
    fn error_into_response(&self, err: PaygateError) -> Response {
        match err {
            PaygateError::Verification(err) => self.challenge(err.to_string()),
            PaygateError::Facilitator(ref details) => json_error("Verification failed", details),
            PaygateError::Settlement(ref details) => json_error("Settlement failed", details),
        }
    }

    /// Calls the inner service with proper telemetry instrumentation.
    async fn call_inner<S>(inner: S, req: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        let Ok(response) = inner.oneshot(req).instrument(tracing::info_span!("inner")).await;
        #[cfg(not(feature = "telemetry"))]
        let Ok(response) = inner.oneshot(req).await;
        response
    }
}

/// Rejects a Solana payment whose signature, recipient, amount or deadline
/// does not hold up.
fn check_solana_locally(
    payload: &PaymentPayload,
    requirement: &PaymentRequirement,
) -> Result<(), VerificationError> {
    let Some(network) = networks::lookup(&requirement.network) else {
        return Ok(());
    };
    if network.family != NetworkFamily::Solana {
        return Ok(());
    }
    let solana: SolanaPayload = match SchemePayload::decode(network.family, payload.payload.clone()) {
        Ok(SchemePayload::Solana(solana)) => solana,
        _ => return Err(VerificationError::VerificationFailed("invalid_payload".into())),
    };
    if solana.to != requirement.pay_to {
        return Err(VerificationError::VerificationFailed("invalid_recipient".into()));
    }
    if compare_atomic(&solana.amount, &requirement.max_amount_required) == Ordering::Less {
        return Err(VerificationError::VerificationFailed("insufficient_amount".into()));
    }
    if !verify_unexpired_solana_payload(&solana) {
        return Err(VerificationError::VerificationFailed("invalid_signature".into()));
    }
    Ok(())
}

/// Adds the confirmation header; downstream headers are left as they are.
fn attach_confirmation(response: &mut Response, confirmation: &SettleResult) {
    let Some(value) = encode_payment_response(confirmation)
        .ok()
        .and_then(|encoded| HeaderValue::from_str(&encoded).ok())
    else {
        return;
    };
    response.headers_mut().insert(PAYMENT_RESPONSE_HEADER, value);
}

fn json_error(error: &str, details: &str) -> Response {
    let body = json!({
        "error": error,
        "details": details,
    });
    json_response(body.to_string().into_bytes())
}

fn json_response(body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::PAYMENT_REQUIRED;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[allow(clippy::missing_const_for_fn)]
fn enter(state: GateState) {
    #[cfg(feature = "telemetry")]
    tracing::debug!(%state, "payment gate");
    #[cfg(not(feature = "telemetry"))]
    let _ = state;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use axum::body::to_bytes;
    use sbc402::proto::Scheme;
    use sbc402_svm::{SolanaSigner, build_solana_payment};
    use serde_json::Value;
    use solana_keypair::Keypair;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::headers::{decode_payment_required, decode_payment_response, encode_payment_signature};

    const PAY_TO: &str = "0x3333333333333333333333333333333333333333";

    fn offer() -> PaymentRequirement {
        PaymentRequirement::for_network("base-sepolia", PAY_TO, "1000000", "https://api.example.com/data")
            .unwrap()
    }

    fn gate(server: &MockServer) -> Paygate {
        let facilitator = FacilitatorClient::try_from(server.uri()).unwrap();
        Paygate::try_new(vec![offer()], facilitator).unwrap()
    }

    fn paid_request(payload: &PaymentPayload) -> Request {
        http::Request::builder()
            .uri("/data")
            .header(PAYMENT_SIGNATURE_HEADER, encode_payment_signature(payload).unwrap())
            .body(Body::empty())
            .unwrap()
    }

    fn payment_for(requirement: &PaymentRequirement) -> PaymentPayload {
        PaymentPayload::new(requirement, json!({ "signature": "0xabc" }))
    }

    /// A downstream service that counts its calls and sets its own header.
    fn downstream(calls: Arc<AtomicUsize>) -> impl Service<Request, Response = Response, Error = Infallible, Future: Send> + Clone {
        tower::service_fn(move |_req: Request| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, AtomicOrdering::SeqCst);
                let mut response = Response::new(Body::from("paid content"));
                response
                    .headers_mut()
                    .insert("x-downstream", HeaderValue::from_static("kept"));
                Ok::<_, Infallible>(response)
            }
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn mount_verify(server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn construction_rejects_unknown_networks_and_empty_offers() {
        let mut bad = offer();
        bad.network = "dogechain".into();
        let err = Paygate::try_new(vec![offer(), bad], FacilitatorClient::new()).unwrap_err();
        assert!(matches!(err, PaygateSetupError::UnknownNetwork(ref e) if e.network == "dogechain"));

        let err = Paygate::try_new(Vec::new(), FacilitatorClient::new()).unwrap_err();
        assert!(matches!(err, PaygateSetupError::NoOffers));
    }

    #[tokio::test]
    async fn missing_header_answers_with_the_offers() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let req = http::Request::builder().uri("/data").body(Body::empty()).unwrap();

        let response = gate(&server).handle_request(downstream(Arc::clone(&calls)), req).await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let header = response.headers()[PAYMENT_REQUIRED_HEADER].to_str().unwrap().to_owned();
        let from_header = decode_payment_required(&header).unwrap();
        let body = body_json(response).await;
        assert_eq!(body["protocolVersion"], 2);
        assert_eq!(body["x402Version"], 2);
        assert_eq!(body["accepts"][0]["payTo"], PAY_TO);
        assert!(body["error"].as_str().unwrap().contains(PAYMENT_SIGNATURE_HEADER));
        assert_eq!(from_header.accepts, vec![offer()]);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_header_still_lists_offers() {
        let server = MockServer::start().await;
        let req = http::Request::builder()
            .header(PAYMENT_SIGNATURE_HEADER, "%%% not base64 %%%")
            .body(Body::empty())
            .unwrap();

        let err = gate(&server).authorize(req.headers()).await.unwrap_err();
        assert_eq!(err.state(), GateState::InvalidHeader);

        let response = gate(&server)
            .handle_request(downstream(Arc::new(AtomicUsize::new(0))), req)
            .await;
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid or malformed"));
        assert_eq!(body["accepts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unmatched_network_is_named_and_downstream_skipped() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let other = PaymentRequirement::for_network("polygon", PAY_TO, "1000000", "https://r").unwrap();
        let payload = payment_for(&other);

        let response = gate(&server)
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payload))
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("eip155:137"));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    fn two_network_gate(server: &MockServer) -> (Paygate, PaymentRequirement) {
        let amoy = PaymentRequirement::for_network("polygon-amoy", PAY_TO, "2500", "https://api.example.com/data")
            .unwrap();
        let facilitator = FacilitatorClient::try_from(server.uri()).unwrap();
        let gate = Paygate::try_new(vec![offer(), amoy.clone()], facilitator).unwrap();
        (gate, amoy)
    }

    #[tokio::test]
    async fn multi_offer_gate_rejects_a_third_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
            .expect(0)
            .mount(&server)
            .await;
        let (gate, _) = two_network_gate(&server);
        let calls = Arc::new(AtomicUsize::new(0));
        let elsewhere = PaymentRequirement::for_network("base", PAY_TO, "2500", "https://r").unwrap();

        let response = gate
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&elsewhere)))
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("eip155:8453"));
        assert_eq!(body["accepts"].as_array().unwrap().len(), 2);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn multi_offer_gate_verifies_against_the_matched_offer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({
                "paymentPayload": { "accepted": { "network": "eip155:80002" } },
                "paymentRequirements": { "network": "eip155:80002", "amount": "2500", "payTo": PAY_TO }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isValid": true })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .and(body_partial_json(json!({
                "paymentRequirements": { "network": "eip155:80002", "amount": "2500" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "transaction": "0xa11" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (gate, amoy) = two_network_gate(&server);
        let calls = Arc::new(AtomicUsize::new(0));

        let response = gate
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&amoy)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        let confirmation = response.headers()[PAYMENT_RESPONSE_HEADER].to_str().unwrap();
        let confirmation = decode_payment_response(confirmation).unwrap();
        assert_eq!(confirmation.transaction.as_deref(), Some("0xa11"));
    }

    #[tokio::test]
    async fn scheme_must_match_as_well_as_network() {
        let server = MockServer::start().await;
        let mut payload = payment_for(&offer());
        payload.accepted.scheme = Scheme::Upto;

        let err = gate(&server).authorize(paid_request(&payload).headers()).await.unwrap_err();
        assert_eq!(err.state(), GateState::NetworkUnmatched);
    }

    #[tokio::test]
    async fn invalid_verdict_carries_the_facilitator_reason() {
        let server = MockServer::start().await;
        mount_verify(&server, json!({ "isValid": false, "invalidReason": "insufficient_funds" })).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let response = gate(&server)
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&offer())))
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "insufficient_funds");
        assert_eq!(body["accepts"].as_array().unwrap().len(), 1);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settlement_failure_is_terminal_json_without_offers() {
        let server = MockServer::start().await;
        mount_verify(&server, json!({ "isValid": true })).await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": false, "errorReason": "nonce_already_used" })),
            )
            .mount(&server)
            .await;
        let calls = Arc::new(AtomicUsize::new(0));

        let response = gate(&server)
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&offer())))
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(response.headers().get(PAYMENT_REQUIRED_HEADER).is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"], "Settlement failed");
        assert_eq!(body["details"], "nonce_already_used");
        assert!(body.get("accepts").is_none());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn facilitator_fault_during_verify_becomes_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let response = gate(&server)
            .handle_request(
                downstream(Arc::new(AtomicUsize::new(0))),
                paid_request(&payment_for(&offer())),
            )
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Verification failed");
        assert!(body["details"].as_str().unwrap().contains("400"));
    }

    #[tokio::test]
    async fn settled_payment_reaches_downstream_with_confirmation() {
        let server = MockServer::start().await;
        mount_verify(&server, json!({ "isValid": true })).await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "txHash": "0xfeed" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let calls = Arc::new(AtomicUsize::new(0));

        let response = gate(&server)
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&offer())))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(response.headers()["x-downstream"], "kept");
        let confirmation = response.headers()[PAYMENT_RESPONSE_HEADER].to_str().unwrap();
        let confirmation = decode_payment_response(confirmation).unwrap();
        assert!(confirmation.success);
        assert_eq!(confirmation.transaction.as_deref(), Some("0xfeed"));
        assert_eq!(confirmation.network.as_deref(), Some("base-sepolia"));
    }

    #[tokio::test]
    async fn verify_only_skips_settlement_and_confirmation() {
        let server = MockServer::start().await;
        mount_verify(&server, json!({ "isValid": true })).await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let calls = Arc::new(AtomicUsize::new(0));

        let response = gate(&server)
            .verify_only()
            .handle_request(downstream(Arc::clone(&calls)), paid_request(&payment_for(&offer())))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        assert!(response.headers().get(PAYMENT_RESPONSE_HEADER).is_none());
    }

    #[tokio::test]
    async fn local_solana_check_rejects_before_the_facilitator() {
        let server = MockServer::start().await;
        mount_verify(&server, json!({ "isValid": true })).await;
        let payer = Keypair::new_from_array([7u8; 32]);
        let payee = Keypair::new_from_array([9u8; 32]).address();
        let requirement =
            PaymentRequirement::for_network("solana-devnet", payee, "1000000000", "https://r").unwrap();
        let network = networks::resolve("solana-devnet").unwrap();
        let signed = build_solana_payment(&payer, &requirement, network, 300).await.unwrap();
        let facilitator = FacilitatorClient::try_from(server.uri()).unwrap();
        let gate = Paygate::try_new(vec![requirement.clone()], facilitator)
            .unwrap()
            .verify_only()
            .with_local_solana_verification();

        let genuine = PaymentPayload::new(&requirement, serde_json::to_value(&signed).unwrap());
        let authorization = gate.authorize(paid_request(&genuine).headers()).await.unwrap();
        assert_eq!(authorization.requirement, requirement);

        let mut tampered = signed;
        tampered.amount = "1000000001".into();
        let forged = PaymentPayload::new(&requirement, serde_json::to_value(&tampered).unwrap());
        let err = gate.authorize(paid_request(&forged).headers()).await.unwrap_err();
        assert!(matches!(
            err,
            PaygateError::Verification(VerificationError::VerificationFailed(ref r)) if r == "invalid_signature"
        ));
    }
}
