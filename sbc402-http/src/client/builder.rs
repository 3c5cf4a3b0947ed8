//! Dispatches the selected offer to the authorization builder of its network
//! family.
//!
//! | family                        | authorization                                   |
//! |-------------------------------|-------------------------------------------------|
//! | permit                        | [`SchemePayload::Permit`], falling back to [`SchemePayload::DirectPayment`] |
//! | transfer-with-authorization   | [`SchemePayload::TransferWithAuthorization`]    |
//! | solana                        | [`SchemePayload::Solana`]                       |
//!
//! The permit fallback fires on any permit failure (no RPC endpoint, a failed
//! nonce read, a signer that cannot sign permits) except an explicit
//! rejection by the key holder, which is returned as-is.

use std::fmt;
use std::sync::Arc;

use sbc402::networks::{NetworkConfig, NetworkFamily};
use sbc402::proto::{PaymentPayload, PaymentRequirement};
use sbc402_evm::client::parse_address;
use sbc402_evm::{
    EvmError, EvmPaymentParams, EvmSigner, RpcClient, build_direct_payment, build_permit,
    build_transfer_with_authorization,
};
use sbc402_svm::{SolanaError, SolanaSigner, build_solana_payment};

use crate::scheme::SchemePayload;

/// Errors from building an authorization.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// No signer is configured for the network's family.
    #[error("No signer configured for {family} networks")]
    MissingSigner {
        /// Family of the selected network.
        family: NetworkFamily,
    },
    /// EVM building or signing failed.
    #[error(transparent)]
    Evm(#[from] EvmError),
    /// Solana building or signing failed.
    #[error(transparent)]
    Solana(#[from] SolanaError),
}

impl PayloadError {
    /// Returns `true` if the key holder declined to sign.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        match self {
            Self::Evm(e) => e.is_rejection(),
            Self::Solana(e) => e.is_rejection(),
            Self::MissingSigner { .. } => false,
        }
    }
}

/// The signers a client pays with, at most one per chain family.
#[derive(Clone, Default)]
pub struct Signers {
    /// Signs for the permit and transfer-with-authorization families.
    pub evm: Option<Arc<dyn EvmSigner>>,
    /// Signs for the Solana family.
    pub solana: Option<Arc<dyn SolanaSigner>>,
}

impl fmt::Debug for Signers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signers")
            .field("evm", &self.evm.as_ref().map(|s| s.address()))
            .field("solana", &self.solana.as_ref().map(|s| s.address()))
            .finish()
    }
}

impl Signers {
    /// Whether a signer for `family` is configured.
    #[must_use]
    pub const fn supports(&self, family: NetworkFamily) -> bool {
        match family {
            NetworkFamily::Permit | NetworkFamily::TransferWithAuthorization => self.evm.is_some(),
            NetworkFamily::Solana => self.solana.is_some(),
        }
    }

    fn evm(&self, family: NetworkFamily) -> Result<&dyn EvmSigner, PayloadError> {
        self.evm
            .as_deref()
            .ok_or(PayloadError::MissingSigner { family })
    }

    fn solana(&self) -> Result<&dyn SolanaSigner, PayloadError> {
        self.solana.as_deref().ok_or(PayloadError::MissingSigner {
            family: NetworkFamily::Solana,
        })
    }
}

/// Everything needed to authorize one offer.
#[derive(Debug, Clone)]
pub struct PaymentContext<'a> {
    /// The selected offer.
    pub requirement: &'a PaymentRequirement,
    /// Its network.
    pub network: &'static NetworkConfig,
    /// Facilitator operating address (permit spender, direct-payment domain).
    pub facilitator_address: &'a str,
    /// Authorization lifetime in seconds.
    pub validity_secs: u64,
    /// JSON-RPC endpoint for the permit nonce read, when one resolves.
    pub rpc: Option<RpcClient>,
}

/// Builds and signs the authorization for `ctx`, wrapped as a payment
/// payload answering the offer.
///
/// # Errors
///
/// Returns [`PayloadError`] if the family's signer is missing, an offer field
/// is malformed, or signing fails.
#[cfg_attr(
    feature = "telemetry",
    tracing::instrument(name = "sbc402.client.build_payment", skip_all, fields(network = ctx.network.name), err)
)]
pub async fn build_payment(
    signers: &Signers,
    ctx: &PaymentContext<'_>,
) -> Result<PaymentPayload<SchemePayload>, PayloadError> {
    let family = ctx.network.family;
    let payload = match family {
        NetworkFamily::Permit => {
            let signer = signers.evm(family)?;
            let params =
                EvmPaymentParams::from_requirement(ctx.requirement, ctx.network, ctx.validity_secs)?;
            let facilitator = parse_address("facilitator", ctx.facilitator_address)?;
            if let Some(rpc) = &ctx.rpc {
                match build_permit(signer, rpc, &params, facilitator).await {
                    Ok(permit) => return Ok(wrap(ctx, SchemePayload::Permit(permit))),
                    Err(e) if e.is_rejection() => return Err(e.into()),
                    Err(err) => {
                        #[cfg(feature = "telemetry")]
                        tracing::debug!(error = %err, "permit failed, falling back to direct payment");
                        #[cfg(not(feature = "telemetry"))]
                        let _ = err;
                    }
                }
            }
            SchemePayload::DirectPayment(build_direct_payment(signer, &params, facilitator).await?)
        }
        NetworkFamily::TransferWithAuthorization => {
            let signer = signers.evm(family)?;
            let params =
                EvmPaymentParams::from_requirement(ctx.requirement, ctx.network, ctx.validity_secs)?;
            SchemePayload::TransferWithAuthorization(
                build_transfer_with_authorization(signer, &params).await?,
            )
        }
        NetworkFamily::Solana => SchemePayload::Solana(
            build_solana_payment(signers.solana()?, ctx.requirement, ctx.network, ctx.validity_secs)
                .await?,
        ),
    };
    Ok(wrap(ctx, payload))
}

fn wrap(ctx: &PaymentContext<'_>, payload: SchemePayload) -> PaymentPayload<SchemePayload> {
    #[cfg(feature = "telemetry")]
    tracing::debug!(scheme = payload.name(), "authorization signed");
    PaymentPayload::new(ctx.requirement, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Signature;
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use sbc402::networks;
    use sbc402_evm::{SignerError, TypedDataRequest};
    use serde_json::json;
    use solana_keypair::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "0x3333333333333333333333333333333333333333";
    const FACILITATOR: &str = "0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE";

    /// Signs permits with a closure-controlled outcome and counts calls.
    struct ScriptedSigner {
        inner: PrivateKeySigner,
        reject_permits: Option<SignerError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EvmSigner for ScriptedSigner {
        fn address(&self) -> alloy_primitives::Address {
            self.inner.address()
        }

        async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Signature, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.message.primary_type() == "Permit" {
                if let Some(err) = &self.reject_permits {
                    return Err(err.clone());
                }
            }
            self.inner.sign_typed_data(request).await
        }
    }

    fn scripted(reject_permits: Option<SignerError>) -> Arc<ScriptedSigner> {
        Arc::new(ScriptedSigner {
            inner: PrivateKeySigner::random(),
            reject_permits,
            calls: AtomicUsize::new(0),
        })
    }

    fn evm_signers(signer: Arc<ScriptedSigner>) -> Signers {
        Signers {
            evm: Some(signer),
            solana: None,
        }
    }

    fn context<'a>(requirement: &'a PaymentRequirement, rpc: Option<RpcClient>) -> PaymentContext<'a> {
        PaymentContext {
            requirement,
            network: networks::lookup(&requirement.network).unwrap(),
            facilitator_address: FACILITATOR,
            validity_secs: 300,
            rpc,
        }
    }

    async fn nonce_rpc() -> (MockServer, RpcClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("0x7ecebe00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x00"
            })))
            .mount(&server)
            .await;
        let rpc = RpcClient::new(Url::parse(&server.uri()).unwrap());
        (server, rpc)
    }

    #[tokio::test]
    async fn permit_family_prefers_permit() {
        let (_server, rpc) = nonce_rpc().await;
        let requirement = PaymentRequirement::for_network("base-sepolia", PAY_TO, "1000000", "r").unwrap();
        let signer = scripted(None);
        let payment = build_payment(&evm_signers(Arc::clone(&signer)), &context(&requirement, Some(rpc)))
            .await
            .unwrap();
        assert!(matches!(payment.payload, SchemePayload::Permit(_)));
        assert_eq!(payment.accepted.network, "eip155:84532");
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permit_failure_falls_back_to_direct_payment() {
        let (_server, rpc) = nonce_rpc().await;
        let requirement = PaymentRequirement::for_network("base", PAY_TO, "1000000", "r").unwrap();
        let signer = scripted(Some(SignerError::Unavailable("no permit support".into())));
        let payment = build_payment(&evm_signers(Arc::clone(&signer)), &context(&requirement, Some(rpc)))
            .await
            .unwrap();
        assert!(matches!(payment.payload, SchemePayload::DirectPayment(_)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_rpc_goes_straight_to_direct_payment() {
        let requirement = PaymentRequirement::for_network("base", PAY_TO, "1000000", "r").unwrap();
        let signer = scripted(None);
        let payment = build_payment(&evm_signers(Arc::clone(&signer)), &context(&requirement, None))
            .await
            .unwrap();
        assert!(matches!(payment.payload, SchemePayload::DirectPayment(_)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_is_not_a_fallback_trigger() {
        let (_server, rpc) = nonce_rpc().await;
        let requirement = PaymentRequirement::for_network("base", PAY_TO, "1000000", "r").unwrap();
        let signer = scripted(Some(SignerError::Rejected("user declined".into())));
        let err = build_payment(&evm_signers(Arc::clone(&signer)), &context(&requirement, Some(rpc)))
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transfer_family_signs_eip3009() {
        let requirement = PaymentRequirement::for_network("polygon-amoy", PAY_TO, "1000000", "r").unwrap();
        let payment = build_payment(&evm_signers(scripted(None)), &context(&requirement, None))
            .await
            .unwrap();
        assert!(matches!(payment.payload, SchemePayload::TransferWithAuthorization(_)));
        assert_eq!(payment.accepted.network, "eip155:80002");
    }

    #[tokio::test]
    async fn solana_family_signs_message() {
        let keypair = Keypair::new_from_array([9u8; 32]);
        let pay_to = Keypair::new_from_array([3u8; 32]);
        let requirement =
            PaymentRequirement::for_network("solana-devnet", SolanaSigner::address(&pay_to), "5000", "r").unwrap();
        let signers = Signers {
            evm: None,
            solana: Some(Arc::new(keypair)),
        };
        let payment = build_payment(&signers, &context(&requirement, None)).await.unwrap();
        let SchemePayload::Solana(message) = &payment.payload else {
            panic!("expected a Solana payload");
        };
        assert!(sbc402_svm::verify_solana_payload(message));
        assert_eq!(payment.accepted.network, "solana:devnet");
    }

    #[tokio::test]
    async fn missing_signer_is_reported() {
        let requirement = PaymentRequirement::for_network("solana", "11111111111111111111111111111111", "1", "r").unwrap();
        let err = build_payment(&Signers::default(), &context(&requirement, None))
            .await
            .unwrap_err();
        assert!(matches!(err, PayloadError::MissingSigner { family: NetworkFamily::Solana }));
        assert!(!Signers::default().supports(NetworkFamily::Permit));
    }
}
