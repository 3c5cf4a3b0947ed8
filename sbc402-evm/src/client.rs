//! Client-side construction of EVM payment authorizations.
//!
//! All three builders share [`EvmPaymentParams`], derived from the selected
//! offer and its network. They differ in the signing domain and struct:
//!
//! | builder                              | domain                          | replay protection        |
//! |--------------------------------------|---------------------------------|--------------------------|
//! | [`build_permit`]                     | token, version `1`              | on-chain `nonces(owner)` |
//! | [`build_direct_payment`]             | facilitator, version `1`        | timestamp nonce          |
//! | [`build_transfer_with_authorization`]| token, version from offer or `2`| random 32-byte nonce     |

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{Eip712Domain, eip712_domain};
use rand::RngExt;
use rand::rng;
use sbc402::amount::parse_atomic;
use sbc402::networks::NetworkConfig;
use sbc402::proto::PaymentRequirement;
use sbc402::timestamp::UnixTimestamp;

use crate::error::EvmError;
use crate::rpc::RpcClient;
use crate::signer::{EvmSigner, TypedDataRequest, TypedMessage};
use crate::types::{
    DEFAULT_EIP3009_VERSION, DOMAIN_VERSION, DirectPaymentPayload, Eip3009Authorization,
    Eip3009Payload, FACILITATOR_DOMAIN_NAME, Payment, Permit, PermitPayload, TokenAmount,
    TransferWithAuthorization,
};

/// Seconds `validAfter` is backdated to absorb clock skew.
pub const CLOCK_SKEW_SECS: u64 = 60;

/// Default authorization lifetime in seconds.
pub const DEFAULT_VALIDITY_SECS: u64 = 300;

/// Parameters shared by every EVM authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmPaymentParams {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract.
    pub asset: Address,
    /// Payee.
    pub pay_to: Address,
    /// Amount in atomic units.
    pub amount: U256,
    /// Token display name for the token's signing domain.
    pub token_name: String,
    /// Token domain version, when the offer names one.
    pub token_version: Option<String>,
    /// Authorization lifetime in seconds.
    pub validity_secs: u64,
}

impl EvmPaymentParams {
    /// Derives parameters from an offer on an EVM network.
    ///
    /// The token name comes from the offer's `extra.name` when present and
    /// from the network registry otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`EvmError::NotEvm`] for a non-EVM network, and
    /// [`EvmError::InvalidAddress`] or [`EvmError::InvalidAmount`] for
    /// malformed offer fields.
    pub fn from_requirement(
        requirement: &PaymentRequirement,
        network: &NetworkConfig,
        validity_secs: u64,
    ) -> Result<Self, EvmError> {
        if !network.family.is_evm() {
            return Err(EvmError::NotEvm(network.name.to_owned()));
        }
        let extra = requirement.extra.as_ref();
        Ok(Self {
            chain_id: network.chain_id,
            asset: parse_address("asset", &requirement.asset)?,
            pay_to: parse_address("payTo", &requirement.pay_to)?,
            amount: parse_atomic(&requirement.max_amount_required)
                .map_err(|_| EvmError::InvalidAmount(requirement.max_amount_required.clone()))?,
            token_name: extra
                .and_then(|e| e.name.clone())
                .unwrap_or_else(|| network.token_name.to_owned()),
            token_version: extra.and_then(|e| e.version.clone()),
            validity_secs,
        })
    }

    /// Signing domain of the token for permits.
    #[must_use]
    pub fn permit_domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: self.token_name.clone(),
            version: DOMAIN_VERSION,
            chain_id: self.chain_id,
            verifying_contract: self.asset,
        }
    }

    /// Signing domain of the facilitator contract for direct payments.
    #[must_use]
    pub fn direct_payment_domain(&self, facilitator: Address) -> Eip712Domain {
        eip712_domain! {
            name: FACILITATOR_DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: self.chain_id,
            verifying_contract: facilitator,
        }
    }

    /// Signing domain of the token for transfer-with-authorization.
    #[must_use]
    pub fn eip3009_domain(&self) -> Eip712Domain {
        let version = self
            .token_version
            .clone()
            .unwrap_or_else(|| DEFAULT_EIP3009_VERSION.to_owned());
        eip712_domain! {
            name: self.token_name.clone(),
            version: version,
            chain_id: self.chain_id,
            verifying_contract: self.asset,
        }
    }
}

/// Parses an EVM address from an offer field.
///
/// # Errors
///
/// Returns [`EvmError::InvalidAddress`] naming `field`.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, EvmError> {
    value.parse().map_err(|_| EvmError::InvalidAddress {
        field,
        value: value.to_owned(),
    })
}

/// Builds an ERC-2612 permit letting `spender` (the facilitator) pull the
/// payment.
///
/// The permit nonce is read from the token contract, not generated.
///
/// # Errors
///
/// Returns [`EvmError`] if the nonce read fails or the signer fails.
#[cfg_attr(feature = "telemetry", tracing::instrument(name = "sbc402.evm.build_permit", skip_all, err))]
pub async fn build_permit<S: EvmSigner + ?Sized>(
    signer: &S,
    rpc: &RpcClient,
    params: &EvmPaymentParams,
    spender: Address,
) -> Result<PermitPayload, EvmError> {
    let owner = signer.address();
    let nonce = rpc.nonces(params.asset, owner).await?;
    let deadline = UnixTimestamp::now() + params.validity_secs;

    let permit = Permit {
        owner,
        spender,
        value: params.amount,
        nonce,
        deadline: U256::from(deadline.as_secs()),
    };
    let request = TypedDataRequest {
        domain: params.permit_domain(),
        message: TypedMessage::Permit(permit),
    };
    let signature = signer.sign_typed_data(&request).await?;

    Ok(PermitPayload {
        owner,
        spender,
        value: TokenAmount(params.amount),
        nonce: TokenAmount(nonce),
        deadline,
        signature: signature.as_bytes().into(),
    })
}

/// Builds a direct payment signed against the facilitator contract's domain.
///
/// # Errors
///
/// Returns [`EvmError::Signing`] if the signer fails.
#[cfg_attr(feature = "telemetry", tracing::instrument(name = "sbc402.evm.build_direct_payment", skip_all, err))]
pub async fn build_direct_payment<S: EvmSigner + ?Sized>(
    signer: &S,
    params: &EvmPaymentParams,
    facilitator: Address,
) -> Result<DirectPaymentPayload, EvmError> {
    let from = signer.address();
    let nonce = UnixTimestamp::now();
    let deadline = nonce + params.validity_secs;

    let payment = Payment {
        from,
        to: params.pay_to,
        amount: params.amount,
        nonce: U256::from(nonce.as_secs()),
        deadline: U256::from(deadline.as_secs()),
    };
    let request = TypedDataRequest {
        domain: params.direct_payment_domain(facilitator),
        message: TypedMessage::Payment(payment),
    };
    let signature = signer.sign_typed_data(&request).await?;

    Ok(DirectPaymentPayload {
        from,
        to: params.pay_to,
        amount: TokenAmount(params.amount),
        nonce,
        deadline,
        signature: signature.as_bytes().into(),
    })
}

/// Builds an ERC-3009 transfer authorization with a fresh random nonce.
///
/// # Errors
///
/// Returns [`EvmError::Signing`] if the signer fails.
#[cfg_attr(feature = "telemetry", tracing::instrument(name = "sbc402.evm.build_transfer_with_authorization", skip_all, err))]
pub async fn build_transfer_with_authorization<S: EvmSigner + ?Sized>(
    signer: &S,
    params: &EvmPaymentParams,
) -> Result<Eip3009Payload, EvmError> {
    let now = UnixTimestamp::now();
    let nonce: [u8; 32] = rng().random();
    let authorization = Eip3009Authorization {
        from: signer.address(),
        to: params.pay_to,
        value: TokenAmount(params.amount),
        valid_after: now - CLOCK_SKEW_SECS,
        valid_before: now + params.validity_secs,
        nonce: B256::from(nonce),
    };

    // The facilitator rebuilds this struct from `authorization`; the fields
    // must match it exactly.
    let transfer = TransferWithAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value.0,
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
    };
    let request = TypedDataRequest {
        domain: params.eip3009_domain(),
        message: TypedMessage::TransferWithAuthorization(transfer),
    };
    let signature = signer.sign_typed_data(&request).await?;

    Ok(Eip3009Payload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use sbc402::networks;
    use sbc402::proto::RequirementExtra;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "0x3333333333333333333333333333333333333333";
    const FACILITATOR: Address = alloy_primitives::address!("0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE");

    fn params(network: &str) -> EvmPaymentParams {
        let requirement =
            PaymentRequirement::for_network(network, PAY_TO, "1000000", "https://r").unwrap();
        let network = networks::resolve(network).unwrap();
        EvmPaymentParams::from_requirement(&requirement, network, DEFAULT_VALIDITY_SECS).unwrap()
    }

    #[test]
    fn params_reject_malformed_offers() {
        let network = networks::resolve("base").unwrap();
        let mut requirement =
            PaymentRequirement::for_network("base", "not-an-address", "1", "r").unwrap();
        assert!(matches!(
            EvmPaymentParams::from_requirement(&requirement, network, 300),
            Err(EvmError::InvalidAddress { field: "payTo", .. })
        ));
        requirement.pay_to = PAY_TO.into();
        requirement.max_amount_required = "1.5".into();
        assert!(matches!(
            EvmPaymentParams::from_requirement(&requirement, network, 300),
            Err(EvmError::InvalidAmount(_))
        ));
        let solana = networks::resolve("solana").unwrap();
        assert!(matches!(
            EvmPaymentParams::from_requirement(&requirement, solana, 300),
            Err(EvmError::NotEvm(_))
        ));
    }

    #[tokio::test]
    async fn permit_uses_on_chain_nonce_and_token_domain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("0x7ecebe00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": format!("0x{:064x}", 7)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = PrivateKeySigner::random();
        let rpc = RpcClient::new(Url::parse(&server.uri()).unwrap());
        let params = params("base-sepolia");
        let before = UnixTimestamp::now();
        let payload = build_permit(&signer, &rpc, &params, FACILITATOR).await.unwrap();

        assert_eq!(payload.nonce, TokenAmount(U256::from(7u8)));
        assert_eq!(payload.owner, signer.address());
        assert_eq!(payload.spender, FACILITATOR);
        assert!(payload.deadline >= before + DEFAULT_VALIDITY_SECS);
        let request = TypedDataRequest {
            domain: params.permit_domain(),
            message: TypedMessage::Permit(payload.to_struct()),
        };
        assert_eq!(request.recover_signer(&payload.signature).unwrap(), signer.address());
        assert_eq!(request.domain.version.as_deref(), Some("1"));
        assert_eq!(request.domain.name.as_deref(), Some("Stable Coin"));
    }

    #[tokio::test]
    async fn direct_payment_signs_against_facilitator_domain() {
        let signer = PrivateKeySigner::random();
        let params = params("base");
        let payload = build_direct_payment(&signer, &params, FACILITATOR).await.unwrap();

        assert_eq!(payload.to, params.pay_to);
        assert_eq!(payload.deadline.as_secs() - payload.nonce.as_secs(), DEFAULT_VALIDITY_SECS);
        let request = TypedDataRequest {
            domain: params.direct_payment_domain(FACILITATOR),
            message: TypedMessage::Payment(payload.to_struct()),
        };
        assert_eq!(request.domain.name.as_deref(), Some(FACILITATOR_DOMAIN_NAME));
        assert_eq!(request.domain.verifying_contract, Some(FACILITATOR));
        assert_eq!(request.recover_signer(&payload.signature).unwrap(), signer.address());
    }

    #[tokio::test]
    async fn transfer_with_authorization_nonce_differs_per_call() {
        let signer = PrivateKeySigner::random();
        let params = params("polygon-amoy");
        let first = build_transfer_with_authorization(&signer, &params).await.unwrap();
        let second = build_transfer_with_authorization(&signer, &params).await.unwrap();
        assert_ne!(first.authorization.nonce, second.authorization.nonce);

        let a = first.authorization;
        assert!(a.valid_after < UnixTimestamp::now());
        assert_eq!(a.valid_before.as_secs() - a.valid_after.as_secs(), DEFAULT_VALIDITY_SECS + CLOCK_SKEW_SECS);
        let request = TypedDataRequest {
            domain: params.eip3009_domain(),
            message: TypedMessage::TransferWithAuthorization(first.to_struct()),
        };
        assert_eq!(request.domain.version.as_deref(), Some("2"));
        assert_eq!(request.recover_signer(&first.signature).unwrap(), signer.address());
    }

    #[test]
    fn offer_extra_overrides_domain_name_and_version() {
        let network = networks::resolve("polygon").unwrap();
        let mut requirement =
            PaymentRequirement::for_network("polygon", PAY_TO, "1", "r").unwrap();
        requirement.extra = Some(RequirementExtra {
            name: Some("USDC".into()),
            version: Some("3".into()),
        });
        let params = EvmPaymentParams::from_requirement(&requirement, network, 60).unwrap();
        let domain = params.eip3009_domain();
        assert_eq!(domain.name.as_deref(), Some("USDC"));
        assert_eq!(domain.version.as_deref(), Some("3"));
    }
}
