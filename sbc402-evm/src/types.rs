//! Wire and EIP-712 types for EVM payment authorizations.
//!
//! Three authorization shapes are supported, matching the token capabilities
//! a network advertises:
//!
//! - [`PermitPayload`] - ERC-2612 `permit` granting the facilitator an allowance
//! - [`DirectPaymentPayload`] - a payment signed against the facilitator's own
//!   EIP-712 domain; requires a prior on-chain allowance
//! - [`Eip3009Payload`] - ERC-3009 `transferWithAuthorization`
//!
//! Each payload carries exactly the fields needed to rebuild the signed
//! struct; no payload stores a digest.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::sol;
use sbc402::timestamp::UnixTimestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// EIP-712 domain name of the facilitator contract used by direct payments.
pub const FACILITATOR_DOMAIN_NAME: &str = "SBC x402 Facilitator";

/// EIP-712 domain version used by permit and direct payment.
pub const DOMAIN_VERSION: &str = "1";

/// Default EIP-712 domain version for transfer-with-authorization tokens.
pub const DEFAULT_EIP3009_VERSION: &str = "2";

/// A token amount in atomic units, serialized as a decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10)
            .map(Self)
            .map_err(|_| serde::de::Error::custom("amount must be a decimal integer string"))
    }
}

sol!(
    #![sol(all_derives)]

    /// ERC-2612 permit, signed against the token's own domain.
    #[sol(all_derives)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    /// Direct payment, signed against the facilitator contract's domain.
    #[sol(all_derives)]
    struct Payment {
        address from;
        address to;
        uint256 amount;
        uint256 nonce;
        uint256 deadline;
    }

    /// ERC-3009 transfer authorization.
    #[sol(all_derives)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }

    /// ERC-2612 replay nonce of `owner`.
    #[sol(all_derives)]
    function nonces(address owner) external view returns (uint256);

    /// ERC-20 balance of `account`.
    #[sol(all_derives)]
    function balanceOf(address account) external view returns (uint256);
);

/// Signed ERC-2612 permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitPayload {
    /// Token holder.
    pub owner: Address,
    /// Facilitator allowed to pull the funds.
    pub spender: Address,
    /// Allowance in atomic units.
    pub value: TokenAmount,
    /// On-chain permit nonce of `owner` at signing time.
    pub nonce: TokenAmount,
    /// Expiry.
    pub deadline: UnixTimestamp,
    /// 65-byte ECDSA signature.
    pub signature: Bytes,
}

impl PermitPayload {
    /// Rebuilds the signed struct.
    #[must_use]
    pub fn to_struct(&self) -> Permit {
        Permit {
            owner: self.owner,
            spender: self.spender,
            value: self.value.0,
            nonce: self.nonce.0,
            deadline: U256::from(self.deadline.as_secs()),
        }
    }
}

/// Signed direct payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPaymentPayload {
    /// Payer.
    pub from: Address,
    /// Payee.
    pub to: Address,
    /// Amount in atomic units.
    pub amount: TokenAmount,
    /// Unix timestamp at signing; replay is bounded by `deadline`.
    pub nonce: UnixTimestamp,
    /// Expiry.
    pub deadline: UnixTimestamp,
    /// 65-byte ECDSA signature.
    pub signature: Bytes,
}

impl DirectPaymentPayload {
    /// Rebuilds the signed struct.
    #[must_use]
    pub fn to_struct(&self) -> Payment {
        Payment {
            from: self.from,
            to: self.to,
            amount: self.amount.0,
            nonce: U256::from(self.nonce.as_secs()),
            deadline: U256::from(self.deadline.as_secs()),
        }
    }
}

/// Authorization fields of an ERC-3009 transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Payer.
    pub from: Address,
    /// Payee.
    pub to: Address,
    /// Amount in atomic units.
    pub value: TokenAmount,
    /// Not valid before this time.
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// Random 32-byte nonce.
    pub nonce: B256,
}

/// Signed ERC-3009 transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Payload {
    /// 65-byte ECDSA signature.
    pub signature: Bytes,
    /// The signed authorization.
    pub authorization: Eip3009Authorization,
}

impl Eip3009Payload {
    /// Rebuilds the signed struct.
    #[must_use]
    pub fn to_struct(&self) -> TransferWithAuthorization {
        let a = &self.authorization;
        TransferWithAuthorization {
            from: a.from,
            to: a.to,
            value: a.value.0,
            validAfter: U256::from(a.valid_after.as_secs()),
            validBefore: U256::from(a.valid_before.as_secs()),
            nonce: a.nonce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolStruct;

    #[test]
    fn token_amount_is_a_decimal_string() {
        let amount = TokenAmount(U256::from(1_000_000u64));
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1000000\"");
        let back: TokenAmount = serde_json::from_str("\"1000000\"").unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<TokenAmount>("\"0x10\"").is_err());
    }

    #[test]
    fn struct_type_strings_match_the_contracts() {
        assert_eq!(
            Permit::eip712_encode_type(),
            "Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)"
        );
        assert_eq!(
            TransferWithAuthorization::eip712_encode_type(),
            "TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)"
        );
    }

    #[test]
    fn permit_payload_uses_camel_case_and_string_numbers() {
        let payload = PermitPayload {
            owner: address!("0x1111111111111111111111111111111111111111"),
            spender: address!("0x2222222222222222222222222222222222222222"),
            value: TokenAmount(U256::from(5u8)),
            nonce: TokenAmount(U256::ZERO),
            deadline: UnixTimestamp::from_secs(1_700_000_300),
            signature: Bytes::from(vec![0u8; 65]),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["value"], "5");
        assert_eq!(json["nonce"], "0");
        assert_eq!(json["deadline"], "1700000300");
        let back: PermitPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_struct().deadline, U256::from(1_700_000_300u64));
    }
}
