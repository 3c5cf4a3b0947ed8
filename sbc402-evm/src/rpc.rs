//! Minimal JSON-RPC reads against ERC-20 contracts.
//!
//! The client only needs two view calls, `nonces(owner)` for permits and
//! `balanceOf(account)` for the pre-payment balance check. Both are issued as a
//! raw `eth_call` with the ABI-encoded selector and a left-padded address.

use alloy_primitives::{Address, U256, hex};
use alloy_sol_types::SolCall;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::EvmError;
use crate::types::{balanceOfCall, noncesCall};

/// A JSON-RPC endpoint for one EVM chain.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcClient {
    /// Creates a client for `url` with a fresh HTTP client.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self::with_http_client(reqwest::Client::new(), url)
    }

    /// Creates a client for `url` reusing `http`.
    #[must_use]
    pub const fn with_http_client(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    /// Endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Issues `eth_call` against `to` at the latest block and returns the raw
    /// hex result.
    ///
    /// # Errors
    ///
    /// Returns [`EvmError::RpcTransport`] if the endpoint is unreachable and
    /// [`EvmError::Rpc`] if it answers with an error object.
    #[cfg_attr(feature = "telemetry", tracing::instrument(name = "sbc402.evm.eth_call", skip_all, fields(url = %self.url), err))]
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<String, EvmError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{"to": to, "data": hex::encode_prefixed(data)}, "latest"],
        });
        let response: RpcResponse = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            return Err(EvmError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or_default())
    }

    /// Reads the ERC-2612 permit nonce of `owner` on `token`.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::eth_call`]; also [`EvmError::Decode`] for a malformed result.
    pub async fn nonces(&self, token: Address, owner: Address) -> Result<U256, EvmError> {
        let data = noncesCall { owner }.abi_encode();
        decode_uint256(&self.eth_call(token, &data).await?)
    }

    /// Reads the ERC-20 balance of `account` on `token`.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::eth_call`]; also [`EvmError::Decode`] for a malformed result.
    pub async fn balance_of(&self, token: Address, account: Address) -> Result<U256, EvmError> {
        let data = balanceOfCall { account }.abi_encode();
        decode_uint256(&self.eth_call(token, &data).await?)
    }
}

/// Decodes a big-endian `uint256` returned by `eth_call`.
///
/// An empty result (`""` or `"0x"`), as returned by some nodes for a contract
/// without the function, decodes to zero.
///
/// # Errors
///
/// Returns [`EvmError::Decode`] for non-hex input or more than 32 bytes.
pub fn decode_uint256(result: &str) -> Result<U256, EvmError> {
    let digits = result.strip_prefix("0x").unwrap_or(result);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    let bytes = hex::decode(digits).map_err(|_| EvmError::Decode(result.to_owned()))?;
    U256::try_from_be_slice(&bytes).ok_or_else(|| EvmError::Decode(result.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: Address = address!("0xf9FB20B8E097904f0aB7d12e9DbeE88f2dcd0F16");
    const OWNER: Address = address!("0x1111111111111111111111111111111111111111");

    #[test]
    fn empty_result_decodes_to_zero() {
        assert_eq!(decode_uint256("0x").unwrap(), U256::ZERO);
        assert_eq!(decode_uint256("").unwrap(), U256::ZERO);
    }

    #[test]
    fn word_decodes_big_endian() {
        let word = format!("0x{:064x}", 42);
        assert_eq!(decode_uint256(&word).unwrap(), U256::from(42u8));
        assert_eq!(decode_uint256("0x0100").unwrap(), U256::from(256u16));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_uint256("0xzz"), Err(EvmError::Decode(_))));
        let too_long = format!("0x{}", "ff".repeat(33));
        assert!(matches!(decode_uint256(&too_long), Err(EvmError::Decode(_))));
    }

    #[test]
    fn calldata_is_selector_plus_padded_address() {
        let data = noncesCall { owner: OWNER }.abi_encode();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x7e, 0xce, 0xbe, 0x00]);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..], OWNER.as_slice());
        assert_eq!(&balanceOfCall { account: OWNER }.abi_encode()[..4], &[0x70, 0xa0, 0x82, 0x31]);
    }

    #[tokio::test]
    async fn reads_nonce_and_balance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("0x7ecebe00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": format!("0x{:064x}", 3)
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("0x70a08231"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x"
            })))
            .mount(&server)
            .await;

        let rpc = RpcClient::new(Url::parse(&server.uri()).unwrap());
        assert_eq!(rpc.nonces(TOKEN, OWNER).await.unwrap(), U256::from(3u8));
        assert_eq!(rpc.balance_of(TOKEN, OWNER).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn surfaces_rpc_error_objects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "execution reverted"}
            })))
            .mount(&server)
            .await;

        let rpc = RpcClient::new(Url::parse(&server.uri()).unwrap());
        let err = rpc.balance_of(TOKEN, OWNER).await.unwrap_err();
        assert!(matches!(err, EvmError::Rpc { code: -32000, .. }));
    }
}
