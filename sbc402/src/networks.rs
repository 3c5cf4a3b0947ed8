//! Static registry of supported networks.
//!
//! Each entry maps a human-readable network name (e.g., `"base-sepolia"`) to
//! its chain metadata: the CAIP-2 chain address, default RPC and facilitator
//! endpoints, the facilitator's operating address, the default settlement
//! asset and the signing family that decides which authorization the client
//! builds.
//!
//! The table is process-wide and read-only. Per-call overrides (see
//! [`NetworkOverrides`]) are resolved next to it and never mutate it.

use std::fmt;

use url::Url;

use crate::chain::{ChainId, EIP155_NAMESPACE, SOLANA_NAMESPACE};

/// Default facilitator endpoint shared by all built-in networks.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.stablecoin.xyz";

/// Which authorization structure a network's payments are signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFamily {
    /// EVM chains whose token supports ERC-2612 `permit`. Falls back to a
    /// facilitator-domain direct payment when the permit path is unavailable.
    Permit,
    /// EVM chains whose token supports ERC-3009 `transferWithAuthorization`.
    TransferWithAuthorization,
    /// Solana clusters, signed as a canonical pipe-delimited message.
    Solana,
}

impl NetworkFamily {
    /// Returns `true` for both EVM families.
    #[must_use]
    pub const fn is_evm(self) -> bool {
        matches!(self, Self::Permit | Self::TransferWithAuthorization)
    }
}

/// Chain metadata for one supported network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Human-readable network name used in payment requirements.
    pub name: &'static str,
    /// EIP-155 chain id; `0` for non-EVM chains.
    pub chain_id: u64,
    /// Default JSON-RPC endpoint.
    pub rpc_url: &'static str,
    /// Default facilitator base URL.
    pub facilitator_url: &'static str,
    /// Statically configured facilitator operating address.
    pub facilitator_address: &'static str,
    /// Default settlement asset (token contract or mint).
    pub asset: &'static str,
    /// Decimal precision of the default asset.
    pub decimals: u8,
    /// Token display name used in structured-signing domains.
    pub token_name: &'static str,
    /// Signing family.
    pub family: NetworkFamily,
    /// Whether this is a test network.
    pub testnet: bool,
}

impl NetworkConfig {
    /// Returns the canonical CAIP-2 chain address of this network.
    ///
    /// The Solana clusters are irregular: their chain id is `0`, so the
    /// reference is the cluster name rather than a number.
    #[must_use]
    pub fn chain_address(&self) -> ChainId {
        match (self.family, self.name) {
            (NetworkFamily::Solana, "solana") => ChainId::new(SOLANA_NAMESPACE, "mainnet-beta"),
            (NetworkFamily::Solana, _) => ChainId::new(SOLANA_NAMESPACE, "devnet"),
            _ => ChainId::new(EIP155_NAMESPACE, self.chain_id.to_string()),
        }
    }
}

/// All networks known to this build.
pub static NETWORKS: &[NetworkConfig] = &[
    NetworkConfig {
        name: "base",
        chain_id: 8453,
        rpc_url: "https://mainnet.base.org",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE",
        asset: "0xfdcC3dd6671eaB0709A4C0f3F53De9a333d80798",
        decimals: 18,
        token_name: "Stable Coin",
        family: NetworkFamily::Permit,
        testnet: false,
    },
    NetworkConfig {
        name: "base-sepolia",
        chain_id: 84532,
        rpc_url: "https://sepolia.base.org",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE",
        asset: "0xf9FB20B8E097904f0aB7d12e9DbeE88f2dcd0F16",
        decimals: 6,
        token_name: "Stable Coin",
        family: NetworkFamily::Permit,
        testnet: true,
    },
    NetworkConfig {
        name: "polygon",
        chain_id: 137,
        rpc_url: "https://polygon-rpc.com",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE",
        asset: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        decimals: 6,
        token_name: "USD Coin",
        family: NetworkFamily::TransferWithAuthorization,
        testnet: false,
    },
    NetworkConfig {
        name: "polygon-amoy",
        chain_id: 80002,
        rpc_url: "https://rpc-amoy.polygon.technology",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "0x124b082e8DF36258198da4Caa3B39c7dFa64D9cE",
        asset: "0x41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF",
        decimals: 6,
        token_name: "USD Coin",
        family: NetworkFamily::TransferWithAuthorization,
        testnet: true,
    },
    NetworkConfig {
        name: "solana",
        chain_id: 0,
        rpc_url: "https://api.mainnet-beta.solana.com",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "2mSjKVjzRGXcipq3DdJCijbepugfNSJXBjMLxKh5ndPn",
        asset: "DBAzBUXaLj1qANCseUPZz4sp9F8d2sc78C4vKjhbTGMA",
        decimals: 9,
        token_name: "Stable Coin",
        family: NetworkFamily::Solana,
        testnet: false,
    },
    NetworkConfig {
        name: "solana-devnet",
        chain_id: 0,
        rpc_url: "https://api.devnet.solana.com",
        facilitator_url: DEFAULT_FACILITATOR_URL,
        facilitator_address: "2mSjKVjzRGXcipq3DdJCijbepugfNSJXBjMLxKh5ndPn",
        asset: "DBAzBUXaLj1qANCseUPZz4sp9F8d2sc78C4vKjhbTGMA",
        decimals: 9,
        token_name: "Stable Coin",
        family: NetworkFamily::Solana,
        testnet: true,
    },
];

/// Error returned when a network name is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown network '{network}'. Valid networks: {}", valid.join(", "))]
pub struct UnknownNetworkError {
    /// The name that failed to resolve.
    pub network: String,
    /// Every valid network name.
    pub valid: Vec<&'static str>,
}

impl UnknownNetworkError {
    /// Creates the error for `network`, listing the registered names.
    #[must_use]
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_owned(),
            valid: supported_networks(),
        }
    }
}

/// Resolves a network name to its static configuration.
///
/// # Errors
///
/// Returns [`UnknownNetworkError`] listing every valid name when `name` is
/// not registered.
pub fn resolve(name: &str) -> Result<&'static NetworkConfig, UnknownNetworkError> {
    NETWORKS
        .iter()
        .find(|n| n.name == name)
        .ok_or_else(|| UnknownNetworkError::new(name))
}

/// Returns `true` if `name` is a registered network.
#[must_use]
pub fn is_supported(name: &str) -> bool {
    NETWORKS.iter().any(|n| n.name == name)
}

/// Returns the canonical chain address (`eip155:8453`, `solana:devnet`, ...)
/// for a network name.
///
/// # Errors
///
/// Returns [`UnknownNetworkError`] when `name` is not registered.
pub fn to_chain_address(name: &str) -> Result<String, UnknownNetworkError> {
    resolve(name).map(|n| n.chain_address().to_string())
}

/// Maps a canonical chain address back to a network name.
///
/// Best effort: returns the input unchanged when no network matches.
#[must_use]
pub fn from_chain_address(address: &str) -> String {
    NETWORKS
        .iter()
        .find(|n| n.chain_address().to_string() == address)
        .map_or_else(|| address.to_owned(), |n| n.name.to_owned())
}

/// Resolves either a network name or a chain address to its configuration.
#[must_use]
pub fn lookup(name_or_address: &str) -> Option<&'static NetworkConfig> {
    resolve(name_or_address)
        .ok()
        .or_else(|| resolve(&from_chain_address(name_or_address)).ok())
}

/// Names of every registered network, in registry order.
#[must_use]
pub fn supported_networks() -> Vec<&'static str> {
    NETWORKS.iter().map(|n| n.name).collect()
}

/// Per-call endpoint overrides.
///
/// Overrides take precedence over the network's static endpoints for a single
/// call and are never written back into [`NETWORKS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkOverrides {
    /// JSON-RPC endpoint to use instead of [`NetworkConfig::rpc_url`].
    pub rpc_url: Option<Url>,
    /// Facilitator base URL to use instead of [`NetworkConfig::facilitator_url`].
    pub facilitator_url: Option<Url>,
}

impl NetworkOverrides {
    /// Returns the effective RPC endpoint for `network`, if one parses.
    #[must_use]
    pub fn rpc_url(&self, network: &NetworkConfig) -> Option<Url> {
        self.rpc_url
            .clone()
            .or_else(|| Url::parse(network.rpc_url).ok())
    }
}

impl fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Permit => "permit",
            Self::TransferWithAuthorization => "transfer-with-authorization",
            Self::Solana => "solana",
        };
        f.write_str(s)
    }
}
