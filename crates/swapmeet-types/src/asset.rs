//! Asset identity and the parties that own it.

use serde::{Deserialize, Serialize};

/// Token standard of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Erc721,
    Erc1155,
    Cryptopunk,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Erc721 => write!(f, "ERC721"),
            Self::Erc1155 => write!(f, "ERC1155"),
            Self::Cryptopunk => write!(f, "CRYPTOPUNK"),
        }
    }
}

/// A unique token. Identity is `(chain_id, collection_contract, token_id)`;
/// `amount` may exceed 1 only for ERC-1155, and the coordinator tracks
/// single-owner single-unit semantics regardless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub chain_id: u64,
    pub collection_contract: String,
    pub token_id: String,
    pub token_type: TokenType,
    #[serde(default = "default_amount")]
    pub amount: u64,
}

fn default_amount() -> u64 {
    1
}

impl Asset {
    pub fn key(&self) -> AssetKey {
        AssetKey {
            chain_id: self.chain_id,
            collection_contract: self.collection_contract.clone(),
            token_id: self.token_id.clone(),
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}#{}",
            self.chain_id, self.collection_contract, self.token_id
        )
    }
}

/// Identity tuple of an asset, usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    pub chain_id: u64,
    pub collection_contract: String,
    pub token_id: String,
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}#{}",
            self.chain_id, self.collection_contract, self.token_id
        )
    }
}

/// Explicit caller context for every engine/coordinator operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub wallet: String,
}

/// Accepts `0x`-prefixed 20-byte hex addresses.
pub fn is_valid_address(addr: &str) -> bool {
    addr.strip_prefix("0x")
        .map(|h| h.len() == 40 && hex::decode(h).is_ok())
        .unwrap_or(false)
}
