//! Remote ledger access
//!
//! [`LedgerClient`] is the seam between the scanning engine and the node.
//! [`rpc::RpcLedgerClient`] talks Substrate JSON-RPC over a WebSocket and
//! [`codec`] turns raw extrinsics into [`Operation`]s.

pub mod codec;
pub mod rpc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use codec::RuntimeLayout;
pub use rpc::RpcLedgerClient;

/// Hex-encoded block or extrinsic hash, `0x`-prefixed as the node reports it.
pub type BlockHash = String;

/// Account identifier rendered as a string (SS58 for account ids).
pub type Address = String;

/// One entry of a block's extrinsic list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub hash: String,
    pub is_signed: bool,
    pub signer: Option<Address>,
    pub section: String,
    pub method: String,
    pub args: Vec<String>,
}

impl Operation {
    pub fn signed(
        hash: impl Into<String>,
        signer: impl Into<Address>,
        section: impl Into<String>,
        method: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            is_signed: true,
            signer: Some(signer.into()),
            section: section.into(),
            method: method.into(),
            args,
        }
    }

    pub fn unsigned(
        hash: impl Into<String>,
        section: impl Into<String>,
        method: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            is_signed: false,
            signer: None,
            section: section.into(),
            method: method.into(),
            args,
        }
    }

    /// Placeholder for an extrinsic whose body could not be decoded. The
    /// hash is still known, so hash lookups keep working.
    pub fn opaque(hash: impl Into<String>) -> Self {
        Self::unsigned(hash, "unknown", "unknown", Vec::new())
    }

    /// Whether this operation's hash equals `hash` exactly, as the node
    /// renders it (lowercase hex).
    pub fn has_hash(&self, hash: &str) -> bool {
        self.hash == hash
    }

    /// Whether this operation is signed by `address`.
    pub fn is_signed_by(&self, address: &str) -> bool {
        self.is_signed && self.signer.as_deref() == Some(address)
    }
}

/// A block body as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBody {
    pub number: u64,
    /// SCALE-encoded length of the block header.
    pub header_size: u64,
    pub operations: Vec<Operation>,
}

/// A block header without the body, as listed by the headers view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: u64,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub state_root: String,
    pub extrinsics_root: String,
    pub digest_logs: Vec<String>,
    /// SCALE-encoded length of the header.
    #[serde(rename = "size")]
    pub encoded_size: u64,
}

/// Access to a remote ledger node.
///
/// Every method may suspend on a network round-trip. Implementations must
/// tolerate `connect` being called before every public operation.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Establish the connection if there is none, otherwise reuse it.
    async fn connect(&self) -> Result<()>;

    /// Number of the current chain head.
    async fn head_number(&self) -> Result<u64>;

    /// Canonical hash at `number`.
    async fn hash_for(&self, number: u64) -> Result<BlockHash>;

    /// Header of the block `hash`, without fetching its body.
    async fn header_for(&self, hash: &str) -> Result<BlockHeader>;

    /// Full block body, operations in block order.
    async fn body_for(&self, hash: &str) -> Result<BlockBody>;

    /// Block timestamp in epoch milliseconds.
    async fn timestamp_for(&self, hash: &str) -> Result<u64>;
}

/// Connect and read the head in one step, as every head-relative query does.
pub(crate) async fn connected_head(client: &dyn LedgerClient) -> Result<u64> {
    client.connect().await?;
    client.head_number().await
}
