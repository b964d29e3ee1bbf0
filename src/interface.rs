//! Narrow interfaces to the external systems the core reads from and writes to.
//!
//! Futures are `?Send`: the worker runs on a single-threaded wasm executor.

use async_trait::async_trait;

use crate::config::WritePolicy;
use crate::error::ExternalError;
use crate::feed::FeedFilter;
use crate::model::{
    Address, CardId, CollectibleCard, ContentHash, FantasyFeedEntry, Position, RegistrationRecord,
    TransactionReceipt, UpdateOp, Upload,
};

/// Read access to the registration and card contracts.
#[async_trait(?Send)]
pub trait ChainReader {
    /// Registration record for `address`. Unknown accounts yield a default (empty) record.
    async fn registration_record(
        &self,
        address: &Address,
    ) -> Result<RegistrationRecord, ExternalError>;
    /// IDs of every minted card.
    async fn card_ids(&self) -> Result<Vec<CardId>, ExternalError>;
    /// A single card record.
    async fn card(&self, card_id: CardId) -> Result<CollectibleCard, ExternalError>;
}

/// Card fields chosen by the minter.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MintRequest {
    /// Team.
    pub team: String,
    /// Position.
    pub position: Position,
    /// League.
    pub league: String,
    /// Season.
    pub season: String,
    /// Profile picture URL or CID.
    pub profile_picture: String,
}

/// Chain-mutating writes. Implementations own signing, gas estimation and retries, following the
/// given [`WritePolicy`]; any failure is returned once, never retried by the caller.
#[async_trait(?Send)]
pub trait ChainWriter {
    /// Overwrite a card's fantasy points. Sent from the contract owner account.
    async fn submit_update_points(
        &self,
        op: &UpdateOp,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError>;
    /// Register `from` with the pinned profile at `content_hash`.
    async fn register_player(
        &self,
        from: &Address,
        content_hash: &ContentHash,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError>;
    /// Mint a card to `from`, paying the contract's minting fee.
    async fn mint_card(
        &self,
        from: &Address,
        request: &MintRequest,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError>;
}

/// Content-addressed storage (pinning gateway).
#[async_trait(?Send)]
pub trait ContentStore {
    /// Fetch the JSON blob stored at `content_hash`.
    async fn fetch_blob(&self, content_hash: &ContentHash)
        -> Result<serde_json::Value, ExternalError>;
    /// Pin a JSON blob, returning its content hash.
    async fn pin_blob(&self, blob: &serde_json::Value) -> Result<ContentHash, ExternalError>;
    /// Pin a file, returning its content hash.
    async fn pin_file(&self, upload: &Upload) -> Result<ContentHash, ExternalError>;
}

/// Third-party fantasy points feed.
#[async_trait(?Send)]
pub trait FantasyFeed {
    /// Current feed entries selected by `filter`.
    async fn fetch_fantasy_feed(
        &self,
        filter: &FeedFilter,
    ) -> Result<Vec<FantasyFeedEntry>, ExternalError>;
}
