use async_trait::async_trait;
use ethereum_consensus::primitives::{BlsPublicKey, Hash32};
use vela_common::{
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBuilderBid},
};
use vela_database::types::BuilderInfoDocument;

use crate::error::AuctioneerError;

/// The shared bid store and builder-status cache. All state behind this trait
/// is visible to every stateless API instance.
#[async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait Auctioneer: Send + Sync + Clone {
    async fn get_last_slot_delivered(&self) -> Result<Option<u64>, AuctioneerError>;

    /// Marks a slot delivered. Fails for slots at or before the stored marker
    /// unless the same block hash is being re-delivered.
    async fn check_and_set_last_slot_and_hash_delivered(
        &self,
        slot: u64,
        hash: &Hash32,
    ) -> Result<(), AuctioneerError>;

    async fn get_best_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedBuilderBid>, AuctioneerError>;

    async fn save_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
        execution_payload: &ExecutionPayload,
    ) -> Result<(), AuctioneerError>;

    async fn get_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<ExecutionPayload>, AuctioneerError>;

    async fn save_bid_trace(&self, bid_trace: &BidTrace) -> Result<(), AuctioneerError>;

    async fn get_bid_trace(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<BidTrace>, AuctioneerError>;

    /// When this builder's latest accepted bid for the tuple was received.
    /// Used to reject submissions that raced to the cache in the wrong order.
    async fn get_builder_latest_payload_received_at(
        &self,
        slot: u64,
        builder_pub_key: &BlsPublicKey,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<u64>, AuctioneerError>;

    /// The ordered stage-16 writes: bid trace, execution payload, this
    /// builder's latest bid, then the tuple's top bid. The staleness CAS and
    /// the top-bid recomputation run serialised per tuple.
    async fn save_bid_and_update_top_bid(
        &self,
        submission: &SignedBidSubmission,
        builder_bid: &SignedBuilderBid,
        received_at_ns: u64,
    ) -> Result<(), AuctioneerError>;

    /// Recomputes the tuple's best bid from all builders' latest bids.
    async fn update_top_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError>;

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<BuilderInfo, AuctioneerError>;

    async fn demote_builder(&self, builder_pub_key: &BlsPublicKey) -> Result<(), AuctioneerError>;

    async fn update_builder_infos(
        &self,
        builder_infos: Vec<BuilderInfoDocument>,
    ) -> Result<(), AuctioneerError>;

    /// Marks a validator as recently active; fed by the registration workers.
    async fn save_active_validator(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError>;

    /// Startup guard: horizontally-scaled instances must sign with one key.
    async fn check_and_set_relay_pubkey(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError>;

    async fn kill_switch_enabled(&self) -> Result<bool, AuctioneerError>;

    async fn enable_kill_switch(&self) -> Result<(), AuctioneerError>;

    async fn disable_kill_switch(&self) -> Result<(), AuctioneerError>;
}
