use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ethereum_consensus::primitives::{BlsPublicKey, Hash32};
use vela_common::{
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBuilderBid},
};
use vela_database::types::BuilderInfoDocument;

use crate::{
    error::AuctioneerError,
    types::{select_top_bid, SignedBuilderBidWrapper},
    Auctioneer,
};

/// In-memory auctioneer for tests. Mirrors the Redis implementation's
/// semantics including the staleness CAS and top-bid recomputation.
#[derive(Clone, Default)]
pub struct MockAuctioneer {
    inner: Arc<Mutex<MockAuctioneerState>>,
}

#[derive(Default)]
struct MockAuctioneerState {
    last_slot_delivered: Option<u64>,
    last_hash_delivered: Option<Hash32>,
    best_bids: HashMap<String, SignedBuilderBid>,
    latest_bids: HashMap<String, HashMap<String, SignedBuilderBidWrapper>>,
    payloads: HashMap<String, ExecutionPayload>,
    bid_traces: HashMap<String, BidTrace>,
    builder_infos: HashMap<String, BuilderInfo>,
    active_validators: std::collections::HashSet<String>,
    relay_pubkey: Option<String>,
    kill_switch: bool,
}

impl MockAuctioneer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_builder_info(&self, pub_key: &BlsPublicKey, info: BuilderInfo) {
        self.inner.lock().unwrap().builder_infos.insert(format!("{pub_key:?}"), info);
    }

    pub fn is_active_validator(&self, pub_key: &BlsPublicKey) -> bool {
        self.inner.lock().unwrap().active_validators.contains(&format!("{pub_key:?}"))
    }

    pub fn builder_demoted(&self, pub_key: &BlsPublicKey) -> bool {
        self.inner
            .lock()
            .unwrap()
            .builder_infos
            .get(&format!("{pub_key:?}"))
            .map(|info| info.is_demoted)
            .unwrap_or(false)
    }

    fn tuple_key(slot: u64, parent_hash: &Hash32, proposer_pub_key: &BlsPublicKey) -> String {
        format!("{slot}_{parent_hash:?}_{proposer_pub_key:?}")
    }

    fn payload_key(slot: u64, proposer_pub_key: &BlsPublicKey, block_hash: &Hash32) -> String {
        format!("{slot}_{proposer_pub_key:?}_{block_hash:?}")
    }
}

#[async_trait]
impl Auctioneer for MockAuctioneer {
    async fn get_last_slot_delivered(&self) -> Result<Option<u64>, AuctioneerError> {
        Ok(self.inner.lock().unwrap().last_slot_delivered)
    }

    async fn check_and_set_last_slot_and_hash_delivered(
        &self,
        slot: u64,
        hash: &Hash32,
    ) -> Result<(), AuctioneerError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(last) = state.last_slot_delivered {
            if slot < last {
                return Err(AuctioneerError::PastSlotAlreadyDelivered);
            }
            if slot == last {
                match &state.last_hash_delivered {
                    Some(last_hash) if last_hash == hash => return Ok(()),
                    Some(_) => {
                        return Err(AuctioneerError::AnotherPayloadAlreadyDeliveredForSlot)
                    }
                    None => return Err(AuctioneerError::UnexpectedValueType),
                }
            }
        }
        state.last_slot_delivered = Some(slot);
        state.last_hash_delivered = Some(hash.clone());
        Ok(())
    }

    async fn get_best_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedBuilderBid>, AuctioneerError> {
        let key = Self::tuple_key(slot, parent_hash, proposer_pub_key);
        Ok(self.inner.lock().unwrap().best_bids.get(&key).cloned())
    }

    async fn save_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
        execution_payload: &ExecutionPayload,
    ) -> Result<(), AuctioneerError> {
        let key = Self::payload_key(slot, proposer_pub_key, block_hash);
        self.inner.lock().unwrap().payloads.insert(key, execution_payload.clone());
        Ok(())
    }

    async fn get_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<ExecutionPayload>, AuctioneerError> {
        let key = Self::payload_key(slot, proposer_pub_key, block_hash);
        Ok(self.inner.lock().unwrap().payloads.get(&key).cloned())
    }

    async fn save_bid_trace(&self, bid_trace: &BidTrace) -> Result<(), AuctioneerError> {
        let key = Self::payload_key(
            bid_trace.slot,
            &bid_trace.proposer_public_key,
            &bid_trace.block_hash,
        );
        self.inner.lock().unwrap().bid_traces.insert(key, bid_trace.clone());
        Ok(())
    }

    async fn get_bid_trace(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<BidTrace>, AuctioneerError> {
        let key = Self::payload_key(slot, proposer_pub_key, block_hash);
        Ok(self.inner.lock().unwrap().bid_traces.get(&key).cloned())
    }

    async fn get_builder_latest_payload_received_at(
        &self,
        slot: u64,
        builder_pub_key: &BlsPublicKey,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<u64>, AuctioneerError> {
        let key = Self::tuple_key(slot, parent_hash, proposer_pub_key);
        Ok(self
            .inner
            .lock()
            .unwrap()
            .latest_bids
            .get(&key)
            .and_then(|bids| bids.get(&format!("{builder_pub_key:?}")))
            .map(|wrapper| wrapper.received_at_ns))
    }

    async fn save_bid_and_update_top_bid(
        &self,
        submission: &SignedBidSubmission,
        builder_bid: &SignedBuilderBid,
        received_at_ns: u64,
    ) -> Result<(), AuctioneerError> {
        let trace = &submission.message;
        let tuple_key =
            Self::tuple_key(trace.slot, &trace.parent_hash, &trace.proposer_public_key);
        let payload_key =
            Self::payload_key(trace.slot, &trace.proposer_public_key, &trace.block_hash);
        let builder_field = format!("{:?}", trace.builder_public_key);

        let mut state = self.inner.lock().unwrap();

        if let Some(stored) =
            state.latest_bids.get(&tuple_key).and_then(|bids| bids.get(&builder_field))
        {
            if stored.received_at_ns > received_at_ns {
                return Err(AuctioneerError::NewerPayloadAlreadyProcessed);
            }
        }

        state.bid_traces.insert(payload_key.clone(), trace.clone());
        state.payloads.insert(payload_key, submission.execution_payload.clone());

        let wrapper = SignedBuilderBidWrapper::new(
            builder_bid.clone(),
            trace.slot,
            trace.builder_public_key.clone(),
            received_at_ns,
        );
        state.latest_bids.entry(tuple_key.clone()).or_default().insert(builder_field, wrapper);

        let entries: Vec<SignedBuilderBidWrapper> =
            state.latest_bids.get(&tuple_key).map(|m| m.values().cloned().collect()).unwrap_or_default();
        match select_top_bid(&entries) {
            Some(top) => {
                let top_bid = top.bid.clone();
                state.best_bids.insert(tuple_key, top_bid);
            }
            None => {
                state.best_bids.remove(&tuple_key);
            }
        }

        Ok(())
    }

    async fn update_top_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let tuple_key = Self::tuple_key(slot, parent_hash, proposer_pub_key);
        let mut state = self.inner.lock().unwrap();
        let entries: Vec<SignedBuilderBidWrapper> =
            state.latest_bids.get(&tuple_key).map(|m| m.values().cloned().collect()).unwrap_or_default();
        match select_top_bid(&entries) {
            Some(top) => {
                let top_bid = top.bid.clone();
                state.best_bids.insert(tuple_key, top_bid);
            }
            None => {
                state.best_bids.remove(&tuple_key);
            }
        }
        Ok(())
    }

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<BuilderInfo, AuctioneerError> {
        self.inner
            .lock()
            .unwrap()
            .builder_infos
            .get(&format!("{builder_pub_key:?}"))
            .cloned()
            .ok_or(AuctioneerError::BuilderNotFound { pub_key: builder_pub_key.clone() })
    }

    async fn demote_builder(&self, builder_pub_key: &BlsPublicKey) -> Result<(), AuctioneerError> {
        let mut state = self.inner.lock().unwrap();
        let info = state.builder_infos.entry(format!("{builder_pub_key:?}")).or_default();
        info.is_demoted = true;
        Ok(())
    }

    async fn update_builder_infos(
        &self,
        builder_infos: Vec<BuilderInfoDocument>,
    ) -> Result<(), AuctioneerError> {
        let mut state = self.inner.lock().unwrap();
        for document in builder_infos {
            state
                .builder_infos
                .insert(format!("{:?}", document.pub_key), document.builder_info);
        }
        Ok(())
    }

    async fn save_active_validator(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        self.inner.lock().unwrap().active_validators.insert(format!("{pub_key:?}"));
        Ok(())
    }

    async fn check_and_set_relay_pubkey(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let ours = format!("{public_key:?}");
        let mut state = self.inner.lock().unwrap();
        match &state.relay_pubkey {
            Some(stored) if *stored == ours => Ok(()),
            Some(stored) => Err(AuctioneerError::RelayPubkeyMismatch {
                stored: stored.clone(),
                ours,
            }),
            None => {
                state.relay_pubkey = Some(ours);
                Ok(())
            }
        }
    }

    async fn kill_switch_enabled(&self) -> Result<bool, AuctioneerError> {
        Ok(self.inner.lock().unwrap().kill_switch)
    }

    async fn enable_kill_switch(&self) -> Result<(), AuctioneerError> {
        self.inner.lock().unwrap().kill_switch = true;
        Ok(())
    }

    async fn disable_kill_switch(&self) -> Result<(), AuctioneerError> {
        self.inner.lock().unwrap().kill_switch = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_consensus::primitives::U256;
    use vela_common::eth::BuilderBid;

    fn random_pubkey() -> BlsPublicKey {
        let mut rng = rand::thread_rng();
        ethereum_consensus::crypto::SecretKey::random(&mut rng).unwrap().public_key()
    }

    fn submission(value: u64, builder: &BlsPublicKey, block_hash_byte: u8) -> SignedBidSubmission {
        let mut submission = SignedBidSubmission::default();
        submission.message.slot = 101;
        submission.message.value = U256::from(value);
        submission.message.block_hash = Hash32::try_from([block_hash_byte; 32].as_slice()).unwrap();
        submission.message.builder_public_key = builder.clone();
        submission
    }

    fn bid_for(submission: &SignedBidSubmission) -> SignedBuilderBid {
        let mut header = vela_common::eth::ExecutionPayloadHeader::default();
        header.block_hash = submission.message.block_hash.clone();
        SignedBuilderBid {
            message: BuilderBid {
                header,
                value: submission.message.value,
                public_key: Default::default(),
            },
            signature: Default::default(),
        }
    }

    #[tokio::test]
    async fn two_bids_top_wins() {
        let auctioneer = MockAuctioneer::new();

        let builder1 = random_pubkey();
        let builder2 = random_pubkey();
        let sub1 = submission(5, &builder1, 0x0a);
        let sub2 = submission(7, &builder2, 0x0b);
        auctioneer.save_bid_and_update_top_bid(&sub1, &bid_for(&sub1), 100).await.unwrap();
        auctioneer.save_bid_and_update_top_bid(&sub2, &bid_for(&sub2), 110).await.unwrap();

        let best = auctioneer
            .get_best_bid(101, &sub1.message.parent_hash, &sub1.message.proposer_public_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.value(), U256::from(7u64));
    }

    #[tokio::test]
    async fn stale_same_builder_submission_is_rejected() {
        let auctioneer = MockAuctioneer::new();

        let builder = random_pubkey();
        let newer = submission(6, &builder, 0x0b);
        auctioneer.save_bid_and_update_top_bid(&newer, &bid_for(&newer), 200).await.unwrap();

        // the older value=5 submission finished simulation late
        let older = submission(5, &builder, 0x0a);
        let err = auctioneer
            .save_bid_and_update_top_bid(&older, &bid_for(&older), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AuctioneerError::NewerPayloadAlreadyProcessed));

        let best = auctioneer
            .get_best_bid(101, &newer.message.parent_hash, &newer.message.proposer_public_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(best.value(), U256::from(6u64));
    }

    #[tokio::test]
    async fn delivered_slot_is_monotone() {
        let auctioneer = MockAuctioneer::new();
        let hash = Hash32::try_from([0xbb; 32].as_slice()).unwrap();

        auctioneer.check_and_set_last_slot_and_hash_delivered(101, &hash).await.unwrap();
        assert_eq!(auctioneer.get_last_slot_delivered().await.unwrap(), Some(101));

        // same slot, same hash: idempotent
        auctioneer.check_and_set_last_slot_and_hash_delivered(101, &hash).await.unwrap();

        // same slot, different hash
        let other = Hash32::try_from([0xcc; 32].as_slice()).unwrap();
        assert!(matches!(
            auctioneer.check_and_set_last_slot_and_hash_delivered(101, &other).await,
            Err(AuctioneerError::AnotherPayloadAlreadyDeliveredForSlot)
        ));

        // earlier slot
        assert!(matches!(
            auctioneer.check_and_set_last_slot_and_hash_delivered(100, &hash).await,
            Err(AuctioneerError::PastSlotAlreadyDelivered)
        ));
    }

    #[tokio::test]
    async fn demotion_is_monotone() {
        let auctioneer = MockAuctioneer::new();
        let builder = BlsPublicKey::default();
        auctioneer.set_builder_info(
            &builder,
            BuilderInfo { collateral: U256::from(100u64), ..Default::default() },
        );

        auctioneer.demote_builder(&builder).await.unwrap();
        assert!(auctioneer.builder_demoted(&builder));

        // refreshing from the durable store does not clear the bit unless the
        // stored row says so
        auctioneer.demote_builder(&builder).await.unwrap();
        assert!(auctioneer.builder_demoted(&builder));
    }
}
