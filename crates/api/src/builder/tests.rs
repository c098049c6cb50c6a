use std::{sync::Arc, time::Duration};

use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    crypto::SecretKey,
    primitives::{Bytes32, Hash32, U256},
};
use vela_beacon_client::MockMultiBeaconClient;
use vela_common::{
    api::builder_api::BuilderGetValidatorsResponseEntry,
    bid_submission::SignedBidSubmission,
    builder_info::BuilderInfo,
    chain_info::ChainInfo,
    config::NetworkConfig,
    eth::Transaction,
    signing::{sign_builder_message, RelaySigningContext},
    simulator::BlockSimError,
    task::WaitGroup,
    utils::utcnow_ns,
    RelayConfig, SubmissionTrace,
};
use vela_database::mock_database_service::MockDatabaseService;
use vela_datastore::{auctioneer::mock_auctioneer::MockAuctioneer, Auctioneer};
use vela_housekeeper::{CurrentSlotInfo, RandaoOracle};

use crate::builder::{
    api::BuilderApi,
    error::BuilderApiError,
    simulator::{mock_simulator::MockSimulator, optimistic_simulator::OptimisticSimulator},
};

const HEAD_SLOT: u64 = 100;
const BID_SLOT: u64 = 101;

pub(crate) struct TestFixture {
    pub api: BuilderApi<MockAuctioneer, MockDatabaseService, MockSimulator, MockMultiBeaconClient>,
    pub auctioneer: Arc<MockAuctioneer>,
    pub db: Arc<MockDatabaseService>,
    pub simulator: MockSimulator,
    pub optimistic_blocks: WaitGroup,
    pub chain_info: Arc<ChainInfo>,
    pub builder_sk: SecretKey,
    pub proposer_sk: SecretKey,
    pub parent_hash: Hash32,
    pub prev_randao: Bytes32,
}

pub(crate) async fn fixture() -> TestFixture {
    let mut rng = rand::thread_rng();
    let builder_sk = SecretKey::random(&mut rng).unwrap();
    let proposer_sk = SecretKey::random(&mut rng).unwrap();

    let chain_info =
        Arc::new(ChainInfo::for_network(&NetworkConfig::Custom { genesis_time: 0 }));
    let auctioneer = Arc::new(MockAuctioneer::new());
    let db = Arc::new(MockDatabaseService::new());
    let simulator = MockSimulator::new();
    let optimistic_blocks = WaitGroup::new();

    let optimistic_simulator = OptimisticSimulator::new(
        simulator.clone(),
        auctioneer.clone(),
        db.clone(),
        optimistic_blocks.clone(),
    );

    let curr_slot_info = CurrentSlotInfo::new();
    curr_slot_info.set_head_slot(HEAD_SLOT);
    curr_slot_info.set_optimistic_slot(BID_SLOT);

    // duty for the bid slot
    let mut registration = SignedValidatorRegistration::default();
    registration.message.public_key = proposer_sk.public_key();
    registration.message.gas_limit = 30_000_000;
    curr_slot_info.set_proposer_duties(vec![BuilderGetValidatorsResponseEntry {
        slot: BID_SLOT,
        validator_index: 7,
        entry: registration,
    }]);

    // oracle pre-filled with the bid slot's randao
    let prev_randao = Bytes32::try_from([0x42u8; 32].as_slice()).unwrap();
    let beacon = Arc::new(MockMultiBeaconClient::new());
    beacon.set_randao(prev_randao.clone());
    let randao_oracle = RandaoOracle::new(beacon);
    randao_oracle.spawn_refresh(BID_SLOT);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let api = BuilderApi::new(
        auctioneer.clone(),
        db.clone(),
        chain_info.clone(),
        Arc::new(RelaySigningContext::default()),
        optimistic_simulator,
        curr_slot_info,
        randao_oracle,
        Arc::new(RelayConfig::default()),
    );

    TestFixture {
        api,
        auctioneer,
        db,
        simulator,
        optimistic_blocks,
        chain_info,
        builder_sk,
        proposer_sk,
        parent_hash: Hash32::try_from([0xaa; 32].as_slice()).unwrap(),
        prev_randao,
    }
}

impl TestFixture {
    pub fn submission(&self, value: u64, block_hash_byte: u8) -> SignedBidSubmission {
        self.submission_for_builder(&self.builder_sk, value, block_hash_byte)
    }

    pub fn submission_for_builder(
        &self,
        builder_sk: &SecretKey,
        value: u64,
        block_hash_byte: u8,
    ) -> SignedBidSubmission {
        let block_hash = Hash32::try_from([block_hash_byte; 32].as_slice()).unwrap();

        let mut submission = SignedBidSubmission::default();
        submission.message.slot = BID_SLOT;
        submission.message.parent_hash = self.parent_hash.clone();
        submission.message.block_hash = block_hash.clone();
        submission.message.builder_public_key = builder_sk.public_key();
        submission.message.proposer_public_key = self.proposer_sk.public_key();
        submission.message.gas_limit = 30_000_000;
        submission.message.gas_used = 21_000;
        submission.message.value = U256::from(value);

        submission.execution_payload.parent_hash = self.parent_hash.clone();
        submission.execution_payload.block_hash = block_hash;
        submission.execution_payload.prev_randao = self.prev_randao.clone();
        submission.execution_payload.block_number = 1_000;
        submission.execution_payload.gas_limit = 30_000_000;
        submission.execution_payload.gas_used = 21_000;
        submission.execution_payload.timestamp =
            self.chain_info.slot_start_timestamp_in_secs(BID_SLOT);
        submission
            .execution_payload
            .transactions
            .push(Transaction::try_from(vec![0x02u8; 16].as_slice()).unwrap());

        submission.signature =
            sign_builder_message(&mut submission.message, builder_sk, &self.chain_info.context)
                .unwrap();
        submission
    }

    pub async fn process(
        &self,
        submission: &mut SignedBidSubmission,
    ) -> Result<SubmissionTrace, BuilderApiError> {
        let mut trace = SubmissionTrace { receive: utcnow_ns(), ..Default::default() };
        self.api.process_submission(submission, &mut trace).await?;
        Ok(trace)
    }
}

#[tokio::test]
async fn happy_path_submission_becomes_top_bid() {
    let fixture = fixture().await;
    let mut submission = fixture.submission(5, 0xbb);

    let trace = fixture.process(&mut submission).await.unwrap();
    assert!(!trace.is_optimistic);
    assert_eq!(fixture.simulator.num_requests(), 1);

    let best = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .expect("top bid stored");
    assert_eq!(best.value(), U256::from(5u64));
    assert_eq!(*best.block_hash(), submission.message.block_hash);

    // payload and trace blobs were written alongside the bid
    let payload = fixture
        .auctioneer
        .get_execution_payload(
            BID_SLOT,
            &fixture.proposer_sk.public_key(),
            &submission.message.block_hash,
        )
        .await
        .unwrap();
    assert!(payload.is_some());

    // deferred audit row
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.db.num_submissions(), 1);
}

#[tokio::test]
async fn two_bids_top_wins() {
    let fixture = fixture().await;
    let mut rng = rand::thread_rng();
    let other_builder = SecretKey::random(&mut rng).unwrap();

    let mut low = fixture.submission(5, 0xb1);
    let mut high = fixture.submission_for_builder(&other_builder, 7, 0xb2);

    fixture.process(&mut low).await.unwrap();
    fixture.process(&mut high).await.unwrap();

    let best = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.value(), U256::from(7u64));
}

#[tokio::test]
async fn stale_same_builder_submission_is_rejected() {
    let fixture = fixture().await;

    let mut newer = fixture.submission(6, 0xb2);
    fixture.process(&mut newer).await.unwrap();

    // an older value=5 submission from the same builder completes late
    let mut older = fixture.submission(5, 0xb1);
    let mut trace = SubmissionTrace { receive: 1, ..Default::default() };
    let err = fixture.api.process_submission(&mut older, &mut trace).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::AlreadyUsingNewerPayload));

    let best = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(best.value(), U256::from(6u64));
}

#[tokio::test]
async fn submissions_after_delivery_are_rejected() {
    let fixture = fixture().await;
    let hash = Hash32::try_from([0xbb; 32].as_slice()).unwrap();
    fixture
        .auctioneer
        .check_and_set_last_slot_and_hash_delivered(BID_SLOT, &hash)
        .await
        .unwrap();

    let mut submission = fixture.submission(5, 0xcc);
    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::PayloadAlreadyDelivered));
}

#[tokio::test]
async fn optimistic_failure_demotes_builder() {
    let fixture = fixture().await;
    let builder = fixture.builder_sk.public_key();
    fixture.auctioneer.set_builder_info(
        &builder,
        BuilderInfo { collateral: U256::from(100u64), ..Default::default() },
    );
    fixture.simulator.fail_with(BlockSimError::BlockValidationFailed("bad state root".into()));

    let mut submission = fixture.submission(10, 0xbb);
    let trace = fixture.process(&mut submission).await.unwrap();
    assert!(trace.is_optimistic);

    fixture.optimistic_blocks.wait().await;
    assert!(fixture.auctioneer.builder_demoted(&builder));

    let demotion = fixture.db.demotion(&submission.message).expect("demotion row written");
    assert!(demotion.sim_error.contains("bad state root"));
    assert!(demotion.signed_beacon_block.is_none());

    // the next submission takes the synchronous path and fails outright
    let mut retry = fixture.submission(10, 0xbc);
    let err = fixture.process(&mut retry).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::BlockValidationError(_)));
}

#[tokio::test]
async fn optimistic_acceptance_is_tight() {
    let fixture = fixture().await;
    let builder = fixture.builder_sk.public_key();

    // collateral == value is not enough
    fixture.auctioneer.set_builder_info(
        &builder,
        BuilderInfo { collateral: U256::from(10u64), ..Default::default() },
    );
    let mut submission = fixture.submission(10, 0xb1);
    let trace = fixture.process(&mut submission).await.unwrap();
    assert!(!trace.is_optimistic);

    // strictly more collateral inside the window is
    fixture.auctioneer.set_builder_info(
        &builder,
        BuilderInfo { collateral: U256::from(11u64), ..Default::default() },
    );
    let mut submission = fixture.submission(10, 0xb2);
    let trace = fixture.process(&mut submission).await.unwrap();
    assert!(trace.is_optimistic);

    // outside the optimistic window the path is synchronous
    fixture.api.curr_slot_info.set_optimistic_slot(BID_SLOT + 1);
    let mut submission = fixture.submission(10, 0xb3);
    let trace = fixture.process(&mut submission).await.unwrap();
    assert!(!trace.is_optimistic);
}

#[tokio::test]
async fn blacklisted_builder_is_silently_dropped() {
    let fixture = fixture().await;
    let builder = fixture.builder_sk.public_key();
    fixture
        .auctioneer
        .set_builder_info(&builder, BuilderInfo { is_blacklisted: true, ..Default::default() });

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();

    assert_eq!(fixture.simulator.num_requests(), 0);
    let best = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap();
    assert!(best.is_none());
}

#[tokio::test]
async fn trivial_submissions_are_accepted_and_ignored() {
    let fixture = fixture().await;

    let mut zero_value = fixture.submission(0, 0xb1);
    fixture.process(&mut zero_value).await.unwrap();

    let mut no_txs = fixture.submission(5, 0xb2);
    no_txs.execution_payload.transactions = Default::default();
    // signature covers only the bid trace, still valid
    fixture.process(&mut no_txs).await.unwrap();

    assert_eq!(fixture.simulator.num_requests(), 0);
    let best = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap();
    assert!(best.is_none());
}

#[tokio::test]
async fn wrong_timestamp_is_rejected() {
    let fixture = fixture().await;
    let mut submission = fixture.submission(5, 0xbb);
    submission.execution_payload.timestamp += 1;

    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::IncorrectTimestamp { .. }));
}

#[tokio::test]
async fn fee_recipient_mismatch_is_rejected() {
    let fixture = fixture().await;
    let mut submission = fixture.submission(5, 0xbb);
    submission.message.proposer_fee_recipient =
        ethereum_consensus::primitives::ExecutionAddress::try_from([0x99; 20].as_slice()).unwrap();

    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::FeeRecipientMismatch { .. }));
}

#[tokio::test]
async fn randao_mismatch_is_rejected() {
    let fixture = fixture().await;
    let mut submission = fixture.submission(5, 0xbb);
    submission.execution_payload.prev_randao =
        Bytes32::try_from([0x66; 32].as_slice()).unwrap();

    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::PrevRandaoMismatch { .. }));
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let fixture = fixture().await;
    let mut submission = fixture.submission(5, 0xbb);
    // tamper after signing
    submission.message.value = U256::from(6u64);

    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::SignatureVerificationFailed));
}

#[tokio::test]
async fn replayed_submission_is_idempotent() {
    let fixture = fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();
    let first = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .unwrap();

    let mut replay = fixture.submission(5, 0xbb);
    fixture.process(&mut replay).await.unwrap();
    let second = fixture
        .auctioneer
        .get_best_bid(BID_SLOT, &fixture.parent_hash, &fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.value(), second.value());
    assert_eq!(first.block_hash(), second.block_hash());
}

#[tokio::test]
async fn submission_for_past_slot_is_rejected() {
    let fixture = fixture().await;
    fixture.api.curr_slot_info.set_head_slot(BID_SLOT);

    let mut submission = fixture.submission(5, 0xbb);
    let err = fixture.process(&mut submission).await.unwrap_err();
    assert!(matches!(err, BuilderApiError::SubmissionForPastSlot { .. }));
}
