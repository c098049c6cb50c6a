use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
};
use ethereum_consensus::{
    builder::{SignedValidatorRegistration, ValidatorRegistration},
    crypto::SecretKey,
};
use vela_beacon_client::MockMultiBeaconClient;
use vela_common::{
    api::proposer_api::GetHeaderParams,
    eth::{try_execution_header_from_payload, BlindedBeaconBlockBody, SignedBlindedBeaconBlock},
    signing::{sign_builder_message, sign_consensus_message},
    utils::utcnow_sec,
    GetPayloadTrace, RelayConfig,
};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;

use crate::{
    builder::tests::{fixture, TestFixture},
    proposer::{api::ProposerApi, error::ProposerApiError, register::RegistrationProcessor},
};

use vela_database::mock_database_service::MockDatabaseService;
use vela_datastore::auctioneer::mock_auctioneer::MockAuctioneer;

const BID_SLOT: u64 = 101;
const PROPOSER_INDEX: u64 = 7;

type TestProposerApi = ProposerApi<MockAuctioneer, MockDatabaseService, MockMultiBeaconClient>;

async fn proposer_fixture() -> (TestFixture, Arc<TestProposerApi>, Arc<MockMultiBeaconClient>) {
    let builder_fixture = fixture().await;
    let beacon = Arc::new(MockMultiBeaconClient::new());

    let registration_processor = RegistrationProcessor::new(
        builder_fixture.auctioneer.clone(),
        builder_fixture.db.clone(),
        builder_fixture.chain_info.clone(),
        2,
        1_000,
    );

    let api = Arc::new(ProposerApi::new(
        builder_fixture.auctioneer.clone(),
        builder_fixture.db.clone(),
        beacon.clone(),
        builder_fixture.chain_info.clone(),
        builder_fixture.api.curr_slot_info.clone(),
        registration_processor,
        Arc::new(RelayConfig::default()),
        builder_fixture.optimistic_blocks.clone(),
    ));

    builder_fixture.db.add_known_validator(builder_fixture.proposer_sk.public_key(), PROPOSER_INDEX);

    (builder_fixture, api, beacon)
}

fn signed_registration(
    sk: &SecretKey,
    timestamp: u64,
    fixture: &TestFixture,
) -> SignedValidatorRegistration {
    let mut message = ValidatorRegistration {
        fee_recipient: Default::default(),
        gas_limit: 30_000_000,
        timestamp,
        public_key: sk.public_key(),
    };
    let signature =
        sign_builder_message(&mut message, sk, &fixture.chain_info.context).unwrap();
    SignedValidatorRegistration { message, signature }
}

fn signed_blinded_block(
    fixture: &TestFixture,
    submission: &vela_common::bid_submission::SignedBidSubmission,
) -> SignedBlindedBeaconBlock {
    let mut payload = submission.execution_payload.clone();
    let header = try_execution_header_from_payload(&mut payload).unwrap();

    let mut block = SignedBlindedBeaconBlock::default();
    block.message.slot = BID_SLOT;
    block.message.proposer_index = PROPOSER_INDEX;
    block.message.body = BlindedBeaconBlockBody { execution_payload_header: header };
    block.signature = sign_consensus_message(
        &mut block.message,
        &fixture.proposer_sk,
        &fixture.chain_info.context,
        Some(BID_SLOT),
        Some(fixture.chain_info.genesis_validators_root.clone()),
    )
    .unwrap();
    block
}

#[tokio::test]
async fn registrations_for_known_validators_are_persisted() {
    let (fixture, api, _) = proposer_fixture().await;

    let registration =
        signed_registration(&fixture.proposer_sk, utcnow_sec(), &fixture);
    let body = serde_json::to_vec(&vec![registration]).unwrap();

    let num_enqueued = api.registration_processor.process_batch(&body).await.unwrap();
    assert_eq!(num_enqueued, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fixture
        .db
        .get_validator_registration(&fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .is_some());
    assert!(fixture.auctioneer.is_active_validator(&fixture.proposer_sk.public_key()));
}

#[tokio::test]
async fn stale_registration_is_a_no_op() {
    let (fixture, api, _) = proposer_fixture().await;
    let now = utcnow_sec();

    let fresh = signed_registration(&fixture.proposer_sk, now, &fixture);
    let body = serde_json::to_vec(&vec![fresh]).unwrap();
    api.registration_processor.process_batch(&body).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // older timestamp never decreases the stored one
    let stale = signed_registration(&fixture.proposer_sk, now - 10, &fixture);
    let body = serde_json::to_vec(&vec![stale]).unwrap();
    let num_enqueued = api.registration_processor.process_batch(&body).await.unwrap();
    assert_eq!(num_enqueued, 0);

    let stored = fixture
        .db
        .get_validator_registration(&fixture.proposer_sk.public_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.timestamp(), now);
}

#[tokio::test]
async fn registration_too_far_in_the_future_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;

    let registration =
        signed_registration(&fixture.proposer_sk, utcnow_sec() + 60, &fixture);
    let body = serde_json::to_vec(&vec![registration]).unwrap();

    let err = api.registration_processor.process_batch(&body).await.unwrap_err();
    assert!(matches!(err, ProposerApiError::TimestampTooFarInTheFuture { .. }));
}

#[tokio::test]
async fn registration_for_unknown_validator_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;
    let mut rng = rand::thread_rng();
    let unknown = SecretKey::random(&mut rng).unwrap();

    let registration = signed_registration(&unknown, utcnow_sec(), &fixture);
    let body = serde_json::to_vec(&vec![registration]).unwrap();

    let err = api.registration_processor.process_batch(&body).await.unwrap_err();
    assert!(matches!(err, ProposerApiError::UnknownValidator));
}

#[tokio::test]
async fn registration_with_bad_signature_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;

    let mut registration =
        signed_registration(&fixture.proposer_sk, utcnow_sec(), &fixture);
    registration.message.gas_limit += 1;
    let body = serde_json::to_vec(&vec![registration]).unwrap();

    let err = api.registration_processor.process_batch(&body).await.unwrap_err();
    assert!(matches!(err, ProposerApiError::InvalidSignature));
}

#[tokio::test]
async fn get_header_returns_no_content_without_bids() {
    let (fixture, api, _) = proposer_fixture().await;

    let response = TestProposerApi::get_header(
        Extension(api),
        Path(GetHeaderParams {
            slot: BID_SLOT,
            parent_hash: fixture.parent_hash.clone(),
            public_key: fixture.proposer_sk.public_key(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn get_header_serves_the_top_bid() {
    let (fixture, api, _) = proposer_fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();

    let response = TestProposerApi::get_header(
        Extension(api),
        Path(GetHeaderParams {
            slot: BID_SLOT,
            parent_hash: fixture.parent_hash.clone(),
            public_key: fixture.proposer_sk.public_key(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_payload_round_trip_delivers_and_marks_slot() {
    let (fixture, api, beacon) = proposer_fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();

    let block = signed_blinded_block(&fixture, &submission);
    let mut trace = GetPayloadTrace::default();
    let payload = api.handle_get_payload(block, &mut trace).await.unwrap();
    assert_eq!(payload.block_hash, submission.message.block_hash);

    assert_eq!(
        fixture.auctioneer.get_last_slot_delivered().await.unwrap(),
        Some(BID_SLOT)
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fixture.db.num_delivered(), 1);
    assert_eq!(beacon.published_blocks().len(), 1);
}

#[tokio::test]
async fn get_payload_attaches_refund_justification_for_demoted_builder() {
    let (fixture, api, _) = proposer_fixture().await;

    // a demoted builder still won the slot
    let mut submission = fixture.submission(10, 0xbb);
    fixture.process(&mut submission).await.unwrap();
    fixture.db.db_demote_builder(&submission, "simulation failed".to_string()).await.unwrap();

    let registration =
        signed_registration(&fixture.proposer_sk, utcnow_sec(), &fixture);
    fixture
        .db
        .save_validator_registrations(vec![
            vela_common::SignedValidatorRegistrationEntry::new(registration),
        ])
        .await
        .unwrap();

    let block = signed_blinded_block(&fixture, &submission);
    let mut trace = GetPayloadTrace::default();
    api.handle_get_payload(block, &mut trace).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let demotion = fixture.db.demotion(&submission.message).unwrap();
    assert!(demotion.signed_beacon_block.is_some());
    assert!(demotion.signed_validator_registration.is_some());
}

#[tokio::test]
async fn get_payload_for_unknown_proposer_index_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();

    let mut block = signed_blinded_block(&fixture, &submission);
    block.message.proposer_index = 999;

    let mut trace = GetPayloadTrace::default();
    let err = api.handle_get_payload(block, &mut trace).await.unwrap_err();
    assert!(matches!(err, ProposerApiError::UnknownProposerIndex(999)));
}

#[tokio::test]
async fn get_payload_with_bad_signature_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();

    let mut block = signed_blinded_block(&fixture, &submission);
    block.signature = Default::default();

    let mut trace = GetPayloadTrace::default();
    let err = api.handle_get_payload(block, &mut trace).await.unwrap_err();
    assert!(matches!(err, ProposerApiError::InvalidSignature));
}

#[tokio::test]
async fn second_delivery_for_a_different_hash_is_rejected() {
    let (fixture, api, _) = proposer_fixture().await;

    let mut submission = fixture.submission(5, 0xbb);
    fixture.process(&mut submission).await.unwrap();
    let mut rng = rand::thread_rng();
    let other_builder = SecretKey::random(&mut rng).unwrap();
    let mut other = fixture.submission_for_builder(&other_builder, 7, 0xcc);
    fixture.process(&mut other).await.unwrap();

    let block = signed_blinded_block(&fixture, &submission);
    let mut trace = GetPayloadTrace::default();
    api.handle_get_payload(block, &mut trace).await.unwrap();

    let other_block = signed_blinded_block(&fixture, &other);
    let mut trace = GetPayloadTrace::default();
    let err = api.handle_get_payload(other_block, &mut trace).await.unwrap_err();
    assert!(matches!(
        err,
        ProposerApiError::AuctioneerError(
            vela_datastore::AuctioneerError::AnotherPayloadAlreadyDeliveredForSlot
        )
    ));
}
