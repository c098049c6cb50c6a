use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    primitives::{BlsPublicKey, Hash32},
};
use vela_common::{
    api::{builder_api::BuilderGetValidatorsResponseEntry, data_api::BidFilters},
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBeaconBlock},
    GetHeaderTrace, GetPayloadTrace, SignedValidatorRegistrationEntry, SubmissionTrace,
    ValidatorSummary,
};

use crate::{
    error::DatabaseError,
    types::{BidSubmissionDocument, BuilderInfoDocument, DeliveredPayloadDocument, DemotionDocument},
    DatabaseService,
};

/// In-memory database used by API and housekeeper tests.
#[derive(Clone, Default)]
pub struct MockDatabaseService {
    registrations: Arc<DashMap<BlsPublicKey, SignedValidatorRegistrationEntry>>,
    known_validators: Arc<DashSet<BlsPublicKey>>,
    known_validators_by_index: Arc<DashMap<u64, BlsPublicKey>>,
    state: Arc<Mutex<MockDatabaseState>>,
}

#[derive(Default)]
struct MockDatabaseState {
    duties: Vec<BuilderGetValidatorsResponseEntry>,
    builder_infos: HashMap<String, BuilderInfo>,
    demotions: HashMap<String, DemotionDocument>,
    submissions: Vec<BidSubmissionDocument>,
    delivered: Vec<DeliveredPayloadDocument>,
}

impl MockDatabaseService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_known_validator(&self, public_key: BlsPublicKey, index: u64) {
        self.known_validators.insert(public_key.clone());
        self.known_validators_by_index.insert(index, public_key);
    }

    pub fn demotion(&self, bid_trace: &BidTrace) -> Option<DemotionDocument> {
        let key = Self::demotion_key(
            bid_trace.slot,
            &bid_trace.builder_public_key,
            &bid_trace.block_hash,
        );
        self.state.lock().unwrap().demotions.get(&key).cloned()
    }

    pub fn num_submissions(&self) -> usize {
        self.state.lock().unwrap().submissions.len()
    }

    pub fn num_delivered(&self) -> usize {
        self.state.lock().unwrap().delivered.len()
    }

    fn demotion_key(slot: u64, builder: &BlsPublicKey, block_hash: &Hash32) -> String {
        format!("{slot}_{builder:?}_{block_hash:?}")
    }
}

#[async_trait]
impl DatabaseService for MockDatabaseService {
    async fn save_validator_registrations(
        &self,
        entries: Vec<SignedValidatorRegistrationEntry>,
    ) -> Result<(), DatabaseError> {
        for entry in entries {
            match self.registrations.get(entry.public_key()) {
                Some(stored) if stored.timestamp() >= entry.timestamp() => {}
                _ => {
                    self.registrations.insert(entry.public_key().clone(), entry);
                }
            }
        }
        Ok(())
    }

    async fn is_registration_update_required(
        &self,
        registration: &SignedValidatorRegistration,
    ) -> Result<bool, DatabaseError> {
        Ok(match self.registrations.get(&registration.message.public_key) {
            Some(stored) => stored.timestamp() < registration.message.timestamp,
            None => true,
        })
    }

    async fn get_validator_registration(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistrationEntry>, DatabaseError> {
        Ok(self.registrations.get(pub_key).map(|entry| entry.clone()))
    }

    async fn get_validator_registrations_for_pub_keys(
        &self,
        pub_keys: &[BlsPublicKey],
    ) -> Result<Vec<SignedValidatorRegistrationEntry>, DatabaseError> {
        Ok(pub_keys
            .iter()
            .filter_map(|pub_key| self.registrations.get(pub_key).map(|entry| entry.clone()))
            .collect())
    }

    async fn set_known_validators(
        &self,
        known_validators: Vec<ValidatorSummary>,
    ) -> Result<(), DatabaseError> {
        self.known_validators.clear();
        self.known_validators_by_index.clear();
        for summary in known_validators {
            self.known_validators.insert(summary.validator.public_key.clone());
            self.known_validators_by_index.insert(summary.index, summary.validator.public_key);
        }
        Ok(())
    }

    async fn check_known_validators(
        &self,
        public_keys: Vec<BlsPublicKey>,
    ) -> Result<HashSet<BlsPublicKey>, DatabaseError> {
        Ok(public_keys
            .into_iter()
            .filter(|pub_key| self.known_validators.contains(pub_key))
            .collect())
    }

    fn is_known_validator(&self, public_key: &BlsPublicKey) -> bool {
        self.known_validators.contains(public_key)
    }

    fn known_validator_by_index(&self, index: u64) -> Option<BlsPublicKey> {
        self.known_validators_by_index.get(&index).map(|entry| entry.clone())
    }

    async fn set_proposer_duties(
        &self,
        proposer_duties: Vec<BuilderGetValidatorsResponseEntry>,
    ) -> Result<(), DatabaseError> {
        self.state.lock().unwrap().duties = proposer_duties;
        Ok(())
    }

    async fn get_proposer_duties(
        &self,
    ) -> Result<Vec<BuilderGetValidatorsResponseEntry>, DatabaseError> {
        Ok(self.state.lock().unwrap().duties.clone())
    }

    async fn get_all_builder_infos(&self) -> Result<Vec<BuilderInfoDocument>, DatabaseError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .builder_infos
            .iter()
            .filter_map(|(key, info)| {
                let stripped = key.trim_start_matches("0x");
                let bytes = hex::decode(stripped).ok()?;
                let pub_key = BlsPublicKey::try_from(bytes.as_slice()).ok()?;
                Some(BuilderInfoDocument { pub_key, builder_info: info.clone() })
            })
            .collect())
    }

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<Option<BuilderInfoDocument>, DatabaseError> {
        let state = self.state.lock().unwrap();
        Ok(state.builder_infos.get(&format!("{builder_pub_key:?}")).map(|info| {
            BuilderInfoDocument { pub_key: builder_pub_key.clone(), builder_info: info.clone() }
        }))
    }

    async fn store_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
        builder_info: &BuilderInfo,
    ) -> Result<(), DatabaseError> {
        self.state
            .lock()
            .unwrap()
            .builder_infos
            .insert(format!("{builder_pub_key:?}"), builder_info.clone());
        Ok(())
    }

    async fn db_demote_builder(
        &self,
        submission: &SignedBidSubmission,
        reason: String,
    ) -> Result<(), DatabaseError> {
        let trace = &submission.message;
        let mut state = self.state.lock().unwrap();

        state
            .builder_infos
            .entry(format!("{:?}", trace.builder_public_key))
            .or_default()
            .is_demoted = true;

        let key =
            Self::demotion_key(trace.slot, &trace.builder_public_key, &trace.block_hash);
        state.demotions.entry(key).or_insert(DemotionDocument {
            slot: trace.slot,
            builder_pub_key: trace.builder_public_key.clone(),
            block_hash: trace.block_hash.clone(),
            sim_error: reason,
            signed_beacon_block: None,
            signed_validator_registration: None,
        });
        Ok(())
    }

    async fn get_builder_demotion(
        &self,
        bid_trace: &BidTrace,
    ) -> Result<Option<DemotionDocument>, DatabaseError> {
        Ok(self.demotion(bid_trace))
    }

    async fn update_builder_demotion(
        &self,
        bid_trace: &BidTrace,
        signed_beacon_block: &SignedBeaconBlock,
        registration: &SignedValidatorRegistration,
    ) -> Result<(), DatabaseError> {
        let key = Self::demotion_key(
            bid_trace.slot,
            &bid_trace.builder_public_key,
            &bid_trace.block_hash,
        );
        let mut state = self.state.lock().unwrap();
        if let Some(demotion) = state.demotions.get_mut(&key) {
            demotion.signed_beacon_block = Some(signed_beacon_block.clone());
            demotion.signed_validator_registration = Some(registration.clone());
        }
        Ok(())
    }

    async fn store_block_submission(
        &self,
        submission: SignedBidSubmission,
        trace: SubmissionTrace,
    ) -> Result<(), DatabaseError> {
        let document = BidSubmissionDocument {
            bid_trace: submission.message.clone(),
            block_number: submission.execution_payload.block_number,
            num_txs: submission.num_txs(),
            timestamp_ms: trace.receive / 1_000_000,
            optimistic_submission: trace.is_optimistic,
        };
        self.state.lock().unwrap().submissions.push(document);
        Ok(())
    }

    async fn save_delivered_payload(
        &self,
        bid_trace: &BidTrace,
        payload: Arc<ExecutionPayload>,
        _latency_trace: &GetPayloadTrace,
    ) -> Result<(), DatabaseError> {
        let document = DeliveredPayloadDocument {
            bid_trace: bid_trace.clone(),
            block_number: payload.block_number,
            num_txs: payload.transactions.len(),
        };
        self.state.lock().unwrap().delivered.push(document);
        Ok(())
    }

    async fn save_get_header_call(
        &self,
        _slot: u64,
        _parent_hash: Hash32,
        _public_key: BlsPublicKey,
        _best_block_hash: Hash32,
        _trace: GetHeaderTrace,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_bids(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<BidSubmissionDocument>, DatabaseError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .submissions
            .iter()
            .filter(|doc| filters.slot.map_or(true, |slot| doc.bid_trace.slot == slot))
            .cloned()
            .collect())
    }

    async fn get_delivered_payloads(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<DeliveredPayloadDocument>, DatabaseError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .delivered
            .iter()
            .filter(|doc| filters.slot.map_or(true, |slot| doc.bid_trace.slot == slot))
            .cloned()
            .collect())
    }
}
