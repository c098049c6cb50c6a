use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    time::{sleep, Instant},
};
use tracing::{debug, error, info, warn};
use vela_beacon_client::{
    types::{HeadEventData, ProposerDuty, StateId},
    MultiBeaconClientTrait,
};
use vela_common::{
    api::builder_api::BuilderGetValidatorsResponseEntry, chain_info::ChainInfo,
    chain_info::SLOTS_PER_EPOCH,
};
use vela_database::DatabaseService;

use crate::error::HousekeeperError;

// Known-validator refresh cadence.
const MIN_SLOTS_BETWEEN_VALIDATOR_UPDATES: u64 = 6;
const MAX_SLOTS_BEFORE_FORCED_VALIDATOR_UPDATE: u64 = 32;
const SLEEP_BEFORE_REFRESHING_VALIDATORS: Duration = Duration::from_secs(6);

type SharedHousekeeper<DB, BeaconClient> = Arc<Housekeeper<DB, BeaconClient>>;

/// Keeps the durable store in sync with the beacon chain: proposer duties for
/// the current and next epoch (joined with stored registrations) and the
/// known-validator set. One instance per deployment is enough; API instances
/// read the results through the database.
pub struct Housekeeper<DB: DatabaseService + 'static, BeaconClient: MultiBeaconClientTrait + 'static>
{
    db: Arc<DB>,
    beacon_client: Arc<BeaconClient>,
    chain_info: Arc<ChainInfo>,

    head_slot: Mutex<u64>,

    proposer_duties_slot: Mutex<u64>,
    proposer_duties_lock: Mutex<()>,

    refreshed_validators_slot: Mutex<u64>,
    refresh_validators_lock: Mutex<()>,
}

impl<DB: DatabaseService, BeaconClient: MultiBeaconClientTrait> Housekeeper<DB, BeaconClient> {
    pub fn new(
        db: Arc<DB>,
        beacon_client: Arc<BeaconClient>,
        chain_info: Arc<ChainInfo>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            beacon_client,
            chain_info,
            head_slot: Mutex::new(0),
            proposer_duties_slot: Mutex::new(0),
            proposer_duties_lock: Mutex::new(()),
            refreshed_validators_slot: Mutex::new(0),
            refresh_validators_lock: Mutex::new(()),
        })
    }

    pub async fn start(
        self: &SharedHousekeeper<DB, BeaconClient>,
        head_event_receiver: &mut broadcast::Receiver<HeadEventData>,
    ) -> Result<(), HousekeeperError> {
        let best_sync_status = self.beacon_client.best_sync_status().await?;
        self.process_new_slot(best_sync_status.head_slot).await;

        loop {
            match head_event_receiver.recv().await {
                Ok(head_event) => {
                    self.process_new_slot(head_event.slot).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("head events lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    error!("head event channel closed");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn process_new_slot(self: &SharedHousekeeper<DB, BeaconClient>, head_slot: u64) {
        let (is_new_block, prev_head_slot) = self.update_head_slot(head_slot).await;
        if !is_new_block {
            return;
        }

        let cloned_self = self.clone();
        tokio::spawn(async move {
            let _ = cloned_self.update_proposer_duties(head_slot).await;
        });

        if self.should_refresh_known_validators(head_slot).await {
            let cloned_self = self.clone();
            tokio::spawn(async move {
                let _ = cloned_self.refresh_known_validators(head_slot).await;
            });
        }

        debug!(
            head_slot,
            prev_head_slot,
            head_slot_pos = (head_slot % SLOTS_PER_EPOCH) + 1,
            "Housekeeper::process_new_slot",
        );
    }

    async fn update_head_slot(&self, head_slot: u64) -> (bool, u64) {
        let mut guard = self.head_slot.lock().await;
        let prev_head_slot = *guard;
        if prev_head_slot < head_slot {
            *guard = head_slot;
            (true, prev_head_slot)
        } else {
            (false, prev_head_slot)
        }
    }

    /// Fetch duties for this epoch and the next, keep only validators with a
    /// stored registration, and persist the map for the API instances.
    async fn update_proposer_duties(
        self: &SharedHousekeeper<DB, BeaconClient>,
        head_slot: u64,
    ) -> Result<(), HousekeeperError> {
        let _guard = self.proposer_duties_lock.try_lock()?;

        let epoch = self.chain_info.epoch_for_slot(head_slot);
        let mut duties = self.fetch_duties(epoch).await?;

        let pub_keys: Vec<_> = duties.iter().map(|duty| duty.public_key.clone()).collect();
        let registrations =
            self.db.get_validator_registrations_for_pub_keys(&pub_keys).await?;

        if registrations.is_empty() {
            warn!(epoch, "no signed validator registrations found for proposer duties");
        } else {
            let num_duties =
                self.format_and_store_duties(std::mem::take(&mut duties), registrations).await?;
            info!(epoch, num_duties, "updated proposer duties");
        }

        *self.proposer_duties_slot.lock().await = head_slot;
        Ok(())
    }

    pub async fn format_and_store_duties(
        &self,
        duties: Vec<ProposerDuty>,
        registrations: Vec<vela_common::SignedValidatorRegistrationEntry>,
    ) -> Result<usize, HousekeeperError> {
        let mut entries = Vec::with_capacity(duties.len());

        for duty in duties {
            let Some(entry) = registrations
                .iter()
                .find(|registration| *registration.public_key() == duty.public_key)
            else {
                continue;
            };

            entries.push(BuilderGetValidatorsResponseEntry {
                slot: duty.slot,
                validator_index: duty.validator_index,
                entry: entry.registration.clone(),
            });
        }

        let num_duties = entries.len();
        self.db.set_proposer_duties(entries).await?;
        Ok(num_duties)
    }

    async fn fetch_duties(&self, epoch: u64) -> Result<Vec<ProposerDuty>, HousekeeperError> {
        let (_, mut duties) = self.beacon_client.get_proposer_duties(epoch).await?;
        match self.beacon_client.get_proposer_duties(epoch + 1).await {
            Ok((_, next_duties)) => duties.extend(next_duties),
            Err(err) => warn!(%err, "failed fetching next epoch proposer duties"),
        }
        Ok(duties)
    }

    async fn should_refresh_known_validators(
        self: &SharedHousekeeper<DB, BeaconClient>,
        head_slot: u64,
    ) -> bool {
        let last_refreshed_slot = *self.refreshed_validators_slot.lock().await;

        if head_slot <= last_refreshed_slot {
            return false;
        }

        let slots_since_last_update = head_slot - last_refreshed_slot;
        if slots_since_last_update < MIN_SLOTS_BETWEEN_VALIDATOR_UPDATES {
            return false;
        }

        if slots_since_last_update > MAX_SLOTS_BEFORE_FORCED_VALIDATOR_UPDATE {
            return true;
        }

        // Twice per epoch.
        let head_slot_pos = (head_slot % SLOTS_PER_EPOCH) + 1;
        head_slot_pos == 4 || head_slot_pos == 20
    }

    async fn refresh_known_validators(
        self: &SharedHousekeeper<DB, BeaconClient>,
        head_slot: u64,
    ) -> Result<(), HousekeeperError> {
        let _guard = self.refresh_validators_lock.try_lock()?;

        // Let the head settle before a heavy state read.
        sleep(SLEEP_BEFORE_REFRESHING_VALIDATORS).await;

        let start_fetching_ts = Instant::now();
        let validators = self.beacon_client.get_state_validators(StateId::Head).await?;

        info!(
            head_slot,
            num_known_validators = validators.len(),
            fetch_validators_latency_ms = start_fetching_ts.elapsed().as_millis(),
        );

        let eligible = validators
            .into_iter()
            .filter(|summary| summary.status.is_eligible())
            .collect::<Vec<_>>();
        self.db.set_known_validators(eligible).await?;

        *self.refreshed_validators_slot.lock().await = head_slot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_consensus::{builder::SignedValidatorRegistration, crypto::SecretKey};
    use vela_beacon_client::MockMultiBeaconClient;
    use vela_common::{config::NetworkConfig, SignedValidatorRegistrationEntry};
    use vela_database::mock_database_service::MockDatabaseService;

    #[tokio::test]
    async fn duties_are_joined_with_registrations() {
        let mut rng = rand::thread_rng();
        let registered = SecretKey::random(&mut rng).unwrap().public_key();
        let unregistered = SecretKey::random(&mut rng).unwrap().public_key();

        let db = Arc::new(MockDatabaseService::new());
        let beacon = Arc::new(MockMultiBeaconClient::new());
        let housekeeper = Housekeeper::new(
            db.clone(),
            beacon,
            Arc::new(ChainInfo::for_network(&NetworkConfig::Custom { genesis_time: 0 })),
        );

        let mut registration = SignedValidatorRegistration::default();
        registration.message.public_key = registered.clone();

        let duties = vec![
            ProposerDuty { public_key: registered.clone(), validator_index: 1, slot: 101 },
            ProposerDuty { public_key: unregistered, validator_index: 2, slot: 102 },
        ];

        let num = housekeeper
            .format_and_store_duties(
                duties,
                vec![SignedValidatorRegistrationEntry::new(registration)],
            )
            .await
            .unwrap();

        assert_eq!(num, 1);
        let stored = db.get_proposer_duties().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].slot, 101);
        assert_eq!(stored[0].entry.message.public_key, registered);
    }
}
