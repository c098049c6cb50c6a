use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast,
    time::{interval_at, Instant},
};
use tracing::{error, info, warn};
use vela_beacon_client::{types::HeadEventData, MultiBeaconClientTrait};
use vela_common::{chain_info::ChainInfo, task::WaitGroup, utils::utcnow_sec};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;

use crate::{current_slot_info::CurrentSlotInfo, randao::RandaoOracle};

// Do not accept head events more than 60 seconds in the future.
const MAX_DISTANCE_FOR_FUTURE_SLOT: u64 = 60;

// Reload the duty map at least this often even without a missed slot.
const DUTY_REFRESH_SLOT_INTERVAL: u64 = 8;

// Fallback tick, seconds into the slot, if head events stall.
const CUT_OFF_TIME: u64 = 4;

/// Consumes the beacon head-event stream and drives the per-slot refreshes:
/// randao, duty map, optimistic window and builder registry.
pub struct ChainEventUpdater<D: DatabaseService + 'static, A: Auctioneer + 'static, M: MultiBeaconClientTrait + 'static> {
    head_slot: u64,
    duties_refreshed_slot: u64,

    database: Arc<D>,
    auctioneer: Arc<A>,
    chain_info: Arc<ChainInfo>,

    curr_slot_info: CurrentSlotInfo,
    randao_oracle: RandaoOracle<M>,
    optimistic_barrier: WaitGroup,
}

impl<D: DatabaseService, A: Auctioneer, M: MultiBeaconClientTrait> ChainEventUpdater<D, A, M> {
    pub fn new(
        database: Arc<D>,
        auctioneer: Arc<A>,
        chain_info: Arc<ChainInfo>,
        curr_slot_info: CurrentSlotInfo,
        randao_oracle: RandaoOracle<M>,
        optimistic_barrier: WaitGroup,
    ) -> Self {
        Self {
            head_slot: 0,
            duties_refreshed_slot: 0,
            database,
            auctioneer,
            chain_info,
            curr_slot_info,
            randao_oracle,
            optimistic_barrier,
        }
    }

    /// Runs until the head event channel closes.
    pub async fn start(mut self, mut head_event_rx: broadcast::Receiver<HeadEventData>) {
        let start_instant = Instant::now() + Duration::from_secs(CUT_OFF_TIME);
        let mut timer =
            interval_at(start_instant, Duration::from_secs(self.chain_info.seconds_per_slot));

        loop {
            tokio::select! {
                head_event_result = head_event_rx.recv() => {
                    match head_event_result {
                        Ok(head_event) => self.process_slot(head_event.slot).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("head events lagged by {n} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            error!("head event channel closed");
                            break;
                        }
                    }
                }
                _ = timer.tick() => {
                    self.process_slot(self.chain_info.current_slot()).await;
                }
            }
        }
    }

    pub async fn process_slot(&mut self, slot: u64) {
        if self.head_slot >= slot {
            return;
        }

        let slot_timestamp = self.chain_info.slot_start_timestamp_in_secs(slot);
        if slot_timestamp > utcnow_sec() + MAX_DISTANCE_FOR_FUTURE_SLOT {
            warn!(head_slot = slot, "head slot is too far in the future");
            return;
        }

        let prev_head_slot = self.head_slot;
        let missed_slots = prev_head_slot != 0 && slot > prev_head_slot + 1;
        if prev_head_slot != 0 {
            for missed_slot in prev_head_slot + 1..slot {
                warn!(missed_slot, "missed slot");
            }
        }

        self.head_slot = slot;
        self.curr_slot_info.set_head_slot(slot);

        info!(
            head_slot = slot,
            epoch = self.chain_info.epoch_for_slot(slot),
            slot_in_epoch = self.chain_info.slot_in_epoch(slot),
            "processing new head slot",
        );

        // Expected randao for the next proposal.
        self.randao_oracle.spawn_refresh(slot + 1);

        if missed_slots ||
            slot.saturating_sub(self.duties_refreshed_slot) >= DUTY_REFRESH_SLOT_INTERVAL
        {
            self.refresh_duties(slot).await;
        }

        // The optimistic window only advances once outstanding optimistic
        // simulations for the previous window have drained.
        {
            let barrier = self.optimistic_barrier.clone();
            let curr_slot_info = self.curr_slot_info.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                curr_slot_info.set_optimistic_slot(slot + 1);
            });
        }

        // Builder status changes made out-of-band become visible each slot.
        {
            let database = self.database.clone();
            let auctioneer = self.auctioneer.clone();
            tokio::spawn(async move {
                match database.get_all_builder_infos().await {
                    Ok(builder_infos) => {
                        if let Err(err) = auctioneer.update_builder_infos(builder_infos).await {
                            error!(%err, "failed to update builder infos in auctioneer");
                        }
                    }
                    Err(err) => error!(%err, "failed to fetch builder infos"),
                }
            });
        }
    }

    async fn refresh_duties(&mut self, slot: u64) {
        match self.database.get_proposer_duties().await {
            Ok(duties) => {
                info!(head_slot = slot, num_duties = duties.len(), "refreshed proposer duties");
                self.curr_slot_info.set_proposer_duties(duties);
                self.duties_refreshed_slot = slot;
            }
            Err(err) => error!(%err, "failed to get proposer duties from database"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_beacon_client::MockMultiBeaconClient;
    use vela_common::config::NetworkConfig;
    use vela_database::mock_database_service::MockDatabaseService;
    use vela_datastore::auctioneer::mock_auctioneer::MockAuctioneer;

    fn updater(
        barrier: WaitGroup,
    ) -> (
        ChainEventUpdater<MockDatabaseService, MockAuctioneer, MockMultiBeaconClient>,
        CurrentSlotInfo,
    ) {
        let beacon = Arc::new(MockMultiBeaconClient::new());
        let curr_slot_info = CurrentSlotInfo::new();
        let updater = ChainEventUpdater::new(
            Arc::new(MockDatabaseService::new()),
            Arc::new(MockAuctioneer::new()),
            Arc::new(ChainInfo::for_network(&NetworkConfig::Custom { genesis_time: 0 })),
            curr_slot_info.clone(),
            RandaoOracle::new(beacon),
            barrier,
        );
        (updater, curr_slot_info)
    }

    #[tokio::test]
    async fn head_only_moves_forward() {
        let (mut updater, info) = updater(WaitGroup::new());

        updater.process_slot(100).await;
        assert_eq!(info.head_slot(), 100);

        updater.process_slot(99).await;
        assert_eq!(info.head_slot(), 100);

        updater.process_slot(101).await;
        assert_eq!(info.head_slot(), 101);
    }

    #[tokio::test]
    async fn optimistic_slot_waits_for_barrier() {
        let barrier = WaitGroup::new();
        let guard = barrier.enter();
        let (mut updater, info) = updater(barrier.clone());

        updater.process_slot(100).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(info.optimistic_slot(), 0);

        drop(guard);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(info.optimistic_slot(), 101);
    }
}
