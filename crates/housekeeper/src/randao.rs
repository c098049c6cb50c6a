use std::sync::Arc;

use ethereum_consensus::primitives::Bytes32;
use parking_lot::RwLock;
use tracing::{debug, warn};
use vela_beacon_client::{types::StateId, MultiBeaconClientTrait};

/// The randao value submissions for `slot` must reproduce. The mix is
/// committed one slot earlier, so `slot` is the proposing slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedRandao {
    pub slot: u64,
    pub prev_randao: Bytes32,
}

/// One lock guards both the known value and the in-flight fetch marker, so
/// readers can never observe a stale single-flight token next to a newer
/// value.
#[derive(Default)]
struct RandaoState {
    ready: Option<ExpectedRandao>,
    fetching: Option<u64>,
}

#[derive(Clone)]
pub struct RandaoOracle<M: MultiBeaconClientTrait + 'static> {
    state: Arc<RwLock<RandaoState>>,
    beacon_client: Arc<M>,
}

impl<M: MultiBeaconClientTrait + 'static> RandaoOracle<M> {
    pub fn new(beacon_client: Arc<M>) -> Self {
        Self { state: Arc::new(RwLock::new(RandaoState::default())), beacon_client }
    }

    pub fn expected(&self) -> Option<ExpectedRandao> {
        self.state.read().ready.clone()
    }

    pub fn known_slot(&self) -> Option<u64> {
        self.state.read().ready.as_ref().map(|randao| randao.slot)
    }

    /// Value for the given proposing slot, if that is the slot we have.
    pub fn prev_randao_for_slot(&self, slot: u64) -> Option<Bytes32> {
        let state = self.state.read();
        match &state.ready {
            Some(randao) if randao.slot == slot => Some(randao.prev_randao.clone()),
            _ => None,
        }
    }

    /// Fire-and-forget refresh for `target_slot`. The fetch queries the mix of
    /// `target_slot - 1`; the result is kept only if it is not older than what
    /// is already stored.
    pub fn spawn_refresh(&self, target_slot: u64) {
        {
            let mut state = self.state.write();

            let already_known =
                state.ready.as_ref().map_or(false, |randao| randao.slot >= target_slot);
            let already_fetching = state.fetching.map_or(false, |slot| slot >= target_slot);
            if already_known || already_fetching {
                debug!(target_slot, "skipping randao refresh");
                return;
            }

            state.fetching = Some(target_slot);
        }

        let oracle = self.clone();
        tokio::spawn(async move {
            let queried_slot = target_slot.saturating_sub(1);
            let result = oracle.beacon_client.get_randao(StateId::Slot(queried_slot)).await;

            let mut state = oracle.state.write();
            if state.fetching == Some(target_slot) {
                state.fetching = None;
            }

            match result {
                Ok(response) => {
                    let newer = state
                        .ready
                        .as_ref()
                        .map_or(true, |randao| target_slot >= randao.slot);
                    if newer {
                        state.ready = Some(ExpectedRandao {
                            slot: target_slot,
                            prev_randao: response.randao,
                        });
                        debug!(target_slot, "updated expected prev_randao");
                    }
                }
                Err(err) => {
                    warn!(%err, target_slot, "failed to get randao from beacon node");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vela_beacon_client::MockMultiBeaconClient;

    fn randao_bytes(byte: u8) -> Bytes32 {
        Bytes32::try_from([byte; 32].as_slice()).unwrap()
    }

    #[tokio::test]
    async fn refresh_fills_state_for_target_slot() {
        let beacon = Arc::new(MockMultiBeaconClient::new());
        beacon.set_randao(randao_bytes(0x42));

        let oracle = RandaoOracle::new(beacon);
        assert!(oracle.expected().is_none());

        oracle.spawn_refresh(101);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let expected = oracle.expected().unwrap();
        assert_eq!(expected.slot, 101);
        assert_eq!(expected.prev_randao, randao_bytes(0x42));
        assert_eq!(oracle.prev_randao_for_slot(101), Some(randao_bytes(0x42)));
        assert_eq!(oracle.prev_randao_for_slot(102), None);
    }

    #[tokio::test]
    async fn older_refresh_does_not_clobber_newer_value() {
        let beacon = Arc::new(MockMultiBeaconClient::new());
        beacon.set_randao(randao_bytes(0x42));

        let oracle = RandaoOracle::new(beacon.clone());
        oracle.spawn_refresh(102);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(oracle.known_slot(), Some(102));

        beacon.set_randao(randao_bytes(0x01));
        oracle.spawn_refresh(101);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // slot 101 is older than the stored 102; refresh was skipped
        let expected = oracle.expected().unwrap();
        assert_eq!(expected.slot, 102);
        assert_eq!(expected.prev_randao, randao_bytes(0x42));
    }

    #[tokio::test]
    async fn fetch_failure_leaves_previous_value() {
        let beacon = Arc::new(MockMultiBeaconClient::new());
        beacon.set_randao(randao_bytes(0x42));

        let oracle = RandaoOracle::new(beacon.clone());
        oracle.spawn_refresh(101);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // mock with no randao configured errors out
        let failing = Arc::new(MockMultiBeaconClient::new());
        let failing_oracle = RandaoOracle {
            state: oracle.state.clone(),
            beacon_client: failing,
        };
        failing_oracle.spawn_refresh(105);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let expected = oracle.expected().unwrap();
        assert_eq!(expected.slot, 101);
    }
}
