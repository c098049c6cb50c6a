use ethereum_consensus::{primitives::Root, state_transition::Context};

use crate::{config::NetworkConfig, utils::utcnow_sec};

pub const SECONDS_PER_SLOT: u64 = 12;
pub const SLOTS_PER_EPOCH: u64 = 32;

pub const MAINNET_GENESIS_TIME: u64 = 1_606_824_023;

pub(crate) const MAINNET_GENESIS_VALIDATOR_ROOT: [u8; 32] = [
    75, 54, 61, 185, 78, 40, 97, 32, 215, 110, 185, 5, 52, 15, 221, 78, 84, 191, 233, 240, 107,
    243, 63, 246, 207, 90, 210, 127, 81, 27, 254, 149,
];

/// Runtime config with all chain specific information.
#[derive(Clone)]
pub struct ChainInfo {
    pub network: NetworkConfig,
    pub genesis_validators_root: Root,
    pub context: Context,
    pub genesis_time_in_secs: u64,
    pub seconds_per_slot: u64,
}

impl ChainInfo {
    pub fn for_mainnet() -> Self {
        Self {
            network: NetworkConfig::Mainnet,
            genesis_validators_root: Root::try_from(MAINNET_GENESIS_VALIDATOR_ROOT.as_slice())
                .expect("valid root"),
            context: Context::for_mainnet(),
            genesis_time_in_secs: MAINNET_GENESIS_TIME,
            seconds_per_slot: SECONDS_PER_SLOT,
        }
    }

    pub fn for_network(network: &NetworkConfig) -> Self {
        match network {
            NetworkConfig::Mainnet => Self::for_mainnet(),
            NetworkConfig::Sepolia => Self {
                network: NetworkConfig::Sepolia,
                context: Context::for_sepolia(),
                ..Self::for_mainnet()
            },
            NetworkConfig::Goerli => Self {
                network: NetworkConfig::Goerli,
                context: Context::for_goerli(),
                ..Self::for_mainnet()
            },
            NetworkConfig::Custom { genesis_time } => Self {
                network: network.clone(),
                genesis_time_in_secs: *genesis_time,
                ..Self::for_mainnet()
            },
        }
    }

    /// Current slot based on wall-clock time.
    pub fn current_slot(&self) -> u64 {
        utcnow_sec().saturating_sub(self.genesis_time_in_secs) / self.seconds_per_slot
    }

    pub fn slot_start_timestamp_in_secs(&self, slot: u64) -> u64 {
        self.genesis_time_in_secs + slot * self.seconds_per_slot
    }

    pub fn epoch_for_slot(&self, slot: u64) -> u64 {
        slot / SLOTS_PER_EPOCH
    }

    /// Position of the slot in its epoch, 0-31.
    pub fn slot_in_epoch(&self, slot: u64) -> u64 {
        slot % SLOTS_PER_EPOCH
    }
}

impl Default for ChainInfo {
    fn default() -> Self {
        Self::for_mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_timestamps_follow_genesis() {
        let info = ChainInfo::for_network(&NetworkConfig::Custom { genesis_time: 0 });
        assert_eq!(info.slot_start_timestamp_in_secs(101), 101 * 12);
        assert_eq!(info.epoch_for_slot(101), 3);
        assert_eq!(info.slot_in_epoch(101), 5);
    }
}
