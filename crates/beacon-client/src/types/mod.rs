use std::fmt;

use ethereum_consensus::{primitives::{BlsPublicKey, Bytes32, Hash32, Root}, serde::as_str};
use serde::{Deserialize, Serialize};

/// Standard beacon API envelope: either `{data: ...}` or an error body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResult<T> {
    Ok(T),
    Err(ApiError),
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("beacon api error {code}: {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BeaconResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(with = "as_str")]
    pub head_slot: u64,
    #[serde(with = "as_str")]
    pub sync_distance: u64,
    pub is_syncing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadEventData {
    #[serde(with = "as_str")]
    pub slot: u64,
    pub block: Hash32,
    pub state: Root,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerDuty {
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
    #[serde(with = "as_str")]
    pub validator_index: u64,
    #[serde(with = "as_str")]
    pub slot: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposerDutiesResponse {
    pub dependent_root: Root,
    pub data: Vec<ProposerDuty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandaoResponse {
    pub randao: Bytes32,
}

#[derive(Debug, Clone, Copy)]
pub enum StateId {
    Head,
    Slot(u64),
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Head => write!(f, "head"),
            StateId::Slot(slot) => write!(f, "{slot}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BroadcastValidation {
    Gossip,
    Consensus,
    ConsensusAndEquivocation,
}

impl fmt::Display for BroadcastValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastValidation::Gossip => write!(f, "gossip"),
            BroadcastValidation::Consensus => write!(f, "consensus"),
            BroadcastValidation::ConsensusAndEquivocation => {
                write!(f, "consensus_and_equivocation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_event_decodes_from_beacon_json() {
        let json = r#"{"slot":"101","block":"0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb","state":"0xcccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc"}"#;
        let event: HeadEventData = serde_json::from_str(json).unwrap();
        assert_eq!(event.slot, 101);
    }

    #[test]
    fn state_id_renders_paths() {
        assert_eq!(StateId::Head.to_string(), "head");
        assert_eq!(StateId::Slot(100).to_string(), "100");
    }
}
