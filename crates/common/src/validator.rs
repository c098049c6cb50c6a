use ethereum_consensus::{builder::SignedValidatorRegistration, primitives::BlsPublicKey, serde::as_str};
use serde::{Deserialize, Serialize};

use crate::utils::utcnow_ms;

/// A validator as returned by the beacon node's state-validators endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidatorSummary {
    #[serde(with = "as_str")]
    pub index: u64,
    pub status: ValidatorStatus,
    pub validator: ValidatorInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidatorInfo {
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    PendingInitialized,
    PendingQueued,
    ActiveOngoing,
    ActiveExiting,
    ActiveSlashed,
    ExitedUnslashed,
    ExitedSlashed,
    WithdrawalPossible,
    WithdrawalDone,
}

impl ValidatorStatus {
    pub fn is_eligible(&self) -> bool {
        matches!(
            self,
            ValidatorStatus::PendingInitialized |
                ValidatorStatus::PendingQueued |
                ValidatorStatus::ActiveOngoing |
                ValidatorStatus::ActiveExiting
        )
    }
}

/// A stored registration with the relay's receive timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedValidatorRegistrationEntry {
    pub registration: SignedValidatorRegistration,
    pub inserted_at: u64,
}

impl SignedValidatorRegistrationEntry {
    pub fn new(registration: SignedValidatorRegistration) -> Self {
        Self { registration, inserted_at: utcnow_ms() }
    }

    pub fn public_key(&self) -> &BlsPublicKey {
        &self.registration.message.public_key
    }

    pub fn timestamp(&self) -> u64 {
        self.registration.message.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_eligibility() {
        assert!(ValidatorStatus::ActiveOngoing.is_eligible());
        assert!(!ValidatorStatus::ExitedSlashed.is_eligible());
    }

    #[test]
    fn status_serializes_snake_case() {
        let encoded = serde_json::to_string(&ValidatorStatus::ActiveOngoing).unwrap();
        assert_eq!(encoded, "\"active_ongoing\"");
    }
}
