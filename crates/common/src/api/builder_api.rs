use ethereum_consensus::{builder::SignedValidatorRegistration, serde::as_str};
use serde::{Deserialize, Serialize};

/// One entry of the duty map served via `GET /relay/v1/builder/validators` and
/// consumed by the submission pipeline's duty check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderGetValidatorsResponseEntry {
    #[serde(with = "as_str")]
    pub slot: u64,
    #[serde(with = "as_str")]
    pub validator_index: u64,
    pub entry: SignedValidatorRegistration,
}
