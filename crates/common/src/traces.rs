use serde::{Deserialize, Serialize};

/// Timing profile of a builder submission, nanosecond unix timestamps per
/// stage. Persisted alongside the submission row.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SubmissionTrace {
    pub receive: u64,
    pub decode: u64,
    pub pre_checks: u64,
    pub signature: u64,
    pub simulation: u64,
    pub cache_update: u64,
    pub request_finish: u64,
    /// When the bid became servable via getHeader.
    pub eligible_at: u64,
    pub is_optimistic: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GetHeaderTrace {
    pub receive: u64,
    pub validation_complete: u64,
    pub best_bid_fetched: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GetPayloadTrace {
    pub receive: u64,
    pub proposer_index_validated: u64,
    pub signature_validated: u64,
    pub payload_fetched: u64,
    pub validation_complete: u64,
    pub beacon_client_broadcast: u64,
    pub on_deliver_payload: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterValidatorsTrace {
    pub receive: u64,
    pub registrations_complete: u64,
}
