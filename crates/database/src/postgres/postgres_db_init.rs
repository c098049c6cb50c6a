use deadpool_postgres::GenericClient;

use crate::error::DatabaseError;

/// Embedded schema, applied idempotently at startup.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS validator_registrations (
    public_key      BYTEA PRIMARY KEY,
    timestamp       BIGINT NOT NULL,
    registration    JSONB NOT NULL,
    inserted_at     BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS known_validators (
    public_key      BYTEA PRIMARY KEY,
    validator_index BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS known_validators_index_idx ON known_validators (validator_index);

CREATE TABLE IF NOT EXISTS proposer_duties (
    slot            BIGINT PRIMARY KEY,
    validator_index BIGINT NOT NULL,
    entry           JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS block_builders (
    public_key      BYTEA PRIMARY KEY,
    collateral      TEXT NOT NULL DEFAULT '0',
    is_high_prio    BOOLEAN NOT NULL DEFAULT FALSE,
    is_blacklisted  BOOLEAN NOT NULL DEFAULT FALSE,
    is_demoted      BOOLEAN NOT NULL DEFAULT FALSE,
    builder_id      TEXT,
    num_submissions BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS builder_demotions (
    slot                            BIGINT NOT NULL,
    builder_pubkey                  BYTEA NOT NULL,
    block_hash                      BYTEA NOT NULL,
    sim_error                       TEXT NOT NULL,
    submission                      JSONB NOT NULL,
    signed_beacon_block             JSONB,
    signed_validator_registration   JSONB,
    inserted_at                     BIGINT NOT NULL,
    PRIMARY KEY (slot, builder_pubkey, block_hash)
);

CREATE TABLE IF NOT EXISTS block_submissions (
    slot                  BIGINT NOT NULL,
    parent_hash           BYTEA NOT NULL,
    block_hash            BYTEA NOT NULL,
    builder_pubkey        BYTEA NOT NULL,
    proposer_pubkey       BYTEA NOT NULL,
    proposer_fee_recipient BYTEA NOT NULL,
    gas_limit             BIGINT NOT NULL,
    gas_used              BIGINT NOT NULL,
    value                 TEXT NOT NULL,
    block_number          BIGINT NOT NULL,
    num_txs               BIGINT NOT NULL,
    timestamp_ms          BIGINT NOT NULL,
    optimistic_submission BOOLEAN NOT NULL,
    simulation_ok         BOOLEAN,
    eligible_at           BIGINT NOT NULL,
    decode_ns             BIGINT NOT NULL,
    simulation_ns         BIGINT NOT NULL,
    cache_update_ns       BIGINT NOT NULL,
    total_ns              BIGINT NOT NULL,
    PRIMARY KEY (slot, builder_pubkey, block_hash)
);
CREATE INDEX IF NOT EXISTS block_submissions_block_hash_idx ON block_submissions (block_hash);
CREATE INDEX IF NOT EXISTS block_submissions_block_number_idx ON block_submissions (block_number);
CREATE INDEX IF NOT EXISTS block_submissions_builder_idx ON block_submissions (builder_pubkey);

CREATE TABLE IF NOT EXISTS delivered_payloads (
    slot                  BIGINT PRIMARY KEY,
    parent_hash           BYTEA NOT NULL,
    block_hash            BYTEA NOT NULL,
    builder_pubkey        BYTEA NOT NULL,
    proposer_pubkey       BYTEA NOT NULL,
    proposer_fee_recipient BYTEA NOT NULL,
    gas_limit             BIGINT NOT NULL,
    gas_used              BIGINT NOT NULL,
    value                 TEXT NOT NULL,
    block_number          BIGINT NOT NULL,
    num_txs               BIGINT NOT NULL,
    latency_trace         JSONB NOT NULL,
    inserted_at           BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS delivered_payloads_block_hash_idx ON delivered_payloads (block_hash);

CREATE TABLE IF NOT EXISTS get_header_calls (
    slot            BIGINT NOT NULL,
    parent_hash     BYTEA NOT NULL,
    proposer_pubkey BYTEA NOT NULL,
    best_block_hash BYTEA NOT NULL,
    latency_trace   JSONB NOT NULL,
    inserted_at     BIGINT NOT NULL
);
";

pub async fn init_schema(client: &impl GenericClient) -> Result<(), DatabaseError> {
    client.batch_execute(SCHEMA).await?;
    Ok(())
}
