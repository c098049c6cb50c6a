use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod};
use ethereum_consensus::{
    builder::SignedValidatorRegistration,
    primitives::{BlsPublicKey, Hash32},
};
use tokio_postgres::{types::ToSql, NoTls};
use tracing::info;
use vela_common::{
    api::{builder_api::BuilderGetValidatorsResponseEntry, data_api::BidFilters},
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBeaconBlock},
    utils::utcnow_ms,
    GetHeaderTrace, GetPayloadTrace, RelayConfig, SignedValidatorRegistrationEntry,
    SubmissionTrace, ValidatorSummary,
};

use crate::{
    error::DatabaseError,
    postgres::{
        postgres_db_init::init_schema,
        postgres_db_row_parsing::{parse_bytes_to_pubkey, parse_row_to_bid_trace},
    },
    types::{BidSubmissionDocument, BuilderInfoDocument, DeliveredPayloadDocument, DemotionDocument},
    DatabaseService,
};

pub const DEFAULT_LIMIT_DELIVERED: i64 = 200;
pub const DEFAULT_LIMIT_BIDS: i64 = 200;

#[derive(Clone)]
pub struct PostgresDatabaseService {
    validator_registration_cache: Arc<DashMap<BlsPublicKey, SignedValidatorRegistrationEntry>>,
    known_validators_cache: Arc<DashSet<BlsPublicKey>>,
    known_validators_by_index: Arc<DashMap<u64, BlsPublicKey>>,
    pool: Arc<Pool>,
}

impl PostgresDatabaseService {
    pub fn from_relay_config(config: &RelayConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mut cfg = Config::new();
        cfg.host = Some(config.postgres.hostname.clone());
        cfg.port = Some(config.postgres.port);
        cfg.dbname = Some(config.postgres.db_name.clone());
        cfg.user = Some(config.postgres.user.clone());
        cfg.password = Some(config.postgres.password.clone());
        cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
        let pool = cfg.create_pool(None, NoTls)?;

        Ok(PostgresDatabaseService {
            validator_registration_cache: Arc::new(DashMap::new()),
            known_validators_cache: Arc::new(DashSet::new()),
            known_validators_by_index: Arc::new(DashMap::new()),
            pool: Arc::new(pool),
        })
    }

    pub async fn init_schema(&self) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        init_schema(&*client).await
    }

    /// Warm the in-process known-validator set, once at startup.
    pub async fn load_known_validators(&self) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT public_key, validator_index FROM known_validators", &[])
            .await?;
        for row in rows {
            let public_key = parse_bytes_to_pubkey(row.get("public_key"))?;
            let index = row.get::<_, i64>("validator_index") as u64;
            self.known_validators_cache.insert(public_key.clone());
            self.known_validators_by_index.insert(index, public_key);
        }
        info!(num_known_validators = self.known_validators_cache.len(), "loaded known validators");
        Ok(())
    }

    fn filters_to_clauses(
        filters: &BidFilters,
        params: &mut Vec<Box<dyn ToSql + Send + Sync>>,
    ) -> Vec<String> {
        let mut clauses = Vec::new();

        if let Some(slot) = filters.slot {
            params.push(Box::new(slot as i64));
            clauses.push(format!("slot = ${}", params.len()));
        }
        if let Some(cursor) = filters.cursor {
            params.push(Box::new(cursor as i64));
            clauses.push(format!("slot <= ${}", params.len()));
        }
        if let Some(ref block_hash) = filters.block_hash {
            params.push(Box::new(block_hash.as_ref().to_vec()));
            clauses.push(format!("block_hash = ${}", params.len()));
        }
        if let Some(block_number) = filters.block_number {
            params.push(Box::new(block_number as i64));
            clauses.push(format!("block_number = ${}", params.len()));
        }
        if let Some(ref proposer) = filters.proposer_pubkey {
            params.push(Box::new(proposer.as_ref().to_vec()));
            clauses.push(format!("proposer_pubkey = ${}", params.len()));
        }
        if let Some(ref builder) = filters.builder_pubkey {
            params.push(Box::new(builder.as_ref().to_vec()));
            clauses.push(format!("builder_pubkey = ${}", params.len()));
        }

        clauses
    }
}

#[async_trait]
impl DatabaseService for PostgresDatabaseService {
    async fn save_validator_registrations(
        &self,
        entries: Vec<SignedValidatorRegistrationEntry>,
    ) -> Result<(), DatabaseError> {
        let mut client = self.pool.get().await?;

        for chunk in entries.chunks(1_000) {
            let transaction = client.transaction().await?;

            for entry in chunk {
                let registration = &entry.registration.message;
                let encoded = serde_json::to_value(&entry.registration)?;
                transaction
                    .execute(
                        "INSERT INTO validator_registrations
                            (public_key, timestamp, registration, inserted_at)
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT (public_key) DO UPDATE SET
                            timestamp = excluded.timestamp,
                            registration = excluded.registration,
                            inserted_at = excluded.inserted_at
                        WHERE validator_registrations.timestamp < excluded.timestamp",
                        &[
                            &registration.public_key.as_ref(),
                            &(registration.timestamp as i64),
                            &encoded,
                            &(entry.inserted_at as i64),
                        ],
                    )
                    .await?;
            }

            transaction.commit().await?;

            for entry in chunk {
                self.validator_registration_cache
                    .insert(entry.public_key().clone(), entry.clone());
            }
        }

        Ok(())
    }

    async fn is_registration_update_required(
        &self,
        registration: &SignedValidatorRegistration,
    ) -> Result<bool, DatabaseError> {
        if let Some(cached) =
            self.validator_registration_cache.get(&registration.message.public_key)
        {
            return Ok(cached.timestamp() < registration.message.timestamp);
        }

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT timestamp FROM validator_registrations WHERE public_key = $1",
                &[&registration.message.public_key.as_ref()],
            )
            .await?;

        match row {
            Some(row) => {
                Ok((row.get::<_, i64>("timestamp") as u64) < registration.message.timestamp)
            }
            None => Ok(true),
        }
    }

    async fn get_validator_registration(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistrationEntry>, DatabaseError> {
        if let Some(cached) = self.validator_registration_cache.get(pub_key) {
            return Ok(Some(cached.clone()));
        }

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT registration, inserted_at FROM validator_registrations
                WHERE public_key = $1",
                &[&pub_key.as_ref()],
            )
            .await?;

        match row {
            Some(row) => {
                let registration: SignedValidatorRegistration =
                    serde_json::from_value(row.get("registration"))?;
                Ok(Some(SignedValidatorRegistrationEntry {
                    registration,
                    inserted_at: row.get::<_, i64>("inserted_at") as u64,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_validator_registrations_for_pub_keys(
        &self,
        pub_keys: &[BlsPublicKey],
    ) -> Result<Vec<SignedValidatorRegistrationEntry>, DatabaseError> {
        let mut entries = Vec::with_capacity(pub_keys.len());
        for pub_key in pub_keys {
            if let Some(entry) = self.get_validator_registration(pub_key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn set_known_validators(
        &self,
        known_validators: Vec<ValidatorSummary>,
    ) -> Result<(), DatabaseError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        transaction.execute("DELETE FROM known_validators", &[]).await?;

        for chunk in known_validators.chunks(5_000) {
            let mut sql = String::from(
                "INSERT INTO known_validators (public_key, validator_index) VALUES ",
            );
            let mut params: Vec<Box<dyn ToSql + Send + Sync>> =
                Vec::with_capacity(chunk.len() * 2);

            for (i, summary) in chunk.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                params.push(Box::new(summary.validator.public_key.as_ref().to_vec()));
                params.push(Box::new(summary.index as i64));
                sql.push_str(&format!("(${}, ${})", params.len() - 1, params.len()));
            }
            sql.push_str(" ON CONFLICT (public_key) DO UPDATE SET validator_index = excluded.validator_index");

            let param_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
            transaction.execute(&sql, &param_refs[..]).await?;
        }

        transaction.commit().await?;

        self.known_validators_cache.clear();
        self.known_validators_by_index.clear();
        for summary in known_validators {
            self.known_validators_cache.insert(summary.validator.public_key.clone());
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
            .filter(|pub_key| self.known_validators_cache.contains(pub_key))
            .collect())
    }

    fn is_known_validator(&self, public_key: &BlsPublicKey) -> bool {
        self.known_validators_cache.contains(public_key)
    }

    fn known_validator_by_index(&self, index: u64) -> Option<BlsPublicKey> {
        self.known_validators_by_index.get(&index).map(|entry| entry.clone())
    }

    async fn set_proposer_duties(
        &self,
        proposer_duties: Vec<BuilderGetValidatorsResponseEntry>,
    ) -> Result<(), DatabaseError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        transaction.execute("DELETE FROM proposer_duties", &[]).await?;

        for duty in &proposer_duties {
            let entry = serde_json::to_value(&duty.entry)?;
            transaction
                .execute(
                    "INSERT INTO proposer_duties (slot, validator_index, entry)
                    VALUES ($1, $2, $3)",
                    &[&(duty.slot as i64), &(duty.validator_index as i64), &entry],
                )
                .await?;
        }

        transaction.commit().await?;
        Ok(())
    }

    async fn get_proposer_duties(
        &self,
    ) -> Result<Vec<BuilderGetValidatorsResponseEntry>, DatabaseError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT slot, validator_index, entry FROM proposer_duties ORDER BY slot", &[])
            .await?;

        let mut duties = Vec::with_capacity(rows.len());
        for row in rows {
            duties.push(BuilderGetValidatorsResponseEntry {
                slot: row.get::<_, i64>("slot") as u64,
                validator_index: row.get::<_, i64>("validator_index") as u64,
                entry: serde_json::from_value(row.get("entry"))?,
            });
        }
        Ok(duties)
    }

    async fn get_all_builder_infos(&self) -> Result<Vec<BuilderInfoDocument>, DatabaseError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT public_key, collateral, is_high_prio, is_blacklisted, is_demoted,
                    builder_id
                FROM block_builders",
                &[],
            )
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(BuilderInfoDocument {
                pub_key: parse_bytes_to_pubkey(row.get("public_key"))?,
                builder_info: BuilderInfo {
                    collateral: super::postgres_db_row_parsing::parse_text_to_u256(
                        row.get("collateral"),
                    )?,
                    is_high_prio: row.get("is_high_prio"),
                    is_blacklisted: row.get("is_blacklisted"),
                    is_demoted: row.get("is_demoted"),
                    builder_id: row.get("builder_id"),
                },
            });
        }
        Ok(documents)
    }

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<Option<BuilderInfoDocument>, DatabaseError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT public_key, collateral, is_high_prio, is_blacklisted, is_demoted,
                    builder_id
                FROM block_builders WHERE public_key = $1",
                &[&builder_pub_key.as_ref()],
            )
            .await?;

        match row {
            Some(row) => Ok(Some(BuilderInfoDocument {
                pub_key: parse_bytes_to_pubkey(row.get("public_key"))?,
                builder_info: BuilderInfo {
                    collateral: super::postgres_db_row_parsing::parse_text_to_u256(
                        row.get("collateral"),
                    )?,
                    is_high_prio: row.get("is_high_prio"),
                    is_blacklisted: row.get("is_blacklisted"),
                    is_demoted: row.get("is_demoted"),
                    builder_id: row.get("builder_id"),
                },
            })),
            None => Ok(None),
        }
    }

    async fn store_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
        builder_info: &BuilderInfo,
    ) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO block_builders
                    (public_key, collateral, is_high_prio, is_blacklisted, is_demoted, builder_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (public_key) DO UPDATE SET
                    collateral = excluded.collateral,
                    is_high_prio = excluded.is_high_prio,
                    is_blacklisted = excluded.is_blacklisted,
                    is_demoted = excluded.is_demoted,
                    builder_id = excluded.builder_id",
                &[
                    &builder_pub_key.as_ref(),
                    &builder_info.collateral.to_string(),
                    &builder_info.is_high_prio,
                    &builder_info.is_blacklisted,
                    &builder_info.is_demoted,
                    &builder_info.builder_id,
                ],
            )
            .await?;
        Ok(())
    }

    async fn db_demote_builder(
        &self,
        submission: &SignedBidSubmission,
        reason: String,
    ) -> Result<(), DatabaseError> {
        let trace = &submission.message;
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        transaction
            .execute(
                "UPDATE block_builders SET is_demoted = TRUE WHERE public_key = $1",
                &[&trace.builder_public_key.as_ref()],
            )
            .await?;

        let encoded = serde_json::to_value(submission)?;
        transaction
            .execute(
                "INSERT INTO builder_demotions
                    (slot, builder_pubkey, block_hash, sim_error, submission, inserted_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (slot, builder_pubkey, block_hash) DO NOTHING",
                &[
                    &(trace.slot as i64),
                    &trace.builder_public_key.as_ref(),
                    &trace.block_hash.as_ref(),
                    &reason,
                    &encoded,
                    &(utcnow_ms() as i64),
                ],
            )
            .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn get_builder_demotion(
        &self,
        bid_trace: &BidTrace,
    ) -> Result<Option<DemotionDocument>, DatabaseError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT slot, builder_pubkey, block_hash, sim_error, signed_beacon_block,
                    signed_validator_registration
                FROM builder_demotions
                WHERE slot = $1 AND builder_pubkey = $2 AND block_hash = $3",
                &[
                    &(bid_trace.slot as i64),
                    &bid_trace.builder_public_key.as_ref(),
                    &bid_trace.block_hash.as_ref(),
                ],
            )
            .await?;

        match row {
            Some(row) => Ok(Some(DemotionDocument {
                slot: row.get::<_, i64>("slot") as u64,
                builder_pub_key: parse_bytes_to_pubkey(row.get("builder_pubkey"))?,
                block_hash: Hash32::try_from(row.get::<_, &[u8]>("block_hash"))
                    .map_err(|err| DatabaseError::RowParsingError(format!("{err:?}")))?,
                sim_error: row.get("sim_error"),
                signed_beacon_block: row
                    .get::<_, Option<serde_json::Value>>("signed_beacon_block")
                    .map(serde_json::from_value)
                    .transpose()?,
                signed_validator_registration: row
                    .get::<_, Option<serde_json::Value>>("signed_validator_registration")
                    .map(serde_json::from_value)
                    .transpose()?,
            })),
            None => Ok(None),
        }
    }

    async fn update_builder_demotion(
        &self,
        bid_trace: &BidTrace,
        signed_beacon_block: &SignedBeaconBlock,
        registration: &SignedValidatorRegistration,
    ) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        let block = serde_json::to_value(signed_beacon_block)?;
        let registration = serde_json::to_value(registration)?;
        client
            .execute(
                "UPDATE builder_demotions SET
                    signed_beacon_block = $4,
                    signed_validator_registration = $5
                WHERE slot = $1 AND builder_pubkey = $2 AND block_hash = $3",
                &[
                    &(bid_trace.slot as i64),
                    &bid_trace.builder_public_key.as_ref(),
                    &bid_trace.block_hash.as_ref(),
                    &block,
                    &registration,
                ],
            )
            .await?;
        Ok(())
    }

    async fn store_block_submission(
        &self,
        submission: SignedBidSubmission,
        trace: SubmissionTrace,
    ) -> Result<(), DatabaseError> {
        let message = &submission.message;
        let payload = &submission.execution_payload;
        let mut client = self.pool.get().await?;

        // Submission row and builder counter move together.
        let transaction = client.transaction().await?;

        let simulation_ok: Option<bool> = if trace.is_optimistic { None } else { Some(true) };
        transaction
            .execute(
                "INSERT INTO block_submissions
                    (slot, parent_hash, block_hash, builder_pubkey, proposer_pubkey,
                     proposer_fee_recipient, gas_limit, gas_used, value, block_number, num_txs,
                     timestamp_ms, optimistic_submission, simulation_ok, eligible_at,
                     decode_ns, simulation_ns, cache_update_ns, total_ns)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                        $17, $18, $19)
                ON CONFLICT (slot, builder_pubkey, block_hash) DO NOTHING",
                &[
                    &(message.slot as i64),
                    &message.parent_hash.as_ref(),
                    &message.block_hash.as_ref(),
                    &message.builder_public_key.as_ref(),
                    &message.proposer_public_key.as_ref(),
                    &message.proposer_fee_recipient.as_ref(),
                    &(message.gas_limit as i64),
                    &(message.gas_used as i64),
                    &message.value.to_string(),
                    &(payload.block_number as i64),
                    &(payload.transactions.len() as i64),
                    &((trace.receive / 1_000_000) as i64),
                    &trace.is_optimistic,
                    &simulation_ok,
                    &(trace.eligible_at as i64),
                    &(trace.decode.saturating_sub(trace.receive) as i64),
                    &(trace.simulation.saturating_sub(trace.signature) as i64),
                    &(trace.cache_update.saturating_sub(trace.simulation) as i64),
                    &(trace.request_finish.saturating_sub(trace.receive) as i64),
                ],
            )
            .await?;

        transaction
            .execute(
                "INSERT INTO block_builders (public_key, num_submissions)
                VALUES ($1, 1)
                ON CONFLICT (public_key) DO UPDATE SET
                    num_submissions = block_builders.num_submissions + 1",
                &[&message.builder_public_key.as_ref()],
            )
            .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn save_delivered_payload(
        &self,
        bid_trace: &BidTrace,
        payload: Arc<ExecutionPayload>,
        latency_trace: &GetPayloadTrace,
    ) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        let trace = serde_json::to_value(latency_trace)?;
        client
            .execute(
                "INSERT INTO delivered_payloads
                    (slot, parent_hash, block_hash, builder_pubkey, proposer_pubkey,
                     proposer_fee_recipient, gas_limit, gas_used, value, block_number, num_txs,
                     latency_trace, inserted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (slot) DO NOTHING",
                &[
                    &(bid_trace.slot as i64),
                    &bid_trace.parent_hash.as_ref(),
                    &bid_trace.block_hash.as_ref(),
                    &bid_trace.builder_public_key.as_ref(),
                    &bid_trace.proposer_public_key.as_ref(),
                    &bid_trace.proposer_fee_recipient.as_ref(),
                    &(bid_trace.gas_limit as i64),
                    &(bid_trace.gas_used as i64),
                    &bid_trace.value.to_string(),
                    &(payload.block_number as i64),
                    &(payload.transactions.len() as i64),
                    &trace,
                    &(utcnow_ms() as i64),
                ],
            )
            .await?;
        Ok(())
    }

    async fn save_get_header_call(
        &self,
        slot: u64,
        parent_hash: Hash32,
        public_key: BlsPublicKey,
        best_block_hash: Hash32,
        trace: GetHeaderTrace,
    ) -> Result<(), DatabaseError> {
        let client = self.pool.get().await?;
        let trace = serde_json::to_value(&trace)?;
        client
            .execute(
                "INSERT INTO get_header_calls
                    (slot, parent_hash, proposer_pubkey, best_block_hash, latency_trace,
                     inserted_at)
                VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &(slot as i64),
                    &parent_hash.as_ref(),
                    &public_key.as_ref(),
                    &best_block_hash.as_ref(),
                    &trace,
                    &(utcnow_ms() as i64),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_bids(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<BidSubmissionDocument>, DatabaseError> {
        let mut params: Vec<Box<dyn ToSql + Send + Sync>> = Vec::new();
        let clauses = Self::filters_to_clauses(filters, &mut params);

        let mut sql = String::from(
            "SELECT slot, parent_hash, block_hash, builder_pubkey, proposer_pubkey,
                proposer_fee_recipient, gas_limit, gas_used, value, block_number, num_txs,
                timestamp_ms, optimistic_submission
            FROM block_submissions",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY slot DESC");
        let limit = filters.limit.map(|l| l as i64).unwrap_or(DEFAULT_LIMIT_BIDS);
        sql.push_str(&format!(" LIMIT {limit}"));

        let client = self.pool.get().await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        let rows = client.query(&sql, &param_refs[..]).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(BidSubmissionDocument {
                bid_trace: parse_row_to_bid_trace(&row)?,
                block_number: row.get::<_, i64>("block_number") as u64,
                num_txs: row.get::<_, i64>("num_txs") as usize,
                timestamp_ms: row.get::<_, i64>("timestamp_ms") as u64,
                optimistic_submission: row.get("optimistic_submission"),
            });
        }
        Ok(documents)
    }

    async fn get_delivered_payloads(
        &self,
        filters: &BidFilters,
    ) -> Result<Vec<DeliveredPayloadDocument>, DatabaseError> {
        let mut params: Vec<Box<dyn ToSql + Send + Sync>> = Vec::new();
        let clauses = Self::filters_to_clauses(filters, &mut params);

        let mut sql = String::from(
            "SELECT slot, parent_hash, block_hash, builder_pubkey, proposer_pubkey,
                proposer_fee_recipient, gas_limit, gas_used, value, block_number, num_txs
            FROM delivered_payloads",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        match filters.order_by {
            Some(1) => sql.push_str(" ORDER BY value ASC"),
            Some(-1) => sql.push_str(" ORDER BY value DESC"),
            _ => sql.push_str(" ORDER BY slot DESC"),
        }
        let limit = filters.limit.map(|l| l as i64).unwrap_or(DEFAULT_LIMIT_DELIVERED);
        sql.push_str(&format!(" LIMIT {limit}"));

        let client = self.pool.get().await?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        let rows = client.query(&sql, &param_refs[..]).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(DeliveredPayloadDocument {
                bid_trace: parse_row_to_bid_trace(&row)?,
                block_number: row.get::<_, i64>("block_number") as u64,
                num_txs: row.get::<_, i64>("num_txs") as usize,
            });
        }
        Ok(documents)
    }
}
