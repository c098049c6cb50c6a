use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Config, CreatePoolError, Pool, Runtime};
use ethereum_consensus::primitives::{BlsPublicKey, Hash32};
use moka::sync::Cache;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::error;
use vela_common::{
    bid_submission::{BidTrace, SignedBidSubmission},
    builder_info::BuilderInfo,
    eth::{ExecutionPayload, SignedBuilderBid},
    metrics::TOP_BID_UPDATE_COUNT,
};
use vela_database::types::BuilderInfoDocument;

use crate::{
    error::AuctioneerError,
    redis::{
        error::RedisCacheError,
        utils::{
            get_best_bid_key, get_cache_bid_trace_key, get_execution_payload_key,
            get_latest_bid_received_at_key, get_latest_builder_bid_key,
        },
    },
    types::{select_top_bid, SignedBuilderBidWrapper},
    types::keys::{
        ACTIVE_VALIDATORS_KEY, BUILDER_INFO_KEY, KILL_SWITCH_KEY, LAST_HASH_DELIVERED_KEY,
        LAST_SLOT_DELIVERED_KEY, RELAY_PUBKEY_KEY,
    },
    Auctioneer,
};

/// Bid entries only matter for one slot; expire them well after that.
const BID_CACHE_EXPIRY_S: usize = 45;

/// Active-validator set, refreshed on every registration batch.
const ACTIVE_VALIDATORS_EXPIRY_S: usize = 3 * 24 * 60 * 60;

#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,

    last_delivered_slot: Arc<AtomicU64>,
    builder_info_cache: Cache<String, BuilderInfo>,
    execution_payload_cache: Cache<String, ExecutionPayload>,

    /// Per-(slot, parent, proposer) locks serialising top-bid recomputation.
    top_bid_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RedisCache {
    pub async fn new(
        conn_str: &str,
        builder_infos: Vec<BuilderInfoDocument>,
    ) -> Result<Self, CreatePoolError> {
        let cfg = Config::from_url(conn_str);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        let builder_info_cache =
            Cache::builder().time_to_live(Duration::from_secs(12)).max_capacity(10_000).build();
        let execution_payload_cache =
            Cache::builder().time_to_idle(Duration::from_secs(45)).max_capacity(10_000).build();

        let cache = Self {
            pool,
            last_delivered_slot: Arc::new(AtomicU64::new(0)),
            builder_info_cache,
            execution_payload_cache,
            top_bid_locks: Arc::new(DashMap::new()),
        };

        if let Err(err) = cache.update_builder_infos(builder_infos).await {
            error!(%err, "failed to initialise builder info");
        }

        Ok(cache)
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        match value {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &impl Serialize,
        expiry: Option<usize>,
    ) -> Result<(), RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let str_val = serde_json::to_string(value)?;

        match expiry {
            Some(expiry) => Ok(conn.set_ex(key, str_val, expiry).await?),
            None => Ok(conn.set(key, str_val).await?),
        }
    }

    async fn hget<T: DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>, RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<Vec<u8>> = conn.hget(key, field).await?;
        match value {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    async fn hset(
        &self,
        key: &str,
        field: &str,
        value: &impl Serialize,
        expiry: Option<usize>,
    ) -> Result<(), RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let str_val = serde_json::to_string(value)?;
        conn.hset::<_, _, _, ()>(key, field, str_val).await?;
        if let Some(expiry) = expiry {
            conn.expire::<_, ()>(key, expiry).await?;
        }
        Ok(())
    }

    async fn hgetall<V: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<V>, RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let entries: std::collections::HashMap<String, Vec<u8>> = conn.hgetall(key).await?;

        let mut deserialized = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            deserialized.push(serde_json::from_slice(&value)?);
        }
        Ok(deserialized)
    }

    async fn clear_key(&self, key: &str) -> Result<(), RedisCacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.del(key).await?)
    }

    /// SET NX, returning whether the value was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, RedisCacheError> {
        let mut conn = self.pool.get().await?;
        let was_set: bool = conn.set_nx(key, value).await?;
        Ok(was_set)
    }

    fn tuple_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.top_bid_locks.entry(key.to_string()).or_default().clone()
    }

    async fn get_last_hash_delivered(&self) -> Result<Option<Hash32>, RedisCacheError> {
        self.get(LAST_HASH_DELIVERED_KEY).await
    }

    /// Recomputes and publishes the tuple's best bid. Callers must hold the
    /// tuple lock.
    async fn update_top_bid_locked(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let latest_bids_key = get_latest_builder_bid_key(slot, parent_hash, proposer_pub_key);
        let entries: Vec<SignedBuilderBidWrapper> = self.hgetall(&latest_bids_key).await?;

        let best_bid_key = get_best_bid_key(slot, parent_hash, proposer_pub_key);
        match select_top_bid(&entries) {
            Some(top) => {
                self.set(&best_bid_key, &top.bid, Some(BID_CACHE_EXPIRY_S)).await?;
            }
            None => {
                self.clear_key(&best_bid_key).await?;
            }
        }

        TOP_BID_UPDATE_COUNT.inc();
        Ok(())
    }
}

#[async_trait]
impl Auctioneer for RedisCache {
    async fn get_last_slot_delivered(&self) -> Result<Option<u64>, AuctioneerError> {
        let last_slot_delivered = self.last_delivered_slot.load(Ordering::Relaxed);
        if last_slot_delivered > 0 {
            return Ok(Some(last_slot_delivered));
        }

        Ok(self.get(LAST_SLOT_DELIVERED_KEY).await?)
    }

    async fn check_and_set_last_slot_and_hash_delivered(
        &self,
        slot: u64,
        hash: &Hash32,
    ) -> Result<(), AuctioneerError> {
        if let Some(last_slot_delivered) = self.get_last_slot_delivered().await? {
            if slot < last_slot_delivered {
                return Err(AuctioneerError::PastSlotAlreadyDelivered);
            }

            if slot == last_slot_delivered {
                match self.get_last_hash_delivered().await? {
                    Some(last_hash_delivered) if *hash == last_hash_delivered => return Ok(()),
                    Some(_) => {
                        return Err(AuctioneerError::AnotherPayloadAlreadyDeliveredForSlot)
                    }
                    None => return Err(AuctioneerError::UnexpectedValueType),
                }
            }
        }

        self.last_delivered_slot.store(slot, Ordering::Relaxed);
        self.set(LAST_SLOT_DELIVERED_KEY, &slot, None).await?;
        self.set(LAST_HASH_DELIVERED_KEY, hash, None).await?;
        Ok(())
    }

    async fn get_best_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<SignedBuilderBid>, AuctioneerError> {
        let key = get_best_bid_key(slot, parent_hash, proposer_pub_key);
        Ok(self.get(&key).await?)
    }

    async fn save_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
        execution_payload: &ExecutionPayload,
    ) -> Result<(), AuctioneerError> {
        let key = get_execution_payload_key(slot, proposer_pub_key, block_hash);
        self.execution_payload_cache.insert(key.clone(), execution_payload.clone());
        self.set(&key, execution_payload, Some(BID_CACHE_EXPIRY_S)).await?;
        Ok(())
    }

    async fn get_execution_payload(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<ExecutionPayload>, AuctioneerError> {
        let key = get_execution_payload_key(slot, proposer_pub_key, block_hash);
        if let Some(cached) = self.execution_payload_cache.get(&key) {
            return Ok(Some(cached));
        }

        let payload: Option<ExecutionPayload> = self.get(&key).await?;
        if let Some(ref payload) = payload {
            self.execution_payload_cache.insert(key, payload.clone());
        }
        Ok(payload)
    }

    async fn save_bid_trace(&self, bid_trace: &BidTrace) -> Result<(), AuctioneerError> {
        let key = get_cache_bid_trace_key(
            bid_trace.slot,
            &bid_trace.proposer_public_key,
            &bid_trace.block_hash,
        );
        self.set(&key, bid_trace, Some(BID_CACHE_EXPIRY_S)).await?;
        Ok(())
    }

    async fn get_bid_trace(
        &self,
        slot: u64,
        proposer_pub_key: &BlsPublicKey,
        block_hash: &Hash32,
    ) -> Result<Option<BidTrace>, AuctioneerError> {
        let key = get_cache_bid_trace_key(slot, proposer_pub_key, block_hash);
        Ok(self.get(&key).await?)
    }

    async fn get_builder_latest_payload_received_at(
        &self,
        slot: u64,
        builder_pub_key: &BlsPublicKey,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<Option<u64>, AuctioneerError> {
        let key = get_latest_bid_received_at_key(slot, parent_hash, proposer_pub_key);
        Ok(self.hget(&key, &format!("{builder_pub_key:?}")).await?)
    }

    async fn save_bid_and_update_top_bid(
        &self,
        submission: &SignedBidSubmission,
        builder_bid: &SignedBuilderBid,
        received_at_ns: u64,
    ) -> Result<(), AuctioneerError> {
        let trace = &submission.message;
        let lock_key =
            get_best_bid_key(trace.slot, &trace.parent_hash, &trace.proposer_public_key);
        let lock = self.tuple_lock(&lock_key);
        let _guard = lock.lock().await;

        // Pre-write CAS: a later submission from this builder may have already
        // been written while this one was in the simulator.
        let stored_received_at = self
            .get_builder_latest_payload_received_at(
                trace.slot,
                &trace.builder_public_key,
                &trace.parent_hash,
                &trace.proposer_public_key,
            )
            .await?;
        if let Some(stored) = stored_received_at {
            if stored > received_at_ns {
                return Err(AuctioneerError::NewerPayloadAlreadyProcessed);
            }
        }

        // Ordered writes; all idempotent, no undo on later failure.
        self.save_bid_trace(trace).await?;

        self.save_execution_payload(
            trace.slot,
            &trace.proposer_public_key,
            &trace.block_hash,
            &submission.execution_payload,
        )
        .await?;

        let wrapper = SignedBuilderBidWrapper::new(
            builder_bid.clone(),
            trace.slot,
            trace.builder_public_key.clone(),
            received_at_ns,
        );

        let builder_field = format!("{:?}", trace.builder_public_key);
        let latest_bids_key =
            get_latest_builder_bid_key(trace.slot, &trace.parent_hash, &trace.proposer_public_key);
        self.hset(&latest_bids_key, &builder_field, &wrapper, Some(BID_CACHE_EXPIRY_S)).await?;

        let received_at_key = get_latest_bid_received_at_key(
            trace.slot,
            &trace.parent_hash,
            &trace.proposer_public_key,
        );
        self.hset(&received_at_key, &builder_field, &received_at_ns, Some(BID_CACHE_EXPIRY_S))
            .await?;

        self.update_top_bid_locked(trace.slot, &trace.parent_hash, &trace.proposer_public_key)
            .await
    }

    async fn update_top_bid(
        &self,
        slot: u64,
        parent_hash: &Hash32,
        proposer_pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let lock_key = get_best_bid_key(slot, parent_hash, proposer_pub_key);
        let lock = self.tuple_lock(&lock_key);
        let _guard = lock.lock().await;

        self.update_top_bid_locked(slot, parent_hash, proposer_pub_key).await
    }

    async fn get_builder_info(
        &self,
        builder_pub_key: &BlsPublicKey,
    ) -> Result<BuilderInfo, AuctioneerError> {
        let field = format!("{builder_pub_key:?}");
        if let Some(cached) = self.builder_info_cache.get(&field) {
            return Ok(cached);
        }

        let builder_info: BuilderInfo = self
            .hget(BUILDER_INFO_KEY, &field)
            .await?
            .ok_or(AuctioneerError::BuilderNotFound { pub_key: builder_pub_key.clone() })?;

        self.builder_info_cache.insert(field, builder_info.clone());
        Ok(builder_info)
    }

    async fn demote_builder(&self, builder_pub_key: &BlsPublicKey) -> Result<(), AuctioneerError> {
        let mut builder_info = self.get_builder_info(builder_pub_key).await?;
        if builder_info.is_demoted {
            return Ok(());
        }
        builder_info.is_demoted = true;

        let field = format!("{builder_pub_key:?}");
        self.builder_info_cache.insert(field.clone(), builder_info.clone());
        self.hset(BUILDER_INFO_KEY, &field, &builder_info, None).await?;
        Ok(())
    }

    async fn update_builder_infos(
        &self,
        builder_infos: Vec<BuilderInfoDocument>,
    ) -> Result<(), AuctioneerError> {
        for document in builder_infos {
            let field = format!("{:?}", document.pub_key);
            let changed = match self.hget::<BuilderInfo>(BUILDER_INFO_KEY, &field).await? {
                Some(stored) => stored != document.builder_info,
                None => true,
            };

            if changed {
                self.hset(BUILDER_INFO_KEY, &field, &document.builder_info, None).await?;
            }
            self.builder_info_cache.insert(field, document.builder_info);
        }

        Ok(())
    }

    async fn save_active_validator(
        &self,
        pub_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let mut conn = self.pool.get().await.map_err(RedisCacheError::from)?;
        conn.sadd::<_, _, ()>(ACTIVE_VALIDATORS_KEY, format!("{pub_key:?}"))
            .await
            .map_err(RedisCacheError::from)?;
        conn.expire::<_, ()>(ACTIVE_VALIDATORS_KEY, ACTIVE_VALIDATORS_EXPIRY_S)
            .await
            .map_err(RedisCacheError::from)?;
        Ok(())
    }

    async fn check_and_set_relay_pubkey(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<(), AuctioneerError> {
        let ours = format!("{public_key:?}");
        if self.set_if_absent(RELAY_PUBKEY_KEY, &ours).await? {
            return Ok(());
        }

        let stored: Option<String> = {
            let mut conn = self.pool.get().await.map_err(RedisCacheError::from)?;
            conn.get(RELAY_PUBKEY_KEY).await.map_err(RedisCacheError::from)?
        };

        match stored {
            Some(stored) if stored == ours => Ok(()),
            Some(stored) => Err(AuctioneerError::RelayPubkeyMismatch { stored, ours }),
            None => Err(AuctioneerError::UnexpectedValueType),
        }
    }

    async fn kill_switch_enabled(&self) -> Result<bool, AuctioneerError> {
        Ok(self.get(KILL_SWITCH_KEY).await?.unwrap_or(false))
    }

    async fn enable_kill_switch(&self) -> Result<(), AuctioneerError> {
        self.set(KILL_SWITCH_KEY, &true, None).await?;
        Ok(())
    }

    async fn disable_kill_switch(&self) -> Result<(), AuctioneerError> {
        self.set(KILL_SWITCH_KEY, &false, None).await?;
        Ok(())
    }
}
