use std::sync::Arc;

use ethereum_consensus::{builder::SignedValidatorRegistration, primitives::BlsPublicKey};
use serde::Deserialize;
use serde_json::value::RawValue;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};
use vela_common::{
    chain_info::ChainInfo, metrics::REGISTRATION_CHANNEL_DROPS,
    signing::verify_signed_builder_message, utils::utcnow_sec,
    SignedValidatorRegistrationEntry,
};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;

use crate::proposer::error::ProposerApiError;

const MAX_TIMESTAMP_AHEAD_SECS: u64 = 10;

/// The cheap-to-decode prefix of a registration; enough for the timestamp and
/// known-validator gates without touching the signature.
#[derive(Deserialize)]
struct RegistrationPeek {
    message: RegistrationMessagePeek,
}

#[derive(Deserialize)]
struct RegistrationMessagePeek {
    #[serde(rename = "pubkey")]
    public_key: BlsPublicKey,
    #[serde(with = "ethereum_consensus::serde::as_str")]
    timestamp: u64,
}

/// Fans validated registrations out to the active-validator set and the
/// durable upsert through bounded worker channels. Overflow drops the entry
/// with a warning; the HTTP path never blocks on persistence.
#[derive(Clone)]
pub struct RegistrationProcessor<A, DB>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    db: Arc<DB>,
    chain_info: Arc<ChainInfo>,
    active_tx: mpsc::Sender<BlsPublicKey>,
    persist_tx: mpsc::Sender<SignedValidatorRegistrationEntry>,
    _auctioneer: std::marker::PhantomData<A>,
}

impl<A, DB> RegistrationProcessor<A, DB>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    pub fn new(
        auctioneer: Arc<A>,
        db: Arc<DB>,
        chain_info: Arc<ChainInfo>,
        workers: usize,
        channel_size: usize,
    ) -> Self {
        let (active_tx, active_rx) = mpsc::channel::<BlsPublicKey>(channel_size);
        let (persist_tx, persist_rx) =
            mpsc::channel::<SignedValidatorRegistrationEntry>(channel_size);

        let active_rx = Arc::new(Mutex::new(active_rx));
        let persist_rx = Arc::new(Mutex::new(persist_rx));

        for _ in 0..workers {
            let auctioneer = auctioneer.clone();
            let active_rx = active_rx.clone();
            tokio::spawn(async move {
                loop {
                    let entry = active_rx.lock().await.recv().await;
                    match entry {
                        Some(pub_key) => {
                            if let Err(err) = auctioneer.save_active_validator(&pub_key).await {
                                error!(%err, "failed to save active validator");
                            }
                        }
                        None => break,
                    }
                }
            });

            let db = db.clone();
            let persist_rx = persist_rx.clone();
            tokio::spawn(async move {
                loop {
                    let entry = persist_rx.lock().await.recv().await;
                    match entry {
                        Some(entry) => {
                            if let Err(err) =
                                db.save_validator_registrations(vec![entry]).await
                            {
                                error!(%err, "failed to save validator registration");
                            }
                        }
                        None => break,
                    }
                }
            });
        }

        Self {
            db,
            chain_info,
            active_tx,
            persist_tx,
            _auctioneer: std::marker::PhantomData,
        }
    }

    /// Processes one registration batch. Returns the number of registrations
    /// enqueued for persistence. A malformed or invalid element stops the
    /// scan; entries already enqueued proceed regardless.
    pub async fn process_batch(&self, body: &[u8]) -> Result<usize, ProposerApiError> {
        // elements stay as raw slices until they pass the cheap gates
        let elements: Vec<&RawValue> = serde_json::from_slice(body)?;
        if elements.is_empty() {
            return Err(ProposerApiError::EmptyRequest);
        }

        let max_timestamp = utcnow_sec() + MAX_TIMESTAMP_AHEAD_SECS;
        let mut num_enqueued = 0;

        for raw in elements {
            let peek: RegistrationPeek = serde_json::from_str(raw.get())?;

            if peek.message.timestamp > max_timestamp {
                return Err(ProposerApiError::TimestampTooFarInTheFuture {
                    got: peek.message.timestamp,
                    max: max_timestamp,
                });
            }

            if !self.db.is_known_validator(&peek.message.public_key) {
                return Err(ProposerApiError::UnknownValidator);
            }

            if self.active_tx.try_send(peek.message.public_key.clone()).is_err() {
                REGISTRATION_CHANNEL_DROPS.with_label_values(&["active"]).inc();
                warn!("active-validator channel full, dropping entry");
            }

            // no-op if the stored registration is at least as fresh
            let stored = self.db.get_validator_registration(&peek.message.public_key).await?;
            if let Some(stored) = stored {
                if stored.timestamp() >= peek.message.timestamp {
                    debug!(
                        pub_key = ?peek.message.public_key,
                        "registration update not required"
                    );
                    continue;
                }
            }

            let mut registration: SignedValidatorRegistration =
                serde_json::from_str(raw.get())?;
            self.verify_registration_signature(&mut registration)?;

            let entry = SignedValidatorRegistrationEntry::new(registration);
            if self.persist_tx.try_send(entry).is_err() {
                REGISTRATION_CHANNEL_DROPS.with_label_values(&["persist"]).inc();
                warn!("registration-persist channel full, dropping entry");
                continue;
            }
            num_enqueued += 1;
        }

        Ok(num_enqueued)
    }

    fn verify_registration_signature(
        &self,
        registration: &mut SignedValidatorRegistration,
    ) -> Result<(), ProposerApiError> {
        let public_key = registration.message.public_key.clone();
        let signature = registration.signature.clone();
        verify_signed_builder_message(
            &mut registration.message,
            &signature,
            &public_key,
            &self.chain_info.context,
        )
        .map_err(|_| ProposerApiError::InvalidSignature)
    }
}
