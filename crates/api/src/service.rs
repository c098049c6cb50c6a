use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, sync::broadcast, time::sleep};
use tracing::{error, info};
use vela_beacon_client::{
    beacon_client::BeaconClient, multi_beacon_client::MultiBeaconClient,
    types::HeadEventData, MultiBeaconClientTrait,
};
use vela_common::{
    chain_info::ChainInfo, signing::RelaySigningContext, task::WaitGroup, RelayConfig,
};
use vela_database::{postgres::PostgresDatabaseService, DatabaseService};
use vela_datastore::{redis::RedisCache, Auctioneer};
use vela_housekeeper::{ChainEventUpdater, CurrentSlotInfo, Housekeeper, RandaoOracle};

use crate::{
    builder::{
        api::BuilderApi,
        simulator::{manager::SimulatorManager, optimistic_simulator::OptimisticSimulator,
            rpc_simulator::RpcSimulator},
    },
    internal::api::InternalApi,
    proposer::{api::ProposerApi, register::RegistrationProcessor},
    relay_data::api::DataApi,
    router::build_router,
};

/// Grace period between refusing new headers and draining getPayload calls.
const SHUTDOWN_HEADER_GRACE: Duration = Duration::from_secs(5);

pub struct ApiService;

impl ApiService {
    pub async fn run(mut config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
        let chain_info = Arc::new(ChainInfo::for_network(&config.network_config));
        let signing_context = Arc::new(RelaySigningContext::from_hex(&config.relay.secret_key)?);

        // Durable store first; the cache is seeded from it.
        let db = Arc::new(PostgresDatabaseService::from_relay_config(&config)?);
        db.init_schema().await?;
        db.load_known_validators().await?;

        let builder_infos = db.get_all_builder_infos().await?;
        let auctioneer = Arc::new(RedisCache::new(&config.redis.url, builder_infos).await?);

        // All horizontally-scaled instances must present the same signing key.
        auctioneer.check_and_set_relay_pubkey(signing_context.public_key()).await?;

        if config.beacon_clients.is_empty() {
            return Err("no beacon clients configured".into());
        }
        let beacon_clients = config
            .beacon_clients
            .iter()
            .map(|cfg| BeaconClient::from_endpoint_str(&cfg.url).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let multi_beacon_client = Arc::new(MultiBeaconClient::new(beacon_clients));

        let (head_event_tx, head_event_rx) = broadcast::channel::<HeadEventData>(100);
        multi_beacon_client.subscribe_to_head_events(head_event_tx.clone()).await;

        let curr_slot_info = CurrentSlotInfo::new();
        let randao_oracle = RandaoOracle::new(multi_beacon_client.clone());
        let optimistic_blocks = WaitGroup::new();

        // Housekeeper: beacon -> durable store.
        let housekeeper = Housekeeper::new(db.clone(), multi_beacon_client.clone(), chain_info.clone());
        let mut housekeeper_rx = head_event_tx.subscribe();
        tokio::spawn(async move {
            if let Err(err) = housekeeper.start(&mut housekeeper_rx).await {
                error!(%err, "housekeeper exited");
            }
        });

        // Chain event updater: per-slot fan-out into the shared state.
        let updater = ChainEventUpdater::new(
            db.clone(),
            auctioneer.clone(),
            chain_info.clone(),
            curr_slot_info.clone(),
            randao_oracle.clone(),
            optimistic_blocks.clone(),
        );
        tokio::spawn(updater.start(head_event_rx));

        let rpc_simulator = RpcSimulator::new(reqwest::Client::new(), config.simulator.url.clone());
        let manager = SimulatorManager::new(rpc_simulator, config.limits.max_concurrent_simulations);
        let simulator = OptimisticSimulator::new(
            manager,
            auctioneer.clone(),
            db.clone(),
            optimistic_blocks.clone(),
        );

        let relay_config = Arc::new(config.clone());

        let builder_api = Arc::new(BuilderApi::new(
            auctioneer.clone(),
            db.clone(),
            chain_info.clone(),
            signing_context.clone(),
            simulator,
            curr_slot_info.clone(),
            randao_oracle,
            relay_config.clone(),
        ));

        let registration_processor = RegistrationProcessor::new(
            auctioneer.clone(),
            db.clone(),
            chain_info.clone(),
            config.limits.registration_workers,
            config.limits.registration_channel_size,
        );

        let proposer_api = Arc::new(ProposerApi::new(
            auctioneer.clone(),
            db.clone(),
            multi_beacon_client,
            chain_info,
            curr_slot_info,
            registration_processor,
            relay_config,
            optimistic_blocks,
        ));

        let data_api = Arc::new(DataApi::new(db.clone()));
        let internal_api = Arc::new(InternalApi::new(auctioneer, db));

        let router = build_router(
            &mut config.router_config,
            builder_api,
            proposer_api.clone(),
            data_api,
            internal_api,
        );

        let bind_address = if config.bind_address.is_empty() {
            "0.0.0.0:4040".to_string()
        } else {
            config.bind_address.clone()
        };
        let listener = TcpListener::bind(&bind_address).await?;
        info!(%bind_address, "relay API listening");

        let no_more_headers = proposer_api.no_more_headers.clone();
        let payload_calls = proposer_api.payload_calls_in_flight.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received, refusing new headers");
                no_more_headers.store(true, std::sync::atomic::Ordering::Relaxed);
                sleep(SHUTDOWN_HEADER_GRACE).await;
                payload_calls.wait().await;
                info!("in-flight getPayload calls drained");
            })
            .await?;

        Ok(())
    }
}
