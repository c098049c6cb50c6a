use std::{sync::Arc, time::Duration};

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use vela_beacon_client::{beacon_client::BeaconClient, multi_beacon_client::MultiBeaconClient};
use vela_common::{Route, RouterConfig};
use vela_database::postgres::PostgresDatabaseService;
use vela_datastore::redis::RedisCache;

use crate::{
    builder::{
        api::BuilderApi, decode::MAX_PAYLOAD_LENGTH, simulator::manager::SimulatorManager,
        PATH_BUILDER_API, PATH_GET_VALIDATORS, PATH_SUBMIT_BLOCK,
    },
    internal::{api::InternalApi, PATH_BUILDER_COLLATERAL, PATH_BUILDER_STATUS, PATH_INTERNAL_API},
    proposer::{
        api::ProposerApi, PATH_GET_HEADER, PATH_GET_PAYLOAD, PATH_PROPOSER_API,
        PATH_REGISTER_VALIDATORS, PATH_STATUS,
    },
    relay_data::{
        api::{BidsCache, DataApi, DeliveredPayloadsCache},
        PATH_BUILDER_BIDS_RECEIVED, PATH_DATA_API, PATH_PROPOSER_PAYLOAD_DELIVERED,
        PATH_VALIDATOR_REGISTRATION,
    },
};

pub(crate) const API_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

pub type BuilderApiProd = BuilderApi<
    RedisCache,
    PostgresDatabaseService,
    SimulatorManager,
    MultiBeaconClient<BeaconClient>,
>;

pub type ProposerApiProd =
    ProposerApi<RedisCache, PostgresDatabaseService, MultiBeaconClient<BeaconClient>>;

pub type DataApiProd = DataApi<PostgresDatabaseService>;

pub type InternalApiProd = InternalApi<RedisCache, PostgresDatabaseService>;

pub fn build_router(
    router_config: &mut RouterConfig,
    builder_api: Arc<BuilderApiProd>,
    proposer_api: Arc<ProposerApiProd>,
    data_api: Arc<DataApiProd>,
    internal_api: Arc<InternalApiProd>,
) -> Router {
    router_config.resolve_condensed_routes();

    let mut router = Router::new();

    for route in router_config.enabled_routes.iter() {
        match route {
            Route::GetValidators => {
                router = router.route(
                    &format!("{PATH_BUILDER_API}{PATH_GET_VALIDATORS}"),
                    get(BuilderApiProd::get_validators),
                );
            }
            Route::SubmitBlock => {
                router = router.route(
                    &format!("{PATH_BUILDER_API}{PATH_SUBMIT_BLOCK}"),
                    post(BuilderApiProd::submit_block),
                );
            }
            Route::Status => {
                router = router.route(
                    &format!("{PATH_PROPOSER_API}{PATH_STATUS}"),
                    get(ProposerApiProd::status),
                );
            }
            Route::RegisterValidators => {
                router = router.route(
                    &format!("{PATH_PROPOSER_API}{PATH_REGISTER_VALIDATORS}"),
                    post(ProposerApiProd::register_validators),
                );
            }
            Route::GetHeader => {
                router = router.route(
                    &format!("{PATH_PROPOSER_API}{PATH_GET_HEADER}"),
                    get(ProposerApiProd::get_header),
                );
            }
            Route::GetPayload => {
                router = router.route(
                    &format!("{PATH_PROPOSER_API}{PATH_GET_PAYLOAD}"),
                    post(ProposerApiProd::get_payload),
                );
            }
            Route::ProposerPayloadDelivered => {
                router = router.route(
                    &format!("{PATH_DATA_API}{PATH_PROPOSER_PAYLOAD_DELIVERED}"),
                    get(DataApiProd::proposer_payload_delivered),
                );
            }
            Route::BuilderBidsReceived => {
                router = router.route(
                    &format!("{PATH_DATA_API}{PATH_BUILDER_BIDS_RECEIVED}"),
                    get(DataApiProd::builder_bids_received),
                );
            }
            Route::ValidatorRegistration => {
                router = router.route(
                    &format!("{PATH_DATA_API}{PATH_VALIDATOR_REGISTRATION}"),
                    get(DataApiProd::validator_registration),
                );
            }
            Route::BuilderStatus => {
                router = router.route(
                    &format!("{PATH_INTERNAL_API}{PATH_BUILDER_STATUS}"),
                    get(InternalApiProd::get_builder)
                        .post(InternalApiProd::update_builder_status)
                        .put(InternalApiProd::update_builder_status),
                );
            }
            Route::BuilderCollateral => {
                router = router.route(
                    &format!("{PATH_INTERNAL_API}{PATH_BUILDER_COLLATERAL}"),
                    post(InternalApiProd::update_builder_collateral)
                        .put(InternalApiProd::update_builder_collateral),
                );
            }
            route => {
                panic!("condensed route was not resolved: {route:?}");
            }
        }
    }

    let bids_cache: Arc<BidsCache> =
        Arc::new(BidsCache::builder().time_to_live(Duration::from_secs(12)).build());
    let delivered_cache: Arc<DeliveredPayloadsCache> =
        Arc::new(DeliveredPayloadsCache::builder().time_to_live(Duration::from_secs(12)).build());

    router = router.layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_LENGTH));

    router = router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(|_: BoxError| async { StatusCode::REQUEST_TIMEOUT }))
            .layer(TimeoutLayer::new(API_REQUEST_TIMEOUT)),
    );

    router
        .layer(Extension(builder_api))
        .layer(Extension(proposer_api))
        .layer(Extension(data_api))
        .layer(Extension(internal_api))
        .layer(Extension(bids_cache))
        .layer(Extension(delivered_cache))
}
