use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use ethereum_consensus::primitives::BlsPublicKey;
use serde::Deserialize;
use tracing::info;
use vela_common::{builder_info::BuilderInfo, utils::u256_from_dec_str};
use vela_database::{types::BuilderInfoDocument, DatabaseService};
use vela_datastore::Auctioneer;

/// Operator-only builder administration: status bits and collateral. This is
/// the only place the demoted bit can be cleared.
#[derive(Clone)]
pub struct InternalApi<A, DB>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    pub auctioneer: Arc<A>,
    pub db: Arc<DB>,
}

#[derive(Debug, Deserialize)]
pub struct BuilderStatusParams {
    pub high_prio: Option<bool>,
    pub blacklisted: Option<bool>,
    pub demoted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BuilderCollateralParams {
    pub collateral_id: String,
    pub value: String,
}

impl<A, DB> InternalApi<A, DB>
where
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    pub fn new(auctioneer: Arc<A>, db: Arc<DB>) -> Self {
        Self { auctioneer, db }
    }

    pub async fn get_builder(
        Extension(api): Extension<Arc<InternalApi<A, DB>>>,
        Path(pubkey): Path<BlsPublicKey>,
    ) -> Result<impl IntoResponse, StatusCode> {
        match api.db.get_builder_info(&pubkey).await {
            Ok(Some(document)) => Ok(Json(document)),
            Ok(None) => Err(StatusCode::NOT_FOUND),
            Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub async fn update_builder_status(
        Extension(api): Extension<Arc<InternalApi<A, DB>>>,
        Path(pubkey): Path<BlsPublicKey>,
        Query(params): Query<BuilderStatusParams>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let mut builder_info = api
            .db
            .get_builder_info(&pubkey)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map(|document| document.builder_info)
            .unwrap_or_default();

        if let Some(high_prio) = params.high_prio {
            builder_info.is_high_prio = high_prio;
        }
        if let Some(blacklisted) = params.blacklisted {
            builder_info.is_blacklisted = blacklisted;
        }
        if let Some(demoted) = params.demoted {
            builder_info.is_demoted = demoted;
        }

        info!(
            builder = ?pubkey,
            high_prio = builder_info.is_high_prio,
            blacklisted = builder_info.is_blacklisted,
            demoted = builder_info.is_demoted,
            "updating builder status",
        );

        api.store_and_sync(&pubkey, builder_info).await?;
        Ok(StatusCode::OK)
    }

    pub async fn update_builder_collateral(
        Extension(api): Extension<Arc<InternalApi<A, DB>>>,
        Path(pubkey): Path<BlsPublicKey>,
        Query(params): Query<BuilderCollateralParams>,
    ) -> Result<impl IntoResponse, StatusCode> {
        let collateral = u256_from_dec_str(&params.value).ok_or(StatusCode::BAD_REQUEST)?;

        let mut builder_info = api
            .db
            .get_builder_info(&pubkey)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .map(|document| document.builder_info)
            .unwrap_or_default();

        builder_info.collateral = collateral;
        builder_info.builder_id = Some(params.collateral_id);

        info!(builder = ?pubkey, collateral = %collateral, "updating builder collateral");

        api.store_and_sync(&pubkey, builder_info).await?;
        Ok(StatusCode::OK)
    }

    async fn store_and_sync(
        &self,
        pubkey: &BlsPublicKey,
        builder_info: BuilderInfo,
    ) -> Result<(), StatusCode> {
        self.db
            .store_builder_info(pubkey, &builder_info)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        self.auctioneer
            .update_builder_infos(vec![BuilderInfoDocument {
                pub_key: pubkey.clone(),
                builder_info,
            }])
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Ok(())
    }
}
