use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, Response, StatusCode,
};
use serde_json::json;
use tracing::{debug, error};
use vela_common::{metrics::SimulatorMetrics, simulator::BlockSimError};

use crate::builder::types::BlockSimRequest;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct JsonRpcError {
    pub message: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct BlockSimRpcResponse {
    pub error: Option<JsonRpcError>,
}

/// Sends validation requests to the simulator's JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcSimulator {
    http: Client,
    pub endpoint: String,
}

impl RpcSimulator {
    pub fn new(http: Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    async fn send_rpc_request(
        &self,
        request: BlockSimRequest,
        is_high_prio: bool,
    ) -> Result<Response, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if is_high_prio {
            headers.insert("X-High-Priority", HeaderValue::from_static("true"));
        }

        let rpc_payload = json!({
            "jsonrpc": "2.0",
            "id": "1",
            "method": "flashbots_validateBuilderSubmissionV2",
            "params": [request]
        });

        self.http.post(&self.endpoint).headers(headers).json(&rpc_payload).send().await
    }

    async fn process_rpc_response(response: Response) -> Result<(), BlockSimError> {
        if response.status() != StatusCode::OK {
            return Err(BlockSimError::RpcError(response.status().to_string()));
        }

        match response.json::<BlockSimRpcResponse>().await {
            Ok(rpc_response) => {
                if let Some(error) = rpc_response.error {
                    return Err(BlockSimError::BlockValidationFailed(error.message));
                }
                Ok(())
            }
            Err(err) => Err(BlockSimError::RpcError(err.to_string())),
        }
    }

    pub async fn simulate(
        &self,
        request: BlockSimRequest,
        is_high_prio: bool,
    ) -> Result<(), BlockSimError> {
        debug!(
            slot = request.message.slot,
            block_hash = ?request.message.block_hash,
            builder = ?request.message.builder_public_key,
            "sending block validation request",
        );

        match self.send_rpc_request(request, is_high_prio).await {
            Ok(response) => {
                let result = Self::process_rpc_response(response).await;
                SimulatorMetrics::sim_status(result.is_ok());
                result
            }
            Err(err) => {
                error!(%err, "error sending block validation request");
                SimulatorMetrics::sim_status(false);
                Err(BlockSimError::RpcError(err.to_string()))
            }
        }
    }
}
