use async_trait::async_trait;
use vela_common::simulator::BlockSimError;

use crate::builder::types::BlockSimRequest;

/// The external simulation backend, behind whatever queueing the
/// implementation applies. `Ok(())` means the block is valid (or equivalently
/// already known to the chain).
#[async_trait]
pub trait BlockSimulator: Send + Sync + Clone {
    async fn simulate(
        &self,
        request: BlockSimRequest,
        is_high_prio: bool,
    ) -> Result<(), BlockSimError>;
}
