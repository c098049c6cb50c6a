use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{debug, error, warn};
use vela_common::{
    builder_info::BuilderInfo, metrics::SimulatorMetrics, simulator::BlockSimError,
    task::WaitGroup,
};
use vela_database::DatabaseService;
use vela_datastore::Auctioneer;

use crate::builder::{simulator::traits::BlockSimulator, types::BlockSimRequest};

/// Runs simulations synchronously or optimistically. Optimistic runs are
/// detached from the request, tracked by the optimistic barrier, and demote
/// the builder on a non-transient failure.
#[derive(Clone)]
pub struct OptimisticSimulator<S, A, DB>
where
    S: BlockSimulator + 'static,
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    simulator: S,
    auctioneer: Arc<A>,
    db: Arc<DB>,
    optimistic_blocks: WaitGroup,
    /// Circuit breaker: if a demotion write fails, stop accepting
    /// optimistically until an operator intervenes.
    failsafe_triggered: Arc<AtomicBool>,
}

impl<S, A, DB> OptimisticSimulator<S, A, DB>
where
    S: BlockSimulator + 'static,
    A: Auctioneer + 'static,
    DB: DatabaseService + 'static,
{
    pub fn new(simulator: S, auctioneer: Arc<A>, db: Arc<DB>, optimistic_blocks: WaitGroup) -> Self {
        Self {
            simulator,
            auctioneer,
            db,
            optimistic_blocks,
            failsafe_triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failsafe_triggered(&self) -> bool {
        self.failsafe_triggered.load(Ordering::Relaxed)
    }

    /// Returns `Ok(true)` when the request was accepted optimistically (the
    /// simulation continues in the background), `Ok(false)` when it passed a
    /// synchronous simulation.
    pub async fn process_request(
        &self,
        request: BlockSimRequest,
        builder_info: &BuilderInfo,
        can_be_optimistic: bool,
    ) -> Result<bool, BlockSimError> {
        if can_be_optimistic && !self.failsafe_triggered() {
            debug!(
                block_hash = ?request.message.block_hash,
                "optimistically processing submission"
            );

            let guard = self.optimistic_blocks.enter();
            let cloned = self.clone();
            let builder_info = builder_info.clone();
            tokio::spawn(async move {
                let _guard = guard;
                let _ = cloned.handle_simulation(request, &builder_info, true).await;
            });

            return Ok(true);
        }

        self.handle_simulation(request, builder_info, false).await.map(|_| false)
    }

    async fn handle_simulation(
        &self,
        request: BlockSimRequest,
        builder_info: &BuilderInfo,
        was_optimistic: bool,
    ) -> Result<(), BlockSimError> {
        if let Err(err) = self.simulator.simulate(request.clone(), builder_info.is_high_prio).await
        {
            if was_optimistic {
                if err.is_temporary() {
                    warn!(
                        builder = ?request.message.builder_public_key,
                        block_hash = ?request.message.block_hash,
                        %err,
                        "transient simulation failure on optimistic submission, not demoting",
                    );
                } else {
                    warn!(
                        builder = ?request.message.builder_public_key,
                        block_hash = ?request.message.block_hash,
                        %err,
                        "block simulation failed, demoting builder",
                    );
                    self.demote_builder_due_to_error(&request, err.to_string()).await;
                }
            }
            return Err(err);
        }

        Ok(())
    }

    /// Demotes in the auctioneer and in the durable demotion log. A failure of
    /// either write trips the failsafe.
    async fn demote_builder_due_to_error(&self, request: &BlockSimRequest, reason: String) {
        SimulatorMetrics::demotion_count();

        if let Err(err) = self.auctioneer.demote_builder(&request.message.builder_public_key).await
        {
            self.failsafe_triggered.store(true, Ordering::Relaxed);
            error!(
                builder = ?request.message.builder_public_key,
                %err,
                "failed to demote builder in auctioneer"
            );
        }

        if let Err(err) = self.db.db_demote_builder(&request.to_submission(), reason).await {
            self.failsafe_triggered.store(true, Ordering::Relaxed);
            error!(
                builder = ?request.message.builder_public_key,
                %err,
                "failed to demote builder in database"
            );
        }
    }
}
