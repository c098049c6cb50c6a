use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::warn;
use vela_common::{metrics::SimulatorMetrics, simulator::BlockSimError};

use crate::builder::{
    simulator::{rpc_simulator::RpcSimulator, traits::BlockSimulator},
    types::BlockSimRequest,
};

struct QueuedRequest {
    request: BlockSimRequest,
    is_high_prio: bool,
    res_tx: oneshot::Sender<Result<(), BlockSimError>>,
}

/// Bounded-concurrency dispatcher in front of the simulator. Two FIFO queues;
/// high-priority requests always jump ahead of low-priority ones.
#[derive(Clone)]
pub struct SimulatorManager {
    high_tx: mpsc::UnboundedSender<QueuedRequest>,
    low_tx: mpsc::UnboundedSender<QueuedRequest>,
    high_depth: Arc<AtomicI64>,
    low_depth: Arc<AtomicI64>,
}

impl SimulatorManager {
    pub fn new(simulator: RpcSimulator, max_concurrent: usize) -> Self {
        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (low_tx, low_rx) = mpsc::unbounded_channel();
        let high_depth = Arc::new(AtomicI64::new(0));
        let low_depth = Arc::new(AtomicI64::new(0));

        tokio::spawn(run_dispatcher(
            simulator,
            max_concurrent,
            high_rx,
            low_rx,
            high_depth.clone(),
            low_depth.clone(),
        ));

        Self { high_tx, low_tx, high_depth, low_depth }
    }

    pub fn queue_depth(&self) -> (i64, i64) {
        (self.high_depth.load(Ordering::Relaxed), self.low_depth.load(Ordering::Relaxed))
    }
}

async fn run_dispatcher(
    simulator: RpcSimulator,
    max_concurrent: usize,
    mut high_rx: mpsc::UnboundedReceiver<QueuedRequest>,
    mut low_rx: mpsc::UnboundedReceiver<QueuedRequest>,
    high_depth: Arc<AtomicI64>,
    low_depth: Arc<AtomicI64>,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    loop {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let queued = tokio::select! {
            biased;
            request = high_rx.recv() => {
                match request {
                    Some(request) => {
                        high_depth.fetch_sub(1, Ordering::Relaxed);
                        SimulatorMetrics::queue_depth("high", high_depth.load(Ordering::Relaxed));
                        request
                    }
                    None => return,
                }
            }
            request = low_rx.recv() => {
                match request {
                    Some(request) => {
                        low_depth.fetch_sub(1, Ordering::Relaxed);
                        SimulatorMetrics::queue_depth("low", low_depth.load(Ordering::Relaxed));
                        request
                    }
                    None => return,
                }
            }
        };

        let simulator = simulator.clone();
        tokio::spawn(async move {
            let result = simulator.simulate(queued.request, queued.is_high_prio).await;
            let _ = queued.res_tx.send(result);
            drop(permit);
        });
    }
}

#[async_trait]
impl BlockSimulator for SimulatorManager {
    async fn simulate(
        &self,
        request: BlockSimRequest,
        is_high_prio: bool,
    ) -> Result<(), BlockSimError> {
        let (res_tx, res_rx) = oneshot::channel();
        let queued = QueuedRequest { request, is_high_prio, res_tx };

        let sent = if is_high_prio {
            self.high_depth.fetch_add(1, Ordering::Relaxed);
            SimulatorMetrics::queue_depth("high", self.high_depth.load(Ordering::Relaxed));
            self.high_tx.send(queued)
        } else {
            self.low_depth.fetch_add(1, Ordering::Relaxed);
            SimulatorMetrics::queue_depth("low", self.low_depth.load(Ordering::Relaxed));
            self.low_tx.send(queued)
        };

        if sent.is_err() {
            warn!("simulation dispatcher is gone");
            return Err(BlockSimError::SimulationDropped);
        }

        let result = res_rx.await.map_err(|_| BlockSimError::SimulationDropped)?;

        // An already-known block has, equivalently, been accepted.
        match result {
            Err(err) if err.is_already_known() => Ok(()),
            other => other,
        }
    }
}
