use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vela_common::simulator::BlockSimError;

use crate::builder::{simulator::traits::BlockSimulator, types::BlockSimRequest};

/// Scriptable simulator for pipeline tests.
#[derive(Clone, Default)]
pub struct MockSimulator {
    inner: Arc<Mutex<MockSimulatorState>>,
}

#[derive(Default)]
struct MockSimulatorState {
    result: Option<BlockSimError>,
    requests: Vec<BlockSimRequest>,
}

impl MockSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent simulation fail with the given error.
    pub fn fail_with(&self, err: BlockSimError) {
        self.inner.lock().unwrap().result = Some(err);
    }

    pub fn succeed(&self) {
        self.inner.lock().unwrap().result = None;
    }

    pub fn num_requests(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> Option<BlockSimRequest> {
        self.inner.lock().unwrap().requests.last().cloned()
    }
}

#[async_trait]
impl BlockSimulator for MockSimulator {
    async fn simulate(
        &self,
        request: BlockSimRequest,
        _is_high_prio: bool,
    ) -> Result<(), BlockSimError> {
        let mut state = self.inner.lock().unwrap();
        state.requests.push(request);
        match &state.result {
            Some(err) if err.is_already_known() => Ok(()),
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
