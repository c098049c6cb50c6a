use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tokio::{sync::Notify, task::JoinHandle};

use crate::metrics::TASK_COUNT;

/// Spawns a task counted per call site so runaway background work shows up in
/// the task gauge.
pub fn spawn<F>(file: &str, line: u32, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let label = format!("{file}:{line}");

    tokio::spawn(async move {
        let metric = TASK_COUNT.with_label_values(&[label.as_str()]);
        metric.inc();
        let result = future.await;
        metric.dec();
        result
    })
}

/// Counts in-flight work and lets other tasks wait for it to drain. Used for
/// outstanding optimistic simulations and for in-flight getPayload calls
/// during shutdown.
#[derive(Clone, Default)]
pub struct WaitGroup {
    inner: Arc<WaitGroupInner>,
}

#[derive(Default)]
struct WaitGroupInner {
    count: AtomicU64,
    notify: Notify,
}

pub struct WaitGroupGuard {
    inner: Arc<WaitGroupInner>,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> WaitGroupGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        WaitGroupGuard { inner: self.inner.clone() }
    }

    pub fn in_flight(&self) -> u64 {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolves once nothing is in flight.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for WaitGroupGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_when_empty() {
        let wg = WaitGroup::new();
        wg.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_guards_drop() {
        let wg = WaitGroup::new();
        let guard = wg.enter();
        assert_eq!(wg.in_flight(), 1);

        let waiter = {
            let wg = wg.clone();
            tokio::spawn(async move {
                wg.wait().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(wg.in_flight(), 0);
    }
}
