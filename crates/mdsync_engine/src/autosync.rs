//! Debounced sync after save.

use crate::config::AutoSyncConfig;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Sends sync requests to an [`AutoSync`] task.
#[derive(Debug, Clone)]
pub struct AutoSyncTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl AutoSyncTrigger {
    /// Asks for a sync. Requests arriving close together collapse into one.
    pub fn request(&self) {
        if self.tx.send(()).is_err() {
            debug!("auto-sync task stopped, request ignored");
        }
    }
}

/// Background task that runs a sync once saves have settled.
///
/// After the first request the task waits until `min_delay` has passed with
/// no further requests, but never longer than `max_wait` from that first
/// request. The task stops when this handle is dropped or shut down.
#[derive(Debug)]
pub struct AutoSync {
    trigger: AutoSyncTrigger,
    task: JoinHandle<()>,
}

impl AutoSync {
    /// Spawns the debounce task on the current runtime.
    ///
    /// `run` is awaited for each settled burst of requests.
    pub fn spawn<F, Fut>(config: AutoSyncConfig, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce(config, rx, run));
        Self {
            trigger: AutoSyncTrigger { tx },
            task,
        }
    }

    /// Returns a trigger feeding this task.
    pub fn trigger(&self) -> AutoSyncTrigger {
        self.trigger.clone()
    }

    /// Stops the task. A pending burst is dropped.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce<F, Fut>(config: AutoSyncConfig, mut rx: mpsc::UnboundedReceiver<()>, run: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    while rx.recv().await.is_some() {
        let first = Instant::now();
        let cap = first + config.max_wait;
        let mut deadline = (first + config.min_delay).min(cap);
        let mut closed = false;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                request = rx.recv() => match request {
                    Some(()) => deadline = (Instant::now() + config.min_delay).min(cap),
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        debug!(waited = ?first.elapsed(), "auto-sync firing");
        run().await;
        if closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting(config: AutoSyncConfig) -> (AutoSync, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let auto = AutoSync::spawn(config, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (auto, runs)
    }

    fn config() -> AutoSyncConfig {
        AutoSyncConfig::new()
            .with_min_delay(Duration::from_secs(10))
            .with_max_wait(Duration::from_secs(20))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_run() {
        let (auto, runs) = counting(config());
        let trigger = auto.trigger();

        for _ in 0..3 {
            trigger.request();
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_requests_fire_at_max_wait() {
        let (auto, runs) = counting(config());
        let trigger = auto.trigger();

        for _ in 0..10 {
            trigger.request();
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        // The quiet period never elapses, so only the cap fires.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_burst() {
        let (auto, runs) = counting(config());
        let trigger = auto.trigger();
        trigger.request();
        auto.shutdown();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        trigger.request();
    }
}
