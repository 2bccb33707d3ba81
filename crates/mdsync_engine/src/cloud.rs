//! Replication status engine.

use crate::autosync::AutoSync;
use crate::config::{AutoSyncConfig, EngineConfig, RetryConfig};
use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::replication::{EventLevel, ReplicationEvent, ReplicationPort};
use crate::retry::RetryPolicy;
use chrono::Utc;
use mdsync_core::{AppContext, OperationKind, ReplicationConfig, SettingsStore, SyncStatus};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Appended to the status messages when an attempt succeeds.
pub const SUCCESS_MESSAGE: &str = "Success!";
/// Appended when a configure attempt fails.
pub const SETUP_FAILED_MESSAGE: &str = "Failed to Setup Sync!";
/// Appended when a sync attempt fails.
pub const SYNC_FAILED_MESSAGE: &str = "Failed to Sync!";
/// Error returned by sync while replication is not configured.
pub const NOT_ENABLED_MESSAGE: &str = "Git Sync is not enabled!";

/// Drives configure/sync against a replication backend and keeps the
/// shared [`SyncStatus`] and [`ReplicationConfig`] current.
pub struct CloudSyncEngine {
    ctx: Arc<AppContext>,
    coordinator: Arc<SyncCoordinator>,
    replication: Arc<dyn ReplicationPort>,
    retry: RetryPolicy,
    settings: Option<SettingsStore>,
    event_buffer: usize,
    flushers: Mutex<Vec<Flusher>>,
}

/// Asks a subscription task to append everything already queued.
type Flusher = mpsc::UnboundedSender<oneshot::Sender<()>>;

impl std::fmt::Debug for CloudSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSyncEngine")
            .field("retry", &self.retry)
            .field("settings", &self.settings)
            .field("event_buffer", &self.event_buffer)
            .finish_non_exhaustive()
    }
}

impl CloudSyncEngine {
    /// Creates an engine sharing the coordinator's context.
    pub fn new(coordinator: Arc<SyncCoordinator>, replication: Arc<dyn ReplicationPort>) -> Self {
        let config = EngineConfig::default();
        Self {
            ctx: Arc::clone(coordinator.context()),
            coordinator,
            replication,
            retry: RetryPolicy::new(config.replication_retry),
            settings: None,
            event_buffer: config.event_buffer,
            flushers: Mutex::new(Vec::new()),
        }
    }

    /// Applies the replication retry and event buffer settings of `config`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.retry = RetryPolicy::new(config.replication_retry);
        self.event_buffer = config.event_buffer;
        self
    }

    /// Sets the retry configuration for replication calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(retry);
        self
    }

    /// Persists replication settings to `store` after a successful configure.
    pub fn with_settings(mut self, store: SettingsStore) -> Self {
        self.settings = Some(store);
        self
    }

    /// Returns the current replication status.
    pub fn status(&self) -> SyncStatus {
        self.ctx.status()
    }

    /// Returns the current replication settings.
    pub fn config(&self) -> ReplicationConfig {
        self.ctx.replication()
    }

    /// Sets up replication against `repo_url`.
    ///
    /// On success the settings become `enabled` with provider `git`, are
    /// saved to the settings store if one is attached, and the document
    /// listing is reloaded. On failure `enabled` is left as it was.
    pub async fn configure(
        &self,
        repo_url: &str,
        user_name: &str,
        user_email: &str,
    ) -> SyncResult<()> {
        self.attempt(OperationKind::Configure, SETUP_FAILED_MESSAGE, async {
            if repo_url.trim().is_empty() {
                return Err(SyncError::validation("repository URL is empty"));
            }
            self.retry
                .run("configure", || {
                    self.replication.configure(repo_url, user_name, user_email)
                })
                .await?;

            let config = ReplicationConfig::git(repo_url, user_name, user_email);
            if let Some(store) = &self.settings {
                store.save(&config)?;
            }
            self.ctx.set_replication(config);
            info!(repo_url, "replication configured");
            Ok(())
        })
        .await
    }

    /// Runs one replication sync. Requires replication to be enabled.
    pub async fn sync(&self) -> SyncResult<()> {
        self.attempt(OperationKind::Sync, SYNC_FAILED_MESSAGE, async {
            if !self.ctx.replication().enabled {
                return Err(SyncError::validation(NOT_ENABLED_MESSAGE));
            }
            self.retry
                .run("sync", || self.replication.sync())
                .await?;
            info!("replication sync complete");
            Ok(())
        })
        .await
    }

    /// Starts appending replication events to the status messages.
    ///
    /// If the backend cannot open a stream, the failure is logged and an
    /// inactive subscription is returned.
    pub fn subscribe(&self) -> Subscription {
        match self.replication.subscribe(self.event_buffer) {
            Ok(rx) => {
                let (subscription, flusher) = Subscription::spawn(Arc::clone(&self.ctx), rx);
                let mut flushers = self.flushers.lock();
                flushers.retain(|f| !f.is_closed());
                flushers.push(flusher);
                subscription
            }
            Err(e) => {
                warn!(error = %e, "replication event subscription failed");
                Subscription::inactive()
            }
        }
    }

    /// Starts syncing after saves, debounced by `config`.
    ///
    /// Returns `None` when `config` is disabled. Dropping the returned
    /// handle stops the task.
    pub fn start_auto_sync(self: &Arc<Self>, config: AutoSyncConfig) -> Option<AutoSync> {
        if !config.enabled {
            return None;
        }
        let engine = Arc::clone(self);
        let auto = AutoSync::spawn(config, move || {
            let engine = Arc::clone(&engine);
            async move {
                if !engine.config().enabled {
                    debug!("replication disabled, skipping auto-sync");
                    return;
                }
                if let Err(e) = engine.sync().await {
                    warn!(error = %e, "auto-sync failed");
                }
            }
        });
        self.coordinator.set_save_listener(Some(auto.trigger()));
        Some(auto)
    }

    async fn attempt(
        &self,
        kind: OperationKind,
        failure_message: &str,
        operation: impl Future<Output = SyncResult<()>>,
    ) -> SyncResult<()> {
        let guard = self.ctx.operations().begin(kind);
        self.ctx.update_status(SyncStatus::begin_attempt);
        debug!(op = %kind, "replication attempt started");

        let result = operation.await;
        self.flush_events().await;
        match result {
            Ok(()) => {
                self.ctx
                    .update_status(|status| status.succeed(Utc::now(), SUCCESS_MESSAGE));
                drop(guard);
                if let Err(e) = self.coordinator.list_all().await {
                    warn!(error = %e, "document refresh after replication failed");
                }
                Ok(())
            }
            Err(e) => {
                error!(op = %kind, error = %e, "replication attempt failed");
                guard.fail(e.to_string());
                self.ctx.update_status(|status| status.fail(failure_message));
                Err(e)
            }
        }
    }

    /// Waits until every live subscription has appended the events already
    /// queued for it.
    async fn flush_events(&self) {
        let flushers: Vec<_> = {
            let mut flushers = self.flushers.lock();
            flushers.retain(|f| !f.is_closed());
            flushers.clone()
        };
        for flusher in flushers {
            let (done, flushed) = oneshot::channel();
            if flusher.send(done).is_ok() {
                // A subscription cancelled meanwhile drops `done`.
                let _ = flushed.await;
            }
        }
    }
}

/// Handle to a running event subscription.
///
/// Events are appended to the status messages until [`cancel`](Self::cancel)
/// is called or the handle is dropped. Messages already appended stay.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    ctx: Option<Arc<AppContext>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    fn spawn(ctx: Arc<AppContext>, mut rx: mpsc::Receiver<ReplicationEvent>) -> (Self, Flusher) {
        let active = Arc::new(AtomicBool::new(true));
        let (stop, mut stopped) = oneshot::channel::<()>();
        let (flusher, mut flush_requests) = mpsc::unbounded_channel::<oneshot::Sender<()>>();

        let task = {
            let ctx = Arc::clone(&ctx);
            let active = Arc::clone(&active);
            let appending = Arc::clone(&active);
            let append = move |event: ReplicationEvent| {
                log_event(&event);
                ctx.update_status(|status| {
                    if appending.load(Ordering::SeqCst) {
                        status.push(event.data.message);
                    }
                });
            };
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = &mut stopped => break,
                        Some(done) = flush_requests.recv() => {
                            while let Ok(event) = rx.try_recv() {
                                append(event);
                            }
                            let _ = done.send(());
                        }
                        event = rx.recv() => {
                            let Some(event) = event else { break };
                            append(event);
                        }
                    }
                }
                active.store(false, Ordering::SeqCst);
                debug!("replication event subscription ended");
            })
        };

        let subscription = Self {
            active,
            ctx: Some(ctx),
            stop: Some(stop),
            task: Some(task),
        };
        (subscription, flusher)
    }

    fn inactive() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            ctx: None,
            stop: None,
            task: None,
        }
    }

    /// Returns true while events are being appended.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops appending events. No message is appended after this returns.
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        // An append that saw the flag set holds the status lock; wait it out.
        if let Some(ctx) = self.ctx.take() {
            ctx.update_status(|_| ());
        }
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn log_event(event: &ReplicationEvent) {
    match event.typ {
        EventLevel::Debug => debug!(message = event.message(), "replication event"),
        EventLevel::Info => info!(message = event.message(), "replication event"),
        EventLevel::Error => error!(message = event.message(), "replication event"),
    }
}
