//! Replication port, its event stream, and a scripted mock.

use async_trait::async_trait;
use mdsync_storage::{Hold, PortError, PortResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Severity of a replication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    /// Step-by-step detail.
    Debug,
    /// Progress.
    Info,
    /// A step failed.
    Error,
}

/// Payload of a replication event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// Human-readable text.
    pub message: String,
}

/// One event from the replication backend, `{data: {message}, typ}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEvent {
    /// Payload.
    pub data: EventData,
    /// Severity.
    pub typ: EventLevel,
}

impl ReplicationEvent {
    /// Creates an event.
    pub fn new(typ: EventLevel, message: impl Into<String>) -> Self {
        Self {
            data: EventData {
                message: message.into(),
            },
            typ,
        }
    }

    /// Creates a `DEBUG` event.
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Debug, message)
    }

    /// Creates an `INFO` event.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Info, message)
    }

    /// Creates an `ERROR` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventLevel::Error, message)
    }

    /// Returns the message text.
    pub fn message(&self) -> &str {
        &self.data.message
    }
}

/// A push/pull replication backend.
///
/// Calls follow the same response convention as the persistence port:
/// `retryable` rejections may be re-issued, anything else is final.
///
/// # Implementors
///
/// - [`MockReplication`] - Scripted responses for testing
/// - [`crate::GitReplication`] - `git` command line in the documents directory
#[async_trait]
pub trait ReplicationPort: Send + Sync {
    /// Sets up replication against `repo_url`.
    async fn configure(&self, repo_url: &str, user_name: &str, user_email: &str)
        -> PortResult<()>;

    /// Runs one sync cycle.
    async fn sync(&self) -> PortResult<()>;

    /// Opens an event stream holding at most `buffer` undelivered events.
    fn subscribe(&self, buffer: usize) -> PortResult<mpsc::Receiver<ReplicationEvent>>;
}

/// Fan-out of replication events to subscribers.
///
/// A subscriber whose queue is full misses the event; a subscriber whose
/// receiver is gone is dropped.
#[derive(Debug, Default)]
pub struct EventFeed {
    subscribers: RwLock<Vec<mpsc::Sender<ReplicationEvent>>>,
}

impl EventFeed {
    /// Creates a feed without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber.
    pub fn subscribe(&self, buffer: usize) -> mpsc::Receiver<ReplicationEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber.
    pub fn emit(&self, event: ReplicationEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(message = event.message(), "event queue full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// A replication backend with scripted responses.
///
/// Queued results are returned in order; once a queue is empty the call
/// succeeds.
#[derive(Debug, Default)]
pub struct MockReplication {
    configure_results: Mutex<VecDeque<PortResult<()>>>,
    sync_results: Mutex<VecDeque<PortResult<()>>>,
    configure_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    last_configure: Mutex<Option<(String, String, String)>>,
    subscribe_error: Mutex<Option<PortError>>,
    hold: Mutex<Option<Hold>>,
    scripted: Mutex<Vec<ReplicationEvent>>,
    feed: EventFeed,
}

impl MockReplication {
    /// Creates a mock that succeeds on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of a future `configure` call.
    pub fn push_configure(&self, result: PortResult<()>) {
        self.configure_results.lock().push_back(result);
    }

    /// Queues the result of a future `sync` call.
    pub fn push_sync(&self, result: PortResult<()>) {
        self.sync_results.lock().push_back(result);
    }

    /// Makes `subscribe` fail with `error`.
    pub fn fail_subscribe(&self, error: PortError) {
        *self.subscribe_error.lock() = Some(error);
    }

    /// Pauses the next configure or sync call until released.
    pub fn hold(&self) -> Hold {
        let hold = Hold::new();
        *self.hold.lock() = Some(hold.clone());
        hold
    }

    /// Emits `events` from inside the next configure or sync call, just
    /// before it returns.
    pub fn emit_during_next_call(&self, events: impl IntoIterator<Item = ReplicationEvent>) {
        self.scripted.lock().extend(events);
    }

    /// Sends an event to subscribers.
    pub fn emit(&self, event: ReplicationEvent) {
        self.feed.emit(event);
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Returns how many times `configure` was called.
    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times `sync` was called.
    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Returns the arguments of the latest `configure` call.
    pub fn last_configure(&self) -> Option<(String, String, String)> {
        self.last_configure.lock().clone()
    }

    async fn pause_if_held(&self) {
        let hold = self.hold.lock().take();
        if let Some(hold) = hold {
            hold.pause().await;
        }
        let scripted = std::mem::take(&mut *self.scripted.lock());
        for event in scripted {
            self.feed.emit(event);
        }
    }
}

#[async_trait]
impl ReplicationPort for MockReplication {
    async fn configure(
        &self,
        repo_url: &str,
        user_name: &str,
        user_email: &str,
    ) -> PortResult<()> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_configure.lock() = Some((
            repo_url.to_string(),
            user_name.to_string(),
            user_email.to_string(),
        ));
        self.pause_if_held().await;
        let result = self.configure_results.lock().pop_front();
        result.unwrap_or(Ok(()))
    }

    async fn sync(&self) -> PortResult<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.pause_if_held().await;
        let result = self.sync_results.lock().pop_front();
        result.unwrap_or(Ok(()))
    }

    fn subscribe(&self, buffer: usize) -> PortResult<mpsc::Receiver<ReplicationEvent>> {
        if let Some(error) = self.subscribe_error.lock().clone() {
            return Err(error);
        }
        Ok(self.feed.subscribe(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape() {
        let event = ReplicationEvent::info("Pushing changes");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["typ"], "INFO");
        assert_eq!(json["data"]["message"], "Pushing changes");

        let parsed: ReplicationEvent =
            serde_json::from_str(r#"{"data":{"message":"boom"},"typ":"ERROR"}"#).unwrap();
        assert_eq!(parsed, ReplicationEvent::error("boom"));
    }

    #[tokio::test]
    async fn feed_drops_closed_subscribers() {
        let feed = EventFeed::new();
        let mut live = feed.subscribe(4);
        let closed = feed.subscribe(4);
        drop(closed);

        feed.emit(ReplicationEvent::debug("step"));
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(live.recv().await.unwrap().message(), "step");
    }

    #[tokio::test]
    async fn full_queue_drops_event_but_keeps_subscriber() {
        let feed = EventFeed::new();
        let mut rx = feed.subscribe(1);

        feed.emit(ReplicationEvent::info("first"));
        feed.emit(ReplicationEvent::info("second"));

        assert_eq!(rx.recv().await.unwrap().message(), "first");
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn mock_returns_scripted_results_then_success() {
        let mock = MockReplication::new();
        mock.push_sync(Err(PortError::retry("busy")));

        assert!(mock.sync().await.unwrap_err().is_retryable());
        assert!(mock.sync().await.is_ok());
        assert_eq!(mock.sync_calls(), 2);
    }

    #[tokio::test]
    async fn mock_records_configure_arguments() {
        let mock = MockReplication::new();
        mock.configure("git@host:notes.git", "me", "me@host").await.unwrap();
        assert_eq!(
            mock.last_configure(),
            Some(("git@host:notes.git".into(), "me".into(), "me@host".into()))
        );
    }

    #[test]
    fn mock_subscribe_failure() {
        let mock = MockReplication::new();
        mock.fail_subscribe(PortError::unexpected("listener unavailable"));
        assert!(mock.subscribe(8).is_err());
    }
}
