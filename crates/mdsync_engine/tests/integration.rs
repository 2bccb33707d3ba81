//! Integration tests for the coordinator and the cloud engine.

use mdsync_core::{AppContext, OperationKind};
use mdsync_engine::{
    AutoSyncConfig, CancelToken, CloudSyncEngine, ErrorKind, MockReplication, ReplicationEvent,
    RetryConfig, SyncCoordinator, SyncError, SyncResult, SUCCESS_MESSAGE, SYNC_FAILED_MESSAGE,
};
use mdsync_storage::{InMemoryPersistence, PortError, PortOp};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const ROOT: &str = "/home/.mediocre";

struct Harness {
    backend: Arc<InMemoryPersistence>,
    coordinator: Arc<SyncCoordinator>,
    replication: Arc<MockReplication>,
    engine: Arc<CloudSyncEngine>,
}

impl Harness {
    fn new() -> Self {
        Self::with_retry(RetryConfig::new(3))
    }

    fn with_retry(retry: RetryConfig) -> Self {
        let backend = Arc::new(InMemoryPersistence::new(ROOT));
        let coordinator = Arc::new(
            SyncCoordinator::new(Arc::new(AppContext::new()), backend.clone()).with_retry(retry),
        );
        let replication = Arc::new(MockReplication::new());
        let engine = Arc::new(
            CloudSyncEngine::new(coordinator.clone(), replication.clone())
                .with_retry(RetryConfig::new(3)),
        );
        Self {
            backend,
            coordinator,
            replication,
            engine,
        }
    }

    fn ctx(&self) -> &Arc<AppContext> {
        self.coordinator.context()
    }
}

fn id(relative_path: &str) -> String {
    format!("{ROOT}/{relative_path}")
}

async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    assert!(done(), "condition not reached");
}

/// Holds `op` with a queued rejection and checks `kind` is busy exactly
/// while the dispatch is pending.
async fn assert_busy_until_rejected<F, Fut, T>(h: &Harness, op: PortOp, kind: OperationKind, run: F)
where
    F: FnOnce(Arc<SyncCoordinator>) -> Fut,
    Fut: Future<Output = SyncResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let hold = h.backend.hold(op);
    h.backend.fail_next(op, PortError::rejected("disk unavailable"));
    assert!(!h.ctx().is_busy(kind), "{kind} busy before dispatch");

    let task = tokio::spawn(run(h.coordinator.clone()));
    hold.entered().await;
    assert!(h.ctx().is_busy(kind), "{kind} idle while pending");
    hold.release();

    assert!(task.await.unwrap().is_err());
    assert!(!h.ctx().is_busy(kind), "{kind} busy after settling");
    assert_eq!(h.ctx().last_error(kind).as_deref(), Some("disk unavailable"));
}

fn assert_consistent(h: &Harness, relative_path: &str) {
    let doc = h.ctx().document(&id(relative_path)).unwrap();
    assert!(doc.saved && doc.synced);
    assert_eq!(h.backend.content(relative_path).unwrap(), doc.content);
    assert_eq!(h.ctx().editor_buffer(), doc.content);
}

#[tokio::test]
async fn add_creates_opens_and_selects() {
    let h = Harness::new();

    let doc = h.coordinator.add("notes.md").await.unwrap();

    let docs = h.ctx().documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(doc.id, "/home/.mediocre/notes.md");
    assert_eq!(doc.content, "");
    assert!(doc.synced);
    assert_eq!(h.ctx().selected_id().as_deref(), Some("/home/.mediocre/notes.md"));
    assert_consistent(&h, "notes.md");
}

#[tokio::test]
async fn failed_add_keeps_selection() {
    let h = Harness::new();
    h.backend.insert("a.md", "A");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();

    h.backend
        .fail_next(PortOp::FetchOne, PortError::rejected("metadata unavailable"));
    let err = h.coordinator.add("b.md").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(h.ctx().selected_id(), Some(id("a.md")));
    assert_eq!(
        h.ctx().last_error(OperationKind::Add).as_deref(),
        Some("metadata unavailable")
    );
}

#[tokio::test]
async fn save_keeps_buffer_cache_and_backend_equal() {
    let h = Harness::new();
    h.backend.insert("a.md", "old");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();
    assert_consistent(&h, "a.md");

    h.coordinator.mark_edited("new text");
    assert!(!h.coordinator.selected().unwrap().saved);

    h.coordinator.save().await.unwrap();
    assert_consistent(&h, "a.md");
    assert_eq!(h.backend.content("a.md").as_deref(), Some("new text"));
}

#[tokio::test]
async fn save_conflict_writes_nothing() {
    let h = Harness::new();
    h.backend.insert("a.md", "first draft");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();

    h.backend.insert("a.md", "changed elsewhere");
    h.coordinator.mark_edited("my edit");
    let writes_before = h.backend.calls(PortOp::Write);

    let err = h.coordinator.save().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err
        .to_string()
        .starts_with("Content on file system is changed!"));

    assert_eq!(h.backend.calls(PortOp::Write), writes_before);
    assert_eq!(h.backend.content("a.md").as_deref(), Some("changed elsewhere"));
    let doc = h.coordinator.selected().unwrap();
    assert_eq!(doc.content, "first draft");
    assert!(!doc.saved);
    assert_eq!(h.ctx().editor_buffer(), "my edit");
}

#[tokio::test]
async fn retry_k_times_then_success_makes_k_plus_one_calls() {
    let h = Harness::with_retry(RetryConfig::new(5));
    h.backend.insert("a.md", "");
    h.backend
        .fail_times(PortOp::ListAll, PortError::retry("FileSystem sync in progress"), 3);

    let docs = h.coordinator.list_all().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(h.backend.calls(PortOp::ListAll), 4);
}

#[tokio::test]
async fn always_retry_exhausts_after_n_calls() {
    let h = Harness::with_retry(RetryConfig::new(4));
    h.backend
        .fail_times(PortOp::ListAll, PortError::retry("Sync is already in progress"), 100);

    let err = h.coordinator.list_all().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exhausted);
    assert_eq!(h.backend.calls(PortOp::ListAll), 4);
    assert!(h
        .ctx()
        .last_error(OperationKind::ListAll)
        .unwrap()
        .starts_with("maxRetries exceeded!"));
}

#[tokio::test]
async fn busy_flag_spans_dispatch_to_settlement() {
    let h = Harness::new();
    h.backend.insert("a.md", "");

    // Fulfilled path.
    let hold = h.backend.hold(PortOp::ListAll);
    assert!(!h.ctx().is_busy(OperationKind::ListAll));
    let task = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.list_all().await })
    };
    hold.entered().await;
    assert!(h.ctx().is_busy(OperationKind::ListAll));
    hold.release();
    task.await.unwrap().unwrap();
    assert!(!h.ctx().is_busy(OperationKind::ListAll));

    // Rejected path.
    let hold = h.backend.hold(PortOp::ListAll);
    h.backend
        .fail_next(PortOp::ListAll, PortError::rejected("permission denied"));
    let task = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.list_all().await })
    };
    hold.entered().await;
    assert!(h.ctx().is_busy(OperationKind::ListAll));
    hold.release();
    assert!(task.await.unwrap().is_err());
    assert!(!h.ctx().is_busy(OperationKind::ListAll));
    assert_eq!(
        h.ctx().last_error(OperationKind::ListAll).as_deref(),
        Some("permission denied")
    );
}

#[tokio::test]
async fn cancelled_listing_discards_result() {
    let h = Harness::new();
    h.backend.insert("a.md", "");
    h.coordinator.list_all().await.unwrap();
    h.backend.insert("b.md", "");

    let hold = h.backend.hold(PortOp::ListAll);
    let token = CancelToken::new();
    let task = {
        let coordinator = h.coordinator.clone();
        let token = token.clone();
        tokio::spawn(async move { coordinator.list_all_with(&token).await })
    };
    hold.entered().await;
    token.cancel();
    hold.release();

    assert!(matches!(task.await.unwrap(), Err(SyncError::Cancelled)));
    assert_eq!(h.ctx().documents().len(), 1);
}

#[tokio::test]
async fn deleting_selected_clears_selection() {
    let h = Harness::new();
    h.backend.insert("a.md", "A");
    h.backend.insert("b.md", "B");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();

    h.coordinator.delete(&id("a.md")).await.unwrap();

    assert!(h.ctx().selected_id().is_none());
    assert!(h.ctx().document(&id("a.md")).is_none());
    assert_eq!(h.ctx().editor_buffer(), "");
    assert_eq!(h.ctx().documents().len(), 1);
}

#[tokio::test]
async fn delete_unknown_is_not_found() {
    let h = Harness::new();
    let err = h.coordinator.delete(&id("ghost.md")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.backend.calls(PortOp::Remove), 0);
}

#[tokio::test]
async fn rename_replaces_entry() {
    let h = Harness::new();
    h.backend.insert("A.md", "body");
    h.coordinator.list_all().await.unwrap();

    h.coordinator.rename(&id("A.md"), "new.md").await.unwrap();

    let docs = h.ctx().documents();
    assert!(h.ctx().document(&id("A.md")).is_none());
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].relative_path, "new.md");
    assert_eq!(h.backend.calls(PortOp::ListAll), 2);
}

#[tokio::test]
async fn configure_auth_failure_leaves_disabled() {
    let h = Harness::new();
    h.replication
        .push_configure(Err(PortError::rejected("auth failed")));

    let err = h
        .engine
        .configure("git@host:notes.git", "me", "me@host")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert!(!h.engine.config().enabled);
    let status = h.engine.status();
    assert!(!status.is_syncing);
    assert!(status.last_sync.is_none());
    assert!(h
        .ctx()
        .last_error(OperationKind::Configure)
        .unwrap()
        .contains("auth failed"));
    assert_eq!(h.replication.configure_calls(), 1);
}

#[tokio::test]
async fn successful_configure_refreshes_listing() {
    let h = Harness::new();
    h.backend.insert("pulled.md", "from remote");

    h.engine.configure("url", "me", "me@host").await.unwrap();

    assert!(h.engine.config().enabled);
    assert_eq!(h.ctx().documents().len(), 1);
    assert!(!h.ctx().is_busy(OperationKind::Configure));
}

#[tokio::test]
async fn messages_reset_at_each_attempt_start() {
    let h = Harness::new();
    let _subscription = h.engine.subscribe();

    let hold = h.replication.hold();
    let task = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.configure("url", "me", "me@host").await })
    };
    hold.entered().await;
    assert!(h.engine.status().is_syncing);
    assert!(h.ctx().is_busy(OperationKind::Configure));
    assert!(h.engine.status().messages.is_empty());

    h.replication.emit(ReplicationEvent::info("Pushing to remote"));
    settle(|| h.engine.status().messages.len() == 1).await;
    hold.release();
    task.await.unwrap().unwrap();
    assert_eq!(
        h.engine.status().messages,
        vec!["Pushing to remote", SUCCESS_MESSAGE]
    );

    let hold = h.replication.hold();
    let task = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.sync().await })
    };
    hold.entered().await;
    assert!(h.engine.status().messages.is_empty());
    hold.release();
    task.await.unwrap().unwrap();
    assert_eq!(h.engine.status().messages, vec![SUCCESS_MESSAGE]);
}

#[tokio::test]
async fn cancelled_subscription_stops_appending() {
    let h = Harness::new();
    let mut subscription = h.engine.subscribe();
    assert!(subscription.is_active());

    h.replication.emit(ReplicationEvent::debug("git add -A"));
    settle(|| h.engine.status().messages.len() == 1).await;

    subscription.cancel();
    assert!(!subscription.is_active());
    h.replication.emit(ReplicationEvent::error("late"));
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.engine.status().messages, vec!["git add -A"]);
}

#[tokio::test(start_paused = true)]
async fn save_schedules_debounced_sync() {
    let h = Harness::new();
    h.engine.configure("url", "me", "me@host").await.unwrap();
    let _auto = h
        .engine
        .start_auto_sync(
            AutoSyncConfig::new()
                .with_min_delay(Duration::from_secs(10))
                .with_max_wait(Duration::from_secs(20)),
        )
        .unwrap();

    h.backend.insert("a.md", "");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();
    h.coordinator.mark_edited("one");
    h.coordinator.save().await.unwrap();
    h.coordinator.mark_edited("two");
    h.coordinator.save().await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.replication.sync_calls(), 0);
    tokio::time::sleep(Duration::from_secs(6)).await;
    settle(|| h.replication.sync_calls() == 1).await;
    assert_eq!(h.engine.status().messages, vec![SUCCESS_MESSAGE]);
}

#[tokio::test]
async fn auto_sync_disabled_returns_none() {
    let h = Harness::new();
    assert!(h.engine.start_auto_sync(AutoSyncConfig::disabled()).is_none());
}

#[tokio::test]
async fn busy_flag_clears_on_rejection_for_every_document_operation() {
    let h = Harness::new();
    h.backend.insert("a.md", "A");
    h.backend.insert("b.md", "B");
    h.backend.insert("c.md", "C");
    h.coordinator.list_all().await.unwrap();

    assert_busy_until_rejected(&h, PortOp::Read, OperationKind::Open, |c| async move {
        c.open(&id("a.md")).await
    })
    .await;

    h.coordinator.open(&id("a.md")).await.unwrap();
    h.coordinator.mark_edited("A, edited");
    assert_busy_until_rejected(&h, PortOp::Write, OperationKind::Save, |c| async move {
        c.save().await
    })
    .await;
    assert_eq!(h.backend.content("a.md").as_deref(), Some("A"));

    assert_busy_until_rejected(&h, PortOp::Remove, OperationKind::Delete, |c| async move {
        c.delete(&id("b.md")).await
    })
    .await;
    assert!(h.ctx().document(&id("b.md")).is_some());

    assert_busy_until_rejected(&h, PortOp::Rename, OperationKind::Rename, |c| async move {
        c.rename(&id("c.md"), "d.md").await
    })
    .await;

    assert_busy_until_rejected(&h, PortOp::Write, OperationKind::Add, |c| async move {
        c.add("e.md").await
    })
    .await;
    assert_eq!(h.ctx().selected_id(), Some(id("a.md")));
}

#[tokio::test]
async fn busy_flag_clears_on_rejected_sync() {
    let h = Harness::new();
    h.engine.configure("url", "me", "me@host").await.unwrap();

    let hold = h.replication.hold();
    h.replication
        .push_sync(Err(PortError::rejected("remote unreachable")));
    let task = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.sync().await })
    };
    hold.entered().await;
    assert!(h.ctx().is_busy(OperationKind::Sync));
    assert!(h.engine.status().is_syncing);
    hold.release();

    assert!(task.await.unwrap().is_err());
    assert!(!h.ctx().is_busy(OperationKind::Sync));
    assert!(!h.engine.status().is_syncing);
    assert_eq!(
        h.ctx().last_error(OperationKind::Sync).as_deref(),
        Some("remote unreachable")
    );
}

#[tokio::test]
async fn save_after_configure_and_sync_still_succeeds() {
    let h = Harness::new();
    h.backend.insert("a.md", "draft");
    h.coordinator.list_all().await.unwrap();
    h.coordinator.open(&id("a.md")).await.unwrap();
    h.coordinator.mark_edited("first edit");
    h.coordinator.save().await.unwrap();

    h.engine.configure("url", "me", "me@host").await.unwrap();
    assert_consistent(&h, "a.md");

    h.coordinator.mark_edited("second edit");
    h.coordinator.save().await.unwrap();
    assert_consistent(&h, "a.md");

    h.coordinator.mark_edited("third edit");
    h.engine.sync().await.unwrap();
    let open = h.coordinator.selected().unwrap();
    assert_eq!(open.content, "second edit");
    assert!(!open.saved);
    assert_eq!(h.ctx().editor_buffer(), "third edit");

    h.coordinator.save().await.unwrap();
    assert_consistent(&h, "a.md");
    assert_eq!(h.backend.content("a.md").as_deref(), Some("third edit"));
}

#[tokio::test]
async fn events_from_a_call_precede_its_closing_message() {
    let h = Harness::new();
    let _subscription = h.engine.subscribe();

    h.replication.emit_during_next_call([
        ReplicationEvent::info("Committing documents"),
        ReplicationEvent::info("Pushing to remote"),
    ]);
    h.engine.configure("url", "me", "me@host").await.unwrap();
    assert_eq!(
        h.engine.status().messages,
        vec!["Committing documents", "Pushing to remote", SUCCESS_MESSAGE]
    );

    h.replication
        .emit_during_next_call([ReplicationEvent::error("rejected: non-fast-forward")]);
    h.replication
        .push_sync(Err(PortError::rejected("rejected: non-fast-forward")));
    h.engine.sync().await.unwrap_err();
    assert_eq!(
        h.engine.status().messages,
        vec!["rejected: non-fast-forward", SYNC_FAILED_MESSAGE]
    );
}
