//! Notification emitter: asynchronous fan-out with bounded retry
//!
//! Events are queued by the mutating operation and delivered by a
//! background worker, so a delivery failure can never roll back or
//! block the transition that produced it. Failed sends are retried
//! with exponential backoff a bounded number of times, then logged and
//! dropped. The single worker consumes the queue in order, which
//! preserves per-workflow delivery order; there is no cross-workflow
//! guarantee.

use async_trait::async_trait;
use journey_types::{
    Notification, NotificationId, UserId, WorkflowError, WorkflowEvent, WorkflowResult,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const QUEUE_DEPTH: usize = 1024;

// ── Sink ─────────────────────────────────────────────────────────────

/// Delivery target for notifications (inbox, email bridge, webhook)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> WorkflowResult<()>;
}

/// Read access to delivered notifications, for dashboard composition
pub trait InboxReader: Send + Sync {
    /// A user's notifications, oldest first
    fn notifications_for(&self, user_id: &UserId) -> Vec<Notification>;
}

/// In-memory per-user inboxes; the reference sink
#[derive(Default)]
pub struct InMemoryInbox {
    inboxes: RwLock<HashMap<UserId, Vec<Notification>>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unread_count(&self, user_id: &UserId) -> usize {
        self.inboxes
            .read()
            .map(|guard| {
                guard
                    .get(user_id)
                    .map(|inbox| inbox.iter().filter(|n| !n.read).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Flip the read flag on one notification
    pub fn mark_read(
        &self,
        user_id: &UserId,
        notification_id: &NotificationId,
    ) -> WorkflowResult<Notification> {
        let mut guard = self
            .inboxes
            .write()
            .map_err(|_| WorkflowError::Store("inboxes lock poisoned".into()))?;
        let notification = guard
            .get_mut(user_id)
            .and_then(|inbox| inbox.iter_mut().find(|n| &n.id == notification_id))
            .ok_or_else(|| WorkflowError::NotificationNotFound(notification_id.clone()))?;
        notification.mark_read();
        Ok(notification.clone())
    }
}

impl InboxReader for InMemoryInbox {
    fn notifications_for(&self, user_id: &UserId) -> Vec<Notification> {
        self.inboxes
            .read()
            .map(|guard| guard.get(user_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for InMemoryInbox {
    async fn deliver(&self, notification: Notification) -> WorkflowResult<()> {
        self.inboxes
            .write()
            .map_err(|_| WorkflowError::Store("inboxes lock poisoned".into()))?
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification);
        Ok(())
    }
}

// ── Retry policy ─────────────────────────────────────────────────────

/// Bounded retry with exponential backoff
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

// ── Emitter ──────────────────────────────────────────────────────────

/// Queues workflow events for asynchronous delivery
#[derive(Clone, Debug)]
pub struct NotificationEmitter {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl NotificationEmitter {
    /// Spawn the delivery worker and return the emitter handle.
    ///
    /// Dropping every emitter clone closes the queue; the worker then
    /// drains remaining events and exits, which the returned handle
    /// can be awaited on.
    pub fn spawn(
        sink: Arc<dyn NotificationSink>,
        policy: RetryPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = tokio::spawn(deliver_loop(rx, sink, policy));
        (Self { tx }, handle)
    }

    /// Queue an event. Fire-and-forget: a full or closed queue drops
    /// the event with a log line, never an error to the caller.
    pub fn emit(&self, event: WorkflowEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    workflow_id = %event.workflow_id(),
                    "notification queue full; event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    workflow_id = %event.workflow_id(),
                    "notification worker stopped; event dropped"
                );
            }
        }
    }
}

async fn deliver_loop(
    mut rx: mpsc::Receiver<WorkflowEvent>,
    sink: Arc<dyn NotificationSink>,
    policy: RetryPolicy,
) {
    while let Some(event) = rx.recv().await {
        for notification in fan_out(&event) {
            deliver_with_retry(sink.as_ref(), notification, &policy).await;
        }
    }
}

async fn deliver_with_retry(
    sink: &dyn NotificationSink,
    notification: Notification,
    policy: &RetryPolicy,
) {
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.max_attempts {
        match sink.deliver(notification.clone()).await {
            Ok(()) => return,
            Err(err) if attempt == policy.max_attempts => {
                tracing::error!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    error = %err,
                    attempts = attempt,
                    "notification dropped after exhausting retries"
                );
            }
            Err(err) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %err,
                    attempt,
                    "notification delivery failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

// ── Fan-out ──────────────────────────────────────────────────────────

/// Build the per-user notifications an event produces: one for the
/// owner and one per watcher, deduplicated.
fn fan_out(event: &WorkflowEvent) -> Vec<Notification> {
    let (message, owner, previous_owner, watchers) = match event {
        WorkflowEvent::StageTransitioned {
            record_id,
            from,
            to,
            owner,
            previous_owner,
            watchers,
            ..
        } => (
            format!("Record {record_id} moved from '{from}' to '{to}'"),
            owner,
            previous_owner.as_ref(),
            watchers,
        ),
        WorkflowEvent::BlockerCreated {
            record_id,
            blocker,
            owner,
            watchers,
            ..
        } => (
            format!(
                "Blocker on record {record_id}: {} ({:?})",
                blocker.description, blocker.severity
            ),
            owner,
            None,
            watchers,
        ),
        WorkflowEvent::BlockerResolved {
            record_id,
            description,
            owner,
            watchers,
            ..
        } => (
            format!("Blocker resolved on record {record_id}: {description}"),
            owner,
            None,
            watchers,
        ),
        WorkflowEvent::DeadlineApproaching {
            record_id,
            stage,
            owner,
            watchers,
            days_remaining,
            ..
        } => {
            let message = if *days_remaining < 0 {
                format!(
                    "Record {record_id} is {} day(s) overdue at stage '{stage}'",
                    -days_remaining
                )
            } else {
                format!(
                    "Record {record_id} has {days_remaining} day(s) remaining at stage '{stage}'"
                )
            };
            (message, owner, None, watchers)
        }
    };

    let mut targets: Vec<&UserId> = Vec::new();
    for target in owner.iter().chain(previous_owner).chain(watchers) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    targets
        .into_iter()
        .map(|user| {
            Notification::new(
                event.kind(),
                event.workflow_id().clone(),
                user.clone(),
                message.clone(),
                payload.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use journey_types::{NotificationKind, ProcessType, RecordId, StageId, WorkflowId};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn make_transition(workflow: &str, to: &str) -> WorkflowEvent {
        WorkflowEvent::StageTransitioned {
            workflow_id: WorkflowId::new(workflow),
            record_id: RecordId::new("record-1"),
            process_type: ProcessType::new("lead-to-quote"),
            from: StageId::new("qualification"),
            to: StageId::new(to),
            owner: Some(UserId::new("dana")),
            previous_owner: Some(UserId::new("sam")),
            watchers: vec![UserId::new("manager"), UserId::new("dana")],
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_fan_out_targets_owner_previous_owner_and_watchers() {
        let notifications = fan_out(&make_transition("wf-1", "assessment"));
        let users: Vec<&str> = notifications
            .iter()
            .map(|n| n.user_id.as_str())
            .collect();
        // Deduplicated: dana appears once despite also watching
        assert_eq!(users, vec!["dana", "sam", "manager"]);
        for notification in &notifications {
            assert_eq!(notification.kind, NotificationKind::StageTransition);
            assert!(notification.message.contains("assessment"));
        }
    }

    #[test]
    fn test_fan_out_overdue_message() {
        let event = WorkflowEvent::DeadlineApproaching {
            workflow_id: WorkflowId::new("wf-1"),
            record_id: RecordId::new("record-1"),
            stage: StageId::new("legal-review"),
            owner: Some(UserId::new("dana")),
            watchers: Vec::new(),
            days_remaining: -2,
            estimated_completion: Utc::now(),
            occurred_at: Utc::now(),
        };
        let notifications = fan_out(&event);
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].message.contains("2 day(s) overdue"));
    }

    #[tokio::test]
    async fn test_events_reach_the_inbox() {
        let inbox = Arc::new(InMemoryInbox::new());
        let (emitter, worker) =
            NotificationEmitter::spawn(inbox.clone(), RetryPolicy::default());

        emitter.emit(make_transition("wf-1", "assessment"));
        emitter.emit(make_transition("wf-1", "solution-design"));
        drop(emitter);
        worker.await.unwrap();

        let dana = inbox.notifications_for(&UserId::new("dana"));
        assert_eq!(dana.len(), 2);
        // Per-workflow order preserved
        assert!(dana[0].message.contains("assessment"));
        assert!(dana[1].message.contains("solution-design"));
        assert_eq!(inbox.unread_count(&UserId::new("dana")), 2);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let inbox = Arc::new(InMemoryInbox::new());
        let (emitter, worker) =
            NotificationEmitter::spawn(inbox.clone(), RetryPolicy::default());
        emitter.emit(make_transition("wf-1", "assessment"));
        drop(emitter);
        worker.await.unwrap();

        let dana = UserId::new("dana");
        let id = inbox.notifications_for(&dana)[0].id.clone();
        let read = inbox.mark_read(&dana, &id).unwrap();
        assert!(read.read);
        assert_eq!(inbox.unread_count(&dana), 0);

        let missing = inbox.mark_read(&dana, &NotificationId::new("missing"));
        assert!(matches!(
            missing,
            Err(WorkflowError::NotificationNotFound(_))
        ));
    }

    /// Fails the first `failures` deliveries, then succeeds
    struct FlakySink {
        inner: InMemoryInbox,
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn deliver(&self, notification: Notification) -> WorkflowResult<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(WorkflowError::Store("transport glitch".into()));
            }
            self.inner.deliver(notification).await
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let sink = Arc::new(FlakySink {
            inner: InMemoryInbox::new(),
            failures: 2,
            attempts: AtomicU32::new(0),
        });
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        };
        let (emitter, worker) = NotificationEmitter::spawn(sink.clone(), policy);

        let event = WorkflowEvent::DeadlineApproaching {
            workflow_id: WorkflowId::new("wf-1"),
            record_id: RecordId::new("record-1"),
            stage: StageId::new("negotiation"),
            owner: Some(UserId::new("dana")),
            watchers: Vec::new(),
            days_remaining: 1,
            estimated_completion: Utc::now(),
            occurred_at: Utc::now(),
        };
        emitter.emit(event);
        drop(emitter);
        worker.await.unwrap();

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            sink.inner.notifications_for(&UserId::new("dana")).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_without_blocking() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let sink = Arc::new(FlakySink {
            inner: InMemoryInbox::new(),
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
        });
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
        };
        let (emitter, worker) = NotificationEmitter::spawn(sink.clone(), policy);

        emitter.emit(make_transition("wf-1", "assessment"));
        drop(emitter);
        // Worker finishes despite every delivery failing
        worker.await.unwrap();

        assert!(sink
            .inner
            .notifications_for(&UserId::new("dana"))
            .is_empty());
        // Two attempts per fan-out target
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 6);
    }
}
