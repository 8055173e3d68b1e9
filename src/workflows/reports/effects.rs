use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::warn;

use super::broadcast::{EventPublisher, ReportEvent};
use super::domain::{NotificationAudience, ReportId, UserId};
use super::notifications::NotificationDispatcher;
use super::repository::RecordStore;

/// Secondary work scheduled once a primary mutation has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Notify {
        report_id: ReportId,
        user_id: UserId,
        audience: NotificationAudience,
        title: String,
        message: String,
    },
    Broadcast(ReportEvent),
}

impl SideEffect {
    pub fn broadcast(event: ReportEvent) -> Self {
        SideEffect::Broadcast(event)
    }

    fn label(&self) -> String {
        match self {
            SideEffect::Notify { report_id, .. } => format!("notification for report {report_id}"),
            SideEffect::Broadcast(event) => format!("broadcast '{}'", event.name()),
        }
    }
}

/// Dispatch seam for post-commit effects. Failures never undo the primary mutation.
pub trait SideEffects: Send + Sync {
    /// Runs or queues `effects` in order and returns the failures observed before returning.
    fn dispatch(&self, effects: Vec<SideEffect>) -> Vec<String>;
}

/// Executes individual effects against the notification table and the publisher.
pub struct EffectRunner<S, P> {
    notifications: NotificationDispatcher<S>,
    publisher: Arc<P>,
}

impl<S, P> EffectRunner<S, P>
where
    S: RecordStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(notifications: NotificationDispatcher<S>, publisher: Arc<P>) -> Self {
        Self {
            notifications,
            publisher,
        }
    }

    pub fn run(&self, effect: SideEffect) -> Result<(), String> {
        let label = effect.label();
        let result = match effect {
            SideEffect::Notify {
                report_id,
                user_id,
                audience,
                title,
                message,
            } => self
                .notifications
                .notify(report_id, user_id, audience, title, message)
                .map(|_| ())
                .map_err(|err| err.to_string()),
            SideEffect::Broadcast(event) => self
                .publisher
                .publish(event)
                .map(|_| ())
                .map_err(|err| err.to_string()),
        };

        result.map_err(|err| {
            warn!(effect = %label, error = %err, "side effect failed");
            format!("{label} failed: {err}")
        })
    }
}

/// Runs effects sequentially on the caller's task and reports failures back as warnings.
pub struct InlineEffects<S, P> {
    runner: EffectRunner<S, P>,
}

impl<S, P> InlineEffects<S, P>
where
    S: RecordStore + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            runner: EffectRunner::new(NotificationDispatcher::new(store), publisher),
        }
    }
}

impl<S, P> SideEffects for InlineEffects<S, P>
where
    S: RecordStore + 'static,
    P: EventPublisher + 'static,
{
    fn dispatch(&self, effects: Vec<SideEffect>) -> Vec<String> {
        effects
            .into_iter()
            .filter_map(|effect| self.runner.run(effect).err())
            .collect()
    }
}

/// Queues effect batches onto a background task so the primary path does not wait on them.
///
/// Failures are logged by the worker. At most `capacity` batches wait in the queue; a batch that
/// does not fit is dropped and reported back as warnings. The worker exits once every
/// `DeferredEffects` handle has been dropped and the queue is drained.
#[derive(Clone)]
pub struct DeferredEffects {
    queue: mpsc::Sender<Vec<SideEffect>>,
}

impl DeferredEffects {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn<S, P>(runner: EffectRunner<S, P>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        S: RecordStore + 'static,
        P: EventPublisher + 'static,
    {
        let (queue, mut receiver) = mpsc::channel::<Vec<SideEffect>>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                for effect in batch {
                    let _ = runner.run(effect);
                }
            }
        });
        (Self { queue }, worker)
    }
}

impl SideEffects for DeferredEffects {
    fn dispatch(&self, effects: Vec<SideEffect>) -> Vec<String> {
        if effects.is_empty() {
            return Vec::new();
        }
        let (dropped, reason) = match self.queue.try_send(effects) {
            Ok(()) => return Vec::new(),
            Err(TrySendError::Full(dropped)) => (dropped, "queue full"),
            Err(TrySendError::Closed(dropped)) => (dropped, "worker stopped"),
        };
        warn!(count = dropped.len(), reason, "side effects dropped");
        dropped
            .iter()
            .map(|effect| format!("{} dropped: {reason}", effect.label()))
            .collect()
    }
}
