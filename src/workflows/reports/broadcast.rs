use serde::Serialize;
use tokio::sync::broadcast;

use super::domain::{ItemId, ReportId, ReportStatus, ReportView, UserId};

/// Transient change events fanned out to connected observers.
///
/// `Update` is the coarse invalidate-and-refetch signal; the other variants carry enough payload
/// for clients that want to patch local state instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ReportEvent {
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "createdReport")]
    CreatedReport(ReportView),
    #[serde(rename = "reportDeleted")]
    ReportDeleted {
        #[serde(rename = "reportId")]
        report_id: ReportId,
    },
    #[serde(rename = "updatedStatus")]
    UpdatedStatus {
        #[serde(rename = "reportId")]
        report_id: ReportId,
        status: ReportStatus,
    },
    #[serde(rename = "claimAccepted")]
    ClaimAccepted {
        #[serde(rename = "itemId")]
        item_id: ItemId,
        #[serde(rename = "claimerId")]
        claimer_id: UserId,
    },
}

impl ReportEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            ReportEvent::Update => "update",
            ReportEvent::CreatedReport(_) => "createdReport",
            ReportEvent::ReportDeleted { .. } => "reportDeleted",
            ReportEvent::UpdatedStatus { .. } => "updatedStatus",
            ReportEvent::ClaimAccepted { .. } => "claimAccepted",
        }
    }
}

/// Outbound publish hook injected into every component that announces changes.
pub trait EventPublisher: Send + Sync {
    /// Returns how many observers the event was handed to. Zero observers is not an error.
    fn publish(&self, event: ReportEvent) -> Result<usize, PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broadcast transport unavailable: {0}")]
    Transport(String),
}

/// Fan-out hub over a bounded `tokio::sync::broadcast` channel.
///
/// Slow observers that fall more than `capacity` events behind lose the oldest events; nothing
/// is persisted or acknowledged.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<ReportEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.sender.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for BroadcastHub {
    fn publish(&self, event: ReportEvent) -> Result<usize, PublishError> {
        // `send` only fails when nobody is listening.
        Ok(self.sender.send(event).unwrap_or(0))
    }
}
