use std::sync::Arc;

use tracing::debug;

use super::domain::{
    NewNotification, Notification, NotificationAudience, NotificationId, ReportId, UserId,
};
use super::error::WorkflowError;
use super::repository::{RecordStore, StoreError};

/// Writes durable notification rows for interested users.
pub struct NotificationDispatcher<S> {
    store: Arc<S>,
}

impl<S> Clone for NotificationDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> NotificationDispatcher<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn notify(
        &self,
        report_id: ReportId,
        user_id: UserId,
        audience: NotificationAudience,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Notification, StoreError> {
        let notification = self.store.insert_notification(NewNotification {
            report_id,
            user_id,
            audience,
            title: title.into(),
            message: message.into(),
        })?;
        debug!(
            notification_id = %notification.id,
            %report_id,
            %user_id,
            "notification recorded"
        );
        Ok(notification)
    }

    pub fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, WorkflowError> {
        Ok(self.store.notifications_for(user_id)?)
    }

    /// Flips the read flag; only the addressed user may do so.
    pub fn mark_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, WorkflowError> {
        let mut notification = self.store.notification(notification_id)?.ok_or_else(|| {
            WorkflowError::not_found(format!("notification {notification_id} not found"))
        })?;

        if notification.user_id != user_id {
            return Err(WorkflowError::unauthorized(
                "Unauthorized: notification belongs to another user",
            ));
        }

        if !notification.read {
            self.store.mark_notification_read(notification_id)?;
            notification.read = true;
        }
        Ok(notification)
    }
}
