use std::sync::Arc;

use tracing::info;

use super::broadcast::ReportEvent;
use super::domain::{NotificationAudience, Report, ReportId, ReportStatus};
use super::effects::{SideEffect, SideEffects};
use super::error::WorkflowError;
use super::outcome::WorkflowOutcome;
use super::repository::{RecordStore, ReportPatch};

/// Status changes a report can undergo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Report creation; always lands on `Pending`.
    Create,
    /// Admin triage; forces `InProgress` whatever the prior state, so re-triage never regresses.
    Triage,
    /// Explicit admin edit to any of the three states.
    AdminSet(ReportStatus),
}

impl Transition {
    pub fn target(self) -> ReportStatus {
        match self {
            Transition::Create => ReportStatus::Pending,
            Transition::Triage => ReportStatus::InProgress,
            Transition::AdminSet(status) => status,
        }
    }
}

pub(crate) const STATUS_UPDATE_TITLE: &str = "Report Status Update";

pub(crate) fn status_message(report: &Report, status: ReportStatus) -> String {
    format!(
        "Your report at {} is now {}",
        report.location,
        status.display_name()
    )
}

/// Applies admin status edits and archiving against the store.
pub struct StatusStateMachine<S, E> {
    store: Arc<S>,
    effects: Arc<E>,
}

impl<S, E> StatusStateMachine<S, E>
where
    S: RecordStore + 'static,
    E: SideEffects + 'static,
{
    pub fn new(store: Arc<S>, effects: Arc<E>) -> Self {
        Self { store, effects }
    }

    fn load(&self, report_id: ReportId) -> Result<Report, WorkflowError> {
        self.store
            .report(report_id)?
            .ok_or_else(|| WorkflowError::not_found("Report not found"))
    }

    /// Sets `status` directly, then notifies the reporter and announces the change.
    pub fn set_status(
        &self,
        report_id: ReportId,
        status: ReportStatus,
    ) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        let mut report = self.load(report_id)?;
        let target = Transition::AdminSet(status).target();

        if self
            .store
            .update_report(report_id, ReportPatch::status(target))?
            == 0
        {
            return Err(WorkflowError::not_found("Report not found"));
        }
        info!(
            %report_id,
            from = report.status.label(),
            to = target.label(),
            "report status updated"
        );
        report.status = target;

        let warnings = self.effects.dispatch(vec![
            SideEffect::Notify {
                report_id,
                user_id: report.reporter_id,
                audience: NotificationAudience::User,
                title: STATUS_UPDATE_TITLE.to_string(),
                message: status_message(&report, target),
            },
            SideEffect::broadcast(ReportEvent::UpdatedStatus {
                report_id,
                status: target,
            }),
            SideEffect::broadcast(ReportEvent::Update),
        ]);

        Ok(WorkflowOutcome::new("Status updated successfully", report).with_warnings(warnings))
    }

    /// Hides the report from active listings; its status is left as is.
    pub fn archive(&self, report_id: ReportId) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        if self
            .store
            .update_report(report_id, ReportPatch::archive())?
            == 0
        {
            return Err(WorkflowError::not_found("Report not found"));
        }
        let report = self.load(report_id)?;
        info!(%report_id, status = report.status.label(), "report archived");

        let warnings = self
            .effects
            .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]);
        Ok(WorkflowOutcome::new("Report archived successfully", report).with_warnings(warnings))
    }
}
