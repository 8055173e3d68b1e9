use std::sync::Arc;

use tracing::{info, warn};

use super::broadcast::ReportEvent;
use super::claims::{ClaimAcceptance, ClaimSubmission, ClaimWorkflow};
use super::domain::{
    Actor, Claim, ClaimId, FileHandle, ItemId, LostFoundDetail, NewReport, Notification,
    NotificationAudience, NotificationId, Report, ReportId, ReportStatus, ReportView, Role, UserId,
};
use super::effects::{SideEffect, SideEffects};
use super::error::WorkflowError;
use super::files::{FileStore, ImageUpload};
use super::matcher::{find_matches, CandidateMatch, MatchMode};
use super::notifications::NotificationDispatcher;
use super::outcome::WorkflowOutcome;
use super::repository::{RecordStore, ReportFilter, ReportPatch};
use super::specializer::{ReportTypeSpecializer, SpecializedReport, TriageRequest};
use super::status::{StatusStateMachine, Transition};

const NEW_REPORT_TITLE: &str = "Maintenance Report";

/// Raw submission as decoded by the transport. Missing and blank fields are rejected together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateReportRequest {
    pub reporter_id: Option<UserId>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_anonymous: bool,
    pub image: Option<ImageUpload>,
}

/// Owner edit of a report. `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReportRequest {
    pub report_id: ReportId,
    pub user_id: UserId,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image: Option<ImageUpload>,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn optional_edit(value: Option<String>, field: &str) -> Result<Option<String>, WorkflowError> {
    match value {
        None => Ok(None),
        Some(raw) => required(Some(raw))
            .map(Some)
            .ok_or_else(|| WorkflowError::validation(format!("{field} cannot be blank"))),
    }
}

/// Entry point for every report, lost-and-found, claim, and notification operation.
pub struct ReportService<S, F, E> {
    store: Arc<S>,
    files: Arc<F>,
    effects: Arc<E>,
    specializer: ReportTypeSpecializer<S, E>,
    status: StatusStateMachine<S, E>,
    claims: ClaimWorkflow<S, E>,
    notifications: NotificationDispatcher<S>,
}

impl<S, F, E> ReportService<S, F, E>
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    pub fn new(store: Arc<S>, files: Arc<F>, effects: Arc<E>) -> Self {
        Self {
            specializer: ReportTypeSpecializer::new(store.clone(), effects.clone()),
            status: StatusStateMachine::new(store.clone(), effects.clone()),
            claims: ClaimWorkflow::new(store.clone(), effects.clone()),
            notifications: NotificationDispatcher::new(store.clone()),
            store,
            files,
            effects,
        }
    }

    fn load(&self, report_id: ReportId) -> Result<Report, WorkflowError> {
        self.store
            .report(report_id)?
            .ok_or_else(|| WorkflowError::not_found("Report not found"))
    }

    /// Best-effort removal of a stored image; failures come back as a warning.
    fn discard_file(&self, handle: &FileHandle) -> Option<String> {
        match self.files.remove(handle) {
            Ok(()) => None,
            Err(err) => {
                warn!(file = %handle.0, error = %err, "failed to remove stored image");
                Some(format!("image removal for {} failed: {err}", handle.0))
            }
        }
    }

    pub fn create_report(
        &self,
        request: CreateReportRequest,
    ) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        let (Some(reporter_id), Some(location), Some(description)) = (
            request.reporter_id,
            required(request.location),
            required(request.description),
        ) else {
            return Err(WorkflowError::validation("Missing required fields"));
        };

        let image_path = request
            .image
            .map(|upload| self.files.store(upload))
            .transpose()?;

        let inserted = self.store.insert_report(NewReport {
            reporter_id,
            location,
            description,
            image_path: image_path.clone(),
            is_anonymous: request.is_anonymous,
            status: Transition::Create.target(),
        });
        let report = match inserted {
            Ok(report) => report,
            Err(err) => {
                if let Some(handle) = &image_path {
                    self.discard_file(handle);
                }
                return Err(err.into());
            }
        };
        info!(report_id = %report.id, %reporter_id, "report submitted");

        let warnings = self.effects.dispatch(vec![
            SideEffect::Notify {
                report_id: report.id,
                user_id: reporter_id,
                audience: NotificationAudience::Admins,
                title: NEW_REPORT_TITLE.to_string(),
                message: format!("New report submitted issue at {}", report.location),
            },
            SideEffect::broadcast(ReportEvent::Update),
            SideEffect::broadcast(ReportEvent::CreatedReport(report.view_for(None))),
        ]);

        Ok(WorkflowOutcome::new("Report submitted successfully", report).with_warnings(warnings))
    }

    /// Owner edit. A replacement image is stored before the row changes and the old file is
    /// removed only once the new handle is recorded.
    pub fn update_report(
        &self,
        request: UpdateReportRequest,
    ) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        let report_id = request.report_id;
        let current = self.load(report_id)?;
        if !current.is_owned_by(request.user_id) {
            return Err(WorkflowError::unauthorized(
                "Unauthorized: you can only edit your own reports",
            ));
        }
        let location = optional_edit(request.location, "location")?;
        let description = optional_edit(request.description, "description")?;

        let new_image = request
            .image
            .map(|upload| self.files.store(upload))
            .transpose()?;
        let patch = ReportPatch {
            location,
            description,
            image_path: new_image.clone().map(Some),
            ..ReportPatch::default()
        };

        let affected = match self.store.update_report(report_id, patch) {
            Ok(affected) => affected,
            Err(err) => {
                if let Some(handle) = &new_image {
                    self.discard_file(handle);
                }
                return Err(err.into());
            }
        };
        if affected == 0 {
            if let Some(handle) = &new_image {
                self.discard_file(handle);
            }
            return Err(WorkflowError::not_found("Report not found"));
        }
        info!(%report_id, image_replaced = new_image.is_some(), "report updated");

        let mut warnings = Vec::new();
        if new_image.is_some() {
            if let Some(old) = &current.image_path {
                warnings.extend(self.discard_file(old));
            }
        }
        warnings.extend(
            self.effects
                .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]),
        );

        let report = self.load(report_id)?;
        Ok(WorkflowOutcome::new("Report updated successfully", report).with_warnings(warnings))
    }

    fn delete_row(&self, report: &Report) -> Result<Vec<String>, WorkflowError> {
        if self.store.delete_report(report.id)? == 0 {
            return Err(WorkflowError::not_found("Report not found"));
        }
        Ok(report
            .image_path
            .as_ref()
            .and_then(|handle| self.discard_file(handle))
            .into_iter()
            .collect())
    }

    pub fn delete_report_as_owner(
        &self,
        report_id: ReportId,
        user_id: UserId,
    ) -> Result<WorkflowOutcome<ReportId>, WorkflowError> {
        let report = self.load(report_id)?;
        if !report.is_owned_by(user_id) {
            return Err(WorkflowError::unauthorized(
                "Unauthorized: you can only delete your own reports",
            ));
        }

        let mut warnings = self.delete_row(&report)?;
        info!(%report_id, %user_id, "report deleted by owner");
        warnings.extend(
            self.effects
                .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]),
        );
        Ok(WorkflowOutcome::new("Report deleted successfully", report_id).with_warnings(warnings))
    }

    pub fn delete_report_as_admin(
        &self,
        report_id: ReportId,
        role: Role,
    ) -> Result<WorkflowOutcome<ReportId>, WorkflowError> {
        if role != Role::Admin {
            return Err(WorkflowError::unauthorized("Unauthorized: Admins only"));
        }
        let report = self.load(report_id)?;

        let mut warnings = self.delete_row(&report)?;
        info!(%report_id, "report deleted by admin");
        warnings.extend(
            self.effects
                .dispatch(vec![SideEffect::broadcast(ReportEvent::ReportDeleted {
                    report_id,
                })]),
        );
        Ok(WorkflowOutcome::new("Report deleted successfully", report_id).with_warnings(warnings))
    }

    pub fn archive_report(
        &self,
        report_id: ReportId,
    ) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        self.status.archive(report_id)
    }

    /// Untyped, non-archived reports awaiting triage, newest first, anonymous reporters masked.
    pub fn list_active_reports(&self) -> Result<Vec<ReportView>, WorkflowError> {
        let reports = self.store.list_reports(&ReportFilter::active_untyped())?;
        Ok(reports.iter().map(|report| report.view_for(None)).collect())
    }

    /// The user's own non-archived reports, newest first.
    pub fn list_user_reports(&self, user_id: UserId) -> Result<Vec<ReportView>, WorkflowError> {
        let reports = self.store.list_reports(&ReportFilter::active_for(user_id))?;
        Ok(reports
            .iter()
            .map(|report| report.view_for(Some(user_id)))
            .collect())
    }

    pub fn set_status(
        &self,
        report_id: ReportId,
        status: ReportStatus,
    ) -> Result<WorkflowOutcome<Report>, WorkflowError> {
        self.status.set_status(report_id, status)
    }

    pub fn set_report_type(
        &self,
        request: TriageRequest,
    ) -> Result<WorkflowOutcome<SpecializedReport>, WorkflowError> {
        self.specializer.specialize(request)
    }

    pub fn specialized(&self, report_id: ReportId) -> Result<SpecializedReport, WorkflowError> {
        self.specializer.load(report_id)
    }

    pub fn lost_found_items(&self) -> Result<Vec<LostFoundDetail>, WorkflowError> {
        Ok(self.store.list_items()?)
    }

    pub fn item(&self, item_id: ItemId) -> Result<LostFoundDetail, WorkflowError> {
        self.store
            .item(item_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("item {item_id} not found")))
    }

    /// Candidate lost/found pairs recomputed from the current item rows.
    pub fn matches(&self, mode: MatchMode) -> Result<Vec<CandidateMatch>, WorkflowError> {
        let items = self.store.list_items()?;
        Ok(find_matches(&items, mode))
    }

    pub fn submit_claim(
        &self,
        submission: ClaimSubmission,
    ) -> Result<WorkflowOutcome<Claim>, WorkflowError> {
        self.claims.submit_claim(submission)
    }

    pub fn accept_claim(
        &self,
        item_id: ItemId,
        holder_id: UserId,
        claimer_id: UserId,
    ) -> Result<WorkflowOutcome<ClaimAcceptance>, WorkflowError> {
        self.claims.accept_claim(item_id, holder_id, claimer_id)
    }

    pub fn reject_claim(
        &self,
        claim_id: ClaimId,
        actor: Actor,
    ) -> Result<WorkflowOutcome<Claim>, WorkflowError> {
        self.claims.reject_claim(claim_id, actor)
    }

    pub fn claims_for_item(&self, item_id: ItemId) -> Result<Vec<Claim>, WorkflowError> {
        self.claims.claims_for_item(item_id)
    }

    pub fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>, WorkflowError> {
        self.notifications.notifications_for(user_id)
    }

    pub fn mark_notification_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, WorkflowError> {
        self.notifications.mark_read(notification_id, user_id)
    }
}
