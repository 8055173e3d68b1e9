use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::broadcast::ReportEvent;
use super::domain::{
    ItemType, LostFoundDetail, LostFoundUpsert, MaintenanceDetail, Report, ReportId, ReportType,
    UserId,
};
use super::effects::{SideEffect, SideEffects};
use super::error::WorkflowError;
use super::outcome::WorkflowOutcome;
use super::repository::{RecordStore, ReportPatch, StoreError};
use super::status::Transition;

/// Type-specific fields an admin supplies during triage. Which ones matter depends on the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageFields {
    pub category: String,
    pub priority: String,
    pub assigned_staff: String,
    pub item_type: Option<String>,
    pub item_name: String,
    pub contact_info: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_anonymous: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageRequest {
    pub report_id: ReportId,
    pub report_type: ReportType,
    /// Becomes the item owner when the report is filed as lost and found.
    pub sender_id: UserId,
    pub fields: TriageFields,
}

/// A report together with the detail row its type calls for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecializedReport {
    Untyped {
        report: Report,
    },
    Maintenance {
        report: Report,
        detail: MaintenanceDetail,
    },
    LostAndFound {
        report: Report,
        item: LostFoundDetail,
    },
    Other {
        report: Report,
    },
}

impl SpecializedReport {
    pub fn report(&self) -> &Report {
        match self {
            SpecializedReport::Untyped { report }
            | SpecializedReport::Maintenance { report, .. }
            | SpecializedReport::LostAndFound { report, .. }
            | SpecializedReport::Other { report } => report,
        }
    }
}

/// Typed detail decided before anything is written.
enum DetailPlan {
    Maintenance(MaintenanceDetail),
    LostAndFound(LostFoundUpsert),
    None,
}

/// Single translation point between the relational rows and [`SpecializedReport`].
pub struct ReportTypeSpecializer<S, E> {
    store: Arc<S>,
    effects: Arc<E>,
}

impl<S, E> ReportTypeSpecializer<S, E>
where
    S: RecordStore + 'static,
    E: SideEffects + 'static,
{
    pub fn new(store: Arc<S>, effects: Arc<E>) -> Self {
        Self { store, effects }
    }

    /// Reads a report and the detail row matching its type.
    pub fn load(&self, report_id: ReportId) -> Result<SpecializedReport, WorkflowError> {
        let report = self
            .store
            .report(report_id)?
            .ok_or_else(|| WorkflowError::not_found("Report not found"))?;
        self.specialize_row(report)
    }

    fn specialize_row(&self, report: Report) -> Result<SpecializedReport, WorkflowError> {
        let report_id = report.id;
        let report_type = report.report_type.clone();
        let missing = || {
            StoreError::Inconsistent(format!(
                "report {report_id} is typed '{}' but has no detail row",
                report_type.label()
            ))
        };

        match &report_type {
            ReportType::Unset => Ok(SpecializedReport::Untyped { report }),
            ReportType::Other(_) => Ok(SpecializedReport::Other { report }),
            ReportType::Maintenance => {
                let detail = self.store.maintenance(report_id)?.ok_or_else(missing)?;
                Ok(SpecializedReport::Maintenance { report, detail })
            }
            ReportType::LostAndFound => {
                let item = self.store.lost_found(report_id)?.ok_or_else(missing)?;
                Ok(SpecializedReport::LostAndFound { report, item })
            }
        }
    }

    fn plan(&self, request: &TriageRequest, report: &Report) -> Result<DetailPlan, WorkflowError> {
        let fields = &request.fields;
        match &request.report_type {
            ReportType::Maintenance => Ok(DetailPlan::Maintenance(MaintenanceDetail {
                report_id: report.id,
                category: fields.category.clone(),
                priority: fields.priority.clone(),
                assigned_staff: fields.assigned_staff.clone(),
            })),
            ReportType::LostAndFound => {
                let raw = fields.item_type.as_deref().unwrap_or_default();
                let item_type = ItemType::parse(raw).ok_or_else(|| {
                    WorkflowError::validation(format!(
                        "item_type must be 'lost' or 'found', got '{raw}'"
                    ))
                })?;
                Ok(DetailPlan::LostAndFound(LostFoundUpsert {
                    report_id: report.id,
                    owner_user_id: request.sender_id,
                    item_type,
                    category: fields.category.clone(),
                    location: fields
                        .location
                        .clone()
                        .unwrap_or_else(|| report.location.clone()),
                    description: fields
                        .description
                        .clone()
                        .unwrap_or_else(|| report.description.clone()),
                    item_name: fields.item_name.clone(),
                    contact_info: fields.contact_info.clone(),
                    is_anonymous: fields.is_anonymous.unwrap_or(report.is_anonymous),
                }))
            }
            ReportType::Unset => Err(WorkflowError::validation("report_type is required")),
            ReportType::Other(_) => Ok(DetailPlan::None),
        }
    }

    /// Assigns the report type, advances the status, and upserts the matching detail row.
    ///
    /// When the detail write fails the report row is restored to its prior type and status; if
    /// that restore fails too the caller gets [`WorkflowError::PartialFailure`].
    pub fn specialize(
        &self,
        request: TriageRequest,
    ) -> Result<WorkflowOutcome<SpecializedReport>, WorkflowError> {
        let report_id = request.report_id;
        let prior = self
            .store
            .report(report_id)?
            .ok_or_else(|| WorkflowError::not_found("Report not found"))?;
        let plan = self.plan(&request, &prior)?;
        let target = Transition::Triage.target();

        if self.store.update_report(
            report_id,
            ReportPatch::triage(request.report_type.clone(), target),
        )? == 0
        {
            return Err(WorkflowError::not_found("Report not found"));
        }

        let detail_result = match plan {
            DetailPlan::Maintenance(detail) => self.store.upsert_maintenance(detail).map(|_| ()),
            DetailPlan::LostAndFound(detail) => self.store.upsert_lost_found(detail).map(|_| ()),
            DetailPlan::None => Ok(()),
        };

        if let Err(source) = detail_result {
            warn!(%report_id, error = %source, "detail upsert failed; restoring report row");
            let restore = ReportPatch::triage(prior.report_type.clone(), prior.status);
            return match self.store.update_report(report_id, restore) {
                Ok(_) => Err(WorkflowError::Store(source)),
                Err(restore_error) => {
                    error!(
                        %report_id,
                        error = %restore_error,
                        "report left typed without a detail row"
                    );
                    Err(WorkflowError::PartialFailure {
                        completed: "report type update",
                        source,
                    })
                }
            };
        }

        info!(
            %report_id,
            report_type = request.report_type.label(),
            status = target.label(),
            "report triaged"
        );

        let specialized = self.load(report_id)?;
        let message = match specialized {
            SpecializedReport::Other { .. } => "Report type updated successfully",
            _ => "Report updated successfully",
        };
        let warnings = self
            .effects
            .dispatch(vec![SideEffect::broadcast(ReportEvent::Update)]);

        Ok(WorkflowOutcome::new(message, specialized).with_warnings(warnings))
    }
}
