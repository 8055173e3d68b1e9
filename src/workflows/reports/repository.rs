use super::domain::{
    Claim, ClaimId, ClaimStatus, FileHandle, ItemId, LostFoundDetail, LostFoundUpsert,
    MaintenanceDetail, NewClaim, NewNotification, NewReport, Notification, NotificationId, Report,
    ReportId, ReportStatus, ReportType, UserId,
};

/// Row filter for report listings. Results are always ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub reporter_id: Option<UserId>,
    pub include_archived: bool,
    pub untyped_only: bool,
}

impl ReportFilter {
    pub fn active_untyped() -> Self {
        Self {
            reporter_id: None,
            include_archived: false,
            untyped_only: true,
        }
    }

    pub fn active_for(user_id: UserId) -> Self {
        Self {
            reporter_id: Some(user_id),
            include_archived: false,
            untyped_only: false,
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        if !self.include_archived && report.archived {
            return false;
        }
        if self.untyped_only && !report.report_type.is_unset() {
            return false;
        }
        match self.reporter_id {
            Some(user_id) => report.reporter_id == user_id,
            None => true,
        }
    }
}

/// Column-level patch for a report row; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPatch {
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<Option<FileHandle>>,
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
    pub archived: Option<bool>,
}

impl ReportPatch {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn archive() -> Self {
        Self {
            archived: Some(true),
            ..Self::default()
        }
    }

    pub fn triage(report_type: ReportType, status: ReportStatus) -> Self {
        Self {
            report_type: Some(report_type),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(self, report: &mut Report) {
        if let Some(location) = self.location {
            report.location = location;
        }
        if let Some(description) = self.description {
            report.description = description;
        }
        if let Some(image_path) = self.image_path {
            report.image_path = image_path;
        }
        if let Some(report_type) = self.report_type {
            report.report_type = report_type;
        }
        if let Some(status) = self.status {
            report.status = status;
        }
        if let Some(archived) = self.archived {
            report.archived = archived;
        }
    }
}

/// Typed access to the persisted record families.
///
/// Every call is atomic on its own; workflows compose several calls and handle partial failure
/// themselves. Mutations return the affected row count so callers can tell "no such row" apart
/// from success.
pub trait RecordStore: Send + Sync {
    fn insert_report(&self, report: NewReport) -> Result<Report, StoreError>;
    fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError>;
    fn update_report(&self, id: ReportId, patch: ReportPatch) -> Result<u64, StoreError>;
    /// Removes the report together with its detail rows and any claims against its item.
    fn delete_report(&self, id: ReportId) -> Result<u64, StoreError>;
    fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError>;

    /// Insert, or update category/priority/staff in place when a row exists for the report.
    fn upsert_maintenance(&self, detail: MaintenanceDetail) -> Result<u64, StoreError>;
    fn maintenance(&self, report_id: ReportId) -> Result<Option<MaintenanceDetail>, StoreError>;

    /// Insert, or update item type/name/contact in place when a row exists for the report.
    fn upsert_lost_found(&self, detail: LostFoundUpsert) -> Result<LostFoundDetail, StoreError>;
    fn lost_found(&self, report_id: ReportId) -> Result<Option<LostFoundDetail>, StoreError>;
    fn item(&self, id: ItemId) -> Result<Option<LostFoundDetail>, StoreError>;
    fn list_items(&self) -> Result<Vec<LostFoundDetail>, StoreError>;
    /// Reassigns the owner only when the item is currently owned by `holder_id`.
    fn transfer_item(
        &self,
        id: ItemId,
        holder_id: UserId,
        new_owner: UserId,
    ) -> Result<u64, StoreError>;

    fn insert_claim(&self, claim: NewClaim) -> Result<Claim, StoreError>;
    fn claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError>;
    fn claims_for_item(&self, item_id: ItemId) -> Result<Vec<Claim>, StoreError>;
    fn set_claim_status(&self, id: ClaimId, status: ClaimStatus) -> Result<u64, StoreError>;

    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;
    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError>;
    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;
    fn mark_notification_read(&self, id: NotificationId) -> Result<u64, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("inconsistent record state: {0}")]
    Inconsistent(String),
}
