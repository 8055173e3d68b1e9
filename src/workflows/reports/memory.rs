use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Claim, ClaimId, ClaimStatus, ItemId, LostFoundDetail, LostFoundUpsert, MaintenanceDetail,
    NewClaim, NewNotification, NewReport, Notification, NotificationId, Report, ReportId,
    ReportType, UserId,
};
use super::repository::{RecordStore, ReportFilter, ReportPatch, StoreError};

#[derive(Debug, Default)]
struct Tables {
    reports: BTreeMap<ReportId, Report>,
    maintenance: BTreeMap<ReportId, MaintenanceDetail>,
    lost_found: BTreeMap<ReportId, LostFoundDetail>,
    claims: BTreeMap<ClaimId, Claim>,
    notifications: BTreeMap<NotificationId, Notification>,
    report_seq: u64,
    item_seq: u64,
    claim_seq: u64,
    notification_seq: u64,
}

impl Tables {
    fn next(seq: &mut u64) -> u64 {
        *seq += 1;
        *seq
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut LostFoundDetail> {
        self.lost_found.values_mut().find(|item| item.id == id)
    }
}

/// Process-local record store. Each call takes the table lock for its own duration only, so
/// workflows never hold it across steps.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
    }
}

fn newest_first<T, K: Ord>(rows: &mut [T], key: impl Fn(&T) -> K) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl RecordStore for InMemoryRecordStore {
    fn insert_report(&self, report: NewReport) -> Result<Report, StoreError> {
        let mut tables = self.tables()?;
        let id = ReportId(Tables::next(&mut tables.report_seq));
        let row = Report {
            id,
            reporter_id: report.reporter_id,
            location: report.location,
            description: report.description,
            report_type: ReportType::Unset,
            status: report.status,
            image_path: report.image_path,
            is_anonymous: report.is_anonymous,
            archived: false,
            created_at: Utc::now(),
        };
        tables.reports.insert(id, row.clone());
        Ok(row)
    }

    fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.tables()?.reports.get(&id).cloned())
    }

    fn update_report(&self, id: ReportId, patch: ReportPatch) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.reports.get_mut(&id) {
            Some(report) => {
                patch.apply(report);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_report(&self, id: ReportId) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        if tables.reports.remove(&id).is_none() {
            return Ok(0);
        }
        tables.maintenance.remove(&id);
        if let Some(item) = tables.lost_found.remove(&id) {
            tables.claims.retain(|_, claim| claim.item_id != item.id);
        }
        Ok(1)
    }

    fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Report> = tables
            .reports
            .values()
            .filter(|report| filter.matches(report))
            .cloned()
            .collect();
        newest_first(&mut rows, |report| (report.created_at, report.id));
        Ok(rows)
    }

    fn upsert_maintenance(&self, detail: MaintenanceDetail) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.maintenance.get_mut(&detail.report_id) {
            Some(existing) => {
                existing.category = detail.category;
                existing.priority = detail.priority;
                existing.assigned_staff = detail.assigned_staff;
                Ok(2)
            }
            None => {
                tables.maintenance.insert(detail.report_id, detail);
                Ok(1)
            }
        }
    }

    fn maintenance(&self, report_id: ReportId) -> Result<Option<MaintenanceDetail>, StoreError> {
        Ok(self.tables()?.maintenance.get(&report_id).cloned())
    }

    fn upsert_lost_found(&self, detail: LostFoundUpsert) -> Result<LostFoundDetail, StoreError> {
        let mut tables = self.tables()?;
        if let Some(existing) = tables.lost_found.get_mut(&detail.report_id) {
            existing.item_type = detail.item_type;
            existing.item_name = detail.item_name;
            existing.contact_info = detail.contact_info;
            return Ok(existing.clone());
        }

        let id = ItemId(Tables::next(&mut tables.item_seq));
        let row = LostFoundDetail {
            id,
            report_id: detail.report_id,
            owner_user_id: detail.owner_user_id,
            item_type: detail.item_type,
            category: detail.category,
            location: detail.location,
            description: detail.description,
            item_name: detail.item_name,
            contact_info: detail.contact_info,
            is_anonymous: detail.is_anonymous,
        };
        tables.lost_found.insert(detail.report_id, row.clone());
        Ok(row)
    }

    fn lost_found(&self, report_id: ReportId) -> Result<Option<LostFoundDetail>, StoreError> {
        Ok(self.tables()?.lost_found.get(&report_id).cloned())
    }

    fn item(&self, id: ItemId) -> Result<Option<LostFoundDetail>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.lost_found.values().find(|item| item.id == id).cloned())
    }

    fn list_items(&self) -> Result<Vec<LostFoundDetail>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<LostFoundDetail> = tables.lost_found.values().cloned().collect();
        rows.sort_by_key(|item| item.id);
        Ok(rows)
    }

    fn transfer_item(
        &self,
        id: ItemId,
        holder_id: UserId,
        new_owner: UserId,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.item_mut(id) {
            Some(item) if item.owner_user_id == holder_id => {
                item.owner_user_id = new_owner;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn insert_claim(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        let mut tables = self.tables()?;
        let id = ClaimId(Tables::next(&mut tables.claim_seq));
        let row = Claim {
            id,
            item_id: claim.item_id,
            claimer_id: claim.claimer_id,
            holder_id: claim.holder_id,
            description: claim.description,
            status: ClaimStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        };
        tables.claims.insert(id, row.clone());
        Ok(row)
    }

    fn claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError> {
        Ok(self.tables()?.claims.get(&id).cloned())
    }

    fn claims_for_item(&self, item_id: ItemId) -> Result<Vec<Claim>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Claim> = tables
            .claims
            .values()
            .filter(|claim| claim.item_id == item_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |claim| (claim.created_at, claim.id));
        Ok(rows)
    }

    fn set_claim_status(&self, id: ClaimId, status: ClaimStatus) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.claims.get_mut(&id) {
            Some(claim) => {
                claim.status = status;
                claim.resolved_at = match status {
                    ClaimStatus::Open => None,
                    ClaimStatus::Accepted | ClaimStatus::Rejected => Some(Utc::now()),
                };
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut tables = self.tables()?;
        let id = NotificationId(Tables::next(&mut tables.notification_seq));
        let row = Notification {
            id,
            report_id: notification.report_id,
            user_id: notification.user_id,
            audience: notification.audience,
            title: notification.title,
            message: notification.message,
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.insert(id, row.clone());
        Ok(row)
    }

    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |notification| {
            (notification.created_at, notification.id)
        });
        Ok(rows)
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        Ok(self.tables()?.notifications.get(&id).cloned())
    }

    fn mark_notification_read(&self, id: NotificationId) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        match tables.notifications.get_mut(&id) {
            Some(notification) => {
                notification.read = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
