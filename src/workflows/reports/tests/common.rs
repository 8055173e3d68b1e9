use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::reports::broadcast::{EventPublisher, PublishError, ReportEvent};
use crate::workflows::reports::domain::{
    Claim, ClaimId, ClaimStatus, FileHandle, ItemId, ItemType, LostFoundDetail, LostFoundUpsert,
    MaintenanceDetail, NewClaim, NewNotification, NewReport, Notification, NotificationId, Report,
    ReportId, ReportType, UserId,
};
use crate::workflows::reports::effects::InlineEffects;
use crate::workflows::reports::files::{FileStore, FileStoreError, ImageUpload};
use crate::workflows::reports::memory::InMemoryRecordStore;
use crate::workflows::reports::repository::{
    RecordStore, ReportFilter, ReportPatch, StoreError,
};
use crate::workflows::reports::service::{CreateReportRequest, ReportService};
use crate::workflows::reports::specializer::{TriageFields, TriageRequest};

pub(super) type TestService =
    ReportService<FlakyStore, MemoryFiles, InlineEffects<FlakyStore, RecordingPublisher>>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<FlakyStore>,
    pub(super) files: Arc<MemoryFiles>,
    pub(super) events: Arc<RecordingPublisher>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(FlakyStore::default());
    let files = Arc::new(MemoryFiles::default());
    let events = Arc::new(RecordingPublisher::default());
    let effects = Arc::new(InlineEffects::new(store.clone(), events.clone()));
    let service = Arc::new(ReportService::new(store.clone(), files.clone(), effects));
    Harness {
        service,
        store,
        files,
        events,
    }
}

pub(super) fn create_request(
    reporter: u64,
    location: &str,
    description: &str,
) -> CreateReportRequest {
    CreateReportRequest {
        reporter_id: Some(UserId(reporter)),
        location: Some(location.to_string()),
        description: Some(description.to_string()),
        is_anonymous: false,
        image: None,
    }
}

pub(super) fn image(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

pub(super) fn seed_report(harness: &Harness, reporter: u64, location: &str) -> Report {
    harness
        .service
        .create_report(create_request(reporter, location, "needs attention"))
        .expect("report created")
        .data
}

pub(super) fn maintenance_triage(report_id: ReportId, priority: &str) -> TriageRequest {
    TriageRequest {
        report_id,
        report_type: ReportType::Maintenance,
        sender_id: UserId(1),
        fields: TriageFields {
            category: "plumbing".to_string(),
            priority: priority.to_string(),
            assigned_staff: "Dana".to_string(),
            ..TriageFields::default()
        },
    }
}

pub(super) fn lost_found_triage(
    report_id: ReportId,
    sender: u64,
    item_type: ItemType,
    item_name: &str,
) -> TriageRequest {
    TriageRequest {
        report_id,
        report_type: ReportType::LostAndFound,
        sender_id: UserId(sender),
        fields: TriageFields {
            category: "bags".to_string(),
            item_type: Some(item_type.label().to_string()),
            item_name: item_name.to_string(),
            contact_info: "front desk".to_string(),
            description: Some(match item_type {
                ItemType::Lost => "left near lockers".to_string(),
                ItemType::Found => "found near lockers".to_string(),
            }),
            ..TriageFields::default()
        },
    }
}

/// Creates a report and files it as a lost-and-found item owned by `owner`.
pub(super) fn seed_item(
    harness: &Harness,
    owner: u64,
    item_type: ItemType,
    item_name: &str,
    location: &str,
) -> LostFoundDetail {
    let report = seed_report(harness, owner, location);
    harness
        .service
        .set_report_type(lost_found_triage(report.id, owner, item_type, item_name))
        .expect("triaged");
    harness
        .store
        .lost_found(report.id)
        .expect("store reachable")
        .expect("item row exists")
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<ReportEvent>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }

    pub(super) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(ReportEvent::name).collect()
    }

    pub(super) fn clear(&self) {
        self.events.lock().expect("publisher mutex poisoned").clear();
    }

    pub(super) fn fail_publishing(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ReportEvent) -> Result<usize, PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Transport("socket hub offline".to_string()));
        }
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(1)
    }
}

#[derive(Default)]
pub(super) struct MemoryFiles {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    sequence: AtomicU64,
    fail_removals: AtomicBool,
}

impl MemoryFiles {
    pub(super) fn stored(&self) -> Vec<String> {
        self.files
            .lock()
            .expect("file mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub(super) fn fail_removals(&self) {
        self.fail_removals.store(true, Ordering::SeqCst);
    }
}

impl FileStore for MemoryFiles {
    fn store(&self, upload: ImageUpload) -> Result<FileHandle, FileStoreError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{seq}-{}", upload.file_name);
        self.files
            .lock()
            .expect("file mutex poisoned")
            .insert(name.clone(), upload.bytes);
        Ok(FileHandle(name))
    }

    fn exists(&self, handle: &FileHandle) -> bool {
        self.files
            .lock()
            .expect("file mutex poisoned")
            .contains_key(&handle.0)
    }

    fn remove(&self, handle: &FileHandle) -> Result<(), FileStoreError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(FileStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )));
        }
        self.files
            .lock()
            .expect("file mutex poisoned")
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| FileStoreError::Missing(handle.0.clone()))
    }
}

/// Memory store with switches for injecting failures into individual calls.
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryRecordStore,
    fail_report_inserts: AtomicBool,
    fail_detail_upserts: AtomicBool,
    fail_notifications: AtomicBool,
    fail_claim_updates: AtomicBool,
    updates_allowed: AtomicUsize,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            fail_report_inserts: AtomicBool::new(false),
            fail_detail_upserts: AtomicBool::new(false),
            fail_notifications: AtomicBool::new(false),
            fail_claim_updates: AtomicBool::new(false),
            updates_allowed: AtomicUsize::new(usize::MAX),
        }
    }
}

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

impl FlakyStore {
    pub(super) fn fail_report_inserts(&self) {
        self.fail_report_inserts.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_detail_upserts(&self) {
        self.fail_detail_upserts.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_notifications(&self) {
        self.fail_notifications.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_claim_updates(&self) {
        self.fail_claim_updates.store(true, Ordering::SeqCst);
    }

    /// Lets the next `count` report updates through and fails the rest.
    pub(super) fn allow_updates(&self, count: usize) {
        self.updates_allowed.store(count, Ordering::SeqCst);
    }
}

impl RecordStore for FlakyStore {
    fn insert_report(&self, report: NewReport) -> Result<Report, StoreError> {
        if self.fail_report_inserts.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.insert_report(report)
    }

    fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        self.inner.report(id)
    }

    fn update_report(&self, id: ReportId, patch: ReportPatch) -> Result<u64, StoreError> {
        let allowed = self
            .updates_allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if allowed.is_err() {
            return Err(offline());
        }
        self.inner.update_report(id, patch)
    }

    fn delete_report(&self, id: ReportId) -> Result<u64, StoreError> {
        self.inner.delete_report(id)
    }

    fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError> {
        self.inner.list_reports(filter)
    }

    fn upsert_maintenance(&self, detail: MaintenanceDetail) -> Result<u64, StoreError> {
        if self.fail_detail_upserts.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.upsert_maintenance(detail)
    }

    fn maintenance(&self, report_id: ReportId) -> Result<Option<MaintenanceDetail>, StoreError> {
        self.inner.maintenance(report_id)
    }

    fn upsert_lost_found(&self, detail: LostFoundUpsert) -> Result<LostFoundDetail, StoreError> {
        if self.fail_detail_upserts.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.upsert_lost_found(detail)
    }

    fn lost_found(&self, report_id: ReportId) -> Result<Option<LostFoundDetail>, StoreError> {
        self.inner.lost_found(report_id)
    }

    fn item(&self, id: ItemId) -> Result<Option<LostFoundDetail>, StoreError> {
        self.inner.item(id)
    }

    fn list_items(&self) -> Result<Vec<LostFoundDetail>, StoreError> {
        self.inner.list_items()
    }

    fn transfer_item(
        &self,
        id: ItemId,
        holder_id: UserId,
        new_owner: UserId,
    ) -> Result<u64, StoreError> {
        self.inner.transfer_item(id, holder_id, new_owner)
    }

    fn insert_claim(&self, claim: NewClaim) -> Result<Claim, StoreError> {
        self.inner.insert_claim(claim)
    }

    fn claim(&self, id: ClaimId) -> Result<Option<Claim>, StoreError> {
        self.inner.claim(id)
    }

    fn claims_for_item(&self, item_id: ItemId) -> Result<Vec<Claim>, StoreError> {
        self.inner.claims_for_item(item_id)
    }

    fn set_claim_status(&self, id: ClaimId, status: ClaimStatus) -> Result<u64, StoreError> {
        if self.fail_claim_updates.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.set_claim_status(id, status)
    }

    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.inner.insert_notification(notification)
    }

    fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>, StoreError> {
        self.inner.notifications_for(user_id)
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        self.inner.notification(id)
    }

    fn mark_notification_read(&self, id: NotificationId) -> Result<u64, StoreError> {
        self.inner.mark_notification_read(id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
