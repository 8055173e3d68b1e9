//! Facility report lifecycle: intake, admin triage into typed detail records, status
//! tracking, lost-and-found matching, ownership claims, and change notification.

pub mod broadcast;
pub mod claims;
pub mod domain;
pub mod effects;
pub mod error;
pub mod files;
pub mod matcher;
pub mod memory;
pub mod notifications;
pub mod outcome;
pub mod repository;
pub mod router;
pub mod service;
pub mod specializer;
pub mod status;

#[cfg(test)]
mod tests;

pub use broadcast::{BroadcastHub, EventPublisher, PublishError, ReportEvent};
pub use claims::{ClaimAcceptance, ClaimSubmission, ClaimWorkflow};
pub use domain::{
    Actor, Claim, ClaimId, ClaimStatus, FileHandle, ItemId, ItemType, LostFoundDetail,
    MaintenanceDetail, Notification, NotificationAudience, NotificationId, Report, ReportId,
    ReportStatus, ReportType, ReportView, ReporterView, Role, UserId,
};
pub use effects::{DeferredEffects, EffectRunner, InlineEffects, SideEffect, SideEffects};
pub use error::WorkflowError;
pub use files::{FileStore, FileStoreError, ImageUpload, LocalFileStore};
pub use matcher::{find_matches, CandidateMatch, MatchMode, MatchReason};
pub use memory::InMemoryRecordStore;
pub use notifications::NotificationDispatcher;
pub use outcome::WorkflowOutcome;
pub use repository::{RecordStore, ReportFilter, ReportPatch, StoreError};
pub use router::{events_router, report_router};
pub use service::{CreateReportRequest, ReportService, UpdateReportRequest};
pub use specializer::{ReportTypeSpecializer, SpecializedReport, TriageFields, TriageRequest};
pub use status::{StatusStateMachine, Transition};
