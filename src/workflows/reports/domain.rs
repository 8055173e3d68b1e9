use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Store-generated identifier for a submitted report.
    ReportId
);
record_id!(
    /// Identifier of a lost-and-found item row (distinct from its owning report).
    ItemId
);
record_id!(ClaimId);
record_id!(NotificationId);
record_id!(
    /// Member identity as asserted by the identity collaborator.
    UserId
);

/// Role supplied alongside the caller's id. Trusted as asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

/// Caller identity for operations that check ownership or role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Lifecycle status shared by every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(ReportStatus::Pending),
            "in_progress" => Some(ReportStatus::InProgress),
            "resolved" => Some(ReportStatus::Resolved),
            _ => None,
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
        }
    }
}

/// Triage classification. Unknown tags are retained verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ReportType {
    #[default]
    Unset,
    Maintenance,
    LostAndFound,
    Other(String),
}

pub const MAINTENANCE_REPORT_LABEL: &str = "Maintenance Report";
pub const LOST_AND_FOUND_LABEL: &str = "Lost And Found";

impl ReportType {
    pub fn from_label(raw: &str) -> Self {
        match raw {
            "" => ReportType::Unset,
            MAINTENANCE_REPORT_LABEL => ReportType::Maintenance,
            LOST_AND_FOUND_LABEL => ReportType::LostAndFound,
            other => ReportType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ReportType::Unset => "",
            ReportType::Maintenance => MAINTENANCE_REPORT_LABEL,
            ReportType::LostAndFound => LOST_AND_FOUND_LABEL,
            ReportType::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ReportType::Unset)
    }
}

impl Serialize for ReportType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ReportType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(ReportType::from_label(&raw))
    }
}

/// Opaque reference returned by the file storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(pub String);

/// Generic report row as persisted before and after triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub reporter_id: UserId,
    pub location: String,
    pub description: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub image_path: Option<FileHandle>,
    pub is_anonymous: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields the store needs to create a report; id and timestamp are store-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub reporter_id: UserId,
    pub location: String,
    pub description: String,
    pub image_path: Option<FileHandle>,
    pub is_anonymous: bool,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceDetail {
    pub report_id: ReportId,
    pub category: String,
    pub priority: String,
    pub assigned_staff: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Lost,
    Found,
}

impl ItemType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lost" => Some(ItemType::Lost),
            "found" => Some(ItemType::Found),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ItemType::Lost => "lost",
            ItemType::Found => "found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostFoundDetail {
    pub id: ItemId,
    pub report_id: ReportId,
    pub owner_user_id: UserId,
    pub item_type: ItemType,
    pub category: String,
    pub location: String,
    pub description: String,
    pub item_name: String,
    pub contact_info: String,
    pub is_anonymous: bool,
}

/// Lost-and-found upsert payload keyed by `report_id`; the item id is store-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostFoundUpsert {
    pub report_id: ReportId,
    pub owner_user_id: UserId,
    pub item_type: ItemType,
    pub category: String,
    pub location: String,
    pub description: String,
    pub item_name: String,
    pub contact_info: String,
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Open,
    Accepted,
    Rejected,
}

impl ClaimStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ClaimStatus::Open => "open",
            ClaimStatus::Accepted => "accepted",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub item_id: ItemId,
    pub claimer_id: UserId,
    pub holder_id: UserId,
    pub description: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClaim {
    pub item_id: ItemId,
    pub claimer_id: UserId,
    pub holder_id: UserId,
    pub description: String,
}

/// Who a notification row is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAudience {
    Admins,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub report_id: ReportId,
    pub user_id: UserId,
    pub audience: NotificationAudience,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub report_id: ReportId,
    pub user_id: UserId,
    pub audience: NotificationAudience,
    pub title: String,
    pub message: String,
}

/// Reporter identity as exposed to a particular viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum ReporterView {
    Anonymous,
    Identified(UserId),
}

/// Report projection safe to hand to observers and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub id: ReportId,
    pub reporter: ReporterView,
    pub location: String,
    pub description: String,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub image_path: Option<FileHandle>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.reporter_id == user_id
    }

    /// Projects the report for `viewer`; anonymous reporters stay masked unless the viewer owns it.
    pub fn view_for(&self, viewer: Option<UserId>) -> ReportView {
        let reporter = if self.is_anonymous && viewer != Some(self.reporter_id) {
            ReporterView::Anonymous
        } else {
            ReporterView::Identified(self.reporter_id)
        };

        ReportView {
            id: self.id,
            reporter,
            location: self.location.clone(),
            description: self.description.clone(),
            report_type: self.report_type.clone(),
            status: self.status,
            image_path: self.image_path.clone(),
            is_anonymous: self.is_anonymous,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(is_anonymous: bool) -> Report {
        Report {
            id: ReportId(1),
            reporter_id: UserId(7),
            location: "Lib 2F".to_string(),
            description: "leaking pipe".to_string(),
            report_type: ReportType::Unset,
            status: ReportStatus::Pending,
            image_path: None,
            is_anonymous,
            archived: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn report_type_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&ReportType::LostAndFound).expect("serializes");
        assert_eq!(json, "\"Lost And Found\"");

        let parsed: ReportType = serde_json::from_str("\"Parking\"").expect("deserializes");
        assert_eq!(parsed, ReportType::Other("Parking".to_string()));

        let unset: ReportType = serde_json::from_str("\"\"").expect("deserializes");
        assert!(unset.is_unset());
    }

    #[test]
    fn anonymous_reporter_is_masked_for_everyone_but_the_owner() {
        let anonymous = report(true);
        assert_eq!(anonymous.view_for(None).reporter, ReporterView::Anonymous);
        assert_eq!(
            anonymous.view_for(Some(UserId(2))).reporter,
            ReporterView::Anonymous
        );
        assert_eq!(
            anonymous.view_for(Some(UserId(7))).reporter,
            ReporterView::Identified(UserId(7))
        );
        assert_eq!(
            report(false).view_for(None).reporter,
            ReporterView::Identified(UserId(7))
        );
    }

    #[test]
    fn status_parse_accepts_only_known_values() {
        assert_eq!(
            ReportStatus::parse("in_progress"),
            Some(ReportStatus::InProgress)
        );
        assert_eq!(ReportStatus::parse("closed"), None);
        assert_eq!(ItemType::parse("Found"), Some(ItemType::Found));
    }
}
