use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::broadcast::BroadcastHub;
use super::claims::ClaimSubmission;
use super::domain::{
    Actor, ClaimId, ItemId, NotificationId, ReportId, ReportStatus, ReportType, Role, UserId,
};
use super::effects::SideEffects;
use super::error::WorkflowError;
use super::files::{FileStore, ImageUpload};
use super::matcher::MatchMode;
use super::outcome::WorkflowOutcome;
use super::repository::RecordStore;
use super::service::{CreateReportRequest, ReportService, UpdateReportRequest};
use super::specializer::{TriageFields, TriageRequest};

type SharedService<S, F, E> = Arc<ReportService<S, F, E>>;

/// Router exposing report, lost-and-found, claim, and notification endpoints.
pub fn report_router<S, F, E>(service: SharedService<S, F, E>) -> Router
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    Router::new()
        .route(
            "/api/v1/reports",
            post(create_handler::<S, F, E>).get(active_reports_handler::<S, F, E>),
        )
        .route(
            "/api/v1/reports/:id",
            put(update_handler::<S, F, E>).delete(owner_delete_handler::<S, F, E>),
        )
        .route(
            "/api/v1/reports/:id/archive",
            put(archive_handler::<S, F, E>),
        )
        .route(
            "/api/v1/reports/user/:user_id",
            get(user_reports_handler::<S, F, E>),
        )
        .route(
            "/api/v1/admin/reports/:id",
            delete(admin_delete_handler::<S, F, E>),
        )
        .route(
            "/api/v1/admin/reports/:id/status",
            put(status_handler::<S, F, E>),
        )
        .route(
            "/api/v1/admin/reports/:id/type",
            put(report_type_handler::<S, F, E>),
        )
        .route(
            "/api/v1/lost-found/items",
            get(items_handler::<S, F, E>),
        )
        .route(
            "/api/v1/lost-found/matches",
            get(matches_handler::<S, F, E>),
        )
        .route(
            "/api/v1/lost-found/items/:id/claims",
            post(submit_claim_handler::<S, F, E>).get(claims_handler::<S, F, E>),
        )
        .route(
            "/api/v1/lost-found/items/:id/accept-claim",
            post(accept_claim_handler::<S, F, E>),
        )
        .route(
            "/api/v1/lost-found/claims/:id/reject",
            post(reject_claim_handler::<S, F, E>),
        )
        .route(
            "/api/v1/notifications/:user_id",
            get(notifications_handler::<S, F, E>),
        )
        .route(
            "/api/v1/notifications/:user_id/:notification_id/read",
            put(mark_read_handler::<S, F, E>),
        )
        .with_state(service)
}

/// Router relaying broadcast events to WebSocket observers at `/ws`.
pub fn events_router(hub: BroadcastHub) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(hub)
}

fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Unauthorized(_) => StatusCode::FORBIDDEN,
        WorkflowError::Store(_)
        | WorkflowError::File(_)
        | WorkflowError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: WorkflowError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!(error = %error, "request failed");
    }
    let payload = json!({
        "success": false,
        "message": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<WorkflowOutcome<T>, WorkflowError>,
) -> Response {
    match result {
        Ok(outcome) => (status, Json(outcome)).into_response(),
        Err(error) => failure(error),
    }
}

fn listing<T: Serialize>(message: &str, result: Result<T, WorkflowError>) -> Response {
    respond(
        StatusCode::OK,
        result.map(|data| WorkflowOutcome::new(message, data)),
    )
}

/// Image attached inline as base64.
#[derive(Debug, Deserialize)]
pub(crate) struct ImagePayload {
    pub(crate) file_name: String,
    pub(crate) data: String,
}

impl ImagePayload {
    fn decode(self) -> Result<ImageUpload, WorkflowError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map(|bytes| ImageUpload {
                file_name: self.file_name,
                bytes,
            })
            .map_err(|err| {
                WorkflowError::validation(format!("image is not valid base64: {err}"))
            })
    }
}

fn decode_image(image: Option<ImagePayload>) -> Result<Option<ImageUpload>, WorkflowError> {
    image.map(ImagePayload::decode).transpose()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CreateReportBody {
    pub(crate) reporter_id: Option<UserId>,
    pub(crate) location: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_anonymous: bool,
    pub(crate) image: Option<ImagePayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateReportBody {
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) image: Option<ImagePayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerBody {
    pub(crate) user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleBody {
    pub(crate) role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    pub(crate) status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportTypeBody {
    pub(crate) report_type: ReportType,
    pub(crate) sender_id: UserId,
    #[serde(flatten)]
    pub(crate) fields: TriageFields,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MatchesQuery {
    #[serde(default)]
    pub(crate) symmetric: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClaimBody {
    pub(crate) claimer_id: UserId,
    pub(crate) holder_id: UserId,
    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcceptClaimBody {
    pub(crate) holder_id: UserId,
    pub(crate) claimer_id: UserId,
}

pub(crate) async fn create_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Json(body): Json<CreateReportBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    let result = decode_image(body.image).and_then(|image| {
        service.create_report(CreateReportRequest {
            reporter_id: body.reporter_id,
            location: body.location,
            description: body.description,
            is_anonymous: body.is_anonymous,
            image,
        })
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn update_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
    Json(body): Json<UpdateReportBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    let result = decode_image(body.image).and_then(|image| {
        service.update_report(UpdateReportRequest {
            report_id,
            user_id: body.user_id,
            location: body.location,
            description: body.description,
            image,
        })
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn owner_delete_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
    Json(body): Json<OwnerBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(
        StatusCode::OK,
        service.delete_report_as_owner(report_id, body.user_id),
    )
}

pub(crate) async fn admin_delete_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
    Json(body): Json<RoleBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(
        StatusCode::OK,
        service.delete_report_as_admin(report_id, body.role),
    )
}

pub(crate) async fn archive_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(StatusCode::OK, service.archive_report(report_id))
}

pub(crate) async fn active_reports_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    listing("Reports fetched", service.list_active_reports())
}

pub(crate) async fn user_reports_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(user_id): Path<UserId>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    listing("Reports fetched", service.list_user_reports(user_id))
}

pub(crate) async fn status_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
    Json(body): Json<StatusBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    let result = ReportStatus::parse(&body.status)
        .ok_or_else(|| WorkflowError::validation(format!("Invalid status '{}'", body.status)))
        .and_then(|status| service.set_status(report_id, status));
    respond(StatusCode::OK, result)
}

pub(crate) async fn report_type_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(report_id): Path<ReportId>,
    Json(body): Json<ReportTypeBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(
        StatusCode::OK,
        service.set_report_type(TriageRequest {
            report_id,
            report_type: body.report_type,
            sender_id: body.sender_id,
            fields: body.fields,
        }),
    )
}

pub(crate) async fn items_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    listing("Lost and found items fetched", service.lost_found_items())
}

pub(crate) async fn matches_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Query(query): Query<MatchesQuery>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    let mode = if query.symmetric {
        MatchMode::Symmetric
    } else {
        MatchMode::Directional
    };
    listing("Matches computed", service.matches(mode))
}

pub(crate) async fn submit_claim_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(item_id): Path<ItemId>,
    Json(body): Json<ClaimBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(
        StatusCode::CREATED,
        service.submit_claim(ClaimSubmission {
            item_id,
            claimer_id: body.claimer_id,
            holder_id: body.holder_id,
            description: body.description,
        }),
    )
}

pub(crate) async fn claims_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(item_id): Path<ItemId>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    listing("Claims fetched", service.claims_for_item(item_id))
}

pub(crate) async fn accept_claim_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(item_id): Path<ItemId>,
    Json(body): Json<AcceptClaimBody>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(
        StatusCode::OK,
        service.accept_claim(item_id, body.holder_id, body.claimer_id),
    )
}

pub(crate) async fn reject_claim_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(claim_id): Path<ClaimId>,
    Json(actor): Json<Actor>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    respond(StatusCode::OK, service.reject_claim(claim_id, actor))
}

pub(crate) async fn notifications_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path(user_id): Path<UserId>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    listing("Notifications fetched", service.notifications(user_id))
}

pub(crate) async fn mark_read_handler<S, F, E>(
    State(service): State<SharedService<S, F, E>>,
    Path((user_id, notification_id)): Path<(UserId, NotificationId)>,
) -> Response
where
    S: RecordStore + 'static,
    F: FileStore + 'static,
    E: SideEffects + 'static,
{
    let result = service
        .mark_notification_read(notification_id, user_id)
        .map(|notification| WorkflowOutcome::new("Notification marked as read", notification));
    respond(StatusCode::OK, result)
}

pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<BroadcastHub>) -> Response {
    ws.on_upgrade(move |socket| relay_events(socket, hub))
}

/// Pushes every hub event to the socket as JSON until either side goes away.
async fn relay_events(socket: WebSocket, hub: BroadcastHub) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = hub.subscribe();
    debug!(observers = hub.observer_count(), "observer connected");

    let mut forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer lagged; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, event = event.name(), "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; the loop only watches for the close.
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }
    debug!("observer disconnected");
}
