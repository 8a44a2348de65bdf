//! # HTTP host
//!
//! ```text
//! GET  /:handle                                   public read path
//! GET  /api/pages                                 hosted handles
//! POST /api/pages/:handle/reorder                 main flow drag
//! POST /api/pages/:handle/social/reorder          social row drag
//! PUT  /api/pages/:handle/gallery                 gallery placement
//! PUT  /api/pages/:handle/settings                user settings
//! GET  /api/pages/:handle/notices                 failed-save notices
//! POST /api/pages/:handle/messages                inbound surface message
//! POST /api/pages/:handle/clicks/:id              click tracking
//! GET  /api/pages/:handle/frames                  SSE: frame surface events
//! POST /api/pages/:handle/frames/:surface/ready   frame is live
//! POST /api/pages/:handle/frames/:surface/size    frame size report
//! ```

use crate::state::{PageEntry, PageRegistry, StateError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::{self, Stream};
use pagesync_editor::{EditStart, EditorError, Notice, ReorderError, ReorderReport, SequenceKind};
use pagesync_model::{GalleryPlacement, ItemId, ItemKey, LayoutMode, Link, MergedSequence, UserSettings};
use pagesync_preview::{
    EntryQuery, FrameEvent, FrameSize, RenderSurface, SurfaceEntryPoint, SurfaceId, SurfaceKey,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::State(StateError::UnknownPage(_) | StateError::UnknownFrame { .. }) => StatusCode::NOT_FOUND,
            ApiError::State(StateError::AlreadyRegistered(_)) => StatusCode::CONFLICT,
            ApiError::UnknownItem(_) => StatusCode::NOT_FOUND,
            ApiError::State(_) | ApiError::Editor(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared state behind every route
#[derive(Clone)]
pub struct WorkspaceServer {
    registry: Arc<PageRegistry>,
    base_url: Arc<str>,
}

impl WorkspaceServer {
    pub fn new(registry: PageRegistry, base_url: impl Into<String>) -> Self {
        Self {
            registry: Arc::new(registry),
            base_url: base_url.into().into(),
        }
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/:handle", get(read_page))
            .route("/api/pages", get(list_pages))
            .route("/api/pages/:handle/reorder", post(reorder_main))
            .route("/api/pages/:handle/social/reorder", post(reorder_social))
            .route("/api/pages/:handle/gallery", put(set_gallery_placement))
            .route("/api/pages/:handle/settings", put(update_settings))
            .route("/api/pages/:handle/notices", get(take_notices))
            .route("/api/pages/:handle/messages", post(post_message))
            .route("/api/pages/:handle/clicks/:id", post(register_click))
            .route("/api/pages/:handle/frames", get(frame_events))
            .route("/api/pages/:handle/frames/:surface/ready", post(frame_ready))
            .route("/api/pages/:handle/frames/:surface/size", post(frame_size))
            .with_state(self.clone())
            .layer(CorsLayer::permissive())
    }
}

// ============================================================================
// Public read path
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageView {
    handle: String,
    preview: bool,
    layout: LayoutMode,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    items: MergedSequence,
    social: Vec<Link>,
    settings: UserSettings,
}

async fn read_page(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<PageView>, ApiError> {
    let entry = server.registry.get(&handle)?;
    let page = entry.session.lock().await.page().clone();

    Ok(Json(PageView {
        handle: page.handle.clone(),
        preview: query.preview,
        layout: query.layout.unwrap_or(page.settings.layout),
        frame_width: query.frame_width,
        frame_height: query.frame_height,
        items: page.merged(),
        social: page.social(),
        settings: page.settings,
    }))
}

async fn list_pages(State(server): State<WorkspaceServer>) -> Json<Vec<String>> {
    Json(server.registry.handles())
}

// ============================================================================
// Editing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    active: ItemKey,
    over: ItemKey,
}

#[derive(Debug, Deserialize)]
struct PlacementRequest {
    placement: GalleryPlacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ReorderStatus {
    Unchanged,
    Committed,
    Aborted,
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderResponse {
    status: ReorderStatus,
    rolled_back: bool,
    error: Option<String>,
    sequence: MergedSequence,
}

enum Edit {
    Move(SequenceKind, ReorderRequest),
    Placement(GalleryPlacement),
}

impl Edit {
    fn kind(&self) -> SequenceKind {
        match self {
            Edit::Move(kind, _) => *kind,
            Edit::Placement(_) => SequenceKind::Main,
        }
    }
}

async fn reorder_main(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<(StatusCode, Json<ReorderResponse>), ApiError> {
    apply_edit(&server, &handle, Edit::Move(SequenceKind::Main, request)).await
}

async fn reorder_social(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<(StatusCode, Json<ReorderResponse>), ApiError> {
    apply_edit(&server, &handle, Edit::Move(SequenceKind::Social, request)).await
}

async fn set_gallery_placement(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Json(request): Json<PlacementRequest>,
) -> Result<(StatusCode, Json<ReorderResponse>), ApiError> {
    apply_edit(&server, &handle, Edit::Placement(request.placement)).await
}

async fn apply_edit(
    server: &WorkspaceServer,
    handle: &str,
    edit: Edit,
) -> Result<(StatusCode, Json<ReorderResponse>), ApiError> {
    let entry = server.registry.get(handle)?;
    let kind = edit.kind();

    // Runs on its own task: a client hanging up must not cancel a reorder
    // between its optimistic apply and its settlement. The session lock is
    // released while the store works, so reads and other edits go through.
    let task = tokio::spawn(async move {
        let start = {
            let mut session = entry.session.lock().await;
            match &edit {
                Edit::Move(kind, request) => session.start_reorder(*kind, &request.active, &request.over),
                Edit::Placement(placement) => session.start_gallery_placement(*placement),
            }
        };

        let report = match start {
            EditStart::Done(report) => Ok(report),
            EditStart::Persist(write) => {
                let result = write.persist().await;
                entry.session.lock().await.finish(write, result)
            }
        };
        let sequence = kind.sequence_of(entry.session.lock().await.page());
        report.map(|report| (report, sequence))
    });

    let (report, sequence) = task.await.map_err(|error| ApiError::Internal(error.to_string()))??;

    let (status, response) = match report {
        ReorderReport::Unchanged => (StatusCode::OK, ReorderStatus::Unchanged),
        ReorderReport::Committed(_) => (StatusCode::OK, ReorderStatus::Committed),
        ReorderReport::Aborted(ReorderError::InFlight) => (StatusCode::CONFLICT, ReorderStatus::Aborted),
        ReorderReport::Aborted(ref error) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ReorderResponse {
                    status: ReorderStatus::Aborted,
                    rolled_back: false,
                    error: Some(error.to_string()),
                    sequence,
                }),
            ))
        }
        ReorderReport::Failed { error, rolled_back } => {
            return Ok((
                StatusCode::BAD_GATEWAY,
                Json(ReorderResponse {
                    status: ReorderStatus::Failed,
                    rolled_back,
                    error: Some(error.to_string()),
                    sequence,
                }),
            ))
        }
    };

    Ok((
        status,
        Json(ReorderResponse {
            status: response,
            rolled_back: false,
            error: None,
            sequence,
        }),
    ))
}

async fn update_settings(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Json(settings): Json<UserSettings>,
) -> Result<Json<UserSettings>, ApiError> {
    let entry = server.registry.get(&handle)?;
    let mut session = entry.session.lock().await;
    session.update_settings(settings);
    Ok(Json(session.page().settings.clone()))
}

async fn take_notices(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
) -> Result<Json<Vec<Notice>>, ApiError> {
    let entry = server.registry.get(&handle)?;
    let notices = entry.session.lock().await.take_notices();
    Ok(Json(notices))
}

// ============================================================================
// Surfaces
// ============================================================================

async fn post_message(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Json(message): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entry = server.registry.get(&handle)?;
    let recognized = entry.broker.handle_message(&message).map_err(EditorError::from)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "recognized": recognized }))))
}

#[derive(Debug, Serialize)]
struct ClickResponse {
    counted: bool,
    total: u64,
    at: chrono::DateTime<chrono::Utc>,
}

async fn register_click(
    State(server): State<WorkspaceServer>,
    Path((handle, id)): Path<(String, String)>,
) -> Result<Json<ClickResponse>, ApiError> {
    let entry = server.registry.get(&handle)?;
    let id = ItemId::new(id);
    if entry.session.lock().await.page().link(&id).is_none() {
        return Err(ApiError::UnknownItem(id.to_string()));
    }

    let (counted, total) = entry.register_click(&id);
    Ok(Json(ClickResponse {
        counted,
        total,
        at: chrono::Utc::now(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FrameQuery {
    layout: Option<LayoutMode>,
    frame_width: Option<f64>,
    frame_height: Option<f64>,
}

/// Unmounts the frame when its event stream goes away
struct FrameGuard {
    entry: Arc<PageEntry>,
    surface: SurfaceId,
}

impl FrameGuard {
    fn event(&self, event: &FrameEvent) -> Event {
        Event::default().event("frame").data(event.to_json().to_string())
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        tracing::info!(handle = %self.entry.handle, surface = %self.surface, "frame stream closed");
        self.entry.close_frame(self.surface);
    }
}

async fn frame_events(
    State(server): State<WorkspaceServer>,
    Path(handle): Path<String>,
    Query(query): Query<FrameQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let entry = server.registry.get(&handle)?;

    let mut surface_entry = SurfaceEntryPoint::new(&server.base_url, &handle).map_err(StateError::from)?;
    if let Some(layout) = query.layout {
        surface_entry = surface_entry.with_layout(layout);
    }
    if let (Some(width), Some(height)) = (query.frame_width, query.frame_height) {
        surface_entry = surface_entry.with_frame(FrameSize::new(width, height));
    }

    let (surface, frame, events) = entry.open_frame(surface_entry, server.registry.config()).await?;
    let mounted = json!({
        "surface": surface,
        "key": frame.key(),
        "url": frame.entry().url().as_str(),
    });
    tracing::info!(%handle, %surface, "frame stream opened");

    let guard = FrameGuard { entry, surface };
    let initial = stream::once(async move { Ok(Event::default().event("mounted").data(mounted.to_string())) });
    let updates = UnboundedReceiverStream::new(events).map(move |event| Ok(guard.event(&event)));

    Ok(Sse::new(initial.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

#[derive(Debug, Deserialize)]
struct ReadyRequest {
    key: SurfaceKey,
}

async fn frame_ready(
    State(server): State<WorkspaceServer>,
    Path((handle, surface)): Path<(String, SurfaceId)>,
    Json(request): Json<ReadyRequest>,
) -> Result<Json<Value>, ApiError> {
    let frame = server.registry.get(&handle)?.frame(surface)?;
    let live = frame.mark_live(request.key);
    Ok(Json(json!({ "live": live, "key": frame.key() })))
}

async fn frame_size(
    State(server): State<WorkspaceServer>,
    Path((handle, surface)): Path<(String, SurfaceId)>,
    Json(size): Json<FrameSize>,
) -> Result<StatusCode, ApiError> {
    let frame = server.registry.get(&handle)?.frame(surface)?;
    frame.report_size(size);
    Ok(StatusCode::ACCEPTED)
}
