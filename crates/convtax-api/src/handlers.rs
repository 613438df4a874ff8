//! Route handler functions for all API endpoints.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use convtax_core::types::{ConversationHistoryEntry, Notification, Platform};

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "file";

const NO_AUDIO_FILE: &str = "No audio file was uploaded";

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub u_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AudioParams {
    pub u_id: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub u_id: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextIntentBody {
    #[serde(rename = "textInput")]
    pub text_input: String,
}

/// Reply shown to the user.
#[derive(Debug, Serialize, Deserialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub entries: Vec<ConversationHistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewNotificationBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn require_user(u_id: Option<String>) -> Result<String, ApiError> {
    match u_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::BadRequest("Missing user id 'u_id'".to_string())),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /lang/text - detect the intent of a typed message.
pub async fn text_intent(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
    Json(body): Json<TextIntentBody>,
) -> Result<Json<TextResponse>, ApiError> {
    let user_id = require_user(params.u_id)?;
    debug!(user_id = %user_id, "Text intent request");

    let text = state
        .composer
        .respond_to_text(&user_id, &body.text_input)
        .await?;
    Ok(Json(TextResponse { text }))
}

/// POST /lang/audio_upload - detect the intent of a recorded utterance.
///
/// The platform is checked before the body is read, so a request with an
/// unknown platform never reaches the intent detector.
pub async fn audio_upload(
    State(state): State<AppState>,
    Query(params): Query<AudioParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TextResponse>, ApiError> {
    let user_id = require_user(params.u_id)?;
    let platform: Platform = params
        .platform
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(|_| ApiError::BadRequest("Unknown platform".to_string()))?;

    let mut multipart =
        multipart.map_err(|_| ApiError::BadRequest(NO_AUDIO_FILE.to_string()))?;
    let audio = read_audio(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest(NO_AUDIO_FILE.to_string()))?;

    info!(user_id = %user_id, platform = %platform, bytes = audio.len(), "Audio upload");
    let text = state
        .composer
        .respond_to_audio(&user_id, platform, &audio)
        .await?;
    Ok(Json(TextResponse { text }))
}

/// Bytes of the first non-empty `file` part, if any.
async fn read_audio(multipart: &mut Multipart) -> Result<Option<Vec<u8>>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?;
        if !bytes.is_empty() {
            return Ok(Some(bytes.to_vec()));
        }
    }
    Ok(None)
}

/// GET /lang/history - the user's exchanges, most recent first.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = require_user(params.u_id)?;
    let limits = &state.config.history;
    let limit = params
        .limit
        .unwrap_or(limits.default_limit)
        .clamp(1, limits.max_limit.max(1));

    let entries = state.history.recent(&user_id, limit)?;
    Ok(Json(HistoryResponse { entries }))
}

/// GET /lang/notifications - the user's notifications, most recent first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let user_id = require_user(params.u_id)?;
    let notifications = state.notifications.list_for_user(&user_id)?;
    Ok(Json(NotificationsResponse { notifications }))
}

/// POST /lang/notifications - store a notification for a user.
pub async fn create_notification(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
    Json(body): Json<NewNotificationBody>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let user_id = require_user(params.u_id)?;
    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest(
            "Notification title must not be empty".to_string(),
        ));
    }

    let notification = state
        .notifications
        .create(&user_id, title, body.description.trim())?;
    info!(user_id = %user_id, notification_id = %notification.id, "Notification stored");
    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /health - liveness and uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
