//! HTTP route handlers
//!
//! Every handler answers with JSON. Failures go through [`ApiError`], which
//! recovers the [`ParleyError`] variant behind the `anyhow` chain to pick a
//! status and renders `{"error": "..."}`.

use crate::error::ParleyError;
use crate::server::state::AppState;
use crate::storage::{Message, Session, SessionSummary};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Message returned for 500s; details go to the log only
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Error wrapper turning crate errors into HTTP responses
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    /// Status code and client-facing message for this error
    pub fn status_and_message(&self) -> (StatusCode, String, Option<u64>) {
        let Some(parley) = self.0.downcast_ref::<ParleyError>() else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
                None,
            );
        };

        match parley.root_relay_error() {
            ParleyError::EmptyMessage => {
                (StatusCode::BAD_REQUEST, ParleyError::EmptyMessage.to_string(), None)
            }
            ParleyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ParleyError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ParleyError::PayloadTooLarge.to_string(),
                None,
            ),
            ParleyError::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, "Chat session not found".to_string(), None)
            }
            ParleyError::ProviderAuthentication(_) => (
                StatusCode::UNAUTHORIZED,
                "Invalid API key. Please check your GROQ_API_KEY configuration.".to_string(),
                None,
            ),
            ParleyError::ProviderRateLimited { retry_after, .. } => {
                let message = match retry_after {
                    Some(secs) => format!(
                        "Rate limit exceeded. Please wait {} seconds before trying again.",
                        secs
                    ),
                    None => "Rate limit exceeded. Please try again later.".to_string(),
                };
                (StatusCode::TOO_MANY_REQUESTS, message, *retry_after)
            }
            ParleyError::ModelNotFound(model) => (
                StatusCode::NOT_FOUND,
                format!("Model not found or unavailable: {}", model),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
                None,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body for `POST /api/chats/:id/message`
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// User text
    pub message: String,
}

/// Response for `POST /api/chats`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    /// New session id
    pub session_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Response for `POST /api/chats/:id/message`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Session the exchange belongs to
    pub session_id: String,
    /// Assistant reply text
    pub response: String,
    /// Stored user turn
    pub user_message: Message,
    /// Stored assistant turn
    pub assistant_message: Message,
}

/// Response for `DELETE /api/chats/:id`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSession {
    /// Always `true`
    pub success: bool,
    /// Removed session id
    pub session_id: String,
}

/// Handler for GET /api/chats
pub async fn list_chats(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.relay.list_sessions().await?))
}

/// Handler for GET /api/chats/:id
pub async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.relay.get_session(&id).await?))
}

/// Handler for POST /api/chats
pub async fn create_chat(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<CreatedSession>)> {
    let session = state.relay.create_session().await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            session_id: session.session_id,
            created_at: session.created_at,
        }),
    ))
}

/// Handler for POST /api/chats/:id/message
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ParleyError::PayloadTooLarge
        } else {
            ParleyError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
        }
    })?;

    let exchange = state.relay.send_message(&id, &request.message).await?;
    Ok(Json(MessageResponse {
        session_id: exchange.session.session_id,
        response: exchange.assistant_message.content.clone(),
        user_message: exchange.user_message,
        assistant_message: exchange.assistant_message,
    }))
}

/// Handler for DELETE /api/chats/:id
pub async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedSession>> {
    state.relay.delete_session(&id).await?;
    Ok(Json(DeletedSession {
        success: true,
        session_id: id,
    }))
}

/// Handler for GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
    }))
}

/// Handler for GET /api/test-groq
pub async fn test_provider(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let completion = state.relay.probe().await?;
    Ok(Json(json!({
        "success": true,
        "response": completion.content,
        "model": completion.model,
    })))
}
