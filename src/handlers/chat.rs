//! # Voice Chat REST API Handlers
//!
//! ## Available Endpoints:
//! - `POST /agent/chat/{session_id}` - Send one recording, receive the spoken reply
//! - `POST /agent/chat` - Same, in a freshly generated session
//! - `GET /agent/chat/{session_id}/history` - Conversation so far
//! - `DELETE /agent/chat/{session_id}/history` - Forget a session
//!
//! The chat endpoints expect `multipart/form-data` with the recording in the
//! `audio` field. A successful turn always answers 200 with the reply payload,
//! labeled `audio/mpeg` or `text/plain` by length, and an `X-Session-Id` header.

use crate::audio::UploadedAudio;
use crate::conversation::store::{validate_session_id, Message};
use crate::error::AppError;
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

pub const SESSION_ID_HEADER: &str = "X-Session-Id";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub message_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub message: String,
    pub session_id: String,
}

/// Run one voice turn in an existing (or implicitly created) session.
///
/// ## Endpoint: `POST /agent/chat/{session_id}`
///
/// ## Errors:
/// - 400 `VALIDATION_ERROR`: no `audio` field, empty or oversized recording
///
/// Upstream failures never surface here; the reply falls back instead.
pub async fn chat(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    run_turn(&app_state, path.into_inner(), payload).await
}

/// ## Endpoint: `POST /agent/chat`
///
/// The generated session id comes back in the `X-Session-Id` header.
pub async fn chat_new_session(
    app_state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    run_turn(&app_state, Uuid::new_v4().to_string(), payload).await
}

async fn run_turn(
    app_state: &AppState,
    session_id: String,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    validate_session_id(&session_id)?;

    let upload = &app_state.config.upload;
    let audio =
        UploadedAudio::from_multipart(payload, &upload.upload_dir, upload.max_audio_bytes).await?;

    let outcome = app_state.orchestrator.handle_audio(&session_id, audio).await?;

    Ok(HttpResponse::Ok()
        .content_type(outcome.payload.content_type())
        .insert_header((SESSION_ID_HEADER, outcome.session_id.as_str()))
        .body(outcome.payload.data))
}

/// ## Endpoint: `GET /agent/chat/{session_id}/history`
///
/// ## Response:
/// ```json
/// {
///   "sessionId": "abc",
///   "messages": [
///     { "role": "user", "content": "hello", "timestamp": "2024-01-01T00:00:00Z" }
///   ],
///   "messageCount": 1
/// }
/// ```
pub async fn get_history(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    validate_session_id(&session_id)?;

    let messages = app_state.store().get(&session_id)?;
    Ok(HttpResponse::Ok().json(HistoryResponse {
        message_count: messages.len(),
        messages,
        session_id,
    }))
}

/// ## Endpoint: `DELETE /agent/chat/{session_id}/history`
///
/// Succeeds for sessions that never existed.
pub async fn clear_history(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    validate_session_id(&session_id)?;

    app_state.store().clear(&session_id)?;
    Ok(HttpResponse::Ok().json(ClearHistoryResponse {
        message: "Conversation history cleared".to_string(),
        session_id,
    }))
}
