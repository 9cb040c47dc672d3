//! Chat surface: `POST /chat` streams one agent turn back as server-sent
//! events, `DELETE /sessions/{session_id}` resets a session's reference
//! memory.
//!
//! Wire protocol per event: `data: {"text": chunk}` fragments that
//! concatenate into the assistant's envelope JSON, then `data:
//! {"done": true}` on success or `data: {"error": reason}` on failure.
//! Partial text already delivered stays valid when an error follows.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use carty_agent::runtime::AgentRuntime;
use carty_core::errors::{ApplicationError, InterfaceError};
use carty_db::repositories::{MessageRepository, MessageRole};

/// Chunk size, in characters, of the streamed reply.
const STREAM_CHUNK_CHARS: usize = 50;

#[derive(Clone)]
pub struct ChatState {
    agent: Arc<AgentRuntime>,
    messages: Arc<dyn MessageRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(agent: Arc<AgentRuntime>, messages: Arc<dyn MessageRepository>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/sessions/{session_id}", delete(reset_session))
        .layer(CorsLayer::permissive())
        .with_state(ChatState { agent, messages })
}

fn reject(interface: InterfaceError) -> (StatusCode, Json<ErrorBody>) {
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body))
}

/// Split on character boundaries; envelope JSON may carry multi-byte text.
fn chunk_reply(payload: &str) -> Vec<String> {
    let chars: Vec<char> = payload.chars().collect();
    chars.chunks(STREAM_CHUNK_CHARS).map(|chunk| chunk.iter().collect()).collect()
}

fn text_event(chunk: &str) -> Event {
    Event::default().data(json!({ "text": chunk }).to_string())
}

fn done_event() -> Event {
    Event::default().data(json!({ "done": true }).to_string())
}

fn error_event(reason: &str) -> Event {
    Event::default().data(json!({ "error": reason }).to_string())
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>>, (StatusCode, Json<ErrorBody>)>
{
    let correlation_id = Uuid::new_v4().to_string();

    if request.message.trim().is_empty() || request.session_id.trim().is_empty() {
        return Err(reject(
            ApplicationError::Domain(carty_core::errors::DomainError::InvariantViolation(
                "message and session_id are required".to_string(),
            ))
            .into_interface(correlation_id),
        ));
    }

    state
        .messages
        .append(&request.session_id, MessageRole::User, &request.message)
        .await
        .map_err(|repo_error| {
            reject(
                ApplicationError::Persistence(repo_error.to_string())
                    .into_interface(correlation_id.clone()),
            )
        })?;

    info!(
        event_name = "chat.turn.start",
        correlation_id = %correlation_id,
        session_id = %request.session_id,
        "chat turn accepted"
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(16);
    tokio::spawn(run_turn(state, request, correlation_id, tx));

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn run_turn(
    state: ChatState,
    request: ChatRequest,
    correlation_id: String,
    tx: tokio::sync::mpsc::Sender<Result<Event, Infallible>>,
) {
    let envelope = match state.agent.handle_message(&request.session_id, &request.message).await {
        Ok(envelope) => envelope,
        Err(turn_error) => {
            error!(
                event_name = "chat.turn.failed",
                correlation_id = %correlation_id,
                session_id = %request.session_id,
                error = %turn_error,
                "agent turn failed"
            );
            let _ = tx.send(Ok(error_event(&turn_error.to_string()))).await;
            return;
        }
    };

    let payload = match serde_json::to_string(&envelope) {
        Ok(payload) => payload,
        Err(encode_error) => {
            let _ = tx.send(Ok(error_event(&encode_error.to_string()))).await;
            return;
        }
    };

    if let Err(repo_error) = state
        .messages
        .append(&request.session_id, MessageRole::Assistant, &payload)
        .await
    {
        error!(
            event_name = "chat.turn.persist_failed",
            correlation_id = %correlation_id,
            session_id = %request.session_id,
            error = %repo_error,
            "failed to persist assistant reply"
        );
        let _ = tx.send(Ok(error_event(&repo_error.to_string()))).await;
        return;
    }

    for chunk in chunk_reply(&payload) {
        if tx.send(Ok(text_event(&chunk))).await.is_err() {
            // Consumer abandoned the stream; nothing else to deliver and no
            // state to roll back.
            return;
        }
    }
    let _ = tx.send(Ok(done_event())).await;

    info!(
        event_name = "chat.turn.complete",
        correlation_id = %correlation_id,
        session_id = %request.session_id,
        envelope_type = envelope.kind(),
        "chat turn streamed"
    );
}

pub async fn reset_session(
    State(state): State<ChatState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    state.agent.reset_session(&session_id).await;
    info!(
        event_name = "chat.session.reset",
        correlation_id = "session-reset",
        session_id = %session_id,
        "session reference memory cleared"
    );
    StatusCode::NO_CONTENT
}
