use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use qraft_api::{
    CreatePromptRequest, DispatchPromptRequest, ErrorResponse, QueueSnapshot,
};
use qraft_backend::{PromptStore, SqliteStoreError};
use qraft_domain::{
    ExternalSessionId, NewPrompt, PromptId, PromptTransitionError, QraftAiSessionId, WorktreeId,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::convert::{prompt_snapshot, queue_entry_snapshot};
use crate::queue::{DispatchOptions, ExecutionQueue, QueueError, run_blocking};

#[derive(Clone)]
struct AppState {
    queue: ExecutionQueue,
    prompts: Arc<dyn PromptStore>,
}

pub fn router(queue: ExecutionQueue, prompts: Arc<dyn PromptStore>) -> Router {
    let state = AppState { queue, prompts };

    let api = Router::new()
        .route("/health", get(health))
        .route("/prompts", get(list_prompts).post(create_prompt))
        .route("/prompts/{prompt_id}", get(get_prompt).delete(delete_prompt))
        .route("/prompts/{prompt_id}/dispatch", post(dispatch_prompt))
        .route("/prompts/{prompt_id}/cancel", post(cancel_prompt))
        .route("/queue", get(get_queue))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_prompts(State(state): State<AppState>) -> Response {
    let prompts = state.prompts.clone();
    match run_blocking(move || prompts.list()).await {
        Ok(prompts) => Json(prompts.iter().map(prompt_snapshot).collect::<Vec<_>>()).into_response(),
        Err(err) => store_error_response(&err),
    }
}

async fn create_prompt(
    State(state): State<AppState>,
    Json(request): Json<CreatePromptRequest>,
) -> Response {
    if request.prompt_text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "promptText must not be empty");
    }
    if request.project_path.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "projectPath must not be empty");
    }

    let mut prompt = NewPrompt::new(request.prompt_text, request.project_path.trim());
    prompt.description = request.description;
    if let Some(context) = request.context {
        prompt.context = context;
    }
    prompt.dispatch_session_id = request
        .qraft_ai_session_id
        .filter(|id| !id.trim().is_empty())
        .map(QraftAiSessionId::from_string);

    let prompts = state.prompts.clone();
    match run_blocking(move || prompts.create(prompt)).await {
        Ok(prompt) => {
            tracing::info!(prompt_id = %prompt.id, "prompt created");
            (StatusCode::CREATED, Json(prompt_snapshot(&prompt))).into_response()
        }
        Err(err) => store_error_response(&err),
    }
}

async fn get_prompt(State(state): State<AppState>, Path(prompt_id): Path<String>) -> Response {
    let prompts = state.prompts.clone();
    let id = PromptId::from_string(prompt_id);
    match run_blocking(move || prompts.get(&id)).await {
        Ok(Some(prompt)) => Json(prompt_snapshot(&prompt)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "prompt not found"),
        Err(err) => store_error_response(&err),
    }
}

async fn delete_prompt(State(state): State<AppState>, Path(prompt_id): Path<String>) -> Response {
    let id = PromptId::from_string(prompt_id);
    match state.queue.entry(&id).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                "prompt is queued or running; cancel it first",
            );
        }
        Ok(None) => {}
        Err(err) => return queue_error_response(err),
    }

    let prompts = state.prompts.clone();
    match run_blocking(move || prompts.delete(&id)).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "prompt not found"),
        Err(err) => store_error_response(&err),
    }
}

async fn dispatch_prompt(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
    body: Bytes,
) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        DispatchPromptRequest::default()
    } else {
        match serde_json::from_slice::<DispatchPromptRequest>(&body) {
            Ok(request) => request,
            Err(err) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid dispatch request: {err}"),
                );
            }
        }
    };

    let resume_session_id = match request.resume_session_id.as_deref() {
        None => None,
        Some(raw) => match ExternalSessionId::parse(raw) {
            Some(id) => Some(id),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid resumeSessionId: {raw}"),
                );
            }
        },
    };
    let options = DispatchOptions {
        qraft_ai_session_id: request
            .qraft_ai_session_id
            .filter(|id| !id.trim().is_empty())
            .map(QraftAiSessionId::from_string),
        resume_session_id,
    };

    let id = PromptId::from_string(prompt_id);
    match state.queue.dispatch_prompt(&id, options).await {
        Ok(entry) => (StatusCode::ACCEPTED, Json(queue_entry_snapshot(&entry))).into_response(),
        Err(err) => queue_error_response(err),
    }
}

async fn cancel_prompt(State(state): State<AppState>, Path(prompt_id): Path<String>) -> Response {
    let id = PromptId::from_string(prompt_id);
    match state.queue.cancel(&id).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => queue_error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueQuery {
    #[serde(default, alias = "worktree_id")]
    worktree_id: Option<String>,
}

async fn get_queue(State(state): State<AppState>, Query(query): Query<QueueQuery>) -> Response {
    let worktree_id = query
        .worktree_id
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| WorktreeId::from_project_path(std::path::Path::new(raw.trim())));
    match state.queue.snapshot(worktree_id).await {
        Ok(entries) => Json(QueueSnapshot {
            entries: entries.iter().map(queue_entry_snapshot).collect(),
        })
        .into_response(),
        Err(err) => queue_error_response(err),
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn store_error_response(err: &anyhow::Error) -> Response {
    if let Some(SqliteStoreError::PromptNotFound) = err.downcast_ref::<SqliteStoreError>() {
        return error_response(StatusCode::NOT_FOUND, "prompt not found");
    }
    if let Some(transition) = err.downcast_ref::<PromptTransitionError>() {
        return error_response(StatusCode::CONFLICT, transition.to_string());
    }
    tracing::error!(error = %format!("{err:#}"), "prompt store request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

fn queue_error_response(err: QueueError) -> Response {
    match err {
        QueueError::CapacityExceeded { .. } => {
            error_response(StatusCode::TOO_MANY_REQUESTS, err.to_string())
        }
        QueueError::UnknownPrompt(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        QueueError::AlreadyQueued(_) => error_response(StatusCode::CONFLICT, err.to_string()),
        QueueError::Persistence(err) => store_error_response(&err),
        QueueError::Stopped => error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
    }
}
