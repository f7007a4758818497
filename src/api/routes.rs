use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use chrono::Utc;
use tracing::info;

use crate::error::{Result, AppError};
use crate::api::models::{
    ChatErrorResponse, ChatRequest, ChatResponse, ConversationResponse, HealthResponse,
    ReportDetailResponse, ReportListResponse, ScrapeParams, ScrapeResponse, SetContextRequest,
    SetContextResponse,
};
use crate::api::response;
use crate::jobs::ScrapeJob;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler))
        .route("/scrape/:job_id", get(scrape_status_handler))
        .route("/reports", get(list_reports_handler))
        .route("/reports/data", get(list_reports_handler))
        .route("/report/:id", get(report_handler))
        .route("/report/:id/data", get(report_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/:session_id", get(conversation_handler))
        .route("/set-context", post(set_context_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::custom(response::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn scrape_handler(
    State(state): State<AppState>,
    Query(params): Query<ScrapeParams>,
) -> Json<ScrapeResponse> {
    let limit = params.limit.unwrap_or(state.config.scrape_limit);
    let job = state.pipeline.spawn_scrape(&state.jobs, limit);
    info!(job_id = %job.id, limit, "Scrape started");

    Json(ScrapeResponse {
        status: "Scraping started".to_string(),
        message: format!("Processing up to {} reports in the background", limit),
        job_id: job.id,
    })
}

async fn scrape_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<ScrapeJob>> {
    state
        .jobs
        .get(&job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Scrape job {} not found", job_id)))
}

async fn list_reports_handler(State(state): State<AppState>) -> Json<ReportListResponse> {
    let reports = state.reports.list();
    Json(ReportListResponse {
        count: reports.len(),
        reports,
    })
}

async fn report_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportDetailResponse>> {
    let stored = state
        .reports
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

    Ok(Json(ReportDetailResponse {
        report: stored.report,
        summary: stored.summary,
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return response::error(rejection.status(), rejection.body_text()),
    };
    let message = req.message.trim();
    if message.is_empty() {
        return response::error(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    let reply = state.chat.send(req.session_id, message).await;
    match reply.outcome {
        Ok(turn) => Json(ChatResponse {
            session_id: reply.session_id,
            response: turn.response,
            conversation: turn.conversation,
        })
        .into_response(),
        Err(error) => Json(ChatErrorResponse {
            session_id: reply.session_id,
            error,
        })
        .into_response(),
    }
}

async fn conversation_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationResponse>> {
    let session = state
        .conversations
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

    Ok(Json(ConversationResponse {
        session_id: session.id,
        report_id: session.report_context,
        created_at: session.created_at,
        conversation: session.messages,
    }))
}

async fn set_context_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<SetContextRequest>, JsonRejection>,
) -> Result<Json<SetContextResponse>> {
    let Json(req) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if req.session_id.trim().is_empty() {
        return Err(AppError::BadRequest("session_id must not be empty".to_string()));
    }
    state.chat.set_context(&req.session_id, &req.report_id)?;

    Ok(Json(SetContextResponse {
        status: "ok".to_string(),
        session_id: req.session_id,
        report_id: req.report_id,
    }))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}
