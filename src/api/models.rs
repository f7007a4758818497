use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::{ChatMessage, Report, Summary};

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeParams {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ScrapeResponse {
    pub status: String,
    pub message: String,
    pub job_id: String,
}

#[derive(Serialize)]
pub struct ReportListResponse {
    pub count: usize,
    pub reports: Vec<Report>,
}

#[derive(Serialize)]
pub struct ReportDetailResponse {
    pub report: Report,
    pub summary: Option<Summary>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub conversation: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct ChatErrorResponse {
    pub session_id: String,
    pub error: String,
}

#[derive(Serialize)]
pub struct ConversationResponse {
    pub session_id: String,
    pub report_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub conversation: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct SetContextRequest {
    pub session_id: String,
    pub report_id: String,
}

#[derive(Serialize)]
pub struct SetContextResponse {
    pub status: String,
    pub session_id: String,
    pub report_id: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
