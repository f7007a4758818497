use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::llm::{ChatCompletion, CompletionRequest, Message};
use crate::models::{ChatMessage, Role};
use crate::store::{ConversationStore, ReportStore};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about climate \
science reports clearly and concisely.";

/// Stored messages sent along with the system prompt.
pub const CONTEXT_WINDOW: usize = 5;
const CHAT_TEMPERATURE: f32 = 0.7;
const CHAT_MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub session_id: String,
    pub outcome: std::result::Result<ChatTurn, String>,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub response: String,
    pub conversation: Vec<ChatMessage>,
}

/// Relays a session's recent messages to the LLM and records the reply.
pub struct ChatRelay {
    llm: Arc<dyn ChatCompletion>,
    conversations: ConversationStore,
    reports: ReportStore,
}

impl ChatRelay {
    pub fn new(llm: Arc<dyn ChatCompletion>, conversations: ConversationStore, reports: ReportStore) -> Self {
        ChatRelay {
            llm,
            conversations,
            reports,
        }
    }

    /// Relay failures come back in `ChatReply::outcome`, never as an `Err`.
    pub async fn send(&self, session_id: Option<String>, message: &str) -> ChatReply {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.conversations
            .append(&session_id, ChatMessage::new(Role::User, message));

        let outcome = match self.relay(&session_id).await {
            Ok(response) => {
                let conversation = self
                    .conversations
                    .append(&session_id, ChatMessage::new(Role::Assistant, response.clone()));
                info!(session_id = %session_id, messages = conversation.len(), "Chat reply recorded");
                Ok(ChatTurn {
                    response,
                    conversation,
                })
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Chat relay failed");
                Err(e.to_string())
            }
        };

        ChatReply { session_id, outcome }
    }

    /// Pin a known report to the session's system prompt.
    pub fn set_context(&self, session_id: &str, report_id: &str) -> Result<()> {
        if !self.reports.contains(report_id) {
            return Err(AppError::NotFound(format!("Report {} not found", report_id)));
        }
        self.conversations.set_context(session_id, report_id);
        Ok(())
    }

    async fn relay(&self, session_id: &str) -> Result<String> {
        let mut messages = vec![Message::new(Role::System, self.system_prompt(session_id))];
        messages.extend(
            self.conversations
                .recent(session_id, CONTEXT_WINDOW)
                .into_iter()
                .map(|m| Message::new(m.role, m.content)),
        );

        self.llm
            .complete(CompletionRequest {
                messages,
                temperature: Some(CHAT_TEMPERATURE),
                max_tokens: Some(CHAT_MAX_TOKENS),
                json_response: false,
            })
            .await
    }

    fn system_prompt(&self, session_id: &str) -> String {
        let pinned = self
            .conversations
            .context(session_id)
            .and_then(|report_id| self.reports.get(&report_id));

        match pinned {
            Some(stored) => format!(
                "{} The user is currently asking about the report titled \"{}\".",
                SYSTEM_PROMPT, stored.report.title
            ),
            None => SYSTEM_PROMPT.to_string(),
        }
    }
}
