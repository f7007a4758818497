use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm::{ChatCompletion, CompletionRequest, Message};
use crate::models::{Role, Summary};

const SYSTEM_PROMPT: &str = "You are an expert in summarizing climate science reports. \
You always respond with a single JSON object with the keys \"key_findings\", \"risks\", \
\"mitigation_options\" (each an array of strings) and \"confidence_level\" \
(one of \"High\", \"Medium\", \"Low\").";

const SUMMARY_MAX_TOKENS: u32 = 1000;

pub struct Summarizer {
    llm: Arc<dyn ChatCompletion>,
    char_budget: usize,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn ChatCompletion>, char_budget: usize) -> Self {
        Summarizer { llm, char_budget }
    }

    /// Always yields a summary; any failure gives `Summary::placeholder()`.
    pub async fn summarize(&self, title: &str, text: &str) -> Summary {
        match self.try_summarize(title, text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(title = %title, error = %e, "Summarization failed, using placeholder");
                Summary::placeholder()
            }
        }
    }

    async fn try_summarize(&self, title: &str, text: &str) -> Result<Summary> {
        let request = CompletionRequest {
            messages: vec![
                Message::new(Role::System, SYSTEM_PROMPT),
                Message::new(Role::User, build_prompt(title, &truncate_chars(text, self.char_budget))),
            ],
            temperature: None,
            max_tokens: Some(SUMMARY_MAX_TOKENS),
            json_response: true,
        };

        let reply = self.llm.complete(request).await?;
        let summary = parse_summary(&reply)?;
        debug!(title = %title, findings = summary.key_findings.len(), "Parsed summary");
        Ok(summary)
    }
}

pub fn build_prompt(title: &str, text: &str) -> String {
    let mut result = String::with_capacity(text.len() + title.len() + 300);
    result.push_str("Summarize the following climate report. Respond with a JSON object containing ");
    result.push_str("\"key_findings\", \"risks\", \"mitigation_options\" and \"confidence_level\".\n\n");
    result.push_str("Title: ");
    result.push_str(title);
    result.push_str("\n\nReport text:\n");
    result.push_str(text);
    result
}

/// Leading `budget` characters (not bytes) of `text`.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

pub fn parse_summary(reply: &str) -> Result<Summary> {
    let summary: Summary = serde_json::from_str(strip_code_fence(reply))?;
    Ok(summary)
}

/// Unwrap ```json ... ``` fences some models add despite the JSON response format.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::llm::tests::ScriptedLlm;

    const VALID_REPLY: &str = r#"{
        "key_findings": ["Warming is unequivocal"],
        "risks": ["Sea level rise"],
        "mitigation_options": ["Rapid decarbonisation"],
        "confidence_level": "High"
    }"#;

    #[tokio::test]
    async fn test_summarize_parses_reply() {
        let llm = Arc::new(ScriptedLlm::with_replies(vec![Ok(VALID_REPLY.to_string())]));
        let summarizer = Summarizer::new(llm.clone(), 5000);

        let summary = summarizer.summarize("AR6 Synthesis", "Some text").await;
        assert_eq!(summary.key_findings, vec!["Warming is unequivocal".to_string()]);
        assert_eq!(summary.confidence_level, "High");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_response);
        assert_eq!(requests[0].messages[0].role, "system");
        assert!(requests[0].messages[1].content.contains("AR6 Synthesis"));
    }

    #[tokio::test]
    async fn test_summarize_http_failure_gives_placeholder() {
        let llm = Arc::new(ScriptedLlm::with_replies(vec![Err(AppError::LlmError(
            "LLM API returned 500 Internal Server Error".to_string(),
        ))]));
        let summarizer = Summarizer::new(llm, 5000);

        let summary = summarizer.summarize("AR6", "text").await;
        assert_eq!(summary, Summary::placeholder());
        assert_eq!(summary.confidence_level, "Unknown");
    }

    #[tokio::test]
    async fn test_summarize_missing_key_gives_placeholder() {
        let llm = Arc::new(ScriptedLlm::with_replies(vec![Err(AppError::ConfigError(
            "OPENROUTER_API_KEY is not set".to_string(),
        ))]));
        let summarizer = Summarizer::new(llm, 5000);

        assert!(summarizer.summarize("AR6", "text").await.is_placeholder());
    }

    #[tokio::test]
    async fn test_summarize_non_json_gives_placeholder() {
        let llm = Arc::new(ScriptedLlm::with_replies(vec![Ok("Here is your summary!".to_string())]));
        let summarizer = Summarizer::new(llm, 5000);

        assert!(summarizer.summarize("AR6", "text").await.is_placeholder());
    }

    #[tokio::test]
    async fn test_summarize_truncates_text() {
        let llm = Arc::new(ScriptedLlm::with_replies(vec![Ok(VALID_REPLY.to_string())]));
        let summarizer = Summarizer::new(llm.clone(), 10);

        summarizer.summarize("T", "0123456789TAIL").await;
        let requests = llm.requests.lock().unwrap();
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.ends_with("0123456789"));
        assert!(!prompt.contains("TAIL"));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[test]
    fn test_parse_summary_with_fence() {
        let reply = format!("```json\n{}\n```", VALID_REPLY);
        assert_eq!(parse_summary(&reply).unwrap().risks, vec!["Sea level rise".to_string()]);
    }

    #[test]
    fn test_parse_summary_missing_key_fails() {
        assert!(parse_summary(r#"{"key_findings": [], "risks": []}"#).is_err());
    }
}
