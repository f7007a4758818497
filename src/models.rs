//! Records shared by the pipeline, the stores and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Marker used in every list of the placeholder summary.
pub const SUMMARY_FAILURE_MARKER: &str = "Summary generation failed";

/// Metadata for one report discovered on the source site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub title: String,
    pub date: String,
    pub url: String,
    pub pdf_links: Vec<String>,
    pub summary_available: bool,
}

impl Report {
    pub fn new(title: String, date: String, url: String, pdf_links: Vec<String>) -> Self {
        Report {
            id: report_id(&title),
            title,
            date,
            url,
            pdf_links,
            summary_available: false,
        }
    }
}

/// Derive the report identity from its title.
///
/// SHA256 over the exact title bytes, hex encoded. Same title, same id.
pub fn report_id(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Structured LLM output for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub key_findings: Vec<String>,
    pub risks: Vec<String>,
    pub mitigation_options: Vec<String>,
    pub confidence_level: String,
}

impl Summary {
    /// Well-formed stand-in used whenever summarization fails.
    pub fn placeholder() -> Self {
        Summary {
            key_findings: vec![SUMMARY_FAILURE_MARKER.to_string()],
            risks: vec![SUMMARY_FAILURE_MARKER.to_string()],
            mitigation_options: vec![SUMMARY_FAILURE_MARKER.to_string()],
            confidence_level: "Unknown".to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Summary::placeholder()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_id_is_deterministic() {
        let title = "Climate Change 2023: Synthesis Report";
        assert_eq!(report_id(title), report_id(title));
    }

    #[test]
    fn test_report_id_differs_per_title() {
        assert_ne!(
            report_id("Climate Change 2023: Synthesis Report"),
            report_id("Climate Change 2022: Impacts, Adaptation and Vulnerability")
        );
    }

    #[test]
    fn test_report_id_format() {
        let id = report_id("Special Report on the Ocean");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_report_starts_without_summary() {
        let report = Report::new(
            "AR6".to_string(),
            "2023-03-20".to_string(),
            "https://example.org/ar6".to_string(),
            vec![],
        );
        assert!(!report.summary_available);
        assert_eq!(report.id, report_id("AR6"));
    }

    #[test]
    fn test_placeholder_shape() {
        let summary = Summary::placeholder();
        assert_eq!(summary.key_findings, vec![SUMMARY_FAILURE_MARKER.to_string()]);
        assert_eq!(summary.risks.len(), 1);
        assert_eq!(summary.mitigation_options.len(), 1);
        assert_eq!(summary.confidence_level, "Unknown");
        assert!(summary.is_placeholder());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
