//! In-memory stores for reports and chat sessions.
//!
//! Both are cheap-to-clone handles. Every mutation happens inside one lock
//! scope and nothing awaits while a lock is held.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::models::{ChatMessage, Report, Summary};

#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub report: Report,
    pub summary: Option<Summary>,
}

#[derive(Default)]
struct ReportEntries {
    order: Vec<String>,
    entries: HashMap<String, StoredReport>,
}

/// Reports keyed by title hash, listed in first-seen order.
#[derive(Clone, Default)]
pub struct ReportStore {
    inner: Arc<RwLock<ReportEntries>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by identity. Replacing clears any earlier summary.
    /// Returns true when the id was new.
    pub fn upsert(&self, report: Report) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = report.id.clone();
        let is_new = !guard.entries.contains_key(&id);
        if is_new {
            guard.order.push(id.clone());
        }
        guard.entries.insert(id, StoredReport { report, summary: None });
        is_new
    }

    /// Attach a summary and flip `summary_available`. False if the id is unknown.
    pub fn attach_summary(&self, id: &str, summary: Summary) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match guard.entries.get_mut(id) {
            Some(stored) => {
                stored.report.summary_available = true;
                stored.summary = Some(summary);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<StoredReport> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.entries.contains_key(id)
    }

    pub fn list(&self) -> Vec<Report> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .order
            .iter()
            .filter_map(|id| guard.entries.get(id))
            .map(|stored| stored.report.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// Report id pinned to the system prompt, if any.
    pub report_context: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            created_at: now,
            last_active: now,
            report_context: None,
            messages: Vec::new(),
        }
    }
}

/// Chat sessions with a cap on session count and on messages per session.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<Mutex<HashMap<String, Session>>>,
    max_sessions: usize,
    max_messages: usize,
}

impl ConversationStore {
    pub fn new(max_sessions: usize, max_messages: usize) -> Self {
        ConversationStore {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
            max_messages: max_messages.max(1),
        }
    }

    /// Append to a session, creating it on first use. Returns the updated log.
    pub fn append(&self, session_id: &str, message: ChatMessage) -> Vec<ChatMessage> {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let session = Self::session_mut(&mut sessions, session_id, self.max_sessions);
        session.messages.push(message);
        if session.messages.len() > self.max_messages {
            let excess = session.messages.len() - self.max_messages;
            session.messages.drain(..excess);
        }
        session.last_active = Utc::now();
        session.messages.clone()
    }

    /// The last `count` messages of a session, oldest first.
    pub fn recent(&self, session_id: &str, count: usize) -> Vec<ChatMessage> {
        let sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .map(|session| {
                let start = session.messages.len().saturating_sub(count);
                session.messages[start..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Pin a report to a session, creating the session if needed.
    pub fn set_context(&self, session_id: &str, report_id: &str) {
        let mut sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let session = Self::session_mut(&mut sessions, session_id, self.max_sessions);
        session.report_context = Some(report_id.to_string());
        session.last_active = Utc::now();
    }

    pub fn context(&self, session_id: &str) -> Option<String> {
        let sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).and_then(|session| session.report_context.clone())
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        let sessions = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn session_mut<'a>(
        sessions: &'a mut HashMap<String, Session>,
        session_id: &str,
        max_sessions: usize,
    ) -> &'a mut Session {
        if !sessions.contains_key(session_id) {
            while sessions.len() >= max_sessions {
                let oldest = sessions
                    .values()
                    .min_by_key(|session| session.last_active)
                    .map(|session| session.id.clone());
                match oldest {
                    Some(id) => {
                        debug!(session_id = %id, "Evicting least recently active session");
                        sessions.remove(&id);
                    }
                    None => break,
                }
            }
        }
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn report(title: &str) -> Report {
        Report::new(
            title.to_string(),
            "2023-03-20".to_string(),
            format!("https://www.ipcc.ch/{}/", title),
            vec![],
        )
    }

    #[test]
    fn test_upsert_overwrites_by_identity() {
        let store = ReportStore::new();
        assert!(store.upsert(report("ar6")));
        assert!(store.upsert(report("sr15")));

        let mut again = report("ar6");
        again.date = "2024-01-01".to_string();
        assert!(!store.upsert(again));

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "ar6");
        assert_eq!(listed[0].date, "2024-01-01");
        assert_eq!(listed[1].title, "sr15");
    }

    #[test]
    fn test_attach_summary_sets_flag() {
        let store = ReportStore::new();
        let r = report("ar6");
        let id = r.id.clone();
        store.upsert(r);

        assert!(store.attach_summary(&id, Summary::placeholder()));
        let stored = store.get(&id).unwrap();
        assert!(stored.report.summary_available);
        assert!(stored.summary.is_some());
    }

    #[test]
    fn test_attach_summary_unknown_id() {
        let store = ReportStore::new();
        assert!(!store.attach_summary("missing", Summary::placeholder()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_rescrape_clears_old_summary() {
        let store = ReportStore::new();
        let r = report("ar6");
        let id = r.id.clone();
        store.upsert(r.clone());
        store.attach_summary(&id, Summary::placeholder());

        store.upsert(r);
        let stored = store.get(&id).unwrap();
        assert!(!stored.report.summary_available);
        assert!(stored.summary.is_none());
    }

    #[test]
    fn test_append_creates_and_extends_session() {
        let store = ConversationStore::new(10, 10);
        store.append("s1", ChatMessage::new(Role::User, "hello"));
        let log = store.append("s1", ChatMessage::new(Role::Assistant, "hi"));

        assert_eq!(log.len(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(log[1].role, Role::Assistant);
    }

    #[test]
    fn test_recent_returns_tail() {
        let store = ConversationStore::new(10, 50);
        for n in 0..8 {
            store.append("s1", ChatMessage::new(Role::User, format!("m{}", n)));
        }

        let recent = store.recent("s1", 5);
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5", "m6", "m7"]);
        assert!(store.recent("unknown", 5).is_empty());
    }

    #[test]
    fn test_message_cap_drops_oldest() {
        let store = ConversationStore::new(10, 3);
        for n in 0..5 {
            store.append("s1", ChatMessage::new(Role::User, format!("m{}", n)));
        }

        let session = store.get("s1").unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0].content, "m2");
    }

    #[test]
    fn test_session_cap_evicts_least_recent() {
        let store = ConversationStore::new(2, 10);
        store.append("a", ChatMessage::new(Role::User, "1"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append("b", ChatMessage::new(Role::User, "2"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append("a", ChatMessage::new(Role::User, "3"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append("c", ChatMessage::new(Role::User, "4"));

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_set_context_creates_session() {
        let store = ConversationStore::new(10, 10);
        store.set_context("s1", "report-1");

        assert_eq!(store.context("s1").as_deref(), Some("report-1"));
        assert!(store.get("s1").unwrap().messages.is_empty());
    }
}
