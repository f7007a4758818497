//! Status records for background scrape runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeJob {
    pub id: String,
    pub status: JobStatus,
    pub limit: usize,
    pub discovered: usize,
    pub succeeded: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome counts reported by a finished scrape run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub discovered: usize,
    pub succeeded: usize,
}

#[derive(Clone, Default)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, ScrapeJob>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, limit: usize) -> ScrapeJob {
        let job = ScrapeJob {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            limit,
            discovered: 0,
            succeeded: 0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        };
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub fn mark_running(&self, id: &str) {
        self.update(id, |job| job.status = JobStatus::Running);
    }

    pub fn mark_done(&self, id: &str, outcome: ScrapeOutcome) {
        self.update(id, |job| {
            job.status = JobStatus::Done;
            job.discovered = outcome.discovered;
            job.succeeded = outcome.succeeded;
            job.finished_at = Some(Utc::now());
        });
    }

    pub fn mark_failed(&self, id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        });
    }

    pub fn get(&self, id: &str) -> Option<ScrapeJob> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).cloned()
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut ScrapeJob)) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(job) = jobs.get_mut(id) {
            apply(job);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let tracker = JobTracker::new();
        let job = tracker.create(3);
        assert_eq!(job.status, JobStatus::Pending);

        tracker.mark_running(&job.id);
        assert_eq!(tracker.get(&job.id).unwrap().status, JobStatus::Running);

        tracker.mark_done(&job.id, ScrapeOutcome { discovered: 5, succeeded: 2 });
        let done = tracker.get(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.discovered, 5);
        assert_eq!(done.succeeded, 2);
        assert!(done.finished_at.is_some());
    }

    #[test]
    fn test_failed_job_keeps_error() {
        let tracker = JobTracker::new();
        let job = tracker.create(1);
        tracker.mark_failed(&job.id, "task panicked");

        let failed = tracker.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("task panicked"));
    }

    #[test]
    fn test_unknown_job() {
        assert!(JobTracker::new().get("nope").is_none());
    }
}
