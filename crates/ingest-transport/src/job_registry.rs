//! In-memory job tracker for `/ingest/csv` uploads (§6.1, SPEC_FULL.md §2).

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub status: JobState,
    pub processed_rows: usize,
    pub inserted_rows: usize,
    pub rejected_rows: usize,
    pub error: Option<String>,
}

impl JobStatus {
    fn pending() -> Self {
        Self {
            status: JobState::Pending,
            processed_rows: 0,
            inserted_rows: 0,
            rejected_rows: 0,
            error: None,
        }
    }
}

/// Tracks every in-flight and completed CSV upload by `job_id`. Jobs are
/// never pruned: for the volumes this endpoint sees, a bounded eviction
/// policy isn't worth the complexity it would add.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobStatus>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, job_id: String) {
        self.jobs.insert(job_id, JobStatus::pending());
    }

    pub fn mark_running(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobState::Running;
        }
    }

    pub fn record_row(&self, job_id: &str, inserted: bool) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.processed_rows += 1;
            if inserted {
                job.inserted_rows += 1;
            } else {
                job.rejected_rows += 1;
            }
        }
    }

    pub fn mark_completed(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobState::Completed;
        }
    }

    pub fn mark_failed(&self, job_id: &str, error: String) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.status = JobState::Failed;
            job.error = Some(error);
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_row_counts_through_a_lifecycle() {
        let registry = JobRegistry::new();
        registry.create("job-1".to_string());
        registry.mark_running("job-1");
        registry.record_row("job-1", true);
        registry.record_row("job-1", false);
        registry.mark_completed("job-1");

        let status = registry.get("job-1").unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.processed_rows, 2);
        assert_eq!(status.inserted_rows, 1);
        assert_eq!(status.rejected_rows, 1);
    }

    #[test]
    fn unknown_job_id_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn failed_job_carries_error_message() {
        let registry = JobRegistry::new();
        registry.create("job-2".to_string());
        registry.mark_failed("job-2", "malformed header row".to_string());
        let status = registry.get("job-2").unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("malformed header row"));
    }
}
