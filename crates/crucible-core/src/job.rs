//! Job records and the store contract
//!
//! The engine never owns a job beyond the current execution; it mutates the
//! record through the narrow [`JobStore`] contract and forgets it. The
//! bundled in-memory store backs the HTTP front-end and tests; a persistent
//! implementation can replace it behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type JobId = String;

/// One unit of work: source text in, finalized success/output out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(code: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), code)
    }

    pub fn with_id(id: impl Into<JobId>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Stored view of a job's lifecycle. `success` and `output` are present only
/// once the job has been finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub success: Option<bool>,
    pub output: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    fn pending(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            status: JobStatus::Pending,
            success: None,
            output: None,
            created_at: job.created_at,
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job);
    async fn mark_running(&self, job_id: &str);
    /// Narrow finalization contract: sets Completed/Failed along with the
    /// captured output. A job must never remain unfinished after execution.
    async fn complete(&self, job_id: &str, success: bool, output: &str);
    async fn get(&self, job_id: &str) -> Option<JobRecord>;
}

/// In-memory job store keyed by job id.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) {
        self.records
            .write()
            .await
            .insert(job.id.clone(), JobRecord::pending(job));
    }

    async fn mark_running(&self, job_id: &str) {
        if let Some(record) = self.records.write().await.get_mut(job_id) {
            record.status = JobStatus::Running;
        }
    }

    async fn complete(&self, job_id: &str, success: bool, output: &str) {
        if let Some(record) = self.records.write().await.get_mut(job_id) {
            record.status = if success {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            record.success = Some(success);
            record.output = Some(output.to_string());
        } else {
            log::warn!("finalization for unknown job {}", job_id);
        }
    }

    async fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.records.read().await.get(job_id).cloned()
    }
}
