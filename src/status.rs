use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{GenerationJob, JobStatus};

/// Process-lifetime store of generation job records.
///
/// The orchestrator is the only writer; façades read through [`get`].
/// Records are never evicted. A query for an unknown id synthesizes a
/// `not_found` record instead of inserting anything.
///
/// [`get`]: StatusStore::get
#[derive(Default)]
pub struct StatusStore {
    jobs: RwLock<HashMap<Uuid, GenerationJob>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `processing` record and return its id.
    pub fn create(&self, owner: &str) -> Uuid {
        let id = Uuid::new_v4();
        let job = GenerationJob {
            id,
            status: JobStatus::Processing,
            owner: owner.to_string(),
            progress: 0,
            result_url: None,
            error_message: None,
            created_at: Utc::now(),
        };
        self.jobs.write().insert(id, job);
        id
    }

    /// Advance a job's progress. Progress never decreases, and terminal jobs
    /// are left untouched.
    pub fn set_progress(&self, id: Uuid, progress: u8) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.progress = job.progress.max(progress.min(100));
            }
        }
    }

    /// Transition a processing job to `completed` with its result URL.
    pub fn complete(&self, id: Uuid, result_url: String) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Completed;
                job.result_url = Some(result_url);
            }
        }
    }

    /// Transition a processing job to `failed` with an error message.
    pub fn fail(&self, id: Uuid, message: impl Into<String>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Failed;
                job.error_message = Some(message.into());
            }
        }
    }

    /// Look up a job by its wire-level id string.
    ///
    /// Unknown or unparseable ids yield a synthesized `not_found` record;
    /// the store itself is not mutated.
    pub fn get(&self, generation_id: &str) -> GenerationJob {
        let Ok(id) = Uuid::parse_str(generation_id) else {
            return GenerationJob::not_found(generation_id);
        };
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| GenerationJob::not_found(generation_id))
    }
}
