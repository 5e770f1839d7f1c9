use std::collections::{HashMap, VecDeque};
use super::errors::{Result, UploaderError};
use super::types::{Job, JobId, JobStatus};

/// Job bookkeeping owned by one uploader.
///
/// Jobs iterate in insertion order. An id sits in the pending queue exactly
/// while its job is `Pending`.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: HashMap<JobId, Job>,
    order: Vec<JobId>,
    pending: VecDeque<JobId>,
    accepted: usize,
    next_id: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{prefix}file_{n}`, n counting from 1, never reused.
    pub fn next_id(&mut self, prefix: &str) -> JobId {
        self.next_id += 1;
        JobId::new(format!("{}file_{}", prefix, self.next_id))
    }

    pub fn insert(&mut self, job: Job) {
        let id = job.id.clone();
        if self.jobs.insert(id.clone(), job).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: &JobId) -> Option<Job> {
        let job = self.jobs.remove(id)?;
        self.order.retain(|x| x != id);
        self.pending.retain(|x| x != id);
        Some(job)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.order.clear();
        self.pending.clear();
        self.accepted = 0;
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    pub fn require(&self, id: &JobId) -> Result<&Job> {
        self.jobs.get(id).ok_or_else(|| UploaderError::JobNotFound(id.clone()))
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub fn ids_with_status(&self, status: JobStatus) -> Vec<JobId> {
        self.iter()
            .filter(|job| job.status == status)
            .map(|job| job.id.clone())
            .collect()
    }

    /// Marks the job `Pending` and appends it to the queue, once.
    pub fn enqueue(&mut self, id: &JobId) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };

        if job.status != JobStatus::Pending {
            job.status = JobStatus::Pending;
            self.pending.push_back(id.clone());
        }
    }

    pub fn dequeue(&mut self, id: &JobId) {
        self.pending.retain(|x| x != id);
    }

    pub fn pending_head(&self) -> Option<&JobId> {
        self.pending.front()
    }

    pub fn pending_ids(&self) -> Vec<JobId> {
        self.pending.iter().cloned().collect()
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn increment_accepted(&mut self) {
        self.accepted += 1;
    }

    pub fn decrement_accepted(&mut self) {
        self.accepted = self.accepted.saturating_sub(1);
    }

    pub fn count(&self, status: Option<JobStatus>) -> usize {
        match status {
            Some(status) => self.jobs.values().filter(|job| job.status == status).count(),
            None => self.jobs.len(),
        }
    }

    pub fn is_busy(&self, id: Option<&JobId>) -> Result<bool> {
        match id {
            Some(id) => Ok(self.require(id)?.status == JobStatus::Uploading),
            None => Ok(self.jobs.values().any(|job| job.status == JobStatus::Uploading)),
        }
    }

    /// Size of one job or of all jobs, `None` if any size is unknown.
    pub fn total_bytes(&self, id: Option<&JobId>) -> Result<Option<u64>> {
        match id {
            Some(id) => Ok(self.require(id)?.size_bytes),
            None => Ok(self.iter().map(|job| job.size_bytes).sum()),
        }
    }

    pub fn total_transferred(&self, id: Option<&JobId>) -> Result<Option<u64>> {
        let transferred = |job: &Job| job.size_bytes.map(|_| job.bytes_transferred());
        match id {
            Some(id) => Ok(transferred(self.require(id)?)),
            None => Ok(self.iter().map(transferred).sum()),
        }
    }

    /// Bytes per second, summed across jobs when no id is given.
    pub fn speed(&self, id: Option<&JobId>, average: bool) -> Result<Option<u64>> {
        match id {
            Some(id) => Ok(job_speed(self.require(id)?, average)),
            None => Ok(self.iter().map(|job| job_speed(job, average)).sum()),
        }
    }

    /// Seconds left; across jobs the slowest one decides. Unknown while an
    /// uploading job has no measurable speed yet.
    pub fn time_remaining(&self, id: Option<&JobId>, average: bool) -> Result<Option<u64>> {
        match id {
            Some(id) => {
                let job = self.require(id)?;
                Ok(job.size_bytes.and_then(|total| job_time_remaining(job, total, average)))
            }
            None => {
                let mut max = 0;
                for job in self.iter() {
                    let Some(total) = job.size_bytes else {
                        return Ok(None);
                    };
                    match job_time_remaining(job, total, average) {
                        Some(left) => max = max.max(left),
                        None if job.status == JobStatus::Uploading => return Ok(None),
                        None => {}
                    }
                }
                Ok(Some(max))
            }
        }
    }
}

fn job_speed(job: &Job, average: bool) -> Option<u64> {
    let total = job.size_bytes?;
    Some(
        job.progress
            .as_ref()
            .map(|progress| progress.speed(total, average))
            .unwrap_or(0),
    )
}

fn job_time_remaining(job: &Job, total: u64, average: bool) -> Option<u64> {
    match job.status {
        JobStatus::Completed => Some(0),
        JobStatus::Uploading => job.progress.as_ref()?.time_remaining(total, average),
        JobStatus::Added | JobStatus::Pending | JobStatus::Failed => None,
    }
}
