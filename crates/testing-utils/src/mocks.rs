//! Mock implementations of the queue and provider traits
//!
//! In-memory doubles that record every call so tests can assert on exactly
//! what the worker persisted and which provider operations it invoked.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use provisioner_core::{
    JobLogEntry, JobLogLevel, JobQueue, JobUpdate, ProvisionJob, ProvisionProvider, ProvisionResult,
    ProvisionerError, ProvisionerResult,
};

/// A job log entry captured by [`MockJobQueue`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLog {
    pub job_id: String,
    pub ts: DateTime<Utc>,
    pub level: JobLogLevel,
    pub message: String,
    pub context: Option<Value>,
}

/// Ordered record of queue calls, for asserting interleaving
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCall {
    Dequeue(usize),
    AppendLog { job_id: String, message: String },
    UpdateJob { job_id: String },
    GetJob { job_id: String },
}

enum DequeueScript {
    Jobs(Vec<ProvisionJob>),
    Fail(String),
}

/// Mock implementation of JobQueue for testing
///
/// Jobs pushed through [`push_batch`](Self::push_batch) are also stored, so
/// `update_job` applies patches to them and `get_job` returns the result.
#[derive(Clone, Default)]
pub struct MockJobQueue {
    batches: Arc<Mutex<VecDeque<DequeueScript>>>,
    jobs: Arc<Mutex<HashMap<String, ProvisionJob>>>,
    logs: Arc<Mutex<Vec<RecordedLog>>>,
    updates: Arc<Mutex<Vec<(String, JobUpdate)>>>,
    calls: Arc<Mutex<Vec<QueueCall>>>,
    failing_updates: Arc<Mutex<HashSet<String>>>,
    failing_logs: Arc<Mutex<HashSet<String>>>,
    dequeue_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue up the result of the next `dequeue_batch` call
    pub fn push_batch(&self, jobs: Vec<ProvisionJob>) {
        for job in &jobs {
            self.insert_job(job.clone());
        }
        self.batches.lock().unwrap().push_back(DequeueScript::Jobs(jobs));
    }

    /// Make the next `dequeue_batch` call fail
    pub fn push_dequeue_failure(&self, message: &str) {
        self.batches
            .lock()
            .unwrap()
            .push_back(DequeueScript::Fail(message.to_string()));
    }

    /// Every `dequeue_batch` call sleeps this long after being recorded
    pub fn set_dequeue_delay(&self, delay: Duration) {
        *self.dequeue_delay.lock().unwrap() = Some(delay);
    }

    pub fn insert_job(&self, job: ProvisionJob) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }

    pub fn remove_job(&self, job_id: &str) {
        self.jobs.lock().unwrap().remove(job_id);
    }

    /// Every `update_job` for this job fails with a queue error
    pub fn fail_updates_for(&self, job_id: &str) {
        self.failing_updates.lock().unwrap().insert(job_id.to_string());
    }

    /// Every `append_log` for this job fails with a queue error
    pub fn fail_logs_for(&self, job_id: &str) {
        self.failing_logs.lock().unwrap().insert(job_id.to_string());
    }

    pub fn job(&self, job_id: &str) -> Option<ProvisionJob> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }

    pub fn logs(&self) -> Vec<RecordedLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn logs_for(&self, job_id: &str) -> Vec<RecordedLog> {
        self.logs()
            .into_iter()
            .filter(|log| log.job_id == job_id)
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, JobUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_for(&self, job_id: &str) -> Vec<JobUpdate> {
        self.updates()
            .into_iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, update)| update)
            .collect()
    }

    pub fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dequeue_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, QueueCall::Dequeue(_)))
            .count()
    }
}

#[async_trait]
impl JobQueue for MockJobQueue {
    async fn dequeue_batch(&self, max_count: usize) -> ProvisionerResult<Vec<ProvisionJob>> {
        self.calls.lock().unwrap().push(QueueCall::Dequeue(max_count));

        let delay = *self.dequeue_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.batches.lock().unwrap().pop_front() {
            Some(DequeueScript::Jobs(mut jobs)) => {
                jobs.truncate(max_count);
                Ok(jobs)
            }
            Some(DequeueScript::Fail(message)) => Err(ProvisionerError::Queue(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn append_log(&self, job_id: &str, entry: &JobLogEntry) -> ProvisionerResult<()> {
        self.calls.lock().unwrap().push(QueueCall::AppendLog {
            job_id: job_id.to_string(),
            message: entry.message.clone(),
        });

        if self.failing_logs.lock().unwrap().contains(job_id) {
            return Err(ProvisionerError::Queue(format!(
                "append_log rejected for {job_id}"
            )));
        }

        self.logs.lock().unwrap().push(RecordedLog {
            job_id: job_id.to_string(),
            ts: entry.ts,
            level: entry.level,
            message: entry.message.clone(),
            context: entry.context.clone(),
        });
        Ok(())
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> ProvisionerResult<()> {
        self.calls.lock().unwrap().push(QueueCall::UpdateJob {
            job_id: job_id.to_string(),
        });

        if self.failing_updates.lock().unwrap().contains(job_id) {
            return Err(ProvisionerError::Queue(format!(
                "update_job rejected for {job_id}"
            )));
        }

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(job_id).ok_or_else(|| ProvisionerError::JobNotFound {
            id: job_id.to_string(),
        })?;
        job.apply_update(update);

        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), update.clone()));
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> ProvisionerResult<Option<ProvisionJob>> {
        self.calls.lock().unwrap().push(QueueCall::GetJob {
            job_id: job_id.to_string(),
        });
        Ok(self.job(job_id))
    }
}

/// A bootstrap call captured by [`MockProvisionProvider`]
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapCall {
    pub job_id: String,
    pub instance_id: String,
    pub script: String,
}

/// Mock implementation of ProvisionProvider for testing
///
/// Unless scripted otherwise, `create_instance` succeeds with
/// `ins-<short id>` and IP `203.0.113.10`, and `bootstrap_instance` succeeds.
#[derive(Clone, Default)]
pub struct MockProvisionProvider {
    create_results: Arc<Mutex<VecDeque<ProvisionerResult<ProvisionResult>>>>,
    create_failures: Arc<Mutex<HashMap<String, String>>>,
    bootstrap_failures: Arc<Mutex<HashMap<String, String>>>,
    created: Arc<Mutex<Vec<String>>>,
    bootstraps: Arc<Mutex<Vec<BootstrapCall>>>,
}

impl MockProvisionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result of the next `create_instance` call
    pub fn push_create_result(&self, result: ProvisionerResult<ProvisionResult>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    /// `create_instance` fails for this job with a provider response error
    pub fn fail_create_for(&self, job_id: &str, message: &str) {
        self.create_failures
            .lock()
            .unwrap()
            .insert(job_id.to_string(), message.to_string());
    }

    /// `bootstrap_instance` fails for this job with a provider API error
    pub fn fail_bootstrap_for(&self, job_id: &str, body: &str) {
        self.bootstrap_failures
            .lock()
            .unwrap()
            .insert(job_id.to_string(), body.to_string());
    }

    /// Job ids passed to `create_instance`, in call order
    pub fn created_jobs(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn bootstrap_calls(&self) -> Vec<BootstrapCall> {
        self.bootstraps.lock().unwrap().clone()
    }

    pub fn default_result(job: &ProvisionJob) -> ProvisionResult {
        ProvisionResult {
            instance_id: format!("ins-{}", job.short_id()),
            public_ip: Some("203.0.113.10".to_string()),
            metadata: HashMap::new(),
        }
    }
}

#[async_trait]
impl ProvisionProvider for MockProvisionProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_instance(&self, job: &ProvisionJob) -> ProvisionerResult<ProvisionResult> {
        self.created.lock().unwrap().push(job.id.clone());

        if let Some(message) = self.create_failures.lock().unwrap().get(&job.id) {
            return Err(ProvisionerError::ProviderResponse(message.clone()));
        }

        match self.create_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Self::default_result(job)),
        }
    }

    async fn bootstrap_instance(
        &self,
        job: &ProvisionJob,
        instance_id: &str,
        script: &str,
    ) -> ProvisionerResult<()> {
        self.bootstraps.lock().unwrap().push(BootstrapCall {
            job_id: job.id.clone(),
            instance_id: instance_id.to_string(),
            script: script.to_string(),
        });

        if let Some(body) = self.bootstrap_failures.lock().unwrap().get(&job.id) {
            return Err(ProvisionerError::ProviderApi {
                action: "InvokeCommand".to_string(),
                status: 500,
                body: body.clone(),
            });
        }

        Ok(())
    }
}
