//! In-process batch job queue: a bounded channel feeding one worker task,
//! plus registries of queued, failed and completed jobs.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{EnqueueResponse, JobKind, JobStatus, JobSummary, JobView, JobsOverview},
};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        RwLock,
    },
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

pub mod processing;

#[derive(Debug, Clone, Copy)]
pub struct JobQueueConfig {
    pub capacity: usize,
    /// Finished jobs kept per registry before the oldest is forgotten.
    pub history: usize,
    pub timeout: Duration,
}

struct QueuedJob {
    id: Uuid,
    kind: JobKind,
    data: Value,
    options: Value,
}

struct JobRecord {
    kind: JobKind,
    status: JobStatus,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    result: Option<Value>,
    error: Option<String>,
}

#[derive(Default)]
struct Registry {
    records: HashMap<Uuid, JobRecord>,
    queued: VecDeque<Uuid>,
    failed: VecDeque<Uuid>,
    completed: VecDeque<Uuid>,
}

impl Registry {
    fn start(&mut self, id: Uuid) {
        self.queued.retain(|queued| *queued != id);
        if let Some(record) = self.records.get_mut(&id) {
            record.status = JobStatus::Started;
        }
    }

    fn finish(&mut self, id: Uuid, outcome: Result<Value, String>, history: usize) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        record.ended_at = Some(Utc::now());
        let finished = match outcome {
            Ok(result) => {
                record.status = JobStatus::Finished;
                record.result = Some(result);
                &mut self.completed
            }
            Err(error) => {
                record.status = JobStatus::Failed;
                record.error = Some(error);
                &mut self.failed
            }
        };
        finished.push_back(id);
        if finished.len() > history {
            if let Some(evicted) = finished.pop_front() {
                self.records.remove(&evicted);
            }
        }
    }

    fn view(&self, id: Uuid) -> Option<JobView> {
        let record = self.records.get(&id)?;
        Some(JobView {
            job_id: id.to_string(),
            kind: record.kind,
            status: record.status,
            queue_position: self.queued.iter().position(|q| *q == id).unwrap_or(0),
            created_at: record.created_at,
            ended_at: record.ended_at,
            result: record.result.clone(),
            error: record.error.clone(),
        })
    }
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<QueuedJob>,
    registry: Arc<RwLock<Registry>>,
}

impl JobQueue {
    /// Must be called from within a tokio runtime. The worker exits once
    /// every clone of the queue has been dropped.
    pub fn spawn(config: JobQueueConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let registry = Arc::new(RwLock::new(Registry::default()));
        let handle = tokio::spawn(run_worker(rx, registry.clone(), config));
        (Self { tx, registry }, handle)
    }

    pub async fn enqueue(
        &self,
        kind: JobKind,
        data: Value,
        options: Value,
    ) -> Result<EnqueueResponse, ApiError> {
        let id = Uuid::new_v4();
        let mut registry = self.registry.write().await;
        registry.records.insert(
            id,
            JobRecord {
                kind,
                status: JobStatus::Queued,
                created_at: Utc::now(),
                ended_at: None,
                result: None,
                error: None,
            },
        );
        registry.queued.push_back(id);

        let job = QueuedJob {
            id,
            kind,
            data,
            options,
        };
        if let Err(err) = self.tx.try_send(job) {
            registry.records.remove(&id);
            registry.queued.retain(|queued| *queued != id);
            let reason = match err {
                TrySendError::Full(_) => "job queue is full",
                TrySendError::Closed(_) => "job worker stopped",
            };
            warn!(job_id = %id, reason, "rejecting job");
            return Err(ApiError::new(ErrorCode::Unavailable, reason));
        }

        info!(job_id = %id, ?kind, "job enqueued");
        Ok(EnqueueResponse {
            job_id: id.to_string(),
            status: JobStatus::Queued,
            position: registry.queued.len(),
        })
    }

    pub async fn job(&self, id: Uuid) -> Option<JobView> {
        self.registry.read().await.view(id)
    }

    pub async fn overview(&self) -> JobsOverview {
        let registry = self.registry.read().await;
        let summarize = |ids: &VecDeque<Uuid>, with_status: bool| -> Vec<JobSummary> {
            ids.iter()
                .map(|id| JobSummary {
                    job_id: id.to_string(),
                    status: with_status
                        .then(|| registry.records.get(id).map(|r| r.status))
                        .flatten(),
                })
                .collect()
        };
        JobsOverview {
            queued_count: registry.queued.len(),
            failed_count: registry.failed.len(),
            completed_count: registry.completed.len(),
            queued_jobs: summarize(&registry.queued, true),
            failed_jobs: summarize(&registry.failed, false),
            completed_jobs: summarize(&registry.completed, false),
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<QueuedJob>,
    registry: Arc<RwLock<Registry>>,
    config: JobQueueConfig,
) {
    while let Some(job) = rx.recv().await {
        registry.write().await.start(job.id);

        let work = processing::run(job.kind, job.data, job.options);
        let outcome = match tokio::time::timeout(config.timeout, work).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(error.to_string()),
            Err(_) => Err(format!("job timed out after {}s", config.timeout.as_secs())),
        };
        match &outcome {
            Ok(_) => info!(job_id = %job.id, "job finished"),
            Err(error) => warn!(job_id = %job.id, %error, "job failed"),
        }

        registry
            .write()
            .await
            .finish(job.id, outcome, config.history.max(1));
    }
    info!("job worker finished");
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
