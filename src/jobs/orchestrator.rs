//! Bounded worker pool driving jobs through fetch → resize.
//!
//! ```text
//! submit(url) ─▶ store.create (PENDING) ─▶ queue ─▶ worker 1..N
//!                                                   │ mark_processing
//!                                                   │ fetch + resize
//!                                                   ▼
//!                                   store.complete / store.fail
//! ```
//!
//! `submit` only touches the store and the queue, so it never waits on a
//! worker. Callers observe progress by polling [`JobOrchestrator::status`];
//! there are no completion callbacks.
//!
//! The pool size is fixed at start. It bounds how many downloads and decoded
//! images are in flight at once, no matter how many jobs are queued.
//!
//! ## Shutdown
//!
//! [`JobOrchestrator::shutdown`] closes the queue, then gives the workers
//! `timeout` to drain what is already queued. Workers still running after that
//! are aborted. Jobs they held stay in whatever state they were last in and
//! should be treated as abandoned, not failed. Dropping the orchestrator
//! without calling `shutdown` aborts the workers immediately.

use super::store::JobStore;
use super::types::{JobId, JobStatus};
use crate::config::{AppConfig, ConfigError};
use crate::fetch::Fetcher;
use crate::imaging::{BufferError, ImageBuffer, ThumbnailSize};
use crate::process::fetch_and_resize;
use crate::sink::ResultSink;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job {id} is not ready yet ({status})")]
    NotReady { id: JobId, status: JobStatus },
    #[error("Job {id} failed: {reason}")]
    JobFailed { id: JobId, reason: String },
    #[error("Job orchestrator is shut down")]
    ShutDown,
    #[error("Failed to encode result: {0}")]
    Encode(String),
    #[error("Failed to write result: {0}")]
    Sink(String),
}

impl From<BufferError> for JobError {
    fn from(e: BufferError) -> Self {
        JobError::Encode(e.to_string())
    }
}

/// Settings for [`JobOrchestrator::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub size: ThumbnailSize,
}

impl OrchestratorConfig {
    /// Build from the `[jobs]` and `[thumbnail]` sections.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            workers: config.jobs.workers.max(1),
            size: config.thumbnail.thumbnail_size()?,
        })
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            size: ThumbnailSize::default(),
        }
    }
}

/// How a [`JobOrchestrator::shutdown`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker exited within the timeout; the queue is empty.
    Drained,
    /// The timeout expired and the remaining workers were aborted.
    Forced {
        aborted_workers: usize,
        /// Jobs left PENDING or PROCESSING.
        abandoned_jobs: usize,
    },
}

#[derive(Debug)]
struct QueuedJob {
    id: JobId,
    url: String,
}

struct WorkerContext {
    store: Arc<JobStore>,
    fetcher: Arc<dyn Fetcher>,
    size: ThumbnailSize,
}

type SharedQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

pub struct JobOrchestrator {
    store: Arc<JobStore>,
    queue: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    workers: Mutex<Option<JoinSet<()>>>,
    worker_count: usize,
}

impl JobOrchestrator {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(
        config: OrchestratorConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<JobStore>,
    ) -> Self {
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let rx: SharedQueue = Arc::new(tokio::sync::Mutex::new(rx));
        let ctx = Arc::new(WorkerContext {
            store: Arc::clone(&store),
            fetcher,
            size: config.size,
        });

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(worker_loop(worker, Arc::clone(&rx), Arc::clone(&ctx)));
        }
        info!(workers = worker_count, "job orchestrator started");

        Self {
            store,
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(Some(workers)),
            worker_count,
        }
    }

    /// The store this orchestrator records into.
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Register a job for `url` and queue it. Returns immediately.
    pub fn submit(&self, url: impl Into<String>) -> Result<JobId, JobError> {
        let url = url.into();
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = queue.as_ref().ok_or(JobError::ShutDown)?;

        let id = self.store.create(url.clone());
        tx.send(QueuedJob { id, url })
            .map_err(|_| JobError::ShutDown)?;
        debug!(job_id = %id, "job queued");
        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.store.status(id)
    }

    /// The finished thumbnail, or why there isn't one.
    pub fn result(&self, id: JobId) -> Result<ImageBuffer, JobError> {
        let job = self.store.get(id).ok_or(JobError::NotFound(id))?;
        match job.status {
            JobStatus::Pending | JobStatus::Processing => Err(JobError::NotReady {
                id,
                status: job.status,
            }),
            JobStatus::Failed => Err(JobError::JobFailed {
                id,
                reason: job.error.unwrap_or_default(),
            }),
            JobStatus::Completed => job.result.ok_or(JobError::NotReady {
                id,
                status: job.status,
            }),
        }
    }

    /// [`result`](Self::result) encoded as PNG with alpha.
    pub fn result_png(&self, id: JobId) -> Result<Vec<u8>, JobError> {
        Ok(self.result(id)?.to_png()?)
    }

    /// Hand a completed job's thumbnail to `sink` under `name`.
    pub fn write_result(
        &self,
        id: JobId,
        sink: &dyn ResultSink,
        name: &str,
    ) -> Result<PathBuf, JobError> {
        let thumbnail = self.result(id)?;
        sink.write(name, &thumbnail).map_err(|e| JobError::Sink(e.to_string()))
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// Returns `None` for unknown ids. Does not time out on its own; wrap it in
    /// `tokio::time::timeout` when needed.
    pub async fn wait_for(&self, id: JobId, poll_interval: Duration) -> Option<JobStatus> {
        loop {
            let status = self.status(id)?;
            if status.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stop accepting jobs, drain for up to `timeout`, then abort.
    ///
    /// Calling it again after the first call is a no-op that reports `Drained`.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut workers) = workers else {
            return ShutdownOutcome::Drained;
        };

        info!(?timeout, "shutting down job orchestrator");
        let drained = tokio::time::timeout(timeout, async {
            while workers.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if drained {
            info!("all workers finished");
            return ShutdownOutcome::Drained;
        }

        let aborted_workers = workers.len();
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        let counts = self.store.count_by_status();
        let abandoned_jobs = counts.get(&JobStatus::Pending).copied().unwrap_or(0)
            + counts.get(&JobStatus::Processing).copied().unwrap_or(0);
        warn!(
            aborted_workers,
            abandoned_jobs, "shutdown timed out, aborted remaining workers"
        );
        ShutdownOutcome::Forced {
            aborted_workers,
            abandoned_jobs,
        }
    }
}

async fn worker_loop(worker: usize, queue: SharedQueue, ctx: Arc<WorkerContext>) {
    debug!(worker, "worker started");
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else { break };
        run_job(worker, &ctx, job).await;
    }
    debug!(worker, "worker stopped");
}

async fn run_job(worker: usize, ctx: &WorkerContext, job: QueuedJob) {
    let QueuedJob { id, url } = job;
    if let Err(e) = ctx.store.mark_processing(id) {
        warn!(worker, job_id = %id, error = %e, "could not claim job");
        return;
    }
    debug!(worker, job_id = %id, url = %url, "processing job");

    // Own task: a panicking fetcher surfaces as a JoinError, not a dead worker.
    // Aborting the worker drops the set, which aborts the pipeline too.
    let mut pipeline = JoinSet::new();
    let fetcher = Arc::clone(&ctx.fetcher);
    let size = ctx.size;
    let task_url = url.clone();
    pipeline.spawn(async move { fetch_and_resize(fetcher.as_ref(), &task_url, size).await });

    let outcome = match pipeline.join_next().await {
        Some(Ok(result)) => result.map_err(|e| e.to_string()),
        Some(Err(e)) => Err(format!("job task failed: {e}")),
        None => Err("job task did not run".to_string()),
    };

    let recorded = match outcome {
        Ok(thumbnail) => {
            info!(worker, job_id = %id, "job completed");
            ctx.store.complete(id, thumbnail)
        }
        Err(reason) => {
            warn!(worker, job_id = %id, url = %url, error = %reason, "job failed");
            ctx.store.fail(id, reason)
        }
    };
    if let Err(e) = recorded {
        warn!(worker, job_id = %id, error = %e, "could not record job outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::fetch::tests::MockFetcher;
    use crate::sink::tests::MemorySink;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    const POLL: Duration = Duration::from_millis(5);

    fn orchestrator(fetcher: MockFetcher, workers: usize) -> JobOrchestrator {
        JobOrchestrator::start(
            OrchestratorConfig {
                workers,
                ..OrchestratorConfig::default()
            },
            Arc::new(fetcher),
            Arc::new(JobStore::new()),
        )
    }

    async fn wait(orch: &JobOrchestrator, id: JobId) -> JobStatus {
        tokio::time::timeout(Duration::from_secs(10), orch.wait_for(id, POLL))
            .await
            .expect("job did not finish in time")
            .expect("job vanished")
    }

    #[tokio::test]
    async fn completed_job_returns_avatar() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/wide.png", 512, 256);
        let orch = orchestrator(fetcher, 2);

        let id = orch.submit("https://img/wide.png").unwrap();
        assert_eq!(wait(&orch, id).await, JobStatus::Completed);

        let avatar = orch.result(id).unwrap();
        assert_eq!(avatar.dimensions(), (128, 128));
        let png = orch.result_png(id).unwrap();
        assert_eq!(ImageBuffer::decode(&png).unwrap().dimensions(), (128, 128));
    }

    #[tokio::test]
    async fn unreachable_url_fails_job() {
        let orch = orchestrator(MockFetcher::new(), 2);

        let id = orch.submit("http://unreachable.invalid/a.png").unwrap();
        assert_eq!(wait(&orch, id).await, JobStatus::Failed);

        match orch.result(id) {
            Err(JobError::JobFailed { id: failed, reason }) => {
                assert_eq!(failed, id);
                assert!(reason.contains("connection refused"), "{reason}");
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_before_completion_is_not_ready() {
        let fetcher = MockFetcher::with_delay(Duration::from_millis(300));
        fetcher.respond_image("https://img/slow.png", 300, 300);
        let orch = orchestrator(fetcher, 1);

        let id = orch.submit("https://img/slow.png").unwrap();
        assert!(matches!(
            orch.result(id),
            Err(JobError::NotReady { status, .. })
                if status == JobStatus::Pending || status == JobStatus::Processing
        ));
        assert_eq!(wait(&orch, id).await, JobStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let orch = orchestrator(MockFetcher::new(), 1);
        let id = JobId::new();
        assert_eq!(orch.status(id), None);
        assert_eq!(orch.result(id), Err(JobError::NotFound(id)));
        assert_eq!(orch.result_png(id), Err(JobError::NotFound(id)));
        assert_eq!(orch.wait_for(id, POLL).await, None);
    }

    #[tokio::test]
    async fn failure_does_not_stop_worker() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/ok.png", 64, 64);
        let orch = orchestrator(fetcher, 1);

        let bad = orch.submit("https://img/missing.png").unwrap();
        let good = orch.submit("https://img/ok.png").unwrap();
        assert_eq!(wait(&orch, bad).await, JobStatus::Failed);
        assert_eq!(wait(&orch, good).await, JobStatus::Completed);
    }

    /// Panics on its first call, then answers like the wrapped mock.
    struct PanicOnceFetcher {
        panicked: AtomicBool,
        inner: MockFetcher,
    }

    #[async_trait]
    impl Fetcher for PanicOnceFetcher {
        async fn fetch(&self, url: &str) -> Result<ImageBuffer, FetchError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("decoder blew up");
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn panicking_fetch_fails_job_and_worker_survives() {
        let inner = MockFetcher::new();
        inner.respond_image("https://img/a.png", 64, 64);
        let fetcher = PanicOnceFetcher {
            panicked: AtomicBool::new(false),
            inner,
        };
        let orch = JobOrchestrator::start(
            OrchestratorConfig {
                workers: 1,
                ..OrchestratorConfig::default()
            },
            Arc::new(fetcher),
            Arc::new(JobStore::new()),
        );

        let first = orch.submit("https://img/a.png").unwrap();
        let second = orch.submit("https://img/a.png").unwrap();
        assert_eq!(wait(&orch, first).await, JobStatus::Failed);
        assert_eq!(wait(&orch, second).await, JobStatus::Completed);

        match orch.result(first) {
            Err(JobError::JobFailed { reason, .. }) => {
                assert!(reason.contains("panicked"), "{reason}")
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }
        assert_eq!(
            orch.shutdown(Duration::from_secs(1)).await,
            ShutdownOutcome::Drained
        );
    }

    #[tokio::test]
    async fn write_result_hands_thumbnail_to_sink() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/wide.png", 512, 256);
        let orch = orchestrator(fetcher, 1);
        let sink = MemorySink::new();

        let id = orch.submit("https://img/wide.png").unwrap();
        assert_eq!(wait(&orch, id).await, JobStatus::Completed);

        let path = orch.write_result(id, &sink, "avatar_1").unwrap();
        assert_eq!(path, PathBuf::from("avatar_1.png"));
        assert_eq!(
            *sink.written.lock().unwrap(),
            vec![("avatar_1".to_string(), (128, 128))]
        );
    }

    #[tokio::test]
    async fn write_result_of_failed_job_writes_nothing() {
        let orch = orchestrator(MockFetcher::new(), 1);
        let sink = MemorySink::new();

        let id = orch.submit("https://img/missing.png").unwrap();
        assert_eq!(wait(&orch, id).await, JobStatus::Failed);

        assert!(matches!(
            orch.write_result(id, &sink, "avatar_1"),
            Err(JobError::JobFailed { .. })
        ));
        assert!(sink.names().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submits_get_distinct_ids() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/a.png", 8, 8);
        let orch = Arc::new(orchestrator(fetcher, 4));

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let orch = Arc::clone(&orch);
            tasks.spawn(async move {
                (0..25)
                    .map(|_| orch.submit("https://img/a.png").unwrap())
                    .collect::<Vec<_>>()
            });
        }
        let mut ids = Vec::new();
        while let Some(batch) = tasks.join_next().await {
            ids.extend(batch.unwrap());
        }

        let unique: HashSet<JobId> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 400);
        assert_eq!(unique.len(), 400);
        for id in ids {
            assert_eq!(wait(&orch, id).await, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn observed_statuses_never_regress() {
        let fetcher = MockFetcher::with_delay(Duration::from_millis(40));
        fetcher.respond_image("https://img/a.png", 256, 256);
        let orch = orchestrator(fetcher, 1);

        let ids: Vec<JobId> = (0..3)
            .map(|_| orch.submit("https://img/a.png").unwrap())
            .collect();

        let mut seen: Vec<Vec<JobStatus>> = vec![Vec::new(); ids.len()];
        loop {
            for (i, id) in ids.iter().enumerate() {
                let status = orch.status(*id).unwrap();
                if seen[i].last() != Some(&status) {
                    seen[i].push(status);
                }
            }
            if seen.iter().all(|s| s.last().is_some_and(|st| st.is_terminal())) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        for history in seen {
            for pair in history.windows(2) {
                assert!(
                    pair[0].can_transition_to(pair[1])
                        || (pair[0] == JobStatus::Pending && pair[1].is_terminal()),
                    "regressed: {history:?}"
                );
            }
            assert_eq!(history.last(), Some(&JobStatus::Completed));
        }
    }

    #[tokio::test]
    async fn every_terminal_job_passed_through_processing() {
        let fetcher = MockFetcher::new();
        fetcher.respond_image("https://img/a.png", 32, 32);
        let orch = orchestrator(fetcher, 2);

        let id = orch.submit("https://img/a.png").unwrap();
        let bad = orch.submit("https://img/nope.png").unwrap();
        wait(&orch, id).await;
        wait(&orch, bad).await;

        for job_id in [id, bad] {
            let job = orch.store().get(job_id).unwrap();
            assert!(job.started_at.is_some());
            assert!(job.finished_at.is_some());
            assert!(job.processing_time().is_some());
        }
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let orch = orchestrator(MockFetcher::new(), 2);
        assert_eq!(
            orch.shutdown(Duration::from_secs(1)).await,
            ShutdownOutcome::Drained
        );
        assert_eq!(orch.submit("https://img/a.png"), Err(JobError::ShutDown));
        // Second call is a no-op
        assert_eq!(
            orch.shutdown(Duration::from_secs(1)).await,
            ShutdownOutcome::Drained
        );
    }

    #[tokio::test]
    async fn graceful_shutdown_drains_queue() {
        let fetcher = MockFetcher::with_delay(Duration::from_millis(20));
        fetcher.respond_image("https://img/a.png", 64, 64);
        let orch = orchestrator(fetcher, 2);

        let ids: Vec<JobId> = (0..6)
            .map(|_| orch.submit("https://img/a.png").unwrap())
            .collect();
        assert_eq!(
            orch.shutdown(Duration::from_secs(5)).await,
            ShutdownOutcome::Drained
        );
        for id in ids {
            assert_eq!(orch.status(id), Some(JobStatus::Completed));
        }
    }

    #[tokio::test]
    async fn forced_shutdown_abandons_in_flight_jobs() {
        let fetcher = MockFetcher::with_delay(Duration::from_secs(30));
        fetcher.respond_image("https://img/a.png", 64, 64);
        let orch = orchestrator(fetcher, 1);

        let running = orch.submit("https://img/a.png").unwrap();
        let queued = orch.submit("https://img/a.png").unwrap();
        // Let the single worker claim the first job
        tokio::time::timeout(Duration::from_secs(5), async {
            while orch.status(running) != Some(JobStatus::Processing) {
                tokio::time::sleep(POLL).await;
            }
        })
        .await
        .unwrap();

        let outcome = orch.shutdown(Duration::from_millis(50)).await;
        assert_eq!(
            outcome,
            ShutdownOutcome::Forced {
                aborted_workers: 1,
                abandoned_jobs: 2
            }
        );
        // Left as last observed, not marked failed
        assert_eq!(orch.status(running), Some(JobStatus::Processing));
        assert_eq!(orch.status(queued), Some(JobStatus::Pending));
    }

    #[test]
    fn config_from_app_config() {
        let mut app = AppConfig::default();
        app.jobs.workers = 3;
        app.thumbnail.size = 96;
        let config = OrchestratorConfig::from_app_config(&app).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.size.as_tuple(), (96, 96));
    }

    #[tokio::test]
    async fn worker_count_never_below_one() {
        let orch = orchestrator(MockFetcher::new(), 0);
        assert_eq!(orch.worker_count(), 1);
    }
}
