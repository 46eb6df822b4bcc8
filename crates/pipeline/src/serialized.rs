//! Rate-limited FIFO job queue.
//!
//! [`SerializedRunner`] owns a single worker task. Prompts are queued in
//! arrival order and dispatched one at a time; consecutive dispatch starts
//! are spaced by at least one [`RateWindow`]. A job is never retried; its
//! result goes straight back to the caller through a oneshot channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::error::CoreError;
use relay_core::rate_window::RateWindow;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::generation::GenerationPipeline;
use crate::runner::JobRunner;

/// How long [`SerializedRunner::shutdown`] waits for the in-flight job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type JobResult = Result<Vec<String>, CoreError>;

struct QueuedJob {
    prompt: String,
    enqueued_at: Instant,
    reply: oneshot::Sender<JobResult>,
}

/// [`JobRunner`] that serializes jobs through one rate-limited worker.
pub struct SerializedRunner {
    sender: mpsc::UnboundedSender<QueuedJob>,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    window: RateWindow,
}

impl SerializedRunner {
    /// Spawn the worker task and return a handle to the queue.
    pub fn start(pipeline: Arc<GenerationPipeline>, window: RateWindow) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            pipeline,
            window,
            receiver,
            cancel.clone(),
            Arc::clone(&depth),
        ));

        tracing::info!(
            spacing_ms = window.spacing().as_millis() as u64,
            "Serialized job queue started",
        );

        Self {
            sender,
            depth,
            cancel,
            worker: Mutex::new(Some(worker)),
            window,
        }
    }

    /// Jobs waiting for dispatch, excluding the one in flight.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn window(&self) -> RateWindow {
        self.window
    }
}

#[async_trait]
impl JobRunner for SerializedRunner {
    async fn run(&self, prompt: String) -> Result<Vec<String>, CoreError> {
        if self.cancel.is_cancelled() {
            return Err(queue_closed());
        }

        let (reply, response) = oneshot::channel();
        let job = QueuedJob {
            prompt,
            enqueued_at: Instant::now(),
            reply,
        };

        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(queue_closed());
        }
        tracing::debug!(queue_depth = self.queue_depth(), "Job enqueued");

        response
            .await
            .map_err(|_| CoreError::Transport("job queue worker stopped".to_string()))?
    }

    /// Close intake, fail queued jobs, and give the in-flight job a short
    /// grace period to finish.
    async fn shutdown(&self) {
        tracing::info!(queue_depth = self.queue_depth(), "Shutting down job queue");
        self.cancel.cancel();

        if let Some(handle) = self.worker.lock().await.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                tracing::warn!("In-flight job did not finish within the shutdown grace period");
            }
        }

        tracing::info!("Job queue shut down");
    }
}

fn queue_closed() -> CoreError {
    CoreError::Transport("job queue is shut down".to_string())
}

/// Worker loop: take the next job, wait for its slot, run it, reply.
///
/// Runs until cancelled or until every sender is dropped. Jobs still queued
/// at that point are failed with [`CoreError::Transport`].
async fn run_worker(
    pipeline: Arc<GenerationPipeline>,
    window: RateWindow,
    mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
    cancel: CancellationToken,
    depth: Arc<AtomicUsize>,
) {
    let mut last_dispatch: Option<Instant> = None;

    loop {
        let mut job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Some(job) => job,
                None => break,
            },
        };
        depth.fetch_sub(1, Ordering::SeqCst);

        let slot = window.next_slot(
            last_dispatch.map(Instant::into_std),
            Instant::now().into_std(),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = job.reply.send(Err(queue_closed()));
                break;
            }
            _ = job.reply.closed() => {
                tracing::debug!("Caller went away before dispatch, skipping job");
                continue;
            }
            _ = tokio::time::sleep_until(Instant::from_std(slot)) => {}
        }

        last_dispatch = Some(Instant::now());
        tracing::info!(
            waited_ms = job.enqueued_at.elapsed().as_millis() as u64,
            queue_depth = depth.load(Ordering::SeqCst),
            "Dispatching queued job",
        );

        // Once dispatched a job runs to completion; cancellation only
        // applies between jobs.
        let result = pipeline.generate(&job.prompt).await;
        if job.reply.send(result).is_err() {
            tracing::debug!("Caller went away before the job finished");
        }
    }

    receiver.close();
    let mut dropped = 0usize;
    while let Ok(job) = receiver.try_recv() {
        depth.fetch_sub(1, Ordering::SeqCst);
        let _ = job.reply.send(Err(queue_closed()));
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Failed queued jobs on shutdown");
    }
    tracing::info!("Job queue worker exited");
}
