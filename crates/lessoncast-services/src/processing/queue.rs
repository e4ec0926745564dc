//! Bounded pool of processing workers fed through a channel.
//!
//! Shutdown: [`ProcessingQueue::shutdown`] stops the pool from taking new jobs;
//! jobs already running finish on their own tasks.

use lessoncast_core::AppError;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use super::worker::{ProcessingJob, ProcessingWorker};

const JOB_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ProcessingQueue {
    jobs_tx: mpsc::Sender<ProcessingJob>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ProcessingQueue {
    /// Spawn the pool; at most `max_workers` jobs run at once.
    pub fn start(worker: Arc<ProcessingWorker>, max_workers: usize) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(JOB_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(
            worker,
            max_workers.max(1),
            jobs_rx,
            shutdown_rx,
        ));

        Self {
            jobs_tx,
            shutdown_tx,
        }
    }

    #[tracing::instrument(skip(self, job), fields(lesson_id = job.lesson_id, object_key = %job.object_key))]
    pub async fn enqueue(&self, job: ProcessingJob) -> Result<(), AppError> {
        self.jobs_tx.send(job).await.map_err(|_| {
            tracing::error!("Processing queue is closed");
            AppError::Unavailable("Video processing is not running".to_string())
        })?;
        tracing::info!("Processing job queued");
        Ok(())
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    async fn worker_pool(
        worker: Arc<ProcessingWorker>,
        max_workers: usize,
        mut jobs_rx: mpsc::Receiver<ProcessingJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(max_workers = max_workers, "Processing worker pool started");
        let semaphore = Arc::new(Semaphore::new(max_workers));

        loop {
            let job = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Processing worker pool shutting down");
                    break;
                }
                job = jobs_rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = worker.clone();
            tokio::spawn(async move {
                let _permit = permit;
                worker.process(job).await;
            });
        }

        tracing::info!("Processing worker pool stopped");
    }
}
