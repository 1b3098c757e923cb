//! Cancellable encode jobs.
//!
//! An [`EncodeJob`] runs a batch on tokio's blocking pool and streams
//! [`JobEvent`]s back to the caller. Cancelling sets the shared stop flag;
//! the running checksum or ffmpeg process notices it within one poll
//! interval and the batch ends with an aborted outcome.

use crate::pipeline::{BatchReport, PipelineEvent, PipelineExecutor};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages sent by a running job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Pipeline(PipelineEvent),
    /// Last event of every job.
    Finished(BatchReport),
}

/// A batch encode running in the background.
pub struct EncodeJob {
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedReceiver<JobEvent>,
    handle: JoinHandle<BatchReport>,
}

impl EncodeJob {
    /// Start `inputs` on the blocking pool. Must be called inside a tokio
    /// runtime. Replaces any event callback already set on `executor`.
    pub fn spawn(executor: PipelineExecutor, inputs: Vec<PathBuf>) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let stop = executor.stop_signal();

        let pipeline_tx = tx.clone();
        let executor = executor.with_event_callback(Box::new(move |event| {
            let _ = pipeline_tx.send(JobEvent::Pipeline(event));
        }));

        let handle = tokio::task::spawn_blocking(move || {
            let report = executor.run_batch(&inputs);
            let _ = tx.send(JobEvent::Finished(report.clone()));
            report
        });

        Self {
            stop,
            events,
            handle,
        }
    }

    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Ask the job to stop. Returns immediately.
    pub fn cancel(&self) {
        tracing::info!("Abort signal received. Stopping encode job...");
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Next event, or `None` once the job has finished and all events
    /// were received.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<BatchReport> {
        self.handle.await.context("Encode job panicked")
    }
}
