//! Job-to-slot binding
//!
//! One worker task per slot, each consuming its own bounded queue, so a slot
//! never sees two jobs at once and jobs on one slot are processed strictly in
//! submission order. Submission round-robins across slots; a full queue
//! backpressures the submitter instead of dropping work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::EngineError;
use crate::job::Job;
use crate::worker::WorkerExecutor;

pub struct JobDispatcher {
    senders: Vec<mpsc::Sender<Job>>,
    next: AtomicUsize,
    handles: Vec<JoinHandle<()>>,
}

impl JobDispatcher {
    /// Spawns one worker task per slot and returns the dispatch handle.
    pub fn start(executor: Arc<WorkerExecutor>, worker_count: usize, queue_depth: usize) -> Self {
        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for slot_index in 0..worker_count {
            let (tx, mut rx) = mpsc::channel::<Job>(queue_depth);
            let executor = executor.clone();
            let handle = tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    executor.execute(&job, slot_index).await;
                }
                log::debug!("worker {} stopped", slot_index);
            });
            senders.push(tx);
            handles.push(handle);
        }

        Self {
            senders,
            next: AtomicUsize::new(0),
            handles,
        }
    }

    /// Binds the job to the next slot in round-robin order.
    pub async fn submit(&self, job: Job) -> Result<(), EngineError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst) % self.senders.len();
        self.senders[index]
            .send(job)
            .await
            .map_err(|e| EngineError::Queue(format!("worker {} unavailable: {}", index, e)))
    }

    /// Closes the queues and waits for in-flight jobs to drain.
    pub async fn shutdown(mut self) {
        self.senders.clear();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                log::warn!("worker task join failed: {}", e);
            }
        }
    }
}
