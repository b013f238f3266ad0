//! Background worker thread that runs reduction jobs off the caller's thread
//!
//! One worker is kept per coordinator and reused across requests. Replies go
//! back over a oneshot channel so the caller can await them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Result, SamplerError};
use crate::pipeline::{self, Job};
use crate::series::Columns;

/// Requests that can be sent to the background worker
pub(crate) enum WorkerRequest {
    /// Run a reduction job
    Reduce {
        generation: u64,
        job: Arc<Job>,
        reply: oneshot::Sender<WorkerReply>,
    },
    /// Panic on the next job while still holding its reply sender
    #[cfg(test)]
    FailNext,
    /// Shutdown the worker
    Shutdown,
}

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Reducer output for one job
#[derive(Debug)]
pub(crate) struct WorkerReply {
    pub generation: u64,
    pub outputs: Result<Vec<Columns>>,
}

/// Background worker that processes jobs off the calling thread
pub(crate) struct BackgroundWorker {
    id: u64,
    tx: Sender<WorkerRequest>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Spawn a new named worker thread
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = channel::<WorkerRequest>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::worker_loop(rx))
            .map_err(|e| SamplerError::OffloadUnavailable(format!("spawn failed: {}", e)))?;

        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(thread = name, worker = id, "background worker started");
        Ok(Self {
            id,
            tx,
            handle: Some(handle),
        })
    }

    /// Distinguishes this worker from any respawned replacement
    pub fn id(&self) -> u64 {
        self.id
    }

    fn worker_loop(rx: Receiver<WorkerRequest>) {
        #[cfg(test)]
        let mut fail_next = false;

        while let Ok(request) = rx.recv() {
            match request {
                WorkerRequest::Reduce {
                    generation,
                    job,
                    reply,
                } => {
                    #[cfg(test)]
                    if std::mem::take(&mut fail_next) {
                        panic!("injected worker failure for generation {}", generation);
                    }
                    let outputs = pipeline::execute(&job);
                    // the caller may be gone; a stale reply is simply dropped
                    let _ = reply.send(WorkerReply { generation, outputs });
                }
                #[cfg(test)]
                WorkerRequest::FailNext => fail_next = true,
                WorkerRequest::Shutdown => break,
            }
        }
    }

    /// Queue a job; the receiver resolves when the worker has finished it
    pub fn request(&self, generation: u64, job: Arc<Job>) -> Result<oneshot::Receiver<WorkerReply>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Reduce {
                generation,
                job,
                reply,
            })
            .map_err(|_| SamplerError::OffloadUnavailable("worker channel closed".to_string()))?;
        Ok(rx)
    }

    /// Make the worker die on its next job
    #[cfg(test)]
    pub fn fail_next(&self) {
        let _ = self.tx.send(WorkerRequest::FailNext);
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
