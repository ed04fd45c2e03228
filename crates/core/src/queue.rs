//! Unbounded FIFO of pending jobs shared by watchers and workers

use crate::job::Job;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Thread-safe job queue
///
/// Cheap to clone; every clone refers to the same queue. Producers never
/// block. Consumers poll with a timeout so they can observe shutdown.
///
/// Every pushed job is counted as outstanding until a consumer calls
/// [`WorkQueue::task_done`] for it.
#[derive(Clone)]
pub struct WorkQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    outstanding: Arc<Outstanding>,
}

#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            outstanding: Arc::new(Outstanding::default()),
        }
    }

    /// Enqueue a job
    pub fn push(&self, job: Job) {
        *self.outstanding.count.lock() += 1;
        // Both ends live inside `self`, so the channel cannot be disconnected
        if let Err(e) = self.tx.send(job) {
            self.task_done();
            tracing::error!(path = %e.0.path.display(), "work queue disconnected, job lost");
        }
    }

    /// Dequeue the next job, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Job> {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => Some(job),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<Job> {
        self.rx.try_recv().ok()
    }

    /// Mark one dequeued job as finished (success or failure)
    pub fn task_done(&self) {
        let mut count = self.outstanding.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.outstanding.idle.notify_all();
        }
    }

    /// Jobs waiting in the queue (not yet dequeued)
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Jobs pushed but not yet marked done
    pub fn outstanding(&self) -> usize {
        *self.outstanding.count.lock()
    }

    /// Block until every pushed job has been marked done
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            if self
                .outstanding
                .idle
                .wait_until(&mut count, deadline)
                .timed_out()
            {
                return *count == 0;
            }
        }
        true
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("queued", &self.len())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
