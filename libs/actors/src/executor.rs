//! Shared elastic worker pool
//!
//! Jobs go through one unbounded crossbeam channel. A job is picked up by an
//! idle worker, or a new worker is spawned when none is idle (up to
//! `max_threads`). Workers above `core_threads` exit after sitting idle for
//! `keep_alive`. Handlers may block (awaits do), so the pool grows instead
//! of queueing behind a blocked worker.

use crate::error::{ActorError, Result};
use actor_config::ExecutorSettings;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Pool {
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    settings: ExecutorSettings,
    threads: AtomicUsize,
    idle: AtomicUsize,
    spawned: AtomicU64,
}

/// Cached thread pool shared by every actor of a context
#[derive(Clone)]
pub struct ContextExecutor {
    pool: Arc<Pool>,
}

impl ContextExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            pool: Arc::new(Pool {
                sender: Mutex::new(Some(sender)),
                receiver,
                settings,
                threads: AtomicUsize::new(0),
                idle: AtomicUsize::new(0),
                spawned: AtomicU64::new(0),
            }),
        }
    }

    /// Queue a job; fails once the executor is shut down
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .pool
            .sender
            .lock()
            .clone()
            .ok_or(ActorError::ContextStopped)?;
        sender
            .send(Box::new(job))
            .map_err(|_| ActorError::ContextStopped)?;
        self.pool.ensure_worker();
        Ok(())
    }

    /// Run a job on the pool and block until it has finished
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.submit(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job))
                .map_err(|panic| ActorError::panicked(panic.as_ref()));
            let _ = done_tx.send(outcome);
        })?;
        // A dropped job (shutdown) disconnects the channel
        done_rx.recv().map_err(|_| ActorError::ContextStopped)?
    }

    /// Stop accepting jobs and drop the queued ones; returns how many were dropped
    pub fn shutdown(&self) -> usize {
        let sender = self.pool.sender.lock().take();
        if sender.is_none() {
            return 0;
        }
        drop(sender);
        let dropped = self.pool.receiver.try_iter().count();
        debug!(dropped, "Executor shut down");
        dropped
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.sender.lock().is_none()
    }

    /// Live worker threads
    pub fn thread_count(&self) -> usize {
        self.pool.threads.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.pool.idle.load(Ordering::SeqCst)
    }

    /// Workers spawned since creation
    pub fn spawned_count(&self) -> u64 {
        self.pool.spawned.load(Ordering::Relaxed)
    }
}

impl Pool {
    /// Spawn a worker when queued jobs outnumber idle workers
    fn ensure_worker(self: &Arc<Self>) {
        if self.receiver.len() <= self.idle.load(Ordering::SeqCst) {
            return;
        }
        let claimed = self
            .threads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.settings.max_threads).then_some(n + 1)
            });
        let index = match claimed {
            Ok(previous) => previous,
            Err(_) => return,
        };

        let pool = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.settings.thread_name, index))
            .spawn(move || pool.work());
        match spawned {
            Ok(_) => {
                self.spawned.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.threads.fetch_sub(1, Ordering::SeqCst);
                warn!(error = %e, "Failed to spawn worker thread");
            }
        }
    }

    fn work(self: Arc<Self>) {
        let keep_alive = self.settings.keep_alive();
        loop {
            self.idle.fetch_add(1, Ordering::SeqCst);
            let received = self.receiver.recv_timeout(keep_alive);
            self.idle.fetch_sub(1, Ordering::SeqCst);

            match received {
                Ok(job) => {
                    // Jobs queued behind this one need another worker if we block
                    self.ensure_worker();
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("Executor job panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.receiver.is_empty() {
                        continue;
                    }
                    if self.retire() {
                        return;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.threads.fetch_sub(1, Ordering::SeqCst);
    }

    /// Give up this worker if the pool is above its core size
    fn retire(&self) -> bool {
        self.threads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > self.settings.core_threads).then(|| n - 1)
            })
            .is_ok()
    }
}
