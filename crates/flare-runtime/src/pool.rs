//! Shared worker pool
//!
//! A fixed set of named threads pulls boxed jobs from one global injector.
//! Jobs are long-lived in practice (a running timer occupies a worker for its
//! whole life), so there is no per-worker deque or stealing.

use crate::error::RuntimeError;
use crossbeam_deque::{Injector, Steal};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A unit of work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    injector: Injector<Job>,
    shutdown: AtomicBool,
    active: AtomicUsize,
}

/// Fixed-size thread pool
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `threads` workers
    pub fn new(threads: usize) -> Result<Self, RuntimeError> {
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            shutdown: AtomicBool::new(false),
            active: AtomicUsize::new(0),
        });

        let mut pool = ThreadPool {
            shared,
            handles: Vec::with_capacity(threads),
        };
        for index in 0..threads.max(1) {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("flare-worker-{}", index))
                .spawn(move || Self::run_loop(index, &shared))
                .map_err(|source| RuntimeError::Spawn { index, source })?;
            pool.handles.push(handle);
        }

        debug!(threads = pool.handles.len(), "thread pool started");
        Ok(pool)
    }

    /// Queue a job
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.injector.push(Box::new(job));
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Jobs currently executing
    pub fn active_jobs(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Stop the pool, returning how many workers died from a panicking job
    pub fn shutdown(mut self) -> usize {
        self.join_workers()
    }

    fn join_workers(&mut self) -> usize {
        self.shared.shutdown.store(true, Ordering::Release);
        let mut panicked = 0;
        for (index, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                warn!(worker = index, "worker panicked");
                panicked += 1;
            }
        }
        debug!(panicked, "thread pool stopped");
        panicked
    }

    fn run_loop(index: usize, shared: &Shared) {
        loop {
            if shared.shutdown.load(Ordering::Acquire) {
                break;
            }

            match shared.injector.steal() {
                Steal::Success(job) => {
                    shared.active.fetch_add(1, Ordering::AcqRel);
                    job();
                    shared.active.fetch_sub(1, Ordering::AcqRel);
                }
                Steal::Retry => continue,
                Steal::Empty => thread::sleep(Duration::from_micros(100)),
            }
        }
        trace!(worker = index, "worker exiting");
    }
}

impl Drop for ThreadPool {
    /// Stop accepting work and join every worker
    ///
    /// Jobs still queued are dropped unrun. Running jobs are waited for.
    fn drop(&mut self) {
        self.join_workers();
    }
}
