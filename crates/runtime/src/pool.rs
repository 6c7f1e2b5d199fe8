use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool is shutting down and accepts no more work.
    Closed,
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Closed => write!(f, "worker pool is closed"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Fixed-size pool of worker threads fed from a shared task channel.
///
/// Tasks run in submission order per worker but complete in any order; results
/// must be sent back through a completion channel. Dropping the pool closes
/// the channel and joins every worker after the queued tasks have run.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("tile-worker-{index}"))
                .spawn(move || worker_loop(index, rx))?;
            workers.push(handle);
        }

        debug!(threads, "worker pool started");
        Ok(Self {
            sender: Some(tx),
            workers,
        })
    }

    /// Pool sized to the machine's available parallelism.
    pub fn with_default_threads() -> std::io::Result<Self> {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::new(threads)
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        sender.send(Box::new(task)).map_err(|_| PoolError::Closed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

fn worker_loop(index: usize, rx: Receiver<Task>) {
    for task in rx.iter() {
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(worker = index, "task panicked; worker continues");
        }
    }
    debug!(worker = index, "worker stopped");
}
