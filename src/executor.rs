//! Background worker pool for command handlers.
//!
//! Collaborator SDK calls may block on network or disk, so dispatch hands
//! every handler to this pool and returns immediately. Tasks are unordered:
//! two submitted tasks may interleave or run in parallel, and the bridge does
//! not serialize them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads draining a shared task queue.
///
/// A panicking task is logged and the worker survives; the process never
/// crashes because of a failed handler. Note the panicking task's reply
/// channel, if unresolved at the point of panic, stays unresolved.
pub struct WorkerPool {
    sender: async_channel::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool requires at least one thread");
        let (sender, receiver) = async_channel::unbounded::<Task>();

        let workers = (0..size)
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("bridge-worker-{}", index))
                    .spawn(move || worker_loop(receiver))
                    .expect("failed to spawn bridge worker thread")
            })
            .collect();

        WorkerPool { sender, workers }
    }

    /// Submit a task for asynchronous execution. Never blocks the caller.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        // Send only fails once the channel is closed, i.e. during drop.
        if self.sender.send_blocking(Box::new(task)).is_err() {
            error!("Task submitted to a shut-down worker pool; dropping it");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(receiver: async_channel::Receiver<Task>) {
    while let Ok(task) = receiver.recv_blocking() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, "Background task panicked; worker continues");
        }
    }
    debug!("Bridge worker shutting down");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
