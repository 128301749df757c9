//! Dedicated executor for user send-callbacks.
//!
//! User callbacks never run on the tasks driving RPC completion: they are
//! handed to a fixed set of worker tasks fed by a bounded queue. When the
//! queue is full, `submit` waits for space — back-pressure lands on the
//! producer's dispatch task, never on the transport. A panicking callback
//! is caught and logged; it must not take a worker down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, warn};

pub(crate) type CallbackJob = Box<dyn FnOnce() + Send + 'static>;

pub(crate) const DEFAULT_CALLBACK_QUEUE_CAPACITY: usize = 1024;

pub(crate) struct CallbackExecutor {
    queue: Mutex<Option<mpsc::Sender<CallbackJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CallbackExecutor {
    /// Spawns `workers` worker tasks behind a queue of `queue_capacity`
    /// slots. Must be called within a tokio runtime.
    pub(crate) fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<CallbackJob>(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => {
                                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                    error!("send callback panicked");
                                }
                            }
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Sized to the machine: one worker per available core.
    pub(crate) fn with_default_workers(queue_capacity: usize) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(workers, queue_capacity)
    }

    /// Enqueues a callback, waiting for queue space if necessary. Dropped
    /// with a warning when the executor has been shut down.
    pub(crate) async fn submit(&self, job: CallbackJob) {
        let sender = self.queue.lock().await.clone();
        match sender {
            Some(tx) => {
                if tx.send(job).await.is_err() {
                    warn!("callback executor stopped, dropping callback");
                }
            }
            None => warn!("callback executor stopped, dropping callback"),
        }
    }

    /// Closes the queue and waits for the workers to drain outstanding
    /// callbacks. Idempotent.
    pub(crate) async fn shutdown(&self) {
        let Some(sender) = self.queue.lock().await.take() else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            if handle.await.is_err() {
                error!("callback worker aborted during shutdown");
            }
        }
    }
}
