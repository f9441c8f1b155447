//! Subscriber delivery context.
//!
//! Transports call the connector from their own threads, possibly several at
//! once. Subscriber callbacks never run there: dispatch schedules them onto a
//! single serial [`DeliveryContext`], so subscriber code needs no locking of
//! its own and observes deliveries in scheduling order.
//!
//! [`DeliveryQueue`] is the default context: one tokio task draining an
//! unbounded channel. Applications with their own main loop (a UI thread, an
//! actor) implement [`DeliveryContext`] and pass it to
//! [`ConnectorBuilder::delivery_context`](crate::ConnectorBuilder::delivery_context).

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::macros::{log_debug, log_error};

/// A unit of subscriber work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial executor for subscriber callbacks.
///
/// Implementations must run jobs one at a time, in the order they were
/// scheduled, and must not run a job inline on the caller's stack (the
/// caller may be a transport thread).
pub trait DeliveryContext: Send + Sync {
    /// Queue `job` behind everything scheduled before it.
    ///
    /// Returns without running the job. A context that is shutting down may
    /// drop it.
    fn schedule(&self, job: Job);
}

/// Default delivery context backed by a dedicated tokio task.
///
/// A panicking job is caught and logged; later jobs still run. Callbacks run
/// on a runtime worker, so they should not block.
pub struct DeliveryQueue {
    // ---
    tx: mpsc::UnboundedSender<Job>,
    _task: JoinHandle<()>,
}

impl DeliveryQueue {
    // ---

    /// Start the queue's task on the given runtime.
    pub fn spawn(runtime: &Handle) -> Self {
        // ---
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let task = runtime.spawn(async move {
            log_debug!("delivery queue started");

            while let Some(job) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log_error!("subscriber callback panicked; delivery continues");
                }
            }

            log_debug!("delivery queue stopped");
        });

        Self { tx, _task: task }
    }
}

impl DeliveryContext for DeliveryQueue {
    fn schedule(&self, job: Job) {
        // ---
        // Only fails once the runtime is shutting down.
        if self.tx.send(job).is_err() {
            log_debug!("delivery queue closed, job dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    async fn drain(queue: &DeliveryQueue) {
        let (tx, rx) = oneshot::channel();
        queue.schedule(Box::new(move || {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        // ---
        let queue = DeliveryQueue::spawn(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = seen.clone();
            queue.schedule(Box::new(move || seen.lock().unwrap().push(i)));
        }
        drain(&queue).await;

        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panic_does_not_stop_queue() {
        // ---
        let queue = DeliveryQueue::spawn(&Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        queue.schedule(Box::new(|| panic!("subscriber bug")));
        let sink = seen.clone();
        queue.schedule(Box::new(move || sink.lock().unwrap().push("after")));
        drain(&queue).await;

        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }
}
