use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use taskpipe_core::Task;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use crate::channel::StatusReporter;
use crate::queue::BoundedTaskQueue;
use crate::session::{next_worker_id, Session};

/// Execution pool: persistent tasks that drain the queue, run each
/// simulated workload, and deliver exactly one terminal status per task.
pub struct ConsumerPool {
    handles: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    pub fn spawn(
        count: usize,
        public: PathBuf,
        queue: Arc<BoundedTaskQueue>,
        session: Arc<Session>,
        workload_unit: Duration,
    ) -> Self {
        let handles = (0..count)
            .map(|_| {
                let public = public.clone();
                let queue = queue.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    consumer_loop(public, queue, session, workload_unit).await;
                })
            })
            .collect();

        ConsumerPool { handles }
    }

    /// Wait for every consumer to exit; the queue is empty afterwards.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!("consumer task aborted: {err}");
            }
        }
    }
}

async fn consumer_loop(
    public: PathBuf,
    queue: Arc<BoundedTaskQueue>,
    session: Arc<Session>,
    workload_unit: Duration,
) {
    let worker_id = next_worker_id();
    let reporter = StatusReporter::new(public, worker_id);
    let shutdown = session.shutdown_token();

    debug!(worker_id, "consumer started");

    loop {
        let mut task = match queue.pop().await {
            Ok(task) => task,
            Err(_) => break,
        };

        if session.is_shutting_down() {
            // Popped while draining: nothing finishes past the deadline
            task.abandon();
            report_terminal(&reporter, &session, &task).await;
            continue;
        }

        task.begin();
        debug!(
            worker_id,
            request_id = task.request_id,
            client = %task.client,
            "task executing"
        );
        if let Err(err) = reporter.emit(&task).await {
            // No way to reach this client; don't burn budget on its work
            warn!(
                worker_id,
                request_id = task.request_id,
                "cannot reach submitter, failing task: {err}"
            );
            task.fail();
            report_terminal(&reporter, &session, &task).await;
            continue;
        }

        tokio::select! {
            _ = time::sleep(workload_cost(task.workload, workload_unit)) => {
                task.complete(compute_result(task.workload));
            }
            _ = shutdown.cancelled() => {
                task.abandon();
            }
        }

        report_terminal(&reporter, &session, &task).await;
    }

    debug!(worker_id, "consumer exiting");
}

/// Deliver the task's terminal status; a delivery failure affects only
/// this task's client and is logged, never escalated.
async fn report_terminal(reporter: &StatusReporter, session: &Session, task: &Task) {
    session.stats().record_terminal(task.status);
    if let Err(err) = reporter.emit(task).await {
        warn!(
            request_id = task.request_id,
            client = %task.client,
            status = task.status.as_str(),
            "failed to deliver terminal status: {err}"
        );
    }
}

/// Simulated execution time: `workload` units of the configured cost.
/// Hostile negative workloads cost nothing instead of wedging a worker.
fn workload_cost(workload: i32, unit: Duration) -> Duration {
    unit.checked_mul(workload.max(0) as u32)
        .unwrap_or(Duration::MAX)
}

/// Deterministic result of the simulated computation.
fn compute_result(workload: i32) -> i32 {
    workload.saturating_mul(2)
}
